// A participant's client-visible state within a session.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::estimate::Estimate;

const ID_LEN: usize = 9;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// One user's record, as stored under `rooms/{code}/users/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub has_voted: bool,
    /// The card chosen this round. Absent from the stored record when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_card: Option<Estimate>,
    #[serde(default)]
    pub is_observer: bool,
    #[serde(with = "chrono::serde::ts_milliseconds", default = "Utc::now")]
    pub last_seen: DateTime<Utc>,
}

impl Participant {
    /// A fresh voter who has not picked a card yet.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Participant {
            id: id.into(),
            name: name.into(),
            has_voted: false,
            selected_card: None,
            is_observer: false,
            last_seen: Utc::now(),
        }
    }

    /// Record a vote.
    pub fn vote(&mut self, card: Estimate) {
        self.has_voted = true;
        self.selected_card = Some(card);
    }

    /// Withdraw any vote.
    pub fn clear_vote(&mut self) {
        self.has_voted = false;
        self.selected_card = None;
    }

    /// Whether this participant counts towards vote completeness.
    pub fn is_voter(&self) -> bool {
        !self.is_observer
    }
}

/// Generate a random 9-character lowercase base-36 participant id.
pub fn generate_participant_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
