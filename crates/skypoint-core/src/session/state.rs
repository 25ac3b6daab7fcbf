// Session state: participants, reveal flag, story text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::code::RoomCode;
use super::participant::Participant;
use crate::consensus::VoteResult;

/// Everything the room shares between clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub code: RoomCode,
    pub current_story: String,
    /// Session-wide; never tracked per participant.
    pub is_revealed: bool,
    /// Participants keyed by id. Ordered by id, which is also the order the
    /// store returns children in.
    pub participants: BTreeMap<String, Participant>,
}

impl SessionState {
    /// An empty, unrevealed session.
    pub fn new(code: RoomCode) -> Self {
        SessionState {
            code,
            current_story: String::new(),
            is_revealed: false,
            participants: BTreeMap::new(),
        }
    }

    /// Build session state from the full `rooms/{code}` subtree.
    ///
    /// A `null` subtree is an empty room. Participant records that fail to
    /// parse are skipped with a warning; the map key wins over any `id`
    /// field inside the record. A card without `hasVoted` is dropped.
    pub fn from_snapshot(code: RoomCode, snapshot: &Value) -> Self {
        let mut state = SessionState::new(code);

        if let Some(session) = snapshot.get("session") {
            state.is_revealed = session
                .get("isRevealed")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            state.current_story = session
                .get("currentStory")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }

        if let Some(users) = snapshot.get("users").and_then(Value::as_object) {
            for (id, record) in users {
                match serde_json::from_value::<Participant>(record.clone()) {
                    Ok(mut participant) => {
                        participant.id = id.clone();
                        if !participant.has_voted {
                            participant.selected_card = None;
                        }
                        state.participants.insert(id.clone(), participant);
                    }
                    Err(e) => {
                        warn!("Skipping malformed participant record {id} in room {}: {e}", state.code);
                    }
                }
            }
        }

        state
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participant_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    /// Insert or replace a participant by id.
    pub fn upsert(&mut self, participant: Participant) {
        self.participants.insert(participant.id.clone(), participant);
    }

    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        self.participants.remove(id)
    }

    /// True when every non-observer has voted. Vacuously true with no voters.
    pub fn all_votes_in(&self) -> bool {
        self.participants
            .values()
            .filter(|p| p.is_voter())
            .all(|p| p.has_voted)
    }

    /// `(voted, eligible)` counts over non-observers.
    pub fn vote_progress(&self) -> (usize, usize) {
        let voters = self.participants.values().filter(|p| p.is_voter());
        let (mut voted, mut eligible) = (0, 0);
        for p in voters {
            eligible += 1;
            if p.has_voted {
                voted += 1;
            }
        }
        (voted, eligible)
    }

    /// Non-observers who voted, paired with their card, in participant order.
    pub fn vote_results(&self) -> Vec<VoteResult> {
        self.participants
            .values()
            .filter(|p| p.is_voter() && p.has_voted)
            .filter_map(|p| {
                p.selected_card.map(|value| VoteResult {
                    participant_id: p.id.clone(),
                    name: p.name.clone(),
                    value,
                })
            })
            .collect()
    }

    /// Clear every vote and hide the cards again.
    pub fn reset_round(&mut self) {
        self.is_revealed = false;
        for p in self.participants.values_mut() {
            p.clear_vote();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::Estimate;
    use serde_json::json;

    fn code() -> RoomCode {
        RoomCode::coerce("ABC123").unwrap()
    }

    fn state_with(participants: Vec<Participant>) -> SessionState {
        let mut state = SessionState::new(code());
        for p in participants {
            state.upsert(p);
        }
        state
    }

    #[test]
    fn all_votes_in_vacuous_with_no_voters() {
        let state = SessionState::new(code());
        assert!(state.all_votes_in());

        let mut observer = Participant::new("o1", "Olive");
        observer.is_observer = true;
        let state = state_with(vec![observer]);
        assert!(state.all_votes_in());
    }

    #[test]
    fn all_votes_in_ignores_observers() {
        let mut a = Participant::new("a", "Ann");
        a.vote(Estimate::Five);
        let mut obs = Participant::new("o", "Obs");
        obs.is_observer = true;
        let state = state_with(vec![a, obs]);
        assert!(state.all_votes_in());
        assert_eq!(state.vote_progress(), (1, 1));
    }

    #[test]
    fn all_votes_in_false_when_someone_waiting() {
        let mut a = Participant::new("a", "Ann");
        a.vote(Estimate::Five);
        let b = Participant::new("b", "Ben");
        let state = state_with(vec![a, b]);
        assert!(!state.all_votes_in());
        assert_eq!(state.vote_progress(), (1, 2));
    }

    #[test]
    fn vote_results_only_include_voting_non_observers() {
        let mut a = Participant::new("a", "Ann");
        a.vote(Estimate::Five);
        let b = Participant::new("b", "Ben");
        let mut obs = Participant::new("c", "Cat");
        obs.is_observer = true;
        obs.vote(Estimate::Eight);
        let state = state_with(vec![a, b, obs]);

        let results = state.vote_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].participant_id, "a");
        assert_eq!(results[0].name, "Ann");
        assert_eq!(results[0].value, Estimate::Five);
    }

    #[test]
    fn reset_round_clears_everyone() {
        let mut a = Participant::new("a", "Ann");
        a.vote(Estimate::Five);
        let mut b = Participant::new("b", "Ben");
        b.vote(Estimate::Coffee);
        let mut state = state_with(vec![a, b]);
        state.is_revealed = true;

        state.reset_round();
        assert!(!state.is_revealed);
        assert!(state
            .participants
            .values()
            .all(|p| !p.has_voted && p.selected_card.is_none()));
    }

    #[test]
    fn from_snapshot_reads_users_and_session() {
        let snapshot = json!({
            "users": {
                "a": {"id": "a", "name": "Ann", "hasVoted": true, "selectedCard": "8", "isObserver": false, "lastSeen": 10},
                "b": {"id": "b", "name": "Ben", "hasVoted": false, "isObserver": true, "lastSeen": 20}
            },
            "session": {"isRevealed": true, "currentStory": "Login page"}
        });
        let state = SessionState::from_snapshot(code(), &snapshot);
        assert!(state.is_revealed);
        assert_eq!(state.current_story, "Login page");
        assert_eq!(state.participants.len(), 2);
        assert_eq!(state.participant("a").unwrap().selected_card, Some(Estimate::Eight));
        assert!(state.participant("b").unwrap().is_observer);
    }

    #[test]
    fn from_snapshot_drops_card_without_vote() {
        // Mid-reset: hasVoted already cleared, selectedCard not yet removed.
        let snapshot = json!({
            "users": {
                "a": {"name": "Ann", "hasVoted": false, "selectedCard": "3", "lastSeen": 1}
            }
        });
        let state = SessionState::from_snapshot(code(), &snapshot);
        let ann = state.participant("a").unwrap();
        assert!(!ann.has_voted);
        assert_eq!(ann.selected_card, None);
    }

    #[test]
    fn from_snapshot_null_is_empty_room() {
        let state = SessionState::from_snapshot(code(), &Value::Null);
        assert!(state.participants.is_empty());
        assert!(!state.is_revealed);
        assert_eq!(state.current_story, "");
    }

    #[test]
    fn from_snapshot_skips_malformed_records() {
        let snapshot = json!({
            "users": {
                "a": {"name": "Ann", "lastSeen": 1},
                "b": {"name": "Ben", "selectedCard": "7", "lastSeen": 1},
                "c": "garbage"
            }
        });
        let state = SessionState::from_snapshot(code(), &snapshot);
        assert_eq!(state.participants.len(), 1);
        // Key fills in the missing id field.
        assert_eq!(state.participant("a").unwrap().id, "a");
    }
}
