// Room codes and direct-join links.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

/// Number of characters in a room code.
pub const CODE_LEN: usize = 6;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A 6-character uppercase alphanumeric session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a fresh random code.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        RoomCode(code)
    }

    /// Coerce free-form user input into a code.
    ///
    /// Upper-cases, drops anything outside `[A-Z0-9]` and truncates to
    /// [`CODE_LEN`]. Returns `None` unless exactly six characters remain.
    pub fn coerce(input: &str) -> Option<Self> {
        let cleaned: String = input
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.is_ascii_alphanumeric())
            .take(CODE_LEN)
            .collect();
        (cleaned.len() == CODE_LEN).then_some(RoomCode(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomCode::coerce(&value).ok_or_else(|| format!("invalid room code: {value:?}"))
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Parameters extracted from a direct-join link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    pub code: RoomCode,
    /// Display name prefilled by the link, if non-empty.
    pub name: Option<String>,
}

/// Parse a `?join=CODE&name=NAME` link.
///
/// Accepts either a full URL or a bare query string. Returns `None` when the
/// link carries no usable room code.
pub fn parse_join_link(link: &str) -> Option<JoinLink> {
    let query = match Url::parse(link) {
        Ok(url) => url.query().unwrap_or_default().to_string(),
        Err(_) => link.trim_start_matches('?').to_string(),
    };

    let mut code = None;
    let mut name = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "join" => code = RoomCode::coerce(&value),
            "name" => {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    name = Some(trimmed.to_string());
                }
            }
            _ => {}
        }
    }

    code.map(|code| JoinLink { code, name })
}
