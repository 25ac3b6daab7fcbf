// Store paths used by a room.

use crate::session::code::RoomCode;

/// Root of everything a room stores: `rooms/{code}`.
pub fn room(code: &RoomCode) -> String {
    format!("rooms/{code}")
}

/// One participant record: `rooms/{code}/users/{id}`.
pub fn user(code: &RoomCode, participant_id: &str) -> String {
    format!("rooms/{code}/users/{participant_id}")
}

/// A single field of a participant record.
pub fn user_field(code: &RoomCode, participant_id: &str, field: &str) -> String {
    format!("rooms/{code}/users/{participant_id}/{field}")
}

/// `rooms/{code}/session/isRevealed`.
pub fn revealed(code: &RoomCode) -> String {
    format!("rooms/{code}/session/isRevealed")
}

/// `rooms/{code}/session/currentStory`.
pub fn story(code: &RoomCode) -> String {
    format!("rooms/{code}/session/currentStory")
}

/// Split a slash-separated path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
