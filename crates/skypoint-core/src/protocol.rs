// Message types: relay wire frames and the client's UI channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consensus::VoteResult;
use crate::estimate::Estimate;
use crate::session::backlog::BacklogItem;
use crate::session::participant::Participant;

// ---------------------------------------------------------------------------
// Relay wire protocol
// ---------------------------------------------------------------------------

/// Frames sent from a store client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Set { req: u64, path: String, value: Value },
    Remove { req: u64, path: String },
    Subscribe { sub: u64, path: String },
    Unsubscribe { sub: u64 },
    /// Remove `path` when this connection closes.
    RemoveOnDisconnect { req: u64, path: String },
}

/// Frames sent from the relay to a store client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    Ack { req: u64 },
    Nack { req: u64, message: String },
    /// Full subtree at the subscribed path (`null` when absent).
    Snapshot { sub: u64, value: Value },
}

// ---------------------------------------------------------------------------
// Client UI channels
// ---------------------------------------------------------------------------

/// Synchronization status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// No store configured or reachable at startup; local-only session.
    Demo,
    /// The subscription failed or dropped; showing a local-only view.
    Error,
}

/// Commands from the UI to the client event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    SelectCard(Estimate),
    ClearVote,
    Reveal,
    /// Start a new round without recording an estimate.
    Reset,
    SetStory(String),
    SetObserver(bool),
    AddBacklogItem(String),
    SelectBacklogItem(usize),
    EditBacklogItem { id: u32, title: String },
    DeleteBacklogItem(u32),
    /// Record the consensus on the current backlog item, then reset.
    CompleteStory,
    Leave,
}

/// Everything a UI needs to render the room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub code: String,
    pub local_participant_id: String,
    pub participants: Vec<Participant>,
    pub current_story: String,
    pub is_revealed: bool,
    pub all_votes_in: bool,
    /// `(voted, eligible)` among non-observers.
    pub vote_progress: (usize, usize),
    pub selected_card: Option<Estimate>,
    /// Empty until revealed.
    pub results: Vec<VoteResult>,
    /// Consensus estimate; `None` until revealed.
    pub consensus: Option<f64>,
    pub backlog: Vec<BacklogItem>,
    pub current_backlog_index: usize,
    pub connection_status: ConnectionStatus,
}

/// Updates pushed from the client event loop to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    ConnectionStatus(ConnectionStatus),
    Room(Box<RoomSnapshot>),
    /// The local participant left; no further updates follow.
    Left,
}
