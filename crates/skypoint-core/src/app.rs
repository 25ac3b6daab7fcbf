// Client orchestration: the event loop behind one participant's room view.
//
// Coordinates user commands from the UI, snapshots from the store, and the
// liveness heartbeat. Owns the reconciler and the local backlog, and pushes
// a fresh room snapshot to the UI after every change.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::consensus::format_points;
use crate::protocol::{ConnectionStatus, RoomSnapshot, UiUpdate, UserCommand};
use crate::reconciler::Reconciler;
use crate::session::backlog::Backlog;
use crate::sync::{RelayStore, SyncStore};

// ---------------------------------------------------------------------------
// ClientState
// ---------------------------------------------------------------------------

/// Everything one client keeps for a room.
pub struct ClientState {
    pub room: Reconciler,
    pub backlog: Backlog,
}

impl ClientState {
    pub fn new(room: Reconciler) -> Self {
        ClientState {
            room,
            backlog: Backlog::new(),
        }
    }

    /// Build the UI's view of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        let state = self.room.state();
        RoomSnapshot {
            code: state.code.to_string(),
            local_participant_id: self.room.local_participant().id.clone(),
            participants: state.participants.values().cloned().collect(),
            current_story: state.current_story.clone(),
            is_revealed: state.is_revealed,
            all_votes_in: state.all_votes_in(),
            vote_progress: state.vote_progress(),
            selected_card: self.room.selected_card(),
            results: self.room.results(),
            consensus: self.room.consensus(),
            backlog: self.backlog.items().to_vec(),
            current_backlog_index: self.backlog.current_index(),
            connection_status: self.room.status(),
        }
    }

    /// Apply one user command. Returns false when the loop should stop.
    pub async fn handle_command(&mut self, cmd: UserCommand) -> bool {
        let local_id = self.room.local_participant().id.clone();
        match cmd {
            UserCommand::SelectCard(card) => {
                if let Err(e) = self.room.submit_vote(&local_id, card) {
                    warn!("Vote ignored: {e}");
                }
            }
            UserCommand::ClearVote => {
                if let Err(e) = self.room.clear_vote(&local_id) {
                    warn!("Clear vote ignored: {e}");
                }
            }
            UserCommand::Reveal => {
                let results = self.room.reveal();
                info!("Revealed {} vote(s)", results.len());
            }
            UserCommand::Reset => self.room.reset(),
            UserCommand::SetStory(text) => {
                let text = text.trim();
                self.backlog.edit_current(text);
                self.room.set_story(text);
            }
            UserCommand::SetObserver(observer) => {
                if let Err(e) = self.room.set_observer(&local_id, observer) {
                    warn!("Observer toggle ignored: {e}");
                }
            }
            UserCommand::AddBacklogItem(title) => {
                if self.backlog.add(&title).is_none() {
                    warn!("Ignoring blank backlog item");
                }
            }
            UserCommand::SelectBacklogItem(index) => {
                if self.backlog.select(index) {
                    self.sync_story_from_backlog();
                } else {
                    warn!("No backlog item at index {index}");
                }
            }
            UserCommand::EditBacklogItem { id, title } => {
                let is_current = self.backlog.current().is_some_and(|i| i.id == id);
                if !self.backlog.edit(id, &title) {
                    warn!("No backlog item with id {id}");
                } else if is_current {
                    self.sync_story_from_backlog();
                }
            }
            UserCommand::DeleteBacklogItem(id) => {
                let before = self.backlog.current().map(|i| i.id);
                if !self.backlog.delete(id) {
                    warn!("Backlog item {id} not deleted");
                } else if self.backlog.current().map(|i| i.id) != before {
                    self.sync_story_from_backlog();
                }
            }
            UserCommand::CompleteStory => self.complete_story(),
            UserCommand::Leave => {
                self.room.leave().await;
                return false;
            }
        }
        true
    }

    /// Record the consensus on the current backlog item and start a new round.
    fn complete_story(&mut self) {
        let Some(points) = self.room.consensus() else {
            warn!("Cannot complete a story before cards are revealed");
            return;
        };
        if let Some(item) = self.backlog.complete_current(points) {
            info!(
                "Completed {} with {} story points",
                item.display_title(),
                format_points(points)
            );
        }
        self.room.reset();
    }

    fn sync_story_from_backlog(&mut self) {
        let title = self.backlog.current_title().to_string();
        self.room.set_story(&title);
    }
}

// ---------------------------------------------------------------------------
// Store setup
// ---------------------------------------------------------------------------

/// Connect to the configured relay. Returns `None` (demo mode) when no URL
/// is configured or the relay cannot be reached.
pub async fn open_store(config: &SyncConfig) -> Option<Arc<dyn SyncStore>> {
    let url = config.url.as_deref()?;
    match RelayStore::connect(url).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("Store unavailable, continuing in demo mode: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the client event loop until the user leaves or the command channel
/// closes.
///
/// Pushes a `UiUpdate::Room` after every command, snapshot and heartbeat,
/// and a `UiUpdate::ConnectionStatus` whenever the status changes.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut client: ClientState,
    heartbeat_every: Duration,
) -> anyhow::Result<()> {
    info!("Client event loop started for room {}", client.room.code());

    let mut last_status = client.room.status();
    let _ = ui_tx.send(UiUpdate::ConnectionStatus(last_status)).await;
    let _ = ui_tx.send(UiUpdate::Room(Box::new(client.snapshot()))).await;

    let mut heartbeat = tokio::time::interval(heartbeat_every);
    // The first tick completes immediately; consume it so the first
    // heartbeat goes out after one full interval.
    heartbeat.tick().await;

    loop {
        let subscribed = client.room.is_subscribed();
        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        if !client.handle_command(cmd).await {
                            info!("Left room {}", client.room.code());
                            let _ = ui_tx.send(UiUpdate::Left).await;
                            break;
                        }
                    }
                    None => {
                        info!("Command channel closed, leaving room");
                        client.room.leave().await;
                        break;
                    }
                }
            }

            // --- Store snapshots (only poll while subscribed) ---
            snapshot = client.room.next_snapshot(), if subscribed => {
                match snapshot {
                    Some(value) => client.room.apply_snapshot(&value),
                    None => client.room.subscription_lost(),
                }
            }

            // --- Liveness heartbeat ---
            _ = heartbeat.tick() => {
                client.room.heartbeat();
            }
        }

        let status = client.room.status();
        if status != last_status {
            info!("Connection status: {:?} -> {:?}", last_status, status);
            last_status = status;
            let _ = ui_tx.send(UiUpdate::ConnectionStatus(status)).await;
        }
        if ui_tx.send(UiUpdate::Room(Box::new(client.snapshot()))).await.is_err() {
            info!("UI channel closed, leaving room");
            client.room.leave().await;
            break;
        }
    }

    info!("Client event loop exiting");
    Ok(())
}

/// Convenience for callers that only have a status to show before a room
/// exists (e.g. while connecting).
pub fn initial_status(config: &SyncConfig) -> ConnectionStatus {
    if config.url.is_some() {
        ConnectionStatus::Connecting
    } else {
        ConnectionStatus::Demo
    }
}
