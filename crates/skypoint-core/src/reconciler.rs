// Session state reconciler.
//
// Every user action runs in two phases. First the local `SessionState` is
// updated and the store writes the change implies are computed. Then those
// writes are queued on a background dispatcher task that applies them in
// order and logs failures. Snapshots pushed by the store replace the local
// session wholesale. Without a store the reconciler runs standalone: the
// local participant is the only member and nothing is propagated.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::consensus::{self, VoteResult};
use crate::estimate::Estimate;
use crate::protocol::ConnectionStatus;
use crate::session::code::RoomCode;
use crate::session::participant::Participant;
use crate::session::state::SessionState;
use crate::sync::{paths, propagate, RemoteWrite, Subscription, SyncStore};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("no participant with id {0} in this room")]
    UnknownParticipant(String),

    #[error("cards are revealed; start a new round before voting")]
    AlreadyRevealed,

    #[error("observers cannot vote")]
    ObserverCannotVote,

    #[error("failed to encode participant record: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Write dispatcher
// ---------------------------------------------------------------------------

enum Dispatch {
    Writes(Vec<RemoteWrite>),
    Barrier(oneshot::Sender<()>),
}

/// Background task applying write batches to the store in submission order.
struct WriteDispatcher {
    tx: mpsc::UnboundedSender<Dispatch>,
    handle: JoinHandle<()>,
}

impl WriteDispatcher {
    fn spawn(store: Arc<dyn SyncStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    Dispatch::Writes(writes) => {
                        propagate(Arc::clone(&store), writes).await;
                    }
                    Dispatch::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Write dispatcher drained");
        });
        WriteDispatcher { tx, handle }
    }

    fn send(&self, writes: Vec<RemoteWrite>) {
        if writes.is_empty() {
            return;
        }
        if self.tx.send(Dispatch::Writes(writes)).is_err() {
            warn!("Write dispatcher is gone; change stays local");
        }
    }

    async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Dispatch::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Let queued writes finish, then stop.
    async fn finish(self) {
        let WriteDispatcher { tx, handle } = self;
        drop(tx);
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                warn!("Write dispatcher task failed: {e}");
            }
        }
    }

    fn abort(&self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Owns one client's view of a room and keeps it in step with the store.
pub struct Reconciler {
    state: SessionState,
    /// The local participant's latest record. Survives snapshots that do
    /// not (yet) contain it.
    local: Participant,
    status: ConnectionStatus,
    subscription: Option<Subscription>,
    dispatcher: Option<WriteDispatcher>,
}

impl Reconciler {
    /// A standalone session: the local participant alone, nothing propagated.
    pub fn standalone(code: RoomCode, local: Participant) -> Self {
        info!("Room {code}: running in demo mode (no store)");
        let mut state = SessionState::new(code);
        state.upsert(local.clone());
        Reconciler {
            state,
            local,
            status: ConnectionStatus::Demo,
            subscription: None,
            dispatcher: None,
        }
    }

    /// Join `code` through `store`: subscribe to the room and publish the
    /// local participant.
    ///
    /// A failed subscription leaves the reconciler in `Error` status with a
    /// single-participant view; writes are still attempted.
    pub async fn connect(code: RoomCode, local: Participant, store: Arc<dyn SyncStore>) -> Self {
        let mut state = SessionState::new(code.clone());
        state.upsert(local.clone());
        let mut reconciler = Reconciler {
            state,
            local,
            status: ConnectionStatus::Connecting,
            subscription: None,
            dispatcher: Some(WriteDispatcher::spawn(Arc::clone(&store))),
        };

        match store.subscribe(&paths::room(&code)).await {
            Ok(sub) => {
                info!("Room {code}: subscribed");
                reconciler.subscription = Some(sub);
                reconciler.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                warn!("Room {code}: subscription failed, using local view: {e}");
                reconciler.status = ConnectionStatus::Error;
            }
        }

        match reconciler.join_writes() {
            Ok(writes) => reconciler.dispatch(writes),
            Err(e) => warn!("Room {code}: could not publish local participant: {e}"),
        }
        reconciler
    }

    /// Connect when a store is available, otherwise run standalone.
    pub async fn start(
        code: RoomCode,
        local: Participant,
        store: Option<Arc<dyn SyncStore>>,
    ) -> Self {
        match store {
            Some(store) => Self::connect(code, local, store).await,
            None => Self::standalone(code, local),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn code(&self) -> &RoomCode {
        &self.state.code
    }

    pub fn local_participant(&self) -> &Participant {
        &self.local
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// The local participant's card this round.
    pub fn selected_card(&self) -> Option<Estimate> {
        self.local.selected_card
    }

    pub fn all_votes_in(&self) -> bool {
        self.state.all_votes_in()
    }

    /// Revealed votes; empty while cards are hidden.
    pub fn results(&self) -> Vec<VoteResult> {
        if self.state.is_revealed {
            self.state.vote_results()
        } else {
            Vec::new()
        }
    }

    /// Consensus of the revealed votes, `None` while hidden.
    pub fn consensus(&self) -> Option<f64> {
        self.state
            .is_revealed
            .then(|| consensus::consensus(&self.state.vote_results()))
    }

    // -----------------------------------------------------------------------
    // Operations (apply locally, then propagate)
    // -----------------------------------------------------------------------

    /// Record `card` as `participant_id`'s vote.
    pub fn submit_vote(&mut self, participant_id: &str, card: Estimate) -> Result<(), RoomError> {
        let writes = self.apply_vote(participant_id, card)?;
        self.dispatch(writes);
        Ok(())
    }

    /// Withdraw `participant_id`'s vote.
    pub fn clear_vote(&mut self, participant_id: &str) -> Result<(), RoomError> {
        let writes = self.apply_clear_vote(participant_id)?;
        self.dispatch(writes);
        Ok(())
    }

    /// Turn cards face up for everyone and return the results.
    pub fn reveal(&mut self) -> Vec<VoteResult> {
        let writes = self.apply_reveal();
        self.dispatch(writes);
        self.results()
    }

    /// Clear every vote and hide cards again.
    pub fn reset(&mut self) {
        self.catch_up();
        let writes = self.apply_reset();
        self.dispatch(writes);
    }

    /// Change the story under estimation.
    pub fn set_story(&mut self, text: &str) {
        let writes = self.apply_story(text);
        self.dispatch(writes);
    }

    /// Switch `participant_id` between voter and observer.
    pub fn set_observer(&mut self, participant_id: &str, observer: bool) -> Result<(), RoomError> {
        let writes = self.apply_observer(participant_id, observer)?;
        self.dispatch(writes);
        Ok(())
    }

    /// Refresh the local participant's liveness timestamp.
    pub fn heartbeat(&mut self) {
        let writes = self.apply_heartbeat();
        self.dispatch(writes);
    }

    /// Leave the room: stop listening, remove the local participant from the
    /// store (best-effort) and wait for queued writes to drain.
    pub async fn leave(&mut self) {
        info!("Room {}: {} leaving", self.state.code, self.local.id);
        self.subscription = None;
        let writes = self.apply_leave();
        self.dispatch(writes);
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.finish().await;
        }
    }

    /// Stop immediately, dropping queued writes.
    pub fn abort(&mut self) {
        self.subscription = None;
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.flush().await;
        }
    }

    // -----------------------------------------------------------------------
    // Incoming snapshots
    // -----------------------------------------------------------------------

    /// Wait for the next room snapshot. Pending forever when not subscribed.
    pub async fn next_snapshot(&mut self) -> Option<Value> {
        match self.subscription.as_mut() {
            Some(sub) => sub.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Replace local session state with a snapshot of `rooms/{code}`.
    pub fn apply_snapshot(&mut self, snapshot: &Value) {
        let state = SessionState::from_snapshot(self.state.code.clone(), snapshot);
        if let Some(me) = state.participant(&self.local.id) {
            self.local = me.clone();
        }
        debug!(
            "Room {}: snapshot with {} participant(s), revealed={}",
            state.code,
            state.participants.len(),
            state.is_revealed
        );
        self.state = state;
        self.status = ConnectionStatus::Connected;
    }

    /// Apply snapshots that are already queued, keeping the latest.
    fn catch_up(&mut self) {
        let mut latest = None;
        while let Some(snapshot) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            latest = Some(snapshot);
        }
        if let Some(snapshot) = latest {
            self.apply_snapshot(&snapshot);
        }
    }

    /// The subscription ended: fall back to a local-only view.
    pub fn subscription_lost(&mut self) {
        warn!("Room {}: lost store subscription, showing local view", self.state.code);
        self.subscription = None;
        self.status = ConnectionStatus::Error;
        self.state.participants.clear();
        self.state.upsert(self.local.clone());
    }

    // -----------------------------------------------------------------------
    // Local phase
    // -----------------------------------------------------------------------

    fn join_writes(&self) -> Result<Vec<RemoteWrite>, RoomError> {
        let path = paths::user(&self.state.code, &self.local.id);
        Ok(vec![
            RemoteWrite::Set {
                path: path.clone(),
                value: serde_json::to_value(&self.local)?,
            },
            RemoteWrite::RemoveOnDisconnect { path },
        ])
    }

    fn apply_vote(&mut self, participant_id: &str, card: Estimate) -> Result<Vec<RemoteWrite>, RoomError> {
        if self.state.is_revealed {
            return Err(RoomError::AlreadyRevealed);
        }
        let record = self.update_participant(participant_id, |p| {
            if p.is_observer {
                return Err(RoomError::ObserverCannotVote);
            }
            p.vote(card);
            Ok(())
        })?;
        debug!("Room {}: {participant_id} voted {card}", self.state.code);
        self.record_write(&record)
    }

    fn apply_clear_vote(&mut self, participant_id: &str) -> Result<Vec<RemoteWrite>, RoomError> {
        if self.state.is_revealed {
            return Err(RoomError::AlreadyRevealed);
        }
        let record = self.update_participant(participant_id, |p| {
            p.clear_vote();
            Ok(())
        })?;
        self.record_write(&record)
    }

    fn apply_observer(&mut self, participant_id: &str, observer: bool) -> Result<Vec<RemoteWrite>, RoomError> {
        let record = self.update_participant(participant_id, |p| {
            p.is_observer = observer;
            if observer {
                p.clear_vote();
            }
            Ok(())
        })?;
        self.record_write(&record)
    }

    fn apply_reveal(&mut self) -> Vec<RemoteWrite> {
        self.state.is_revealed = true;
        info!(
            "Room {}: revealed {} vote(s)",
            self.state.code,
            self.state.vote_results().len()
        );
        vec![RemoteWrite::Set {
            path: paths::revealed(&self.state.code),
            value: json!(true),
        }]
    }

    /// Only the local participant and those holding a vote are touched, so a
    /// record whose owner already left is not recreated as a bare fragment.
    /// The card goes before the flag so no snapshot shows a card on a
    /// cleared vote.
    fn apply_reset(&mut self) -> Vec<RemoteWrite> {
        let local_id = &self.local.id;
        let holding: Vec<String> = self
            .state
            .participants
            .values()
            .filter(|p| &p.id == local_id || p.has_voted || p.selected_card.is_some())
            .map(|p| p.id.clone())
            .collect();
        self.state.reset_round();
        self.local.clear_vote();

        let code = &self.state.code;
        let mut writes = vec![RemoteWrite::Set {
            path: paths::revealed(code),
            value: json!(false),
        }];
        for id in &holding {
            writes.push(RemoteWrite::Remove {
                path: paths::user_field(code, id, "selectedCard"),
            });
            writes.push(RemoteWrite::Set {
                path: paths::user_field(code, id, "hasVoted"),
                value: json!(false),
            });
        }
        info!("Room {code}: new round");
        writes
    }

    fn apply_story(&mut self, text: &str) -> Vec<RemoteWrite> {
        self.state.current_story = text.to_string();
        vec![RemoteWrite::Set {
            path: paths::story(&self.state.code),
            value: json!(text),
        }]
    }

    fn apply_heartbeat(&mut self) -> Vec<RemoteWrite> {
        let now = Utc::now();
        self.local.last_seen = now;
        if let Some(me) = self.state.participant_mut(&self.local.id) {
            me.last_seen = now;
        }
        vec![RemoteWrite::Set {
            path: paths::user_field(&self.state.code, &self.local.id, "lastSeen"),
            value: json!(now.timestamp_millis()),
        }]
    }

    fn apply_leave(&mut self) -> Vec<RemoteWrite> {
        self.state.remove(&self.local.id);
        vec![RemoteWrite::Remove {
            path: paths::user(&self.state.code, &self.local.id),
        }]
    }

    /// Mutate a participant in place. The local participant is re-inserted
    /// if the last snapshot did not include it.
    fn update_participant<F>(&mut self, participant_id: &str, f: F) -> Result<Participant, RoomError>
    where
        F: FnOnce(&mut Participant) -> Result<(), RoomError>,
    {
        if participant_id == self.local.id && self.state.participant(participant_id).is_none() {
            self.state.upsert(self.local.clone());
        }
        let participant = self
            .state
            .participant_mut(participant_id)
            .ok_or_else(|| RoomError::UnknownParticipant(participant_id.to_string()))?;
        f(participant)?;
        let record = participant.clone();
        if participant_id == self.local.id {
            self.local = record.clone();
        }
        Ok(record)
    }

    fn record_write(&self, record: &Participant) -> Result<Vec<RemoteWrite>, RoomError> {
        Ok(vec![RemoteWrite::Set {
            path: paths::user(&self.state.code, &record.id),
            value: serde_json::to_value(record)?,
        }])
    }

    // -----------------------------------------------------------------------
    // Remote phase
    // -----------------------------------------------------------------------

    fn dispatch(&self, writes: Vec<RemoteWrite>) {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.send(writes),
            None => debug!("Room {}: standalone, {} write(s) kept local", self.state.code, writes.len()),
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{MemoryStore, SyncError};
    use async_trait::async_trait;

    fn code() -> RoomCode {
        RoomCode::coerce("ABC123").unwrap()
    }

    fn demo(id: &str) -> Reconciler {
        Reconciler::standalone(code(), Participant::new(id, "Me"))
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl SyncStore for BrokenStore {
        async fn set(&self, _path: &str, _value: Value) -> Result<(), SyncError> {
            Err(SyncError::Disconnected)
        }
        async fn remove(&self, _path: &str) -> Result<(), SyncError> {
            Err(SyncError::Disconnected)
        }
        async fn subscribe(&self, _path: &str) -> Result<Subscription, SyncError> {
            Err(SyncError::Disconnected)
        }
    }

    #[test]
    fn standalone_has_only_local_participant() {
        let room = demo("me");
        assert_eq!(room.status(), ConnectionStatus::Demo);
        assert_eq!(room.state().participants.len(), 1);
        assert!(room.state().participant("me").is_some());
    }

    #[test]
    fn vote_then_reveal_yields_results() {
        let mut room = demo("me");
        room.submit_vote("me", Estimate::Five).unwrap();
        assert!(room.results().is_empty());
        assert_eq!(room.consensus(), None);

        let results = room.reveal();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].participant_id, "me");
        assert_eq!(results[0].value, Estimate::Five);
        assert_eq!(room.consensus(), Some(5.0));
    }

    #[test]
    fn vote_rejected_after_reveal() {
        let mut room = demo("me");
        room.reveal();
        assert!(matches!(
            room.submit_vote("me", Estimate::One),
            Err(RoomError::AlreadyRevealed)
        ));
        assert!(matches!(room.clear_vote("me"), Err(RoomError::AlreadyRevealed)));
    }

    #[test]
    fn vote_rejected_for_unknown_participant() {
        let mut room = demo("me");
        assert!(matches!(
            room.submit_vote("ghost", Estimate::One),
            Err(RoomError::UnknownParticipant(id)) if id == "ghost"
        ));
    }

    #[test]
    fn observer_cannot_vote_and_loses_vote() {
        let mut room = demo("me");
        room.submit_vote("me", Estimate::Eight).unwrap();
        room.set_observer("me", true).unwrap();
        assert_eq!(room.selected_card(), None);
        assert!(matches!(
            room.submit_vote("me", Estimate::One),
            Err(RoomError::ObserverCannotVote)
        ));
        // No voters left, so completeness holds vacuously.
        assert!(room.all_votes_in());
    }

    #[test]
    fn reset_clears_everything() {
        let mut room = demo("me");
        room.submit_vote("me", Estimate::Three).unwrap();
        room.reveal();
        room.reset();
        assert!(!room.state().is_revealed);
        assert_eq!(room.selected_card(), None);
        assert!(room
            .state()
            .participants
            .values()
            .all(|p| !p.has_voted && p.selected_card.is_none()));
    }

    #[test]
    fn reset_writes_field_level_paths() {
        let mut room = demo("me");
        room.submit_vote("me", Estimate::Two).unwrap();
        let mut other = Participant::new("zed", "Zed");
        other.vote(Estimate::One);
        room.state.upsert(other);
        // No vote to clear, so no write for this one.
        room.state.upsert(Participant::new("idle", "Idle"));

        let writes = room.apply_reset();
        let paths: Vec<&str> = writes.iter().map(RemoteWrite::path).collect();
        assert_eq!(
            paths,
            vec![
                "rooms/ABC123/session/isRevealed",
                "rooms/ABC123/users/me/selectedCard",
                "rooms/ABC123/users/me/hasVoted",
                "rooms/ABC123/users/zed/selectedCard",
                "rooms/ABC123/users/zed/hasVoted",
            ]
        );
        assert!(matches!(writes[1], RemoteWrite::Remove { .. }));
        assert!(matches!(writes[2], RemoteWrite::Set { .. }));
    }

    #[test]
    fn vote_write_carries_full_record() {
        let mut room = demo("me");
        let writes = room.apply_vote("me", Estimate::Half).unwrap();
        match &writes[..] {
            [RemoteWrite::Set { path, value }] => {
                assert_eq!(path, "rooms/ABC123/users/me");
                assert_eq!(value["hasVoted"], true);
                assert_eq!(value["selectedCard"], "1/2");
                assert_eq!(value["name"], "Me");
            }
            other => panic!("unexpected writes: {other:?}"),
        }
    }

    #[test]
    fn set_story_updates_state() {
        let mut room = demo("me");
        room.set_story("Checkout flow");
        assert_eq!(room.state().current_story, "Checkout flow");
    }

    #[test]
    fn snapshot_replaces_state_wholesale() {
        let mut room = demo("me");
        room.set_story("local story");
        room.apply_snapshot(&json!({
            "users": {
                "me": {"name": "Me", "hasVoted": true, "selectedCard": "13", "lastSeen": 1},
                "x": {"name": "X", "lastSeen": 1}
            },
            "session": {"isRevealed": false, "currentStory": "remote story"}
        }));
        assert_eq!(room.status(), ConnectionStatus::Connected);
        assert_eq!(room.state().current_story, "remote story");
        assert_eq!(room.state().participants.len(), 2);
        // Local mirror follows the store's copy of our record.
        assert_eq!(room.selected_card(), Some(Estimate::Thirteen));
        assert!(!room.all_votes_in());
    }

    #[test]
    fn local_participant_reinserted_when_missing_from_snapshot() {
        let mut room = demo("me");
        room.apply_snapshot(&json!({"users": {"x": {"name": "X", "lastSeen": 1}}}));
        assert!(room.state().participant("me").is_none());
        room.submit_vote("me", Estimate::Two).unwrap();
        assert!(room.state().participant("me").unwrap().has_voted);
    }

    #[test]
    fn subscription_lost_falls_back_to_local_view() {
        let mut room = demo("me");
        room.apply_snapshot(&json!({
            "users": {"me": {"name": "Me", "lastSeen": 1}, "x": {"name": "X", "lastSeen": 1}}
        }));
        room.subscription_lost();
        assert_eq!(room.status(), ConnectionStatus::Error);
        assert_eq!(room.state().participants.len(), 1);
        assert!(room.state().participant("me").is_some());
    }

    #[tokio::test]
    async fn connect_publishes_local_participant() {
        let store = MemoryStore::new();
        let room = Reconciler::connect(code(), Participant::new("me", "Me"), Arc::new(store.clone())).await;
        room.flush().await;
        assert_eq!(room.status(), ConnectionStatus::Connected);
        assert_eq!(store.get("rooms/ABC123/users/me/name"), json!("Me"));
    }

    #[tokio::test]
    async fn writes_reach_store_in_order() {
        let store = MemoryStore::new();
        let mut room =
            Reconciler::connect(code(), Participant::new("me", "Me"), Arc::new(store.clone())).await;
        room.submit_vote("me", Estimate::Eight).unwrap();
        room.clear_vote("me").unwrap();
        room.submit_vote("me", Estimate::Three).unwrap();
        room.reveal();
        room.flush().await;

        assert_eq!(store.get("rooms/ABC123/users/me/selectedCard"), json!("3"));
        assert_eq!(store.get("rooms/ABC123/session/isRevealed"), json!(true));
    }

    #[tokio::test]
    async fn broken_store_keeps_local_state() {
        let mut room =
            Reconciler::connect(code(), Participant::new("me", "Me"), Arc::new(BrokenStore)).await;
        assert_eq!(room.status(), ConnectionStatus::Error);
        assert!(!room.is_subscribed());

        room.submit_vote("me", Estimate::Five).unwrap();
        room.reveal();
        room.flush().await;
        assert_eq!(room.results().len(), 1);
        assert_eq!(room.consensus(), Some(5.0));
    }

    #[tokio::test]
    async fn reset_does_not_recreate_departed_participant() {
        let store = MemoryStore::new();
        let mut a = Reconciler::connect(code(), Participant::new("a", "Ann"), Arc::new(store.clone())).await;
        let mut b = Reconciler::connect(code(), Participant::new("b", "Ben"), Arc::new(store.clone())).await;
        b.submit_vote("b", Estimate::Eight).unwrap();
        b.flush().await;
        while !a.state().participant("b").is_some_and(|p| p.has_voted) {
            let snapshot = a.next_snapshot().await.unwrap();
            a.apply_snapshot(&snapshot);
        }

        b.leave().await;
        assert_eq!(store.get("rooms/ABC123/users/b"), Value::Null);

        // A has not looked at the snapshot without B yet.
        a.reset();
        a.flush().await;
        assert_eq!(store.get("rooms/ABC123/users/b"), Value::Null);
        assert!(a.state().participant("b").is_none());
        assert_eq!(store.get("rooms/ABC123/users/a/hasVoted"), json!(false));
    }

    #[tokio::test]
    async fn leave_removes_record_and_stops_listening() {
        let store = MemoryStore::new();
        let mut room =
            Reconciler::connect(code(), Participant::new("me", "Me"), Arc::new(store.clone())).await;
        room.flush().await;
        room.leave().await;
        assert!(!room.is_subscribed());
        assert_eq!(store.get("rooms/ABC123/users/me"), Value::Null);
        assert_eq!(store.watcher_count(), 0);
    }
}
