// WebSocket relay exposing a shared in-memory store to session clients.

use std::collections::HashMap;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use skypoint_core::protocol::{ClientFrame, ServerFrame};
use skypoint_core::sync::paths::segments;
use skypoint_core::sync::MemoryStore;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Bind `addr` and serve relay clients until the task is cancelled.
pub async fn run(addr: &str, store: MemoryStore) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, store).await
}

/// Accept connections on an already-bound listener. Each client gets its own
/// task; all of them share `store`.
pub async fn serve(listener: TcpListener, store: MemoryStore) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("Relay listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr = addr.to_string();
        info!("Accepted TCP connection from {addr}");
        let store = store.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr, store).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, addr: String, store: MemoryStore) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    let (mut write, read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode frame for {writer_addr}: {e}");
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text.into())).await {
                debug!("Client {writer_addr} stopped accepting frames: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    let mut session = ClientSession::new(addr.clone(), store, out_tx);
    process_client_stream(read, &mut session).await;
    session.disconnect();
    drop(session);

    if let Err(e) = writer.await {
        if !e.is_cancelled() {
            warn!("Writer task for {addr} failed: {e}");
        }
    }
    info!("Client {addr} disconnected");
}

// ---------------------------------------------------------------------------
// Per-connection state
// ---------------------------------------------------------------------------

/// One client's view of the relay: its live subscriptions and the paths to
/// clear when it goes away.
pub struct ClientSession {
    addr: String,
    store: MemoryStore,
    out_tx: mpsc::UnboundedSender<ServerFrame>,
    forwarders: HashMap<u64, JoinHandle<()>>,
    on_disconnect: Vec<String>,
}

impl ClientSession {
    pub fn new(addr: String, store: MemoryStore, out_tx: mpsc::UnboundedSender<ServerFrame>) -> Self {
        ClientSession {
            addr,
            store,
            out_tx,
            forwarders: HashMap::new(),
            on_disconnect: Vec::new(),
        }
    }

    /// Apply one client frame to the store, replying through the outbound
    /// channel.
    pub fn handle_frame(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::Set { req, path, value } => {
                if self.check_path(req, &path) {
                    debug!("{} SET {path}", self.addr);
                    self.store.put(&path, value);
                    self.reply(ServerFrame::Ack { req });
                }
            }
            ClientFrame::Remove { req, path } => {
                if self.check_path(req, &path) {
                    debug!("{} REMOVE {path}", self.addr);
                    self.store.delete(&path);
                    self.reply(ServerFrame::Ack { req });
                }
            }
            ClientFrame::RemoveOnDisconnect { req, path } => {
                if self.check_path(req, &path) {
                    debug!("{} will remove {path} on disconnect", self.addr);
                    if !self.on_disconnect.contains(&path) {
                        self.on_disconnect.push(path);
                    }
                    self.reply(ServerFrame::Ack { req });
                }
            }
            ClientFrame::Subscribe { sub, path } => self.subscribe(sub, &path),
            ClientFrame::Unsubscribe { sub } => {
                if let Some(handle) = self.forwarders.remove(&sub) {
                    debug!("{} unsubscribed {sub}", self.addr);
                    handle.abort();
                }
            }
        }
    }

    /// Start forwarding snapshots of `path` as `SNAPSHOT` frames tagged `sub`.
    fn subscribe(&mut self, sub: u64, path: &str) {
        debug!("{} subscribed {sub} to {path}", self.addr);
        let mut subscription = self.store.watch(path);
        let out_tx = self.out_tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(value) = subscription.recv().await {
                if out_tx.send(ServerFrame::Snapshot { sub, value }).is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.forwarders.insert(sub, handle) {
            previous.abort();
        }
    }

    /// Stop all subscriptions and clear the paths registered with
    /// `REMOVE_ON_DISCONNECT`.
    pub fn disconnect(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
        for path in self.on_disconnect.drain(..) {
            info!("Removing {path} after {} disconnected", self.addr);
            self.store.delete(&path);
        }
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.forwarders.len()
    }

    fn check_path(&self, req: u64, path: &str) -> bool {
        if segments(path).is_empty() {
            warn!("{} sent request {req} with an empty path", self.addr);
            self.reply(ServerFrame::Nack {
                req,
                message: "path must not be empty".to_string(),
            });
            return false;
        }
        true
    }

    fn reply(&self, frame: ServerFrame) {
        // The writer only goes away once the socket is closed.
        let _ = self.out_tx.send(frame);
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}

/// Read client messages from any [`Stream`] and apply them to `session`
/// until the stream ends, errors, or closes. Malformed frames are logged
/// and skipped.
pub async fn process_client_stream<St>(mut stream: St, session: &mut ClientSession)
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => session.handle_frame(frame),
                Err(e) => warn!("Ignoring malformed frame from {}: {e}", session.addr),
            },
            Ok(Message::Close(_)) => {
                info!("Client {} sent close frame", session.addr);
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {}: {e}", session.addr);
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
}
