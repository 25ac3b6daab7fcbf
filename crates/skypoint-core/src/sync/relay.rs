// WebSocket client for the SkyPoint relay server.
//
// One connection carries every request. Writes wait for the relay's ACK or
// NACK by request id; subscriptions receive SNAPSHOT frames by subscription
// id. When the socket drops, pending writes fail with `Disconnected` and
// every subscription stream ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{Subscription, SyncError, SyncStore};
use crate::protocol::{ClientFrame, ServerFrame};

type Reply = Result<(), String>;

/// Routes relay frames to waiting writers and subscribers.
#[derive(Default)]
pub struct FrameRouter {
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<Value>>>,
    closed: AtomicBool,
}

impl FrameRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
        self.pending.lock().expect("relay pending mutex poisoned")
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<Value>>> {
        self.subscribers.lock().expect("relay subscriber mutex poisoned")
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register a request and get the receiver for its reply.
    pub fn expect_reply(&self, req: u64) -> Result<oneshot::Receiver<Reply>, SyncError> {
        if self.is_closed() {
            return Err(SyncError::Disconnected);
        }
        let (tx, rx) = oneshot::channel();
        self.pending().insert(req, tx);
        Ok(rx)
    }

    /// Register a subscription and get its snapshot receiver.
    pub fn add_subscriber(&self, sub: u64) -> Result<mpsc::UnboundedReceiver<Value>, SyncError> {
        if self.is_closed() {
            return Err(SyncError::Disconnected);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers().insert(sub, tx);
        Ok(rx)
    }

    pub fn remove_subscriber(&self, sub: u64) {
        self.subscribers().remove(&sub);
    }

    /// Deliver one frame from the relay.
    pub fn route(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Ack { req } => {
                if let Some(tx) = self.pending().remove(&req) {
                    let _ = tx.send(Ok(()));
                }
            }
            ServerFrame::Nack { req, message } => {
                if let Some(tx) = self.pending().remove(&req) {
                    let _ = tx.send(Err(message));
                }
            }
            ServerFrame::Snapshot { sub, value } => {
                let mut subscribers = self.subscribers();
                let delivered = subscribers.get(&sub).map(|tx| tx.send(value).is_ok());
                if delivered == Some(false) {
                    subscribers.remove(&sub);
                }
            }
        }
    }

    /// Fail every pending request and end every subscription.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending().clear();
        self.subscribers().clear();
    }
}

/// Read relay messages from `stream` and route them until the stream ends,
/// errors, or closes. Closes the router on exit.
pub async fn route_incoming<St>(mut stream: St, router: &FrameRouter, url: &str)
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                Ok(frame) => router.route(frame),
                Err(e) => warn!("Ignoring malformed frame from relay {url}: {e}"),
            },
            Ok(Message::Close(_)) => {
                info!("Relay {url} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from relay {url}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    router.close();
}

/// A [`SyncStore`] backed by a relay server connection.
pub struct RelayStore {
    out_tx: mpsc::UnboundedSender<ClientFrame>,
    router: Arc<FrameRouter>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RelayStore {
    /// Open a WebSocket connection to the relay at `url` (`ws://host:port`).
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| SyncError::Connect {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
        info!("Connected to relay at {url}");

        let (mut write, read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let router = Arc::new(FrameRouter::new());

        let reader_router = Arc::clone(&router);
        let reader_url = url.to_string();
        let reader = tokio::spawn(async move {
            route_incoming(read, &reader_router, &reader_url).await;
            debug!("Relay reader for {reader_url} finished");
        });

        let writer_router = Arc::clone(&router);
        let writer_url = url.to_string();
        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode frame for relay {writer_url}: {e}");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    warn!("Failed to send to relay {writer_url}: {e}");
                    writer_router.close();
                    break;
                }
            }
            let _ = write.close().await;
        });

        Ok(RelayStore {
            out_tx,
            router,
            next_id: AtomicU64::new(1),
            reader,
            writer,
        })
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request frame and wait for its ACK/NACK.
    async fn request(&self, req: u64, path: &str, frame: ClientFrame) -> Result<(), SyncError> {
        let reply = self.router.expect_reply(req)?;
        self.out_tx
            .send(frame)
            .map_err(|_| SyncError::Disconnected)?;
        match reply.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(SyncError::Rejected {
                path: path.to_string(),
                message,
            }),
            Err(_) => Err(SyncError::Disconnected),
        }
    }
}

impl Drop for RelayStore {
    fn drop(&mut self) {
        self.router.close();
        self.reader.abort();
        self.writer.abort();
    }
}

#[async_trait]
impl SyncStore for RelayStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), SyncError> {
        let req = self.next_id();
        let frame = ClientFrame::Set {
            req,
            path: path.to_string(),
            value,
        };
        self.request(req, path, frame).await
    }

    async fn remove(&self, path: &str) -> Result<(), SyncError> {
        let req = self.next_id();
        let frame = ClientFrame::Remove {
            req,
            path: path.to_string(),
        };
        self.request(req, path, frame).await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, SyncError> {
        let sub = self.next_id();
        let rx = self.router.add_subscriber(sub)?;
        if self
            .out_tx
            .send(ClientFrame::Subscribe {
                sub,
                path: path.to_string(),
            })
            .is_err()
        {
            self.router.remove_subscriber(sub);
            return Err(SyncError::Disconnected);
        }

        let out_tx = self.out_tx.clone();
        let router = Arc::clone(&self.router);
        Ok(Subscription::new(rx).with_drop_hook(move || {
            router.remove_subscriber(sub);
            let _ = out_tx.send(ClientFrame::Unsubscribe { sub });
        }))
    }

    async fn remove_on_disconnect(&self, path: &str) -> Result<(), SyncError> {
        let req = self.next_id();
        let frame = ClientFrame::RemoveOnDisconnect {
            req,
            path: path.to_string(),
        };
        self.request(req, path, frame).await
    }
}
