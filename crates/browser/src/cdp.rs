//! Low-level Chrome DevTools Protocol (CDP) client over WebSocket.
//!
//! Communicates with a page target via its debugging WebSocket endpoint.
//! Commands are matched to responses by id; events are fanned out to
//! subscribers in the order they arrive on the wire.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};
use wincap_core::{Error, Result};

/// A protocol event as received: method name plus raw params.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

struct Subscriber {
    /// Methods this subscriber wants; empty means everything.
    methods: HashSet<String>,
    tx: mpsc::Sender<CdpEvent>,
}

impl Subscriber {
    fn wants(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A CDP WebSocket client that can send commands and receive responses/events.
pub struct CdpClient {
    /// Sender to write messages to the WebSocket.
    ws_tx: mpsc::Sender<String>,
    /// Pending command responses, keyed by request ID.
    pending: PendingMap,
    /// Auto-incrementing command ID.
    next_id: AtomicU64,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    /// Set once the reader sees the socket close.
    closed: Arc<AtomicBool>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a CDP WebSocket endpoint.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::connect_async;
        use tokio_tungstenite::tungstenite::Message;

        let (ws_stream, _) = connect_async(ws_url).await.map_err(|e| {
            Error::Connection(format!("Failed to connect to CDP endpoint {}: {}", ws_url, e))
        })?;

        let (mut ws_sink, mut ws_stream_read) = ws_stream.split();

        // Channel for outgoing messages
        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(256);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();

        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));
        let subscribers_clone = subscribers.clone();

        let closed = Arc::new(AtomicBool::new(false));
        let closed_clone = closed.clone();

        // Writer task: owns the sink, forwards messages from channel
        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    error!("CDP WebSocket write error: {}", e);
                    break;
                }
            }
        });

        // Reader task: reads from WebSocket, dispatches responses and events
        let reader_handle = tokio::spawn(async move {
            while let Some(msg_result) = ws_stream_read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        let Ok(val) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                            let mut pending = pending_clone.lock().await;
                            if let Some(tx) = pending.remove(&id) {
                                let _ = tx.send(val);
                            }
                        } else if let Some(method) = val.get("method").and_then(|v| v.as_str()) {
                            let params = val.get("params").cloned().unwrap_or(Value::Null);
                            let subs = subscribers_clone.lock().await;
                            for sub in subs.iter().filter(|s| s.wants(method)) {
                                // Full buffers drop the event.
                                if sub
                                    .tx
                                    .try_send(CdpEvent {
                                        method: method.to_string(),
                                        params: params.clone(),
                                    })
                                    .is_err()
                                {
                                    debug!(method, "CDP event dropped");
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            closed_clone.store(true, Ordering::SeqCst);
            // Dropping the senders ends every subscriber stream and fails
            // every command still waiting for a response.
            subscribers_clone.lock().await.clear();
            pending_clone.lock().await.clear();
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            subscribers,
            closed,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a CDP command and wait up to `timeout` for the response.
    pub async fn send_command(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Connection(format!(
                "CDP connection closed, cannot send '{}'",
                method
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        if let Err(e) = self.ws_tx.send(msg.to_string()).await {
            self.pending.lock().await.remove(&id);
            return Err(Error::Connection(format!("Failed to send CDP command: {}", e)));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    let message = error
                        .get("message")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| error.to_string());
                    Err(Error::Protocol(format!("{}: {}", method, message)))
                } else {
                    Ok(response.get("result").cloned().unwrap_or(Value::Null))
                }
            }
            Ok(Err(_)) => Err(Error::Connection(format!(
                "CDP response channel closed while waiting for '{}'",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Timeout(format!(
                    "CDP command '{}' timed out after {}s",
                    method,
                    timeout.as_secs()
                )))
            }
        }
    }

    /// Subscribe to a set of CDP events through one receiver, preserving
    /// their relative order. An empty slice subscribes to every event.
    pub async fn subscribe(&self, methods: &[&str], buffer: usize) -> mpsc::Receiver<CdpEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut subs = self.subscribers.lock().await;
        subs.push(Subscriber {
            methods: methods.iter().map(|m| m.to_string()).collect(),
            tx,
        });
        rx
    }

    /// Enable a CDP domain (e.g., "Page", "Runtime", "Network", "Log").
    pub async fn enable_domain(&self, domain: &str, timeout: Duration) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({}), timeout)
            .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._reader_handle.abort();
        self._writer_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_filter() {
        let (tx, _rx) = mpsc::channel(1);
        let all = Subscriber {
            methods: HashSet::new(),
            tx: tx.clone(),
        };
        assert!(all.wants("Network.loadingFinished"));

        let network = Subscriber {
            methods: ["Network.requestWillBeSent".to_string()].into_iter().collect(),
            tx,
        };
        assert!(network.wants("Network.requestWillBeSent"));
        assert!(!network.wants("Runtime.consoleAPICalled"));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Port 9 (discard) is not expected to speak WebSocket.
        let err = CdpClient::connect("ws://127.0.0.1:9/devtools/page/none")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Connection(_)));
    }
}
