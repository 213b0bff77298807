//! Protocol session adapter.
//!
//! Wraps one window's debugging connection. The connection is attached
//! lazily on first use, every command is bounded by the configured
//! timeout, and nothing is retried: callers decide whether a failure
//! matters.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OnceCell};
use tracing::{debug, info};
use wincap_core::config::ProtocolConfig;
use wincap_core::{Error, Result};

use crate::cdp::{CdpClient, CdpEvent};
use crate::events::CAPTURE_EVENTS;

/// Domains enabled once per attach.
const CAPTURE_DOMAINS: [&str; 4] = ["Network", "Runtime", "Log", "Page"];

/// The command primitive the capture pipeline depends on.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    async fn send(&self, method: &str, params: Value) -> Result<Value>;
}

pub struct CdpSession {
    ws_url: String,
    timeout: Duration,
    event_buffer: usize,
    client: OnceCell<CdpClient>,
    /// Receiver registered during attach, before any domain is enabled,
    /// so the first events of the page are not missed.
    events: Mutex<Option<mpsc::Receiver<CdpEvent>>>,
}

impl CdpSession {
    pub fn new(ws_url: impl Into<String>, config: &ProtocolConfig) -> Self {
        Self {
            ws_url: ws_url.into(),
            timeout: Duration::from_secs(config.command_timeout_secs),
            event_buffer: config.event_buffer,
            client: OnceCell::new(),
            events: Mutex::new(None),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn is_attached(&self) -> bool {
        self.client.get().map(|c| !c.is_closed()).unwrap_or(false)
    }

    async fn client(&self) -> Result<&CdpClient> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let client = CdpClient::connect(&self.ws_url).await?;
                let rx = client.subscribe(&CAPTURE_EVENTS, self.event_buffer).await;
                *self.events.lock().await = Some(rx);
                for domain in CAPTURE_DOMAINS {
                    client.enable_domain(domain, self.timeout).await?;
                }
                info!(ws_url = %self.ws_url, "Protocol session attached");
                Ok::<_, Error>(client)
            })
            .await?;
        if client.is_closed() {
            return Err(Error::Connection(format!(
                "protocol session for {} is detached",
                self.ws_url
            )));
        }
        Ok(client)
    }

    /// Attach now rather than on the first command.
    pub async fn attach(&self) -> Result<()> {
        self.client().await.map(|_| ())
    }

    /// Take the capture event stream. Attaches if needed; only the first
    /// caller gets the receiver.
    pub async fn take_events(&self) -> Result<mpsc::Receiver<CdpEvent>> {
        self.attach().await?;
        self.events
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Other("event stream already taken".into()))
    }

    /// Id of the top-level frame, used to tell page navigations from iframe loads.
    pub async fn main_frame_id(&self) -> Result<Option<String>> {
        let tree = self.send("Page.getFrameTree", json!({})).await?;
        let id = tree
            .pointer("/frameTree/frame/id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        debug!(frame_id = ?id, "Resolved main frame");
        Ok(id)
    }
}

#[async_trait]
impl ProtocolSession for CdpSession {
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let client = self.client().await?;
        client.send_command(method, params, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_attach() {
        let session = CdpSession::new("ws://127.0.0.1:9/devtools/page/x", &ProtocolConfig::default());
        assert!(!session.is_attached());
        let err = session.send("Network.getResponseBody", json!({"requestId": "1"})).await;
        assert!(matches!(err, Err(Error::Connection(_))));
        assert!(!session.is_attached());
    }

    #[test]
    fn test_timeout_from_config() {
        let config = ProtocolConfig {
            command_timeout_secs: 7,
            ..Default::default()
        };
        let session = CdpSession::new("ws://localhost/devtools/page/1", &config);
        assert_eq!(session.timeout, Duration::from_secs(7));
        assert_eq!(session.ws_url(), "ws://localhost/devtools/page/1");
    }
}
