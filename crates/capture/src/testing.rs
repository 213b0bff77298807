//! Test doubles shared by the capture tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;
use wincap_browser::events::{LoadingFinished, RequestSent, ResponseReceived};
use wincap_browser::{ProtocolEvent, ProtocolSession};
use wincap_core::config::CaptureConfig;
use wincap_core::{Error, Headers, Result};

use crate::registry::CaptureRegistry;

/// Serves `Network.getResponseBody` from a fixed map. With a gate set, every
/// body fetch waits for one `notify_one()` before answering; a per-request
/// gate holds back only that request.
#[derive(Default)]
pub struct FakeSession {
    bodies: Mutex<HashMap<String, (String, bool)>>,
    gate: Option<Arc<Notify>>,
    request_gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn gate_request(self, correlation_id: &str, gate: Arc<Notify>) -> Self {
        if let Ok(mut gates) = self.request_gates.lock() {
            gates.insert(correlation_id.to_string(), gate);
        }
        self
    }

    pub fn with_body(self, correlation_id: &str, body: &str, base64_encoded: bool) -> Self {
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.insert(correlation_id.to_string(), (body.to_string(), base64_encoded));
        }
        self
    }
}

#[async_trait]
impl ProtocolSession for FakeSession {
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.calls.lock().unwrap().push(method.to_string());
        let id = params["requestId"].as_str().unwrap_or_default().to_string();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let request_gate = self.request_gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = request_gate {
            gate.notified().await;
        }
        let found = self.bodies.lock().unwrap().get(&id).cloned();
        match found {
            Some((body, base64_encoded)) => Ok(json!({ "body": body, "base64Encoded": base64_encoded })),
            None => Err(Error::Protocol(format!("No resource with given identifier found: {}", id))),
        }
    }
}

pub fn registry(dir: &TempDir) -> CaptureRegistry {
    CaptureRegistry::new(
        CaptureConfig::default(),
        dir.path().join("captures"),
        dir.path().join("scratch"),
    )
}

pub fn request(id: &str, url: &str, post_data: Option<String>) -> ProtocolEvent {
    let mut headers = Headers::new();
    if post_data.is_some() {
        headers.insert("Content-Type".into(), json!("application/json"));
    }
    ProtocolEvent::RequestSent(RequestSent {
        correlation_id: id.to_string(),
        url: url.to_string(),
        method: if post_data.is_some() { "POST" } else { "GET" }.to_string(),
        headers,
        post_data,
        resource_type: Some("Document".to_string()),
    })
}

pub fn response(id: &str, mime_type: &str) -> ProtocolEvent {
    ProtocolEvent::ResponseReceived(ResponseReceived {
        correlation_id: id.to_string(),
        mime_type: Some(mime_type.to_string()),
        headers: Headers::new(),
        status: Some(200),
        status_text: Some("OK".to_string()),
    })
}

pub fn finished(id: &str) -> ProtocolEvent {
    ProtocolEvent::LoadingFinished(LoadingFinished {
        correlation_id: id.to_string(),
        encoded_data_length: Some(128),
    })
}

/// Wait until a sidecar for `index` is on disk, without waiting on other
/// in-flight fetches.
pub async fn wait_for_sidecar(
    registry: &CaptureRegistry,
    window: wincap_core::WindowId,
    index: u64,
    epoch: u64,
) -> wincap_storage::SidecarRecord {
    let store = registry.store();
    for _ in 0..200 {
        if let Some(record) = store.find_sidecar_by_index(window, index).unwrap() {
            if record.epoch == epoch {
                return record;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("no sidecar for index {} in epoch {}", index, epoch);
}
