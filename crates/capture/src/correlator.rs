//! Event correlator for one window.
//!
//! Single writer of the window's [`WindowCaptureState`]. Network records are
//! built across request-sent, response-received and loading-finished;
//! console messages become log entries directly. Every step returns a
//! `Result`, and [`EventCorrelator::handle`] logs failures and carries on:
//! a step that fails simply leaves its part of the record empty.

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;
use wincap_browser::events::{ConsoleMessage, LoadingFailed, LoadingFinished, RequestSent, ResponseReceived};
use wincap_browser::{ProtocolEvent, ProtocolSession};
use wincap_core::config::CaptureConfig;
use wincap_core::types::now_millis;
use wincap_core::{Error, Headers, LogEntry, RequestDetail, RequestSummary, Result, WindowId};
use wincap_storage::layout::{domain_for_url, filename_for_url};
use wincap_storage::{Body, CaptureStore, ScratchStore, SidecarRecord};

use crate::content::{classify, prepare_body};
use crate::state::WindowCaptureState;

pub const GET_RESPONSE_BODY: &str = "Network.getResponseBody";

/// What the event source should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Closed,
}

/// Snapshot taken at loading-finished, before the body fetch suspends.
struct PendingBody {
    index: u64,
    epoch: u64,
    detail: RequestDetail,
}

pub struct EventCorrelator {
    window: WindowId,
    state: Arc<Mutex<WindowCaptureState>>,
    session: Arc<dyn ProtocolSession>,
    store: Arc<CaptureStore>,
    scratch: ScratchStore,
    settings: CaptureConfig,
    /// In-flight body fetches. Resets do not cancel them.
    fetches: std::sync::Mutex<JoinSet<()>>,
}

impl EventCorrelator {
    pub fn new(
        window: WindowId,
        session: Arc<dyn ProtocolSession>,
        store: Arc<CaptureStore>,
        scratch: ScratchStore,
        settings: CaptureConfig,
    ) -> Self {
        let state = WindowCaptureState::new(window, scratch.window_dir(window));
        Self {
            window,
            state: Arc::new(Mutex::new(state)),
            session,
            store,
            scratch,
            settings,
            fetches: std::sync::Mutex::new(JoinSet::new()),
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn state(&self) -> Arc<Mutex<WindowCaptureState>> {
        self.state.clone()
    }

    pub async fn handle(self: &Arc<Self>, event: ProtocolEvent) -> Disposition {
        let (step, outcome) = match event {
            ProtocolEvent::RequestSent(ev) => ("request-sent", self.on_request_sent(ev).await),
            ProtocolEvent::ResponseReceived(ev) => {
                ("response-received", self.on_response_received(ev).await)
            }
            ProtocolEvent::LoadingFinished(ev) => {
                ("loading-finished", self.on_loading_finished(ev).await)
            }
            ProtocolEvent::LoadingFailed(ev) => ("loading-failed", self.on_loading_failed(ev).await),
            ProtocolEvent::ConsoleMessage(msg) => ("console-message", self.on_console_message(msg).await),
            ProtocolEvent::NavigationStarted { frame_id } => {
                debug!(window = %self.window, frame_id = %frame_id, "Navigation started");
                self.reset().await;
                ("navigation-started", Ok(()))
            }
            ProtocolEvent::WindowClosed { reason } => {
                info!(window = %self.window, reason = %reason, "Window detached");
                return Disposition::Closed;
            }
        };
        if let Err(e) = outcome {
            debug!(window = %self.window, step, error = %e, "Capture step skipped");
        }
        Disposition::Continue
    }

    pub async fn on_request_sent(&self, ev: RequestSent) -> Result<()> {
        let parsed = Url::parse(&ev.url).ok();
        let domain = parsed
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or("")
            .to_string();
        let path = parsed
            .as_ref()
            .map(|u| match u.query() {
                Some(q) => format!("{}?{}", u.path(), q),
                None => u.path().to_string(),
            })
            .unwrap_or_default();
        let resource_type = ev.resource_type.clone().unwrap_or_else(|| "Other".to_string());
        let mime_type = header_value(&ev.headers, "content-type").unwrap_or_else(|| resource_type.clone());
        let post_data_size = ev.post_data.as_ref().map(|d| d.len() as u64).unwrap_or(0);

        let mut state = self.state.lock().await;
        let index = state.next_request_index();
        let (post_data, post_data_file) = self.store_post_data(index, &ev.correlation_id, ev.post_data);
        let summary = RequestSummary {
            index,
            timestamp: now_millis(),
            correlation_id: ev.correlation_id.clone(),
            url: ev.url.clone(),
            domain,
            path,
            method: ev.method.clone(),
            resource_type: resource_type.clone(),
            mime_type,
            post_data_size,
        };
        let detail = RequestDetail {
            correlation_id: ev.correlation_id,
            url: ev.url,
            method: ev.method,
            resource_type: Some(resource_type),
            request_headers: ev.headers,
            post_data,
            post_data_file,
            post_data_size,
            ..Default::default()
        };
        debug!(window = %self.window, index, method = %detail.method, url = %detail.url, "Request captured");
        state.insert_request(summary, detail);
        Ok(())
    }

    /// Inline the request body when it fits the threshold, otherwise spill it
    /// to the window's scratch directory. A failed spill keeps it inline.
    fn store_post_data(
        &self,
        index: u64,
        correlation_id: &str,
        post_data: Option<String>,
    ) -> (Option<String>, Option<PathBuf>) {
        match post_data {
            Some(data) if data.len() > self.settings.inline_threshold_bytes => {
                match self.scratch.write_post_data(self.window, index, correlation_id, &data) {
                    Ok(path) => (None, Some(path)),
                    Err(e) => {
                        warn!(window = %self.window, request_id = %correlation_id, error = %e, "Failed to spill request body, keeping it inline");
                        (Some(data), None)
                    }
                }
            }
            other => (other, None),
        }
    }

    pub async fn on_response_received(&self, ev: ResponseReceived) -> Result<()> {
        let mut state = self.state.lock().await;
        let detail = state
            .detail_by_correlation_mut(&ev.correlation_id)
            .ok_or_else(|| not_in_epoch(&ev.correlation_id))?;
        detail.mime_type = ev.mime_type;
        detail.response_headers = Some(ev.headers);
        detail.status = ev.status;
        detail.status_text = ev.status_text;
        Ok(())
    }

    pub async fn on_loading_failed(&self, ev: LoadingFailed) -> Result<()> {
        let mut state = self.state.lock().await;
        let detail = state
            .detail_by_correlation_mut(&ev.correlation_id)
            .ok_or_else(|| not_in_epoch(&ev.correlation_id))?;
        detail.error_text = Some(if ev.error_text.is_empty() && ev.canceled {
            "canceled".to_string()
        } else {
            ev.error_text
        });
        Ok(())
    }

    /// Snapshot the record and start the body fetch in the background. The
    /// fetch outlives a reset: its sidecar is still written, only the
    /// in-memory enrichment is skipped.
    pub async fn on_loading_finished(self: &Arc<Self>, ev: LoadingFinished) -> Result<()> {
        let pending = {
            let mut state = self.state.lock().await;
            let epoch = state.epoch();
            let index = state
                .index_of(&ev.correlation_id)
                .ok_or_else(|| not_in_epoch(&ev.correlation_id))?;
            let detail = state
                .detail_mut(index)
                .ok_or_else(|| not_in_epoch(&ev.correlation_id))?;
            detail.encoded_data_length = ev.encoded_data_length;
            PendingBody {
                index,
                epoch,
                detail: detail.clone(),
            }
        };

        let this = Arc::clone(self);
        let mut fetches = self
            .fetches
            .lock()
            .map_err(|_| Error::Other("body fetch set poisoned".into()))?;
        while fetches.try_join_next().is_some() {}
        fetches.spawn(async move { this.complete(pending).await });
        Ok(())
    }

    async fn complete(&self, pending: PendingBody) {
        let index = pending.index;
        match self.fetch_and_persist(pending).await {
            Ok(()) => {}
            Err(e) if e.is_session_failure() => {
                debug!(window = %self.window, index, error = %e, "Response body unavailable");
            }
            Err(e) => {
                warn!(window = %self.window, index, error = %e, "Failed to persist response body");
            }
        }
    }

    async fn fetch_and_persist(&self, pending: PendingBody) -> Result<()> {
        let PendingBody { index, epoch, mut detail } = pending;
        let result = self
            .session
            .send(GET_RESPONSE_BODY, json!({ "requestId": detail.correlation_id }))
            .await?;
        let raw = result.get("body").and_then(|v| v.as_str()).unwrap_or_default();
        let base64_encoded = result
            .get("base64Encoded")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let url = Url::parse(&detail.url)
            .map_err(|e| Error::Validation(format!("unparseable url {}: {}", detail.url, e)))?;
        let domain = domain_for_url(&url);
        let filename = filename_for_url(&url);
        let category = classify(detail.mime_type.as_deref(), &filename);
        let body = prepare_body(raw, base64_encoded, category, self.settings.pretty_print)?;

        detail.response_body_size = Some(body.len() as u64);
        detail.body_is_binary = Some(body.is_binary());
        if let Body::Text(text) = &body {
            if text.len() <= self.settings.inline_threshold_bytes {
                detail.response_body = Some(text.clone());
            }
        }

        let body_path = self.store.body_path(self.window, &domain, category, &filename);
        match self.store.write(self.window, &domain, category, &filename, &body) {
            Ok(path) => detail.response_body_file = Some(path),
            Err(e) => {
                warn!(window = %self.window, index, path = %body_path.display(), error = %e, "Failed to write response body");
            }
        }

        let record = SidecarRecord {
            index,
            epoch,
            window_id: self.window,
            captured_at: now_millis(),
            detail: detail.clone(),
        };
        if let Err(e) = self.store.write_sidecar(&record, &body_path) {
            warn!(window = %self.window, index, error = %e, "Failed to write sidecar");
        }

        let mut state = self.state.lock().await;
        if state.epoch() != epoch {
            debug!(window = %self.window, index, "State reset during body fetch, sidecar only");
            return Ok(());
        }
        if let Some(current) = state.detail_mut(index) {
            if current.correlation_id == detail.correlation_id {
                current.response_body_size = detail.response_body_size;
                current.response_body_file = detail.response_body_file;
                current.response_body = detail.response_body;
                current.body_is_binary = detail.body_is_binary;
            }
        }
        Ok(())
    }

    pub async fn on_console_message(&self, msg: ConsoleMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state.next_log_index();
        state.push_log(LogEntry {
            index,
            timestamp: now_millis(),
            level: msg.level,
            message: msg.message,
            source: msg.source,
        });
        Ok(())
    }

    /// Navigation-start: clear the window's state and begin a new epoch.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.reset();
        info!(window = %self.window, epoch = state.epoch(), "Capture reset on navigation");
    }

    /// Wait for every body fetch started so far.
    pub async fn flush(&self) {
        loop {
            let mut set = match self.fetches.lock() {
                Ok(mut guard) => std::mem::take(&mut *guard),
                Err(_) => return,
            };
            if set.is_empty() {
                return;
            }
            while let Some(res) = set.join_next().await {
                if let Err(e) = res {
                    if !e.is_cancelled() {
                        warn!(window = %self.window, error = %e, "Body fetch task failed");
                    }
                }
            }
        }
    }

    /// Window-close: stop in-flight fetches, then delete the state, the
    /// scratch directory and everything captured on disk.
    pub async fn close(&self) -> Result<()> {
        let mut set = match self.fetches.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => JoinSet::new(),
        };
        set.abort_all();
        while set.join_next().await.is_some() {}

        self.state.lock().await.purge()?;
        self.store.purge_window(self.window)?;
        info!(window = %self.window, "Capture state purged");
        Ok(())
    }
}

fn not_in_epoch(correlation_id: &str) -> Error {
    Error::NotFound(format!("request {} is not in the current epoch", correlation_id))
}

fn header_value(headers: &Headers, name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.as_str())
        .map(|s| s.to_string())
}
