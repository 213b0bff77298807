//! Per-window in-memory capture state.
//!
//! Indices are unique and increasing within one epoch only. `reset()` starts
//! a new epoch and hands out index 1 again.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tracing::debug;
use wincap_core::{LogEntry, RequestDetail, RequestSummary, Result, WindowId};
use wincap_storage::remove_dir_if_exists;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counters {
    log: u64,
    request: u64,
}

#[derive(Debug)]
pub struct WindowCaptureState {
    window_id: WindowId,
    scratch_dir: PathBuf,
    epoch: u64,
    logs: Vec<LogEntry>,
    requests: Vec<RequestSummary>,
    /// Detail records by stable index.
    details: BTreeMap<u64, RequestDetail>,
    /// Correlation id -> index of its newest request in this epoch.
    by_correlation: HashMap<String, u64>,
    /// Request URLs in first-seen order.
    urls: Vec<String>,
    seen_urls: HashSet<String>,
    counters: Counters,
}

impl WindowCaptureState {
    pub fn new(window_id: WindowId, scratch_dir: PathBuf) -> Self {
        Self {
            window_id,
            scratch_dir,
            epoch: 0,
            logs: Vec::new(),
            requests: Vec::new(),
            details: BTreeMap::new(),
            by_correlation: HashMap::new(),
            urls: Vec::new(),
            seen_urls: HashSet::new(),
            counters: Counters::default(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn next_log_index(&mut self) -> u64 {
        self.counters.log += 1;
        self.counters.log
    }

    pub fn next_request_index(&mut self) -> u64 {
        self.counters.request += 1;
        self.counters.request
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    /// Record a new request under both its index and its correlation id.
    pub fn insert_request(&mut self, summary: RequestSummary, detail: RequestDetail) {
        let index = summary.index;
        if self.seen_urls.insert(summary.url.clone()) {
            self.urls.push(summary.url.clone());
        }
        self.by_correlation
            .insert(summary.correlation_id.clone(), index);
        self.details.insert(index, detail);
        self.requests.push(summary);
    }

    pub fn index_of(&self, correlation_id: &str) -> Option<u64> {
        self.by_correlation.get(correlation_id).copied()
    }

    pub fn detail(&self, index: u64) -> Option<&RequestDetail> {
        self.details.get(&index)
    }

    pub fn detail_mut(&mut self, index: u64) -> Option<&mut RequestDetail> {
        self.details.get_mut(&index)
    }

    pub fn detail_by_correlation_mut(&mut self, correlation_id: &str) -> Option<&mut RequestDetail> {
        let index = self.index_of(correlation_id)?;
        self.details.get_mut(&index)
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn requests(&self) -> &[RequestSummary] {
        &self.requests
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Drop everything captured so far and start a new epoch.
    pub fn reset(&mut self) {
        self.logs = Vec::new();
        self.requests = Vec::new();
        self.details = BTreeMap::new();
        self.by_correlation = HashMap::new();
        self.urls = Vec::new();
        self.seen_urls = HashSet::new();
        self.counters = Counters::default();
        self.epoch += 1;
        debug!(window = %self.window_id, epoch = self.epoch, "Capture state reset");
    }

    /// Reset, then delete the window's scratch directory.
    pub fn purge(&mut self) -> Result<()> {
        self.reset();
        remove_dir_if_exists(&self.scratch_dir)?;
        Ok(())
    }
}
