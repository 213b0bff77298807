//! Durable side-store for response bodies and their sidecar records.
//!
//! Bodies land at `<root>/window-<id>/<domain>/<category>/<filename>`; the
//! same logical path written twice keeps only the last body. Each finished
//! request also gets a sidecar `<filename>.<index>.info.txt` holding its full
//! detail, so the detail can be recovered after the in-memory state that
//! produced it has been reset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use wincap_core::paths::window_dir;
use wincap_core::{Error, RequestDetail, Result, WindowId};

use crate::layout::ContentCategory;
use crate::remove_dir_if_exists;

const SIDECAR_SUFFIX: &str = ".info.txt";

/// A captured response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Text(s) => s.len(),
            Body::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Body::Binary(_))
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Body::Text(s) => s.as_bytes(),
            Body::Binary(b) => b,
        }
    }
}

/// The JSON document stored in a sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarRecord {
    pub index: u64,
    /// Capture epoch the index belongs to; indices repeat across epochs.
    pub epoch: u64,
    pub window_id: WindowId,
    pub captured_at: i64,
    #[serde(flatten)]
    pub detail: RequestDetail,
}

pub struct CaptureStore {
    root: PathBuf,
    /// Sidecars written by this process, by (window, index). Kept outside the
    /// per-window capture state so it survives resets; anything not in it is
    /// found by scanning.
    sidecars: Mutex<HashMap<(WindowId, u64), Vec<PathBuf>>>,
}

impl CaptureStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            sidecars: Mutex::new(HashMap::new()),
        }
    }

    pub fn window_dir(&self, window: WindowId) -> PathBuf {
        window_dir(&self.root, window)
    }

    pub fn body_path(
        &self,
        window: WindowId,
        domain: &str,
        category: ContentCategory,
        filename: &str,
    ) -> PathBuf {
        self.window_dir(window)
            .join(domain)
            .join(category.as_str())
            .join(filename)
    }

    /// Write a body, overwriting whatever was stored under the same
    /// (domain, category, filename). Returns the file path.
    pub fn write(
        &self,
        window: WindowId,
        domain: &str,
        category: ContentCategory,
        filename: &str,
        body: &Body,
    ) -> Result<PathBuf> {
        let path = self.body_path(window, domain, category, filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, body.bytes())?;
        debug!(window = %window, path = %path.display(), bytes = body.len(), "Stored body");
        Ok(path)
    }

    pub fn sidecar_path(body_path: &Path, index: u64) -> PathBuf {
        let mut name = body_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}{}", index, SIDECAR_SUFFIX));
        body_path.with_file_name(name)
    }

    /// Write the sidecar next to `body_path` and remember it in the index.
    /// A record from a newer epoch already at that path is left in place.
    pub fn write_sidecar(&self, record: &SidecarRecord, body_path: &Path) -> Result<PathBuf> {
        let path = Self::sidecar_path(body_path, record.index);
        if path.exists() {
            if let Some(existing) = read_sidecar(&path) {
                if existing.window_id == record.window_id && existing.epoch > record.epoch {
                    debug!(path = %path.display(), epoch = record.epoch, kept = existing.epoch, "Newer sidecar on disk, not overwriting");
                    return Ok(path);
                }
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, content)?;

        let mut sidecars = self
            .sidecars
            .lock()
            .map_err(|_| Error::Storage("sidecar index poisoned".into()))?;
        let entry = sidecars.entry((record.window_id, record.index)).or_default();
        if !entry.contains(&path) {
            entry.push(path.clone());
        }
        Ok(path)
    }

    /// Find the sidecar for `index` in the window's capture directory. When
    /// the same index was captured in several epochs the highest epoch wins,
    /// however late an older epoch's record was written.
    pub fn find_sidecar_by_index(&self, window: WindowId, index: u64) -> Result<Option<SidecarRecord>> {
        let known: Vec<PathBuf> = self
            .sidecars
            .lock()
            .map_err(|_| Error::Storage("sidecar index poisoned".into()))?
            .get(&(window, index))
            .cloned()
            .unwrap_or_default();

        let indexed = newest(
            known
                .iter()
                .filter_map(|p| read_sidecar(p))
                .filter(|r| r.window_id == window && r.index == index),
        );
        if indexed.is_some() {
            return Ok(indexed);
        }

        let dir = self.window_dir(window);
        if !dir.exists() {
            return Ok(None);
        }
        let mut files = Vec::new();
        collect_sidecars(&dir, &mut files)?;
        Ok(newest(
            files
                .iter()
                .filter_map(|p| read_sidecar(p))
                .filter(|r| r.window_id == window && r.index == index),
        ))
    }

    /// Delete everything captured for the window.
    pub fn purge_window(&self, window: WindowId) -> Result<()> {
        if let Ok(mut sidecars) = self.sidecars.lock() {
            sidecars.retain(|(w, _), _| *w != window);
        }
        remove_dir_if_exists(&self.window_dir(window))?;
        Ok(())
    }
}

fn newest(records: impl Iterator<Item = SidecarRecord>) -> Option<SidecarRecord> {
    records.max_by_key(|r| (r.epoch, r.captured_at))
}

fn read_sidecar(path: &Path) -> Option<SidecarRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Sidecar unreadable, skipping");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Sidecar is not a valid record, skipping");
            None
        }
    }
}

fn collect_sidecars(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_sidecars(&path, out)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(SIDECAR_SUFFIX))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(())
}
