//! Window registry: one correlator per open browser window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use wincap_browser::{CdpEvent, ProtocolEvent, ProtocolSession};
use wincap_core::config::CaptureConfig;
use wincap_core::{Config, Error, Paths, Result, WindowId};
use wincap_storage::{CaptureStore, ScratchStore};

use crate::correlator::{Disposition, EventCorrelator};

/// Why [`CaptureRegistry::pump`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The browser reported the window as detached.
    Detached,
    /// The event stream ended without a detach event.
    StreamEnded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub handled: u64,
    pub ignored: u64,
}

pub struct CaptureRegistry {
    settings: CaptureConfig,
    store: Arc<CaptureStore>,
    scratch: ScratchStore,
    windows: RwLock<HashMap<WindowId, Arc<EventCorrelator>>>,
}

impl CaptureRegistry {
    pub fn new(settings: CaptureConfig, capture_root: PathBuf, scratch_root: PathBuf) -> Self {
        Self {
            settings,
            store: Arc::new(CaptureStore::new(capture_root)),
            scratch: ScratchStore::new(scratch_root),
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config, paths: &Paths) -> Self {
        Self::new(
            config.capture.clone(),
            config.capture_root(paths),
            config.scratch_root(paths),
        )
    }

    pub fn store(&self) -> Arc<CaptureStore> {
        self.store.clone()
    }

    pub fn scratch(&self) -> &ScratchStore {
        &self.scratch
    }

    /// Register a window. Opening an already open window returns its
    /// existing correlator and ignores `session`.
    pub async fn open_window(&self, window: WindowId, session: Arc<dyn ProtocolSession>) -> Arc<EventCorrelator> {
        let mut windows = self.windows.write().await;
        if let Some(existing) = windows.get(&window) {
            return existing.clone();
        }
        let correlator = Arc::new(EventCorrelator::new(
            window,
            session,
            self.store.clone(),
            self.scratch.clone(),
            self.settings.clone(),
        ));
        windows.insert(window, correlator.clone());
        info!(window = %window, "Capture window opened");
        correlator
    }

    pub async fn correlator(&self, window: WindowId) -> Result<Arc<EventCorrelator>> {
        self.windows
            .read()
            .await
            .get(&window)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("window {} is not being captured", window)))
    }

    pub async fn navigation_started(&self, window: WindowId) -> Result<()> {
        self.correlator(window).await?.reset().await;
        Ok(())
    }

    /// Deregister the window and purge its memory, scratch files and
    /// captured bodies.
    pub async fn close_window(&self, window: WindowId) -> Result<()> {
        let removed = self.windows.write().await.remove(&window);
        match removed {
            Some(correlator) => correlator.close().await,
            None => Err(Error::NotFound(format!("window {} is not being captured", window))),
        }
    }

    pub async fn windows(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = self.windows.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Feed raw protocol events for `window` into its correlator until the
    /// window detaches or the stream ends. Frame navigations other than
    /// `main_frame_id` are ignored; with no known main frame every
    /// navigation resets. Closing the window is left to the caller.
    pub async fn pump(
        &self,
        window: WindowId,
        mut events: mpsc::Receiver<CdpEvent>,
        main_frame_id: Option<String>,
    ) -> Result<(PumpExit, PumpStats)> {
        let correlator = self.correlator(window).await?;
        let mut stats = PumpStats::default();

        while let Some(event) = events.recv().await {
            let Some(decoded) = ProtocolEvent::from_cdp(&event.method, &event.params) else {
                stats.ignored += 1;
                continue;
            };
            if let ProtocolEvent::NavigationStarted { frame_id } = &decoded {
                if main_frame_id.as_deref().is_some_and(|main| main != frame_id.as_str()) {
                    debug!(window = %window, frame_id = %frame_id, "Ignoring subframe navigation");
                    stats.ignored += 1;
                    continue;
                }
            }
            stats.handled += 1;
            if correlator.handle(decoded).await == Disposition::Closed {
                return Ok((PumpExit::Detached, stats));
            }
        }
        debug!(window = %window, handled = stats.handled, "Event stream ended");
        Ok((PumpExit::StreamEnded, stats))
    }
}
