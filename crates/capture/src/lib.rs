//! The per-window capture pipeline: state, correlation of protocol events,
//! content handling and the query surface.

pub mod content;
pub mod correlator;
pub mod pretty;
pub mod query;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use correlator::{Disposition, EventCorrelator};
pub use query::{CaptureQuery, DetailSource, LogFilter, RequestFilter, RequestRecord};
pub use registry::{CaptureRegistry, PumpExit, PumpStats};
pub use state::WindowCaptureState;
