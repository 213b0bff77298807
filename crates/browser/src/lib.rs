//! Browser engine plumbing: the CDP client, the per-window protocol session
//! adapter and the typed events the capture pipeline consumes.

pub mod cdp;
pub mod discovery;
pub mod events;
pub mod session;

pub use cdp::{CdpClient, CdpEvent};
pub use events::ProtocolEvent;
pub use session::{CdpSession, ProtocolSession};
