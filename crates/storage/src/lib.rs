pub mod capture_store;
pub mod layout;
pub mod scratch;

pub use capture_store::{Body, CaptureStore, SidecarRecord};
pub use layout::ContentCategory;
pub use scratch::ScratchStore;

use std::path::Path;

/// `remove_dir_all` that treats an already-missing directory as success.
pub fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
