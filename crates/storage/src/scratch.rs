//! Per-window scratch space for request bodies too large to keep inline.

use std::path::PathBuf;
use wincap_core::paths::window_dir;
use wincap_core::{Result, WindowId};

use crate::layout::sanitize_segment;

#[derive(Debug, Clone)]
pub struct ScratchStore {
    root: PathBuf,
}

impl ScratchStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn window_dir(&self, window: WindowId) -> PathBuf {
        window_dir(&self.root, window)
    }

    /// Write a request body to `window-<id>/post-<index>-<correlation id>.dat`.
    /// Redirect hops share a correlation id, so the index keeps them apart.
    pub fn write_post_data(&self, window: WindowId, index: u64, correlation_id: &str, data: &str) -> Result<PathBuf> {
        let dir = self.window_dir(window);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("post-{}-{}.dat", index, sanitize_segment(correlation_id)));
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_post_data_file_per_index() {
        let temp_dir = TempDir::new().unwrap();
        let scratch = ScratchStore::new(temp_dir.path().to_path_buf());
        let first = scratch
            .write_post_data(WindowId(5), 1, "1000.42", "payload")
            .unwrap();
        assert_eq!(first, temp_dir.path().join("window-5/post-1-1000.42.dat"));

        // A redirect hop reuses the correlation id under a new index.
        let second = scratch
            .write_post_data(WindowId(5), 2, "1000.42", "redirected")
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "payload");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "redirected");
    }
}
