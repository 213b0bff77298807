use std::path::{Path, PathBuf};

use crate::types::WindowId;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".wincap"))
            .unwrap_or_else(|| PathBuf::from(".wincap"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Default root for captured bodies and sidecar records.
    pub fn capture_root(&self) -> PathBuf {
        self.base.join("captures")
    }

    /// Default root for oversized request bodies. Lives under the system temp dir
    /// since nothing in it outlives its window.
    pub fn scratch_root(&self) -> PathBuf {
        std::env::temp_dir().join("wincap")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

/// `window-<id>` directory under the given root.
pub fn window_dir(root: &Path, window: WindowId) -> PathBuf {
    root.join(window.dir_name())
}

/// Expand a leading `~/` against the home directory; relative paths resolve
/// against `base`.
pub fn expand_path(path: &str, base: &Path) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_dir_name() {
        let root = PathBuf::from("/tmp/captures");
        assert_eq!(
            window_dir(&root, WindowId(7)),
            PathBuf::from("/tmp/captures/window-7")
        );
    }

    #[test]
    fn test_expand_path() {
        let base = PathBuf::from("/srv/wincap");
        assert_eq!(expand_path("/abs/dir", &base), PathBuf::from("/abs/dir"));
        assert_eq!(expand_path("rel", &base), PathBuf::from("/srv/wincap/rel"));
    }

    #[test]
    fn test_paths_layout() {
        let paths = Paths::with_base(PathBuf::from("/srv/wincap"));
        assert_eq!(paths.config_file(), PathBuf::from("/srv/wincap/config.json"));
        assert_eq!(paths.capture_root(), PathBuf::from("/srv/wincap/captures"));
    }
}
