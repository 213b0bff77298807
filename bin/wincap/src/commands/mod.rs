pub mod detail;
pub mod status;
pub mod watch;

use std::path::Path;
use wincap_core::{Config, Paths};

/// Load the config from `path`, or from the default location when it exists.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<(Config, Paths)> {
    let paths = Paths::new();
    let config = match path {
        Some(p) => Config::load(p)?,
        None => Config::load_or_default(&paths)?,
    };
    Ok((config, paths))
}
