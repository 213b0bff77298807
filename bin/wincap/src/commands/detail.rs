use wincap_core::{Config, Paths, WindowId};
use wincap_storage::CaptureStore;

pub async fn run(config: &Config, paths: &Paths, window: u32, index: u64) -> anyhow::Result<()> {
    let store = CaptureStore::new(config.capture_root(paths));
    match store.find_sidecar_by_index(WindowId(window), index)? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!(
            "No persisted detail for request {} in {}",
            index,
            store.window_dir(WindowId(window)).display()
        ),
    }
}
