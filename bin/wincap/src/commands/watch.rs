use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wincap_browser::discovery::page_ws_url;
use wincap_browser::CdpSession;
use wincap_capture::{CaptureQuery, CaptureRegistry};
use wincap_core::{Config, Paths, WindowId};

pub struct WatchOptions {
    pub port: u16,
    pub target: Option<String>,
    pub window: u32,
    pub duration: Option<u64>,
    pub keep: bool,
}

pub async fn run(config: &Config, paths: &Paths, opts: WatchOptions) -> anyhow::Result<()> {
    let ws_url = page_ws_url(opts.port, opts.target.as_deref(), config.protocol.discovery_attempts).await?;
    let session = Arc::new(CdpSession::new(ws_url, &config.protocol));
    let events = session.take_events().await?;
    let main_frame = match session.main_frame_id().await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Could not resolve main frame, every frame navigation resets");
            None
        }
    };

    let registry = Arc::new(CaptureRegistry::from_config(config, paths));
    let window = WindowId(opts.window);
    let correlator = registry.open_window(window, session.clone()).await;
    info!(window = %window, ws_url = %session.ws_url(), "Capturing, press Ctrl-C to stop");

    let deadline = async {
        match opts.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = registry.pump(window, events, main_frame) => {
            let (exit, stats) = res?;
            info!(?exit, handled = stats.handled, ignored = stats.ignored, "Event stream finished");
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = deadline => info!("Watch duration elapsed"),
    }

    correlator.flush().await;

    let query = CaptureQuery::new(registry.clone(), config.query.clone());
    let requests = query.get_requests(window, 1, None).await?;
    let logs = query.get_logs(window, 1, None).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "requests": requests, "logs": logs }))?
    );

    if opts.keep {
        info!(path = %registry.store().window_dir(window).display(), "Keeping captured files");
    } else {
        registry.close_window(window).await?;
    }
    Ok(())
}
