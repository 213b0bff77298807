use std::path::Path;
use wincap_core::{Config, Paths};

pub async fn run(config: &Config, paths: &Paths, config_override: Option<&Path>) -> anyhow::Result<()> {
    println!("wincap status");
    println!("=============");
    println!();

    let config_path = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file());
    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "✗ (defaults)" }
    );

    let capture_root = config.capture_root(paths);
    println!("Captures: {}", capture_root.display());
    println!("Scratch:  {}", config.scratch_root(paths).display());
    println!();

    println!("Inline threshold: {} bytes", config.capture.inline_threshold_bytes);
    println!("Command timeout:  {}s", config.protocol.command_timeout_secs);
    println!(
        "Page size:        {} (max {})",
        config.query.default_page_size, config.query.max_page_size
    );
    println!();

    let mut windows: Vec<String> = match std::fs::read_dir(&capture_root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(|s| s.to_string()))
            .filter(|name| name.starts_with("window-"))
            .collect(),
        Err(_) => Vec::new(),
    };
    windows.sort();
    if windows.is_empty() {
        println!("No captured windows on disk.");
    } else {
        println!("Captured windows:");
        for name in windows {
            println!("  {}", name);
        }
    }

    Ok(())
}
