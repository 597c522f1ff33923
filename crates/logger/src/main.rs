//! CAN Logger - Main Entry Point
//!
//! Usage: `can-logger [config.toml]`

use can_logger::{init_logging, run, LoggerConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = LoggerConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== CAN Logger v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting CAN bus capture...");

    let report = run(config).await?;
    info!(
        "Logged {} messages, dropped {}",
        report.messages, report.capture.dropped
    );

    Ok(())
}
