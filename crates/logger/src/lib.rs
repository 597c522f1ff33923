//! CAN Bus Logger
//!
//! Brings the controller and storage up, runs the capture pipeline with a
//! live status display, and shuts everything down cleanly on request.

use can_bus::{initialize_with_retry, BusController, ClockSource, SessionClock, SimulatedController};
use pipeline::{Pipeline, PipelineError, PipelineReport, ThroughputSampler};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use trace_storage::{log_file_name, open_session, FileStorage, TraceSink};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod status;

pub use config::{ConfigError, LoggerConfig, LoggingSection};
pub use status::{run_status_loop, StatusDisplay, TracingDisplay};

/// Top-level errors
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Initialize logging
pub fn init_logging(config: &LoggingSection) -> Result<(), LoggerError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| LoggerError::Logging(format!("unknown log level '{}'", config.level)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| LoggerError::Logging(e.to_string()))
}

/// Open today's trace file, or `None` to fall back to diagnostic output
pub fn open_storage(config: &LoggerConfig, clock: &dyn ClockSource) -> Option<Box<dyn TraceSink>> {
    if !config.storage.enabled {
        warn!("Storage disabled by configuration");
        return None;
    }

    let name = log_file_name(&clock.wall_clock());
    match FileStorage::new(&config.storage.directory).and_then(|storage| open_session(&storage, &name)) {
        Ok(sink) => Some(Box::new(sink) as Box<dyn TraceSink>),
        Err(e) => {
            error!("SD Card initialization failed! {}", e);
            None
        }
    }
}

/// Initialize the bus controller, or `None` if it never comes up
pub async fn init_controller(controller: Box<dyn BusController>, config: &LoggerConfig) -> Option<Box<dyn BusController>> {
    let policy = config.controller.init_policy();
    let mut controller = controller;

    let outcome = tokio::task::spawn_blocking(move || {
        let result = initialize_with_retry(controller.as_mut(), &policy);
        (controller, result)
    })
    .await;

    match outcome {
        Ok((controller, Ok(_))) => Some(controller),
        Ok((_, Err(e))) => {
            error!("CAN Init Failed! {}. Capture disabled", e);
            None
        }
        Err(e) => {
            error!("Controller init task failed: {}", e);
            None
        }
    }
}

/// Run until `shutdown` resolves, then stop the pipeline and return its totals
pub async fn run_until<F>(
    config: LoggerConfig,
    controller: Box<dyn BusController>,
    display: &dyn StatusDisplay,
    shutdown: F,
) -> Result<PipelineReport, LoggerError>
where
    F: Future<Output = ()>,
{
    let clock = Arc::new(SessionClock::start());
    let sink = open_storage(&config, clock.as_ref());
    let controller = init_controller(controller, &config).await;

    let mut builder = Pipeline::builder(config.pipeline.to_pipeline_config()).clock(clock);
    if let Some(controller) = controller {
        builder = builder.controller(controller);
    }
    if let Some(sink) = sink {
        builder = builder.sink(sink);
    }
    let pipeline = builder.start()?;

    let sampler = ThroughputSampler::new(pipeline.counter(), config.status.sample_interval());
    tokio::select! {
        _ = run_status_loop(|| pipeline.snapshot(), sampler, display, config.status.health_interval()) => {}
        _ = shutdown => {}
    }

    let report = tokio::task::spawn_blocking(move || pipeline.shutdown()).await?;
    info!(
        messages = report.messages,
        dropped = report.capture.dropped,
        bytes = report.writer.bytes_persisted,
        write_errors = report.writer.write_errors,
        "Logger stopped"
    );
    Ok(report)
}

/// Run with the simulated controller until Ctrl-C
pub async fn run(config: LoggerConfig) -> Result<PipelineReport, LoggerError> {
    let controller = Box::new(SimulatedController::new(config.controller.simulated()));
    let display = TracingDisplay;

    run_until(config, controller, &display, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown requested");
    })
    .await
}
