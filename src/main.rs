use clap::Parser;
use livepipe::buffer::FrameBuffer;
use livepipe::config::Configuration;
use livepipe::engine::{control, EngineBuilder};
use livepipe::error::AppError;
use livepipe::pipeline::{DescriptorSource, StepFactory};
use livepipe::plugins;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "livepipe")]
#[command(about = "Real-time frame processing engine with hot-swappable pipelines")]
#[command(version)]
struct Cli {
    /// Settings file (TOML or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pipeline descriptor loaded at startup
    #[arg(long)]
    pipeline: Option<PathBuf>,

    /// Route ingested frames straight to the output buffer
    #[arg(long)]
    passthrough: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut configuration = Configuration::load(cli.config.as_deref())?;
    if let Some(pipeline) = cli.pipeline {
        configuration.engine.pipeline_path = Some(pipeline);
    }
    if cli.passthrough {
        configuration.engine.pipeline_enabled = false;
    }
    init_logging(&configuration.log_level);

    let input = Arc::new(FrameBuffer::from_settings("input", &configuration.buffer));
    let output = Arc::new(FrameBuffer::from_settings("output", &configuration.buffer));

    let factory = Arc::new(plugins::register(StepFactory::builder()).build());
    let engine = EngineBuilder::new(configuration.engine.clone())
        .input_buffer(input)
        .output_buffer(output)
        .factory(factory)
        .build()?;

    if let Some(path) = &configuration.engine.pipeline_path {
        let reference = path.to_string_lossy().into_owned();
        match engine.set_pipeline(DescriptorSource::Stored(reference)).await {
            Ok(()) => info!("Pipeline loaded from {}", path.display()),
            Err(e) => error!(
                "Failed to load pipeline from {}, frames bypass the engine: {}",
                path.display(),
                e
            ),
        }
    }

    let engine_task = engine.spawn_supervised();
    let (control_task, _control) = control::spawn(engine.clone(), configuration.engine.control_capacity);
    info!("Engine running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    engine.shutdown();
    engine_task
        .await
        .map_err(|e| AppError::Engine(e.to_string()))?;
    control_task
        .await
        .map_err(|e| AppError::Engine(e.to_string()))?;

    let metrics = engine.metrics();
    info!(
        "Processed {} frames, {} failed, {} rejected by the output buffer",
        metrics.frames_processed, metrics.frames_failed, metrics.output_rejected
    );
    Ok(())
}
