//! lidar-rt - Main Entry Point
//!
//! Replays point-cloud frames through the acquire → preprocess → identify
//! pipeline at a fixed rate until Ctrl-C (or `--cycles` frames).

use anyhow::Context;
use clap::Parser;
use lidar_rt::{
    config::{default_config_path, PipelineConfig, DEFAULT_LOG_FILTER},
    pipeline::{
        nodes::{ChannelSink, LogSink},
        FrameSink, PipelineBuilder, StopRequest,
    },
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "lidar-rt")]
#[command(about = "Fixed-rate LiDAR point-cloud processing pipeline")]
#[command(version)]
struct CliArgs {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Point-cloud files to replay, overriding `source.frames`
    #[arg(long, value_name = "FILE", num_args = 1..)]
    frames: Vec<PathBuf>,

    /// Acquisition period in milliseconds, overriding `scheduler.period_ms`
    #[arg(long)]
    period_ms: Option<u64>,

    /// Stop after this many frames have been published (at least 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    cycles: Option<u64>,

    /// Write the JSON run report here, overriding `report_path`
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn load_config(args: &CliArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {:?}", path))?,
        None => default_config_path()
            .map(|path| PipelineConfig::load_or_default(path))
            .unwrap_or_default(),
    };

    if !args.frames.is_empty() {
        config.source.frames = args.frames.clone();
    }
    if let Some(period_ms) = args.period_ms {
        config.scheduler.period_ms = period_ms;
    }
    if args.report.is_some() {
        config.report_path = args.report.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Returns the file writer guard, which must live until exit.
fn init_logging(config: &PipelineConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, guard) = match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lidar-rt.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Forward Ctrl-C to the pipeline. The handler only sets the stop flag.
fn spawn_signal_listener(stop: StopRequest) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating signal runtime")?;

    std::thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, stopping pipeline");
                    stop.request();
                }
            });
        })
        .context("spawning signal listener")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config);

    tracing::info!(
        "Starting lidar-rt: {} frame file(s), period {:?}",
        config.source.frames.len(),
        config.scheduler.period()
    );

    let builder = PipelineBuilder::from_config(&config)?;

    let report = match args.cycles {
        None => {
            let pipeline = builder.sink(LogSink::new()).build()?;
            spawn_signal_listener(pipeline.stop_request())?;
            pipeline.start()?.join()?
        }
        Some(cycles) => {
            // Frames are logged here so the main thread can count them and
            // stop the pipeline once enough have arrived.
            let (sink, frames) = ChannelSink::unbounded();
            let pipeline = builder.sink(sink).build()?;
            spawn_signal_listener(pipeline.stop_request())?;
            let handle = pipeline.start()?;

            let mut log = LogSink::new();
            for frame in frames.iter() {
                log.publish(frame)?;
                if log.published() >= cycles {
                    tracing::info!("Published {} frame(s), stopping", cycles);
                    handle.shutdown();
                    break;
                }
            }
            handle.join()?
        }
    };

    if let Some(path) = &config.report_path {
        report.save_json(path)?;
        tracing::info!("Run report written to {:?}", path);
    }

    report.into_result()?;
    Ok(())
}
