//! SpectraScope acquisition service
//!
//! Reads NDJSON requests from stdin, feeds them to the acquisition core and
//! writes spectrum snapshots and replies to stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use spectrascope_service::config::load_config;
use spectrascope_service::{run_ingest_loop, run_writer, ChannelBroadcaster, SpectrumAcquisition};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Responses buffered for the writer before snapshots start dropping
const OUTPUT_QUEUE_DEPTH: usize = 64;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "spectrascope-service")]
#[command(about = "Streaming multi-channel FFT acquisition service")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the FFT size
    #[arg(long)]
    fft_size: Option<usize>,

    /// Override the update interval in channel cycles (0 = auto)
    #[arg(long)]
    interval: Option<usize>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging with RUST_LOG env var support; stdout carries data
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "SpectraScope service starting (pid: {})...",
        std::process::id()
    );

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(fft_size) = cli.fft_size {
        config.fft_size = fft_size;
    }
    if let Some(interval) = cli.interval {
        config.update_interval = interval;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async {
        let (tx, rx) = mpsc::channel(OUTPUT_QUEUE_DEPTH);

        let mut acquisition = SpectrumAcquisition::new(&config);
        acquisition.set_callback(Arc::new(ChannelBroadcaster::new(
            tx.clone(),
            config.drop_log_interval,
        )));

        let writer = tokio::spawn(run_writer(rx, tokio::io::stdout()));
        let reader = BufReader::new(tokio::io::stdin());

        tokio::select! {
            result = run_ingest_loop(reader, acquisition, tx) => {
                if let Err(e) = result {
                    error!("Input error: {}", e);
                }
            }
            _ = shutdown_signal() => {}
        }

        // Every sender is gone once the loop future is dropped
        match writer.await {
            Ok(Err(e)) => error!("Output error: {}", e),
            Err(e) => error!("Writer task failed: {}", e),
            Ok(Ok(())) => {}
        }
    });

    // A pending stdin read holds a blocking thread; don't wait on it
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    info!("SpectraScope service stopped");
}

/// Resolve when the process is asked to terminate.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint, mut sighup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
            _ => {
                error!("Failed to install signal handlers");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sighup.recv() => info!("Received SIGHUP"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
