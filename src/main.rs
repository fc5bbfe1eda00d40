//! Lifeboat Gates - Main Entry Point
//!
//! Loads the classifier gates once and serves survival predictions over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use lifeboat_gates::{
    api,
    config::{AppConfig, LogFormat, DEFAULT_CONFIG_PATH},
    metrics::{MetricsReporter, ServiceMetrics},
    models::{inference::InferenceEngine, registry::ModelRegistry},
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lifeboat-gates")]
#[command(version)]
#[command(about = "Survival predictions from independent classifier gates", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "LIFEBOAT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory containing the gate model files
    #[arg(short, long)]
    models_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(models_dir) = self.models_dir {
            config.models.models_dir = Some(models_dir);
        }
    }
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("lifeboat_gates={}", config.logging.level)),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_path(&cli.config)?;
    cli.apply(&mut config);

    init_tracing(&config)?;
    info!("Starting Lifeboat Gates");

    // Load gates once; the registry is read-only from here on
    let models_dir = config.models.resolve_dir();
    info!(models_dir = %models_dir.display(), "Loading gates");
    let registry = ModelRegistry::load(&models_dir, config.models.onnx_threads);

    let metrics = Arc::new(ServiceMetrics::new());
    let engine = Arc::new(InferenceEngine::new(registry).with_metrics(metrics.clone()));
    if engine.gate_count() == 0 {
        warn!("No gates available, predictions will return empty results");
    } else {
        info!(
            "Inference engine initialized with {} gates: {:?}",
            engine.gate_count(),
            engine.gate_names()
        );
    }

    info!(features = ?engine.feature_names(), "Feature column order");

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let routes = api::routes(engine, metrics.clone());

    let bind_addr: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.host))?;

    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown((bind_addr, config.server.port), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .context("Failed to bind HTTP server")?;

    info!("Server listening on {}", addr);
    server.await;

    info!("Server shutting down...");
    metrics.print_summary();

    Ok(())
}
