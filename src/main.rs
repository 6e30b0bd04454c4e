//! forecastd - time-series prediction server
//!
//! # Usage
//! ```sh
//! MODEL_DIR=ml/models cargo run -- serve --port 8000
//! cargo run -- predict --model lstm --file series.csv --horizon 12
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forecastd::application::bootstrap::ServicesBootstrap;
use forecastd::application::model_registry::ModelRegistry;
use forecastd::application::parser::parse_delimited;
use forecastd::application::pipeline::InferencePipeline;
use forecastd::config::Config;
use forecastd::infrastructure::Scaler;
use forecastd::interfaces::http;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Time-series prediction server", long_about = None)]
struct Cli {
    /// Directory holding the ONNX models and scaler (overrides MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Predict (or forecast with --horizon) from a delimited file
    Predict {
        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        file: PathBuf,

        /// DCT, DWT or CS
        #[arg(short, long)]
        transform: Option<String>,

        #[arg(long)]
        horizon: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.model_dir {
        config.models = config.models.with_model_dir(dir);
    }

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Commands::Predict {
            model,
            file,
            transform,
            horizon,
        } => predict_file(&config, &model, &file, transform.as_deref(), horizon),
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("forecastd {} starting...", env!("CARGO_PKG_VERSION"));

    let services = ServicesBootstrap::init(&config).await?;
    info!(
        "Models available: {:?}",
        services.pipeline.registry().loaded_names()
    );

    let app = http::router(services, &config.server);
    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received. Exiting...");
        })
        .await
        .context("Server error")?;

    Ok(())
}

fn predict_file(
    config: &Config,
    model: &str,
    file: &Path,
    transform: Option<&str>,
    horizon: Option<usize>,
) -> Result<()> {
    let manifest = config.models.manifest()?;
    let registry = ModelRegistry::load(&config.models, &manifest);
    let scaler = Scaler::load_optional(&config.models.scaler_path);
    let pipeline = InferencePipeline::new(Arc::new(registry), scaler);

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let series = parse_delimited(&bytes)?;

    let output = match horizon {
        Some(horizon) => {
            let forecast = pipeline.forecast(model, transform, &series, horizon)?;
            json!({
                "forecast": forecast.forecast,
                "baseline": forecast.baseline,
                "warnings": forecast.warnings,
            })
        }
        None => {
            let prediction = pipeline.predict(model, transform, &series)?;
            json!({
                "prediction": prediction.value,
                "warnings": prediction.warnings,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
