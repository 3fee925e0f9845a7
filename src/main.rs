//! Iris MLOps command line
//!
//! `prepare`, `train` and `pipeline` run the offline stages; `serve` starts
//! the prediction API with its background monitor; `monitor` and
//! `smoke-test` inspect a deployment.

use std::fs::{self, OpenOptions};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iris_mlops::inference::Predictor;
use iris_mlops::monitoring::{self, background, ApiMetrics, PerformanceMonitor};
use iris_mlops::{create_router, db, smoke, training, AppState, Config};

#[derive(Parser, Debug)]
#[command(name = "iris-mlops", version, about = "Iris classification MLOps pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Splits and scales the dataset, writing arrays and scaler to DATA_DIR.
    Prepare,
    /// Trains every classifier and registers the best one.
    Train,
    /// Runs `prepare` then `train`.
    Pipeline,
    /// Starts the prediction API.
    Serve {
        /// Skip the periodic drift/accuracy job.
        #[arg(long)]
        no_monitor: bool,
    },
    /// Prints prediction statistics, hourly volume and drift as JSON.
    Monitor {
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, default_value_t = 24)]
        hours: i64,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Exercises a running API end to end.
    SmokeTest {
        #[arg(long, default_value = "http://localhost:8000")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let cli = Cli::parse();

    init_logging(&config)?;

    match cli.command {
        Commands::Prepare => {
            let cfg = config.clone();
            let split = tokio::task::spawn_blocking(move || training::prepare_data(&cfg)).await??;
            println!(
                "{}",
                json!({ "train_samples": split.y_train.len(), "test_samples": split.y_test.len() })
            );
        }
        Commands::Train => {
            let cfg = config.clone();
            let summary = tokio::task::spawn_blocking(move || training::train(&cfg)).await??;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Pipeline => {
            let cfg = config.clone();
            let summary = tokio::task::spawn_blocking(move || {
                training::prepare_data(&cfg)?;
                training::train(&cfg)
            })
            .await??;
            tracing::info!(
                best_model = %summary.best_model,
                accuracy = summary.metrics.accuracy,
                "Pipeline completed"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Serve { no_monitor } => serve(config, !no_monitor).await?,
        Commands::Monitor { days, hours, threshold } => {
            let pool = open_database(&config).await?;
            let now = Utc::now();
            let stats = monitoring::prediction_stats(&pool, days, now).await?;
            let volume = monitoring::hourly_volume(&pool, hours, now).await?;
            let drift = monitoring::check_drift(
                &pool,
                threshold.unwrap_or(config.drift_threshold),
                now,
            )
            .await;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "prediction_stats": stats,
                    "hourly_volume": volume,
                    "drift": drift,
                }))?
            );
        }
        Commands::SmokeTest { url } => {
            let report = smoke::run(&url)
                .await
                .with_context(|| format!("smoke test against {} failed", url))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Stdout plus an append-only `api.log` under LOG_DIR
fn init_logging(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating {}", config.log_dir.display()))?;
    let log_path = config.log_dir.join("api.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening {}", log_path.display()))?;

    let production = config.is_production();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "iris_mlops=info,tower_http=info".into()))
        .with((!production).then(|| fmt::layer()))
        .with(production.then(|| fmt::layer().json()))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        .init();

    Ok(())
}

async fn open_database(config: &Config) -> Result<sqlx::SqlitePool> {
    tracing::info!("Database: {}", config.database_url);
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool).await.context("Failed to run migrations")?;
    Ok(pool)
}

async fn serve(config: Config, with_monitor: bool) -> Result<()> {
    tracing::info!("Iris Classification API starting...");

    let pool = open_database(&config).await?;

    let predictor = match Predictor::load(&config.model_path, &config.scaler_path) {
        Ok(predictor) => Some(Arc::new(predictor)),
        Err(e) => {
            tracing::error!("Error loading model: {}", e);
            tracing::warn!("Starting API without loaded model");
            None
        }
    };

    let metrics = Arc::new(ApiMetrics::new().context("Failed to register metrics")?);

    if with_monitor {
        background::spawn(pool.clone(), metrics.clone(), (&config).into());
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;

    // Build application state
    let state = AppState {
        pool,
        config,
        predictor,
        metrics,
        performance: Arc::new(PerformanceMonitor::new()),
    };

    let app = create_router(state);

    tracing::info!("🚀 Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
