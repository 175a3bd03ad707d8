use parking_lot::Mutex;
use results_cache::{BlobStoreResultsCache, ResultsCache, SweepReport};
use shared::Config;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use storage_engine::SledBlobStore;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type SledResultsCache = BlobStoreResultsCache<SledBlobStore>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting results cache sweeper");

    // Load environment variables
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    let db_path = Path::new(&config.data_dir).join("results.sled");
    info!("Opening results store at {}", db_path.display());
    let store = SledBlobStore::open(&db_path)?;
    let cache = Arc::new(Mutex::new(BlobStoreResultsCache::from_config(
        store, &config,
    )));

    info!(
        "Sweeping every {:?}, expiring results {:?} past their time to live",
        config.sweep_interval, config.ttl_grace
    );

    let mut interval = tokio::time::interval(config.sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sweep(cache.clone(), config.ttl_grace).await {
                    Ok(report) => info!(
                        examined = report.examined,
                        deleted = report.deleted,
                        skipped = report.skipped,
                        "Sweep complete"
                    ),
                    Err(e) => error!("Sweep failed: {}", e),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("Results cache sweeper shutting down");
    cache.lock().close()?;
    Ok(())
}

/// Run one sweep off the async runtime; the store calls block
async fn sweep(
    cache: Arc<Mutex<SledResultsCache>>,
    grace: Duration,
) -> Result<SweepReport, Box<dyn std::error::Error + Send + Sync>> {
    let report =
        tokio::task::spawn_blocking(move || cache.lock().process_time_to_live(grace)).await??;
    Ok(report)
}

// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
