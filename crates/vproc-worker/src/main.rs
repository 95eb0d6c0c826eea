//! Video analysis worker binary.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vproc_analysis::{AnalysisClient, AnalysisClientConfig, GeminiClient};
use vproc_queue::SqsQueue;
use vproc_status::{InMemoryStatusStore, StatusStore, SupabaseStatusStore};
use vproc_storage::S3Client;
use vproc_worker::{JobExecutor, VideoProcessor, WorkerConfig, WorkerResult};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vproc-worker");

    if let Some(port) = std::env::var("METRICS_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            Ok(()) => info!("Prometheus metrics on port {}", port),
            Err(e) => warn!("Failed to start metrics exporter: {}", e),
        }
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let executor = match build_executor(config).await {
        Ok(executor) => executor,
        Err(e) => {
            error!("Failed to create job executor: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received, finishing current message");
        let _ = shutdown_tx.send(true);
    });

    let stats = executor.run(shutdown_rx).await;

    info!(
        received = stats.received,
        processed = stats.processed,
        errors = stats.errors,
        "Worker shutdown complete"
    );
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vproc=info,info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Wire the queue, object store, analysis client and status store from the environment.
async fn build_executor(config: WorkerConfig) -> WorkerResult<JobExecutor> {
    let queue = SqsQueue::from_env().await?;
    let storage = S3Client::from_env().await?;
    let default_bucket = storage.default_bucket().to_string();

    let analyzer = AnalysisClient::new(GeminiClient::from_env()?, AnalysisClientConfig::from_env());

    let status: Arc<dyn StatusStore> = match std::env::var("STATUS_STORE").as_deref() {
        Ok("memory") => {
            warn!("Using in-memory status store; results are not persisted");
            Arc::new(InMemoryStatusStore::new())
        }
        _ => Arc::new(SupabaseStatusStore::from_env()?),
    };

    tokio::fs::create_dir_all(&config.work_dir).await?;

    let processor = VideoProcessor::new(
        Arc::new(storage),
        Arc::new(analyzer),
        status,
        default_bucket,
        &config,
    );

    Ok(JobExecutor::new(config, Arc::new(queue), Arc::new(processor)))
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
