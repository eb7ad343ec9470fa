//! distcache - an HTTP key/value cache with per-item TTL

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use distcache::api::{create_router, AppState};
use distcache::cache::{Cache, MemoryCache, RedisCache};
use distcache::config::{BackendKind, Config, LogFormat, LogOutput, LoggerConfig};
use distcache::tasks::spawn_cleanup_task;

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Load configuration (defaults, `config.yaml`, `DC_*` variables)
/// 2. Initialize tracing subscriber for logging
/// 3. Connect to the backing store
/// 4. Start background TTL cleanup task (in-memory backend only)
/// 5. Create Axum router with all endpoints
/// 6. Serve until SIGINT/SIGTERM, drain for at most `idle_timeout`, then
///    close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.logger)?;

    info!("Starting distcache server");
    info!(
        backend = ?config.cache.backend,
        addresses = ?config.cache.addresses,
        pool_size = config.cache.pool_size,
        request_timeout = ?config.server.request_timeout,
        read_timeout = ?config.server.read_timeout,
        write_timeout = ?config.server.write_timeout,
        "Configuration loaded"
    );

    let (cache, cleanup_handle) = build_cache(&config).await?;
    info!("Cache backend initialized");

    let state = AppState::new(cache.clone())
        .with_request_timeout(config.server.request_timeout)
        .with_server_timeouts(config.server.read_timeout, config.server.write_timeout);
    let app = create_router(state);

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let shutdown = CancellationToken::new();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle, shutdown.clone()))
        .into_future();

    tokio::select! {
        result = server => result.context("server error")?,
        _ = drain_deadline(&shutdown, config.server.idle_timeout) => {
            warn!(
                idle_timeout = ?config.server.idle_timeout,
                "connections still open after drain limit, closing them"
            );
        }
    }

    if let Err(err) = cache.close().await {
        error!(error = %err, "failed to close cache");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
///
/// The returned guard flushes buffered lines on drop and must live until exit.
fn init_tracing(logger: &LoggerConfig) -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logger.level)));

    let (writer, guard, ansi) = match &logger.output {
        LogOutput::Stdout => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            (writer, guard, true)
        }
        LogOutput::Stderr => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (writer, guard, true)
        }
        LogOutput::File(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("log output {} has no file name", path.display()))?;
            let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (writer, guard, false)
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logger.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init(),
    }
    Ok(guard)
}

/// Connects the configured backend. The in-memory backend also gets a
/// cleanup task, whose handle is returned for shutdown.
async fn build_cache(config: &Config) -> anyhow::Result<(Arc<dyn Cache>, Option<JoinHandle<()>>)> {
    match config.cache.backend {
        BackendKind::Redis => {
            let cache = RedisCache::connect(&config.cache)
                .await
                .context("failed to connect to redis")?;
            Ok((Arc::new(cache), None))
        }
        BackendKind::Memory => {
            let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
            let handle = spawn_cleanup_task(cache.clone(), config.cache.cleanup_interval);
            info!("Background cleanup task started");
            Ok((cache, Some(handle)))
        }
    }
}

/// Resolves `limit` after shutdown has been requested.
async fn drain_deadline(shutdown: &CancellationToken, limit: Duration) {
    shutdown.cancelled().await;
    tokio::time::sleep(limit).await;
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task, starts the drain clock and
/// allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>, shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
    shutdown.cancel();
}
