use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use depot::core::auth::BasicAuth;
use depot::core::config::AppConfig;
use depot::core::shutdown::{ShutdownCoordinator, HTTP_DRAIN_TIMEOUT_SECS};
use depot::delivery::router::{build_router, AppState};
use depot::observability::metrics as obs_metrics;

#[tokio::main]
async fn main() -> ExitCode {
    // Install the Prometheus recorder before anything records.
    let metrics_handle = obs_metrics::install_recorder();

    // Panic hook: count and log with a backtrace.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        obs_metrics::inc_panic_total();
        let backtrace = std::backtrace::Backtrace::force_capture();
        eprintln!("PANIC: {info}\nBacktrace:\n{backtrace}");
        default_hook(info);
    }));

    // Load configuration (layered: default.toml → {env}.toml → env vars).
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!(version = env!("CARGO_PKG_VERSION"), "depot starting");
    obs_metrics::describe_all_metrics();

    // Construct the backend pair once; handlers only see the traits.
    // Misconfiguration (missing bucket, credentials, tokens) fails here
    // with the offending field named, not on the first request.
    let store = match depot::storage::from_config(&config.storage).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, backend = %config.storage.backend, "object store init failed");
            return ExitCode::FAILURE;
        }
    };

    let links = match depot::links::from_config(&config.links).await {
        Ok(links) => links,
        Err(e) => {
            error!(error = %e, backend = %config.links.backend, "link store init failed");
            return ExitCode::FAILURE;
        }
    };

    let auth = Arc::new(BasicAuth::new(&config.auth));

    info!(
        storage_backend = %config.storage.backend,
        links_backend = %config.links.backend,
        auth_locked = auth.is_locked(),
        "backends initialized"
    );

    let shutdown = ShutdownCoordinator::new();
    let start_time = Instant::now();

    let state = AppState {
        store,
        links,
        auth,
        config: config.clone(),
        start_time,
        metrics_handle,
    };
    let app = build_router(state);

    // Uptime gauge refresh task.
    let uptime_cancel = shutdown.token();
    tokio::spawn(async move {
        obs_metrics::run_uptime_task(start_time, uptime_cancel).await;
    });

    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "invalid HTTP bind address");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind HTTP listener");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "HTTP server listening");

    let server_token = shutdown.token();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_token.cancelled().await;
            })
            .await
    });

    shutdown.wait_for_signal_and_shutdown().await;

    info!("draining in-flight requests");
    match tokio::time::timeout(
        std::time::Duration::from_secs(HTTP_DRAIN_TIMEOUT_SECS),
        server,
    )
    .await
    {
        Ok(Ok(Ok(()))) => {
            info!("graceful shutdown completed");
            ExitCode::SUCCESS
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "HTTP server error during shutdown");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            error!(error = %e, "HTTP server task panicked");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("shutdown timed out after {HTTP_DRAIN_TIMEOUT_SECS}s, forcing exit");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
