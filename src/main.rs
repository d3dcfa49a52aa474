use std::sync::Arc;
use std::time::Duration;

use linkwatch::api::{create_router, AppState};
use linkwatch::checker::{Checker, CheckerConfig};
use linkwatch::config::Settings;
use linkwatch::observability::{init_logging, init_metrics, HealthChecker, LogConfig, LogFormat};
use linkwatch::repositories::{PostgresStore, Store};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;

    init_logging(&LogConfig {
        level: settings.log_level.clone(),
        format: LogFormat::from(settings.log_format.as_str()),
        include_target: true,
    });

    let metrics_handle = init_metrics();
    info!("configuration loaded, metrics initialized");

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_concurrency as u32 + 4)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database_url)
        .await?;
    info!("database connection established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("migrations applied");

    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));

    let checker = Arc::new(Checker::new(
        Arc::clone(&store),
        CheckerConfig {
            workers: settings.max_concurrency,
            check_interval: settings.check_interval,
            http_timeout: settings.http_timeout,
        },
    )?);

    let health = Arc::new(HealthChecker::new(Arc::clone(&store), checker.state()));
    let state = AppState::new(Arc::clone(&store), health).with_metrics(metrics_handle);
    let app = create_router(state);

    let shutdown = CancellationToken::new();
    let checker_task = tokio::spawn(Arc::clone(&checker).run(shutdown.clone()));

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The server is down; give the checker the grace window to drain.
    match tokio::time::timeout(settings.shutdown_grace, checker_task).await {
        Ok(_) => info!("shutdown complete"),
        Err(_) => warn!(
            grace_secs = settings.shutdown_grace.as_secs(),
            "shutdown grace exceeded; exiting with workers still running"
        ),
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM and cancels the process-wide token.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    shutdown.cancel();
}
