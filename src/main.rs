use std::sync::Arc;

use autotask::actions::ActionRegistry;
use autotask::actions::builtin::{BatchAction, SleepAction};
use autotask::api::{AppState, task_routes};
use autotask::config::SchedulerConfig;
use autotask::scheduler::Scheduler;
use autotask::store::{HistoryStore, LibSqlBackend};

#[tokio::main]
async fn main() -> autotask::error::Result<()> {
    // Keep the guard alive for the process lifetime so buffered file logs flush.
    let _log_guard = init_tracing();

    let port: u16 = std::env::var("AUTOTASK_PORT")
        .unwrap_or_else(|_| "8787".to_string())
        .parse()
        .unwrap_or(8787);

    let config = SchedulerConfig::from_env()?;

    eprintln!("⚙️  Autotask v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Task API: http://0.0.0.0:{}/api/tasks", port);
    eprintln!("   Event WS: ws://0.0.0.0:{}/ws/tasks", port);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path =
        std::env::var("AUTOTASK_DB_PATH").unwrap_or_else(|_| "./data/autotask.db".to_string());

    let db_path_ref = std::path::Path::new(&db_path);
    let history: Arc<dyn HistoryStore> = Arc::new(LibSqlBackend::new_local(db_path_ref).await?);

    eprintln!("   Database: {}", db_path);

    // ── Scheduler ────────────────────────────────────────────────────────
    let scheduler = Scheduler::new(config, Some(Arc::clone(&history)));

    // AUTOTASK_SERVICES="tagger=2,slow=1" sets per-service concurrency limits.
    if let Ok(services) = std::env::var("AUTOTASK_SERVICES") {
        for entry in services.split(',').filter(|s| !s.trim().is_empty()) {
            let (name, limit) = match entry.split_once('=') {
                Some((name, limit)) => (name.trim(), limit.trim().parse().unwrap_or(1)),
                None => (entry.trim(), 1),
            };
            scheduler.configure_service(name, limit, None).await;
            eprintln!("   Service: {} (max {})", name, limit);
        }
    }

    scheduler.start().await;

    // ── Actions ──────────────────────────────────────────────────────────
    let registry = Arc::new(ActionRegistry::new());
    registry
        .register(SleepAction::definition("slow"), Arc::new(SleepAction))
        .await;
    registry
        .register(
            BatchAction::definition("slow"),
            Arc::new(BatchAction::sleep_batch("slow")),
        )
        .await;
    eprintln!("   Actions: {} registered\n", registry.count());

    // ── Server ───────────────────────────────────────────────────────────
    let state = AppState {
        scheduler: Arc::clone(&scheduler),
        registry,
        history: Some(history),
    };
    let app = task_routes(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "Task server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing: stderr via `RUST_LOG` (default `info`), plus a
/// daily-rotated file when `AUTOTASK_LOG_DIR` is set.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match std::env::var("AUTOTASK_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "autotask.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
