use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aforo::api::{self, AppState};
use aforo::auth::TokenMap;
use aforo::compactor::run_compactor;
use aforo::engine::Engine;
use aforo::notify::NotifyHub;
use aforo::observability;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let metrics_port: Option<u16> = env_parse("AFORO_METRICS_PORT");
    observability::init(metrics_port);

    let bind = env_or("AFORO_BIND", "0.0.0.0");
    let port = env_or("AFORO_PORT", "8080");
    let data_dir = PathBuf::from(env_or("AFORO_DATA_DIR", "./data"));
    let admin_token = std::env::var("AFORO_ADMIN_TOKEN").ok();
    let staff_token = std::env::var("AFORO_STAFF_TOKEN").ok();
    let compact_threshold: u64 = env_parse("AFORO_COMPACT_THRESHOLD").unwrap_or(1_000);

    if admin_token.is_none() {
        warn!("AFORO_ADMIN_TOKEN is not set; admin endpoints will reject every request");
    }

    std::fs::create_dir_all(&data_dir)?;
    let wal_path = data_dir.join("capacity.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(wal_path.clone(), notify)?);

    tokio::spawn(run_compactor(engine.clone(), compact_threshold));

    let state = AppState {
        engine,
        tokens: Arc::new(TokenMap::new(admin_token, staff_token)),
    };
    let app = api::router(state);

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("aforo listening on {addr}");
    info!("wal: {}", wal_path.display());
    match metrics_port {
        Some(p) => info!("metrics on http://{bind}:{p}/metrics"),
        None => info!("metrics disabled (set AFORO_METRICS_PORT to enable)"),
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("aforo stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install ctrl-c handler: {e}");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
