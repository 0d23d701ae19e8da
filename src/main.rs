use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vibeon::{build_router, services::usage, AppState, Config};

/// PIN attempt records older than this are purged.
const PIN_ATTEMPT_RETENTION_DAYS: i64 = 30;

async fn run_maintenance(state: &AppState) -> vibeon::Result<()> {
    let today = usage::today(&state.config);
    let rolled = state.children.rollover_all(today).await?;
    let cutoff = Utc::now() - chrono::Duration::days(PIN_ATTEMPT_RETENTION_DAYS);
    let purged = state.pin_attempts.purge_attempts_before(cutoff).await?;
    tracing::info!(rolled, purged, "Maintenance job completed");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let state = AppState::new(&config).await?;
    tracing::info!("AppState initialized");

    let maintenance_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = run_maintenance(&maintenance_state).await {
                tracing::error!("Maintenance job failed: {}", e);
            }
        }
    });

    let app = build_router(state);

    let addr = config.bind_addr;
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
