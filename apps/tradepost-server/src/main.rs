#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tradepost_server::{build_router_with_state, init_tracing, AppConfig, AppState};

fn env_or_default<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name).map_or_else(
        |_| Ok(default),
        |value| {
            value
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {name} value {value:?}: {e}"))
        },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let defaults = AppConfig::default();
    let liveness_interval_secs = env_or_default(
        "TRADEPOST_LIVENESS_INTERVAL_SECS",
        defaults.liveness_interval.as_secs(),
    )?;
    let rate_limit_requests_per_minute = env_or_default(
        "TRADEPOST_RATE_LIMIT_PER_MINUTE",
        defaults.rate_limit_requests_per_minute,
    )?;
    let app_config = AppConfig {
        liveness_interval: Duration::from_secs(liveness_interval_secs),
        rate_limit_requests_per_minute,
        token_key: std::env::var("TRADEPOST_TOKEN_KEY").ok(),
        database_url: std::env::var("TRADEPOST_DATABASE_URL").ok(),
        ..defaults
    };
    if app_config.token_key.is_none() {
        tracing::warn!(
            event = "bootstrap.token_key.ephemeral",
            "TRADEPOST_TOKEN_KEY unset; issued tokens will not survive a restart"
        );
    }

    let state = AppState::new(&app_config)?;
    if !state.is_persistent() {
        tracing::warn!(
            event = "bootstrap.persistence.memory",
            "TRADEPOST_DATABASE_URL unset; marketplace data is held in memory only"
        );
    }
    let app = build_router_with_state(&app_config, state.clone())?;
    let liveness = state.spawn_liveness_sweep();

    let addr = std::env::var("TRADEPOST_BIND_ADDR")
        .unwrap_or_else(|_| String::from("0.0.0.0:3000"))
        .parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("invalid TRADEPOST_BIND_ADDR: {e}"))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "tradepost-server listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await;
    liveness.abort();
    served?;
    Ok(())
}
