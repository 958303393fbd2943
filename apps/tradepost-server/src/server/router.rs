use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, StatusCode},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{
    core::{AppConfig, AppState},
    handlers::{
        companies::{ban_company, create_my_company, get_my_company, unban_company},
        connections::{
            accept_connection, accepted_connections, create_connection, received_connections,
            reject_connection, sent_connections,
        },
        messages::{conversations, create_message, inbox, mark_read, sent, thread, unread_count},
    },
    realtime::gateway_ws,
    types::{health, metrics},
};

pub(crate) fn validate_config(config: &AppConfig) -> anyhow::Result<()> {
    if config.max_body_bytes == 0 {
        return Err(anyhow!("max body bytes must be at least 1 byte"));
    }
    if config.rate_limit_requests_per_minute == 0 {
        return Err(anyhow!(
            "rate limit must be at least 1 request per minute"
        ));
    }
    if config.gateway_outbound_queue == 0 {
        return Err(anyhow!(
            "gateway outbound queue must hold at least 1 frame"
        ));
    }
    if config.max_gateway_event_bytes == 0
        || config.max_gateway_event_bytes > tradepost_protocol::MAX_EVENT_BYTES
    {
        return Err(anyhow!(
            "gateway event limit must be between 1 and the protocol max of {} bytes",
            tradepost_protocol::MAX_EVENT_BYTES
        ));
    }
    if config.liveness_interval.is_zero() {
        return Err(anyhow!("liveness interval must be non-zero"));
    }
    if config.request_timeout.is_zero() {
        return Err(anyhow!("request timeout must be non-zero"));
    }
    Ok(())
}

/// Build the axum router with fresh state and global security middleware.
///
/// # Errors
/// Returns an error if configured limits are invalid or state cannot be built.
pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    validate_config(config)?;
    let app_state = AppState::new(config)?;
    build_router_with_state(config, app_state)
}

/// Build the router around caller-owned state, so the bootstrap can share the
/// socket registry with the liveness sweep.
///
/// # Errors
/// Returns an error if configured limits are invalid.
pub fn build_router_with_state(config: &AppConfig, app_state: AppState) -> anyhow::Result<Router> {
    validate_config(config)?;

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(60) / config.rate_limit_requests_per_minute)
            .burst_size(config.rate_limit_requests_per_minute)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("invalid governor configuration"))?,
    );
    let request_id_header = HeaderName::from_static("x-request-id");
    let governor_layer = GovernorLayer::new(governor_config);

    let api = Router::new()
        .route("/companies", post(create_my_company))
        .route("/companies/me", get(get_my_company))
        .route("/admin/companies/{id}/ban", put(ban_company))
        .route("/admin/companies/{id}/unban", put(unban_company))
        .route("/connections", post(create_connection))
        .route("/connections/received", get(received_connections))
        .route("/connections/sent", get(sent_connections))
        .route("/connections/accepted", get(accepted_connections))
        .route("/connections/{id}/accept", put(accept_connection))
        .route("/connections/{id}/reject", put(reject_connection))
        .route("/messages", post(create_message))
        .route("/messages/inbox", get(inbox))
        .route("/messages/sent", get(sent))
        .route("/messages/conversations", get(conversations))
        .route("/messages/unread-count", get(unread_count))
        .route("/messages/{id}", get(thread))
        .route("/messages/{id}/read", put(mark_read));

    let routes = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(gateway_ws))
        .nest("/api", api);

    Ok(routes
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
                .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(governor_layer),
        ))
}
