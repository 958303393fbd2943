pub(crate) mod auth;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod domain;
pub(crate) mod errors;
pub(crate) mod gateway_events;
pub(crate) mod handlers;
pub(crate) mod metrics;
pub(crate) mod persistence;
pub(crate) mod realtime;
pub(crate) mod router;
#[cfg(test)]
mod tests;
pub(crate) mod types;

pub use core::{
    AppConfig, AppState, DEFAULT_GATEWAY_OUTBOUND_QUEUE, DEFAULT_LIVENESS_INTERVAL_SECS,
    DEFAULT_MAX_GATEWAY_EVENT_BYTES,
};
pub use errors::init_tracing;
pub use router::{build_router, build_router_with_state};
