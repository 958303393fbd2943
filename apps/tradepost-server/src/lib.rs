#![forbid(unsafe_code)]

mod server;

pub use server::{
    build_router, build_router_with_state, init_tracing, AppConfig, AppState,
    DEFAULT_GATEWAY_OUTBOUND_QUEUE, DEFAULT_LIVENESS_INTERVAL_SECS,
    DEFAULT_MAX_GATEWAY_EVENT_BYTES,
};
