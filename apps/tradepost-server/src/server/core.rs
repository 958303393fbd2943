use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pasetors::{
    keys::{Generate, SymmetricKey},
    version4::V4,
};
use tokio::task::JoinHandle;
use tradepost_core::{CompanyId, ConnectionId, ConnectionStatus, MessageId, Role, UserId};

use super::{
    auth::issue_access_token, persistence::Gateway, realtime::spawn_liveness_sweep,
    realtime::SocketRegistry, router::validate_config,
};

pub const DEFAULT_JSON_BODY_LIMIT_BYTES: usize = 1_048_576;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE: u32 = 60;
pub const ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_GATEWAY_OUTBOUND_QUEUE: usize = 256;
pub const DEFAULT_MAX_GATEWAY_EVENT_BYTES: usize = tradepost_protocol::MAX_EVENT_BYTES;
pub const DEFAULT_LIVENESS_INTERVAL_SECS: u64 = 30;
pub(crate) const MAX_LOGO_URL_CHARS: usize = 512;
pub(crate) const METRICS_TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub rate_limit_requests_per_minute: u32,
    pub gateway_outbound_queue: usize,
    pub max_gateway_event_bytes: usize,
    pub liveness_interval: Duration,
    /// Base64 encoded 32 byte key. A random key is generated when absent,
    /// which invalidates every token on restart.
    pub token_key: Option<String>,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_JSON_BODY_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit_requests_per_minute: DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
            gateway_outbound_queue: DEFAULT_GATEWAY_OUTBOUND_QUEUE,
            max_gateway_event_bytes: DEFAULT_MAX_GATEWAY_EVENT_BYTES,
            liveness_interval: Duration::from_secs(DEFAULT_LIVENESS_INTERVAL_SECS),
            token_key: None,
            database_url: None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct RuntimeConfig {
    pub(crate) liveness_interval: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub(crate) gateway: Arc<Gateway>,
    pub(crate) registry: Arc<SocketRegistry>,
    pub(crate) token_key: Arc<SymmetricKey<V4>>,
    pub(crate) runtime: Arc<RuntimeConfig>,
}

impl AppState {
    /// Builds shared state: persistence gateway, socket registry and token key.
    ///
    /// # Errors
    /// Returns an error when a configured limit is out of range, the token key is
    /// malformed, or the postgres pool cannot be configured.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        validate_config(config)?;
        let token_key = match &config.token_key {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| anyhow!("token key is not valid base64: {e}"))?;
                SymmetricKey::<V4>::from(&bytes)
                    .map_err(|e| anyhow!("token key init failed: {e}"))?
            }
            None => SymmetricKey::<V4>::generate()
                .map_err(|e| anyhow!("token key generation failed: {e}"))?,
        };
        let gateway = Gateway::new(config.database_url.as_deref())?;

        Ok(Self {
            gateway: Arc::new(gateway),
            registry: Arc::new(SocketRegistry::new(
                config.gateway_outbound_queue,
                config.max_gateway_event_bytes,
            )),
            token_key: Arc::new(token_key),
            runtime: Arc::new(RuntimeConfig {
                liveness_interval: config.liveness_interval,
            }),
        })
    }

    /// Mints a bearer token for an externally authenticated user.
    ///
    /// # Errors
    /// Returns an error when token encryption fails.
    pub fn issue_access_token(&self, user_id: &str, role: &str) -> anyhow::Result<String> {
        let user_id = UserId::try_from(user_id.to_owned())
            .map_err(|e| anyhow!("invalid user id: {e}"))?;
        let role = Role::try_from(role).map_err(|e| anyhow!("invalid role: {e}"))?;
        issue_access_token(&self.token_key, user_id, role)
    }

    /// Starts the periodic ping/pong sweep over every registered socket.
    #[must_use]
    pub fn spawn_liveness_sweep(&self) -> JoinHandle<()> {
        spawn_liveness_sweep(Arc::clone(&self.registry), self.runtime.liveness_interval)
    }

    /// Whether persistence runs against postgres rather than in-memory tables.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.gateway.is_persistent()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthContext {
    pub(crate) user_id: UserId,
    pub(crate) role: Role,
}

#[derive(Debug, Clone)]
pub(crate) struct CompanyRecord {
    pub(crate) id: CompanyId,
    pub(crate) owner_user_id: UserId,
    pub(crate) name: String,
    pub(crate) slug: String,
    pub(crate) logo: Option<String>,
    pub(crate) industry_type: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) is_banned: bool,
    pub(crate) connection_count: i64,
    pub(crate) created_at_unix_ms: i64,
}

impl CompanyRecord {
    /// Banned or deactivated companies are invisible as counterparties.
    pub(crate) fn is_visible(&self) -> bool {
        self.is_active && !self.is_banned
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConnectionRecord {
    pub(crate) id: ConnectionId,
    pub(crate) requester_id: CompanyId,
    pub(crate) receiver_id: CompanyId,
    pub(crate) status: ConnectionStatus,
    pub(crate) message: Option<String>,
    pub(crate) created_at_unix_ms: i64,
    pub(crate) responded_at_unix_ms: Option<i64>,
}

impl ConnectionRecord {
    pub(crate) fn involves_pair(&self, a: CompanyId, b: CompanyId) -> bool {
        (self.requester_id == a && self.receiver_id == b)
            || (self.requester_id == b && self.receiver_id == a)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MessageRecord {
    pub(crate) id: MessageId,
    pub(crate) sender_id: UserId,
    pub(crate) sender_company_id: CompanyId,
    pub(crate) receiver_id: UserId,
    pub(crate) receiver_company_id: CompanyId,
    pub(crate) subject: Option<String>,
    pub(crate) content: String,
    pub(crate) is_read: bool,
    pub(crate) read_at_unix_ms: Option<i64>,
    pub(crate) created_at_unix_ms: i64,
}

impl MessageRecord {
    /// The participant on the other side of the message from `viewer`.
    pub(crate) fn counterpart_of(&self, viewer: UserId) -> (UserId, CompanyId) {
        if self.sender_id == viewer {
            (self.receiver_id, self.receiver_company_id)
        } else {
            (self.sender_id, self.sender_company_id)
        }
    }
}
