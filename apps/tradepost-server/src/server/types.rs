use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tradepost_core::{CompanyId, ConnectionId, ConnectionStatus, MessageId, UserId};

use super::{
    core::{CompanyRecord, ConnectionRecord, METRICS_TEXT_CONTENT_TYPE},
    metrics::render_metrics,
};

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn metrics() -> Response {
    (
        [(CONTENT_TYPE, METRICS_TEXT_CONTENT_TYPE)],
        render_metrics(),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: &'static str,
    pub(crate) message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) field: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdPath {
    pub(crate) id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatewayAuthQuery {
    pub(crate) token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReceivedConnectionsQuery {
    pub(crate) status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct CreateCompanyRequest {
    pub(crate) name: String,
    pub(crate) industry_type: Option<String>,
    pub(crate) logo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct CreateConnectionRequest {
    pub(crate) receiver_id: String,
    pub(crate) message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct SendMessageRequest {
    pub(crate) receiver_id: String,
    pub(crate) subject: Option<String>,
    pub(crate) content: Option<String>,
}

/// Display projection of a company attached to connections and messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompanySummary {
    pub(crate) id: CompanyId,
    pub(crate) name: String,
    pub(crate) logo: Option<String>,
    pub(crate) industry_type: Option<String>,
}

impl From<&CompanyRecord> for CompanySummary {
    fn from(record: &CompanyRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            logo: record.logo.clone(),
            industry_type: record.industry_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompanyDetail {
    pub(crate) id: CompanyId,
    pub(crate) owner_user_id: UserId,
    pub(crate) name: String,
    pub(crate) slug: String,
    pub(crate) logo: Option<String>,
    pub(crate) industry_type: Option<String>,
    pub(crate) connection_count: i64,
    pub(crate) is_active: bool,
    pub(crate) is_banned: bool,
    pub(crate) created_at: i64,
}

impl From<&CompanyRecord> for CompanyDetail {
    fn from(record: &CompanyRecord) -> Self {
        Self {
            id: record.id,
            owner_user_id: record.owner_user_id,
            name: record.name.clone(),
            slug: record.slug.clone(),
            logo: record.logo.clone(),
            industry_type: record.industry_type.clone(),
            connection_count: record.connection_count,
            is_active: record.is_active,
            is_banned: record.is_banned,
            created_at: record.created_at_unix_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConnectionView {
    pub(crate) id: ConnectionId,
    pub(crate) requester_id: CompanyId,
    pub(crate) receiver_id: CompanyId,
    pub(crate) status: ConnectionStatus,
    pub(crate) message: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) responded_at: Option<i64>,
}

impl From<&ConnectionRecord> for ConnectionView {
    fn from(record: &ConnectionRecord) -> Self {
        Self {
            id: record.id,
            requester_id: record.requester_id,
            receiver_id: record.receiver_id,
            status: record.status,
            message: record.message.clone(),
            created_at: record.created_at_unix_ms,
            responded_at: record.responded_at_unix_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ConnectionResponse {
    #[serde(flatten)]
    pub(crate) connection: ConnectionView,
    pub(crate) requester: CompanySummary,
    pub(crate) receiver: CompanySummary,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ConnectionDetailResponse {
    #[serde(flatten)]
    pub(crate) connection: ConnectionView,
    pub(crate) requester: CompanyDetail,
    pub(crate) receiver: CompanyDetail,
}

/// A connection seen from one side, with the other party attached.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ConnectionPeerResponse {
    #[serde(flatten)]
    pub(crate) connection: ConnectionView,
    pub(crate) company: CompanySummary,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConnectionListResponse {
    pub(crate) connections: Vec<ConnectionPeerResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageResponse {
    pub(crate) id: MessageId,
    pub(crate) sender_id: UserId,
    pub(crate) sender_company_id: CompanyId,
    pub(crate) sender_company: CompanySummary,
    pub(crate) receiver_id: UserId,
    pub(crate) receiver_company_id: CompanyId,
    pub(crate) receiver_company: CompanySummary,
    pub(crate) subject: Option<String>,
    pub(crate) content: String,
    pub(crate) is_read: bool,
    pub(crate) read_at: Option<i64>,
    pub(crate) created_at: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageListResponse {
    pub(crate) messages: Vec<MessageResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationPeer {
    pub(crate) id: UserId,
    pub(crate) company_id: CompanyId,
    pub(crate) name: String,
    pub(crate) logo: Option<String>,
    pub(crate) slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LastMessage {
    pub(crate) content: String,
    pub(crate) created_at: i64,
    pub(crate) is_read: bool,
    pub(crate) sender_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationResponse {
    pub(crate) other_user: ConversationPeer,
    pub(crate) last_message: LastMessage,
    pub(crate) unread_count: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConversationListResponse {
    pub(crate) conversations: Vec<ConversationResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnreadCountResponse {
    pub(crate) count: i64,
}
