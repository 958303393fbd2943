use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::json_body;
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{
        count_unread, get_thread, list_conversations, list_inbox, list_sent_messages,
        mark_message_read, send_message,
    },
    errors::ApiFailure,
    types::{
        ConversationListResponse, IdPath, MessageListResponse, MessageResponse,
        SendMessageRequest, UnreadCountResponse,
    },
};

pub(crate) async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let request = json_body(payload)?;
    let message = send_message(&state, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub(crate) async fn inbox(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let messages = list_inbox(&state, auth.user_id).await?;
    Ok(Json(MessageListResponse { messages }))
}

pub(crate) async fn sent(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let messages = list_sent_messages(&state, auth.user_id).await?;
    Ok(Json(MessageListResponse { messages }))
}

pub(crate) async fn conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConversationListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let conversations = list_conversations(&state, auth.user_id).await?;
    Ok(Json(ConversationListResponse { conversations }))
}

pub(crate) async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let count = count_unread(&state, auth.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// `id` is the peer's user id; fetching the thread marks it read.
pub(crate) async fn thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IdPath>,
) -> Result<Json<MessageListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let messages = get_thread(&state, auth.user_id, &path.id).await?;
    Ok(Json(MessageListResponse { messages }))
}

pub(crate) async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IdPath>,
) -> Result<Json<MessageResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let message = mark_message_read(&state, &path.id, auth.user_id).await?;
    Ok(Json(message))
}
