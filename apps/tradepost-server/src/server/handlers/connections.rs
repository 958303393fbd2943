use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use tradepost_core::ConnectionDecision;

use super::{json_body, query_params};
use crate::server::{
    auth::authenticate,
    core::AppState,
    domain::{
        create_connection_request, list_accepted, list_received, list_sent,
        respond_to_connection,
    },
    errors::ApiFailure,
    types::{
        ConnectionDetailResponse, ConnectionListResponse, ConnectionResponse,
        CreateConnectionRequest, IdPath, ReceivedConnectionsQuery,
    },
};

pub(crate) async fn create_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateConnectionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ConnectionResponse>), ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let request = json_body(payload)?;
    let connection =
        create_connection_request(&state, auth.user_id, &request.receiver_id, request.message)
            .await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

pub(crate) async fn received_connections(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<ReceivedConnectionsQuery>, QueryRejection>,
) -> Result<Json<ConnectionListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let query = query_params(query)?;
    let connections = list_received(&state, auth.user_id, query.status.as_deref()).await?;
    Ok(Json(ConnectionListResponse { connections }))
}

pub(crate) async fn sent_connections(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConnectionListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let connections = list_sent(&state, auth.user_id).await?;
    Ok(Json(ConnectionListResponse { connections }))
}

pub(crate) async fn accepted_connections(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConnectionListResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let connections = list_accepted(&state, auth.user_id).await?;
    Ok(Json(ConnectionListResponse { connections }))
}

pub(crate) async fn accept_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IdPath>,
) -> Result<Json<ConnectionDetailResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let connection =
        respond_to_connection(&state, &path.id, auth.user_id, ConnectionDecision::Accept).await?;
    Ok(Json(connection))
}

pub(crate) async fn reject_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IdPath>,
) -> Result<Json<ConnectionDetailResponse>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let connection =
        respond_to_connection(&state, &path.id, auth.user_id, ConnectionDecision::Reject).await?;
    Ok(Json(connection))
}
