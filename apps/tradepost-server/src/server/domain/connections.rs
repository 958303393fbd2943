use std::collections::HashMap;

use tradepost_core::{
    CompanyId, ConnectionDecision, ConnectionId, ConnectionNote, ConnectionStatus, UserId,
};

use super::companies::{require_active_company, require_company};
use crate::server::{
    auth::now_unix_ms,
    core::{AppState, CompanyRecord, ConnectionRecord},
    errors::ApiFailure,
    gateway_events::{
        try_connection_request, try_connection_update, CONNECTION_REQUEST_EVENT,
        CONNECTION_UPDATE_EVENT,
    },
    persistence::{ConnectionFilter, RespondOutcome},
    realtime::push_user_event,
    types::{
        CompanyDetail, CompanySummary, ConnectionDetailResponse, ConnectionPeerResponse,
        ConnectionResponse, ConnectionView,
    },
};

pub(crate) async fn create_connection_request(
    state: &AppState,
    requester_user_id: UserId,
    receiver_company_id: &str,
    note: Option<String>,
) -> Result<ConnectionResponse, ApiFailure> {
    let requester = require_active_company(state, requester_user_id).await?;
    let receiver_company_id =
        CompanyId::try_from(receiver_company_id.to_owned()).map_err(|_| ApiFailure::NotFound)?;
    let receiver = state
        .gateway
        .find_company(receiver_company_id)
        .await?
        .filter(CompanyRecord::is_visible)
        .ok_or(ApiFailure::NotFound)?;
    if requester.id == receiver.id {
        return Err(ApiFailure::SelfConnection);
    }
    let note = note
        .filter(|value| !value.trim().is_empty())
        .map(ConnectionNote::try_from)
        .transpose()
        .map_err(|_| ApiFailure::InvalidContent { field: "message" })?;

    let record = ConnectionRecord {
        id: ConnectionId::new(),
        requester_id: requester.id,
        receiver_id: receiver.id,
        status: ConnectionStatus::Pending,
        message: note.map(ConnectionNote::into_inner),
        created_at_unix_ms: now_unix_ms(),
        responded_at_unix_ms: None,
    };
    if !state.gateway.insert_connection(&record).await? {
        return Err(ApiFailure::DuplicateConnection);
    }
    tracing::info!(
        event = "connection.request.created",
        connection_id = %record.id,
        requester_company_id = %requester.id,
        receiver_company_id = %receiver.id,
    );

    let response = ConnectionResponse {
        connection: ConnectionView::from(&record),
        requester: CompanySummary::from(&requester),
        receiver: CompanySummary::from(&receiver),
    };
    push_user_event(
        state,
        receiver.owner_user_id,
        try_connection_request(&response),
        CONNECTION_REQUEST_EVENT,
    )
    .await;
    Ok(response)
}

pub(crate) async fn list_received(
    state: &AppState,
    user_id: UserId,
    status: Option<&str>,
) -> Result<Vec<ConnectionPeerResponse>, ApiFailure> {
    let company = require_company(state, user_id).await?;
    let status = match status {
        Some(value) => ConnectionStatus::try_from(value)
            .map_err(|_| ApiFailure::InvalidContent { field: "status" })?,
        None => ConnectionStatus::Pending,
    };
    list_for_company(state, &company, &ConnectionFilter::received(company.id, status)).await
}

pub(crate) async fn list_sent(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<ConnectionPeerResponse>, ApiFailure> {
    let company = require_company(state, user_id).await?;
    list_for_company(state, &company, &ConnectionFilter::sent(company.id)).await
}

pub(crate) async fn list_accepted(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<ConnectionPeerResponse>, ApiFailure> {
    let company = require_company(state, user_id).await?;
    list_for_company(state, &company, &ConnectionFilter::accepted(company.id)).await
}

async fn list_for_company(
    state: &AppState,
    company: &CompanyRecord,
    filter: &ConnectionFilter,
) -> Result<Vec<ConnectionPeerResponse>, ApiFailure> {
    let records = state.gateway.list_connections(filter).await?;
    let mut peer_ids: Vec<CompanyId> = records
        .iter()
        .map(|record| counterparty(record, company.id))
        .collect();
    peer_ids.sort_unstable();
    peer_ids.dedup();
    let peers = state.gateway.find_companies(&peer_ids).await?;

    records
        .iter()
        .map(|record| {
            let peer = peers
                .get(&counterparty(record, company.id))
                .ok_or(ApiFailure::Internal)?;
            Ok(ConnectionPeerResponse {
                connection: ConnectionView::from(record),
                company: CompanySummary::from(peer),
            })
        })
        .collect()
}

fn counterparty(record: &ConnectionRecord, own_company_id: CompanyId) -> CompanyId {
    if record.requester_id == own_company_id {
        record.receiver_id
    } else {
        record.requester_id
    }
}

pub(crate) async fn respond_to_connection(
    state: &AppState,
    connection_id: &str,
    responder_user_id: UserId,
    decision: ConnectionDecision,
) -> Result<ConnectionDetailResponse, ApiFailure> {
    let connection_id =
        ConnectionId::try_from(connection_id.to_owned()).map_err(|_| ApiFailure::NotFound)?;
    let connection = state
        .gateway
        .find_connection(connection_id)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    let responder = state
        .gateway
        .find_company_by_owner(responder_user_id)
        .await?
        .filter(CompanyRecord::is_visible);
    if responder.map(|company| company.id) != Some(connection.receiver_id) {
        return Err(ApiFailure::Forbidden);
    }
    if connection.status.is_terminal() {
        return Err(ApiFailure::AlreadyResponded);
    }

    let next = decision.target_status();
    let updated = match state
        .gateway
        .respond_to_connection(connection_id, next, now_unix_ms())
        .await?
    {
        RespondOutcome::Updated(record) => record,
        RespondOutcome::NotPending(current) => {
            tracing::debug!(
                event = "connection.request.respond_raced",
                connection_id = %connection_id,
                status = current.as_str(),
            );
            return Err(ApiFailure::AlreadyResponded);
        }
        RespondOutcome::Missing => return Err(ApiFailure::NotFound),
    };
    tracing::info!(
        event = "connection.request.responded",
        connection_id = %updated.id,
        status = updated.status.as_str(),
        responder_user_id = %responder_user_id,
    );

    let companies: HashMap<CompanyId, CompanyRecord> = state
        .gateway
        .find_companies(&[updated.requester_id, updated.receiver_id])
        .await?;
    let requester = companies
        .get(&updated.requester_id)
        .ok_or(ApiFailure::Internal)?;
    let receiver = companies
        .get(&updated.receiver_id)
        .ok_or(ApiFailure::Internal)?;
    let response = ConnectionDetailResponse {
        connection: ConnectionView::from(&updated),
        requester: CompanyDetail::from(requester),
        receiver: CompanyDetail::from(receiver),
    };
    push_user_event(
        state,
        requester.owner_user_id,
        try_connection_update(&response),
        CONNECTION_UPDATE_EVENT,
    )
    .await;
    Ok(response)
}
