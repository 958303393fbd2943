use std::collections::HashMap;

use tradepost_core::{CompanyId, MessageContent, MessageId, MessageSubject, UserId};

use super::companies::require_active_company;
use crate::server::{
    auth::now_unix_ms,
    core::{AppState, CompanyRecord, MessageRecord},
    errors::ApiFailure,
    gateway_events::{try_new_message, NEW_MESSAGE_EVENT},
    persistence::MessageFilter,
    realtime::push_user_event,
    types::{
        CompanySummary, ConversationPeer, ConversationResponse, LastMessage, MessageResponse,
        SendMessageRequest,
    },
};

pub(crate) async fn send_message(
    state: &AppState,
    sender_id: UserId,
    request: SendMessageRequest,
) -> Result<MessageResponse, ApiFailure> {
    let sender_company = require_active_company(state, sender_id).await?;
    let receiver_id =
        UserId::try_from(request.receiver_id).map_err(|_| ApiFailure::RecipientNotFound)?;
    let receiver_company = state
        .gateway
        .find_company_by_owner(receiver_id)
        .await?
        .filter(CompanyRecord::is_visible)
        .ok_or(ApiFailure::RecipientNotFound)?;
    let content = request
        .content
        .ok_or(ApiFailure::InvalidContent { field: "content" })
        .and_then(|value| {
            MessageContent::try_from(value)
                .map_err(|_| ApiFailure::InvalidContent { field: "content" })
        })?;
    let subject = request
        .subject
        .filter(|value| !value.trim().is_empty())
        .map(MessageSubject::try_from)
        .transpose()
        .map_err(|_| ApiFailure::InvalidContent { field: "subject" })?;

    let record = MessageRecord {
        id: MessageId::new(),
        sender_id,
        sender_company_id: sender_company.id,
        receiver_id,
        receiver_company_id: receiver_company.id,
        subject: subject.map(MessageSubject::into_inner),
        content: content.into_inner(),
        is_read: false,
        read_at_unix_ms: None,
        created_at_unix_ms: now_unix_ms(),
    };
    state.gateway.insert_message(&record).await?;
    tracing::info!(
        event = "message.created",
        message_id = %record.id,
        sender_id = %sender_id,
        receiver_id = %receiver_id,
    );

    let response = message_response(&record, &sender_company, &receiver_company);
    push_user_event(
        state,
        receiver_id,
        try_new_message(&response),
        NEW_MESSAGE_EVENT,
    )
    .await;
    Ok(response)
}

/// Returns the full thread oldest-first. Reading it marks every message the
/// peer sent to the viewer as read.
pub(crate) async fn get_thread(
    state: &AppState,
    viewer_id: UserId,
    peer_id: &str,
) -> Result<Vec<MessageResponse>, ApiFailure> {
    let peer_id = UserId::try_from(peer_id.to_owned()).map_err(|_| ApiFailure::NotFound)?;
    let records = state
        .gateway
        .read_thread(viewer_id, peer_id, now_unix_ms())
        .await?;
    project_messages(state, &records).await
}

pub(crate) async fn list_conversations(
    state: &AppState,
    viewer_id: UserId,
) -> Result<Vec<ConversationResponse>, ApiFailure> {
    let records = state
        .gateway
        .list_messages(&MessageFilter::involving(viewer_id))
        .await?;
    let mut peer_company_ids: Vec<CompanyId> = records
        .iter()
        .map(|record| record.counterpart_of(viewer_id).1)
        .collect();
    peer_company_ids.sort_unstable();
    peer_company_ids.dedup();
    let companies = state.gateway.find_companies(&peer_company_ids).await?;
    Ok(aggregate_conversations(viewer_id, &records, &companies))
}

/// Groups newest-first messages by counterpart.
///
/// The first message seen for a counterpart is its `lastMessage`; unread
/// counts cover the whole group. Entries keep first-seen order and are not
/// re-sorted.
pub(crate) fn aggregate_conversations(
    viewer_id: UserId,
    newest_first: &[MessageRecord],
    companies: &HashMap<CompanyId, CompanyRecord>,
) -> Vec<ConversationResponse> {
    let mut order: Vec<UserId> = Vec::new();
    let mut groups: HashMap<UserId, ConversationResponse> = HashMap::new();

    for message in newest_first {
        let (peer_id, peer_company_id) = message.counterpart_of(viewer_id);
        let unread = u64::from(message.receiver_id == viewer_id && !message.is_read);
        if let Some(conversation) = groups.get_mut(&peer_id) {
            conversation.unread_count += unread;
            continue;
        }

        let company = companies.get(&peer_company_id);
        order.push(peer_id);
        groups.insert(
            peer_id,
            ConversationResponse {
                other_user: ConversationPeer {
                    id: peer_id,
                    company_id: peer_company_id,
                    name: company.map(|c| c.name.clone()).unwrap_or_default(),
                    logo: company.and_then(|c| c.logo.clone()),
                    slug: company.map(|c| c.slug.clone()).unwrap_or_default(),
                },
                last_message: LastMessage {
                    content: message.content.clone(),
                    created_at: message.created_at_unix_ms,
                    is_read: message.is_read,
                    sender_id: message.sender_id,
                },
                unread_count: unread,
            },
        );
    }

    order
        .into_iter()
        .filter_map(|peer_id| groups.remove(&peer_id))
        .collect()
}

pub(crate) async fn mark_message_read(
    state: &AppState,
    message_id: &str,
    reader_id: UserId,
) -> Result<MessageResponse, ApiFailure> {
    let message_id = MessageId::try_from(message_id.to_owned()).map_err(|_| ApiFailure::NotFound)?;
    let message = state
        .gateway
        .find_message(message_id)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    if message.receiver_id != reader_id {
        return Err(ApiFailure::Forbidden);
    }
    let updated = state
        .gateway
        .mark_message_read(message_id, now_unix_ms())
        .await?
        .ok_or(ApiFailure::NotFound)?;
    let mut projected = project_messages(state, std::slice::from_ref(&updated)).await?;
    projected.pop().ok_or(ApiFailure::Internal)
}

pub(crate) async fn count_unread(state: &AppState, user_id: UserId) -> Result<i64, ApiFailure> {
    state
        .gateway
        .count_messages(&MessageFilter::unread_for(user_id))
        .await
}

pub(crate) async fn list_inbox(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<MessageResponse>, ApiFailure> {
    let records = state
        .gateway
        .list_messages(&MessageFilter::inbox(user_id))
        .await?;
    project_messages(state, &records).await
}

pub(crate) async fn list_sent_messages(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<MessageResponse>, ApiFailure> {
    let records = state
        .gateway
        .list_messages(&MessageFilter::sent(user_id))
        .await?;
    project_messages(state, &records).await
}

async fn project_messages(
    state: &AppState,
    records: &[MessageRecord],
) -> Result<Vec<MessageResponse>, ApiFailure> {
    let mut company_ids: Vec<CompanyId> = records
        .iter()
        .flat_map(|record| [record.sender_company_id, record.receiver_company_id])
        .collect();
    company_ids.sort_unstable();
    company_ids.dedup();
    let companies = state.gateway.find_companies(&company_ids).await?;

    records
        .iter()
        .map(|record| {
            let sender = companies
                .get(&record.sender_company_id)
                .ok_or(ApiFailure::Internal)?;
            let receiver = companies
                .get(&record.receiver_company_id)
                .ok_or(ApiFailure::Internal)?;
            Ok(message_response(record, sender, receiver))
        })
        .collect()
}

fn message_response(
    record: &MessageRecord,
    sender_company: &CompanyRecord,
    receiver_company: &CompanyRecord,
) -> MessageResponse {
    MessageResponse {
        id: record.id,
        sender_id: record.sender_id,
        sender_company_id: record.sender_company_id,
        sender_company: CompanySummary::from(sender_company),
        receiver_id: record.receiver_id,
        receiver_company_id: record.receiver_company_id,
        receiver_company: CompanySummary::from(receiver_company),
        subject: record.subject.clone(),
        content: record.content.clone(),
        is_read: record.is_read,
        read_at: record.read_at_unix_ms,
        created_at: record.created_at_unix_ms,
    }
}
