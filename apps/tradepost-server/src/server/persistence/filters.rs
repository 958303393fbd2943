use sqlx::{Postgres, QueryBuilder};
use tradepost_core::{CompanyId, ConnectionStatus, UserId};

use crate::server::core::{ConnectionRecord, MessageRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterError {
    /// Message queries must be scoped to at least one participant.
    Unscoped,
    /// Pending connections have no response time to order by.
    PendingOrderedByResponse,
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionSide {
    Receiver,
    Requester,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionOrder {
    NewestCreated,
    NewestResponded,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionFilter {
    pub(crate) company_id: CompanyId,
    pub(crate) side: ConnectionSide,
    pub(crate) status: Option<ConnectionStatus>,
    pub(crate) order: ConnectionOrder,
}

impl ConnectionFilter {
    pub(crate) fn received(company_id: CompanyId, status: ConnectionStatus) -> Self {
        Self {
            company_id,
            side: ConnectionSide::Receiver,
            status: Some(status),
            order: ConnectionOrder::NewestCreated,
        }
    }

    pub(crate) fn sent(company_id: CompanyId) -> Self {
        Self {
            company_id,
            side: ConnectionSide::Requester,
            status: None,
            order: ConnectionOrder::NewestCreated,
        }
    }

    pub(crate) fn accepted(company_id: CompanyId) -> Self {
        Self {
            company_id,
            side: ConnectionSide::Either,
            status: Some(ConnectionStatus::Accepted),
            order: ConnectionOrder::NewestResponded,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), FilterError> {
        if self.order == ConnectionOrder::NewestResponded
            && matches!(self.status, None | Some(ConnectionStatus::Pending))
        {
            return Err(FilterError::PendingOrderedByResponse);
        }
        Ok(())
    }

    pub(crate) fn matches(&self, record: &ConnectionRecord) -> bool {
        let side_matches = match self.side {
            ConnectionSide::Receiver => record.receiver_id == self.company_id,
            ConnectionSide::Requester => record.requester_id == self.company_id,
            ConnectionSide::Either => {
                record.receiver_id == self.company_id || record.requester_id == self.company_id
            }
        };
        side_matches && self.status.map_or(true, |status| record.status == status)
    }

    /// Orders records held in insertion order newest-first; ties favour the
    /// later insert.
    pub(crate) fn sort(&self, records: &mut [ConnectionRecord]) {
        records.reverse();
        match self.order {
            ConnectionOrder::NewestCreated => {
                records.sort_by(|a, b| b.created_at_unix_ms.cmp(&a.created_at_unix_ms));
            }
            ConnectionOrder::NewestResponded => {
                records.sort_by(|a, b| b.responded_at_unix_ms.cmp(&a.responded_at_unix_ms));
            }
        }
    }

    pub(crate) fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let company_id = self.company_id.to_string();
        match self.side {
            ConnectionSide::Receiver => {
                builder.push(" WHERE receiver_company_id = ").push_bind(company_id);
            }
            ConnectionSide::Requester => {
                builder.push(" WHERE requester_company_id = ").push_bind(company_id);
            }
            ConnectionSide::Either => {
                builder
                    .push(" WHERE (receiver_company_id = ")
                    .push_bind(company_id.clone())
                    .push(" OR requester_company_id = ")
                    .push_bind(company_id)
                    .push(")");
            }
        }
        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
    }

    pub(crate) fn push_order(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self.order {
            ConnectionOrder::NewestCreated => {
                builder.push(" ORDER BY created_at_unix_ms DESC, connection_id DESC");
            }
            ConnectionOrder::NewestResponded => {
                builder.push(" ORDER BY responded_at_unix_ms DESC, connection_id DESC");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortOrder {
    OldestFirst,
    NewestFirst,
}

/// Where-clause for message queries. Every populated field narrows the
/// result; unset fields do not constrain it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MessageFilter {
    pub(crate) sender_id: Option<UserId>,
    pub(crate) receiver_id: Option<UserId>,
    pub(crate) participant_id: Option<UserId>,
    pub(crate) thread: Option<(UserId, UserId)>,
    pub(crate) unread_only: bool,
    pub(crate) order: SortOrder,
}

impl MessageFilter {
    fn empty(order: SortOrder) -> Self {
        Self {
            sender_id: None,
            receiver_id: None,
            participant_id: None,
            thread: None,
            unread_only: false,
            order,
        }
    }

    pub(crate) fn inbox(user_id: UserId) -> Self {
        Self {
            receiver_id: Some(user_id),
            ..Self::empty(SortOrder::NewestFirst)
        }
    }

    pub(crate) fn sent(user_id: UserId) -> Self {
        Self {
            sender_id: Some(user_id),
            ..Self::empty(SortOrder::NewestFirst)
        }
    }

    pub(crate) fn involving(user_id: UserId) -> Self {
        Self {
            participant_id: Some(user_id),
            ..Self::empty(SortOrder::NewestFirst)
        }
    }

    pub(crate) fn thread(viewer: UserId, peer: UserId) -> Self {
        Self {
            thread: Some((viewer, peer)),
            ..Self::empty(SortOrder::OldestFirst)
        }
    }

    pub(crate) fn unread_for(user_id: UserId) -> Self {
        Self {
            receiver_id: Some(user_id),
            unread_only: true,
            ..Self::empty(SortOrder::NewestFirst)
        }
    }

    /// Narrows a thread filter to what `viewer` has not read yet.
    pub(crate) fn unread_in_thread(viewer: UserId, peer: UserId) -> Self {
        Self {
            sender_id: Some(peer),
            receiver_id: Some(viewer),
            unread_only: true,
            ..Self::empty(SortOrder::OldestFirst)
        }
    }

    pub(crate) fn validate(&self) -> Result<(), FilterError> {
        if self.sender_id.is_none()
            && self.receiver_id.is_none()
            && self.participant_id.is_none()
            && self.thread.is_none()
        {
            return Err(FilterError::Unscoped);
        }
        Ok(())
    }

    pub(crate) fn matches(&self, record: &MessageRecord) -> bool {
        if self.sender_id.is_some_and(|id| record.sender_id != id) {
            return false;
        }
        if self.receiver_id.is_some_and(|id| record.receiver_id != id) {
            return false;
        }
        if self
            .participant_id
            .is_some_and(|id| record.sender_id != id && record.receiver_id != id)
        {
            return false;
        }
        if let Some((a, b)) = self.thread {
            let forward = record.sender_id == a && record.receiver_id == b;
            let backward = record.sender_id == b && record.receiver_id == a;
            if !forward && !backward {
                return false;
            }
        }
        !(self.unread_only && record.is_read)
    }

    /// Applies the requested order to records held in insertion order.
    pub(crate) fn sort(&self, records: &mut [MessageRecord]) {
        match self.order {
            SortOrder::OldestFirst => {
                records.sort_by(|a, b| a.created_at_unix_ms.cmp(&b.created_at_unix_ms));
            }
            SortOrder::NewestFirst => {
                records.reverse();
                records.sort_by(|a, b| b.created_at_unix_ms.cmp(&a.created_at_unix_ms));
            }
        }
    }

    pub(crate) fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");
        if let Some(sender_id) = self.sender_id {
            builder
                .push(" AND sender_user_id = ")
                .push_bind(sender_id.to_string());
        }
        if let Some(receiver_id) = self.receiver_id {
            builder
                .push(" AND receiver_user_id = ")
                .push_bind(receiver_id.to_string());
        }
        if let Some(participant_id) = self.participant_id {
            builder
                .push(" AND (sender_user_id = ")
                .push_bind(participant_id.to_string())
                .push(" OR receiver_user_id = ")
                .push_bind(participant_id.to_string())
                .push(")");
        }
        if let Some((a, b)) = self.thread {
            builder
                .push(" AND ((sender_user_id = ")
                .push_bind(a.to_string())
                .push(" AND receiver_user_id = ")
                .push_bind(b.to_string())
                .push(") OR (sender_user_id = ")
                .push_bind(b.to_string())
                .push(" AND receiver_user_id = ")
                .push_bind(a.to_string())
                .push("))");
        }
        if self.unread_only {
            builder.push(" AND is_read = FALSE");
        }
    }

    pub(crate) fn push_order(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self.order {
            SortOrder::OldestFirst => builder.push(" ORDER BY created_at_unix_ms ASC, seq ASC"),
            SortOrder::NewestFirst => builder.push(" ORDER BY created_at_unix_ms DESC, seq DESC"),
        };
    }
}

#[cfg(test)]
mod tests {
    use sqlx::{Postgres, QueryBuilder};
    use tradepost_core::{CompanyId, ConnectionStatus, MessageId, UserId};

    use super::{ConnectionFilter, ConnectionOrder, ConnectionSide, FilterError, MessageFilter};
    use crate::server::core::{ConnectionRecord, MessageRecord};

    fn message(sender: UserId, receiver: UserId, created: i64, is_read: bool) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(),
            sender_id: sender,
            sender_company_id: CompanyId::new(),
            receiver_id: receiver,
            receiver_company_id: CompanyId::new(),
            subject: None,
            content: format!("at {created}"),
            is_read,
            read_at_unix_ms: None,
            created_at_unix_ms: created,
        }
    }

    #[test]
    fn message_filter_requires_a_participant_scope() {
        let mut filter = MessageFilter::inbox(UserId::new());
        assert!(filter.validate().is_ok());
        filter.receiver_id = None;
        assert_eq!(filter.validate(), Err(FilterError::Unscoped));
    }

    #[test]
    fn thread_filter_matches_both_directions_only() {
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();
        let filter = MessageFilter::thread(a, b);

        assert!(filter.matches(&message(a, b, 1, false)));
        assert!(filter.matches(&message(b, a, 2, false)));
        assert!(!filter.matches(&message(a, c, 3, false)));
        assert!(!filter.matches(&message(c, b, 4, false)));
    }

    #[test]
    fn unread_thread_filter_ignores_messages_viewer_sent() {
        let viewer = UserId::new();
        let peer = UserId::new();
        let filter = MessageFilter::unread_in_thread(viewer, peer);

        assert!(filter.matches(&message(peer, viewer, 1, false)));
        assert!(!filter.matches(&message(peer, viewer, 2, true)));
        assert!(!filter.matches(&message(viewer, peer, 3, false)));
    }

    #[test]
    fn newest_first_breaks_timestamp_ties_by_later_insertion() {
        let a = UserId::new();
        let b = UserId::new();
        let first = message(a, b, 10, false);
        let second = message(b, a, 10, false);
        let older = message(a, b, 5, false);
        let mut records = vec![older.clone(), first.clone(), second.clone()];

        MessageFilter::involving(a).sort(&mut records);
        let ids: Vec<_> = records.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![second.id, first.id, older.id]);
    }

    #[test]
    fn connection_filter_rejects_response_order_without_terminal_status() {
        let mut filter = ConnectionFilter::accepted(CompanyId::new());
        assert!(filter.validate().is_ok());
        filter.status = Some(ConnectionStatus::Pending);
        assert_eq!(
            filter.validate(),
            Err(FilterError::PendingOrderedByResponse)
        );
        filter.status = None;
        assert!(filter.validate().is_err());
        filter.order = ConnectionOrder::NewestCreated;
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn connection_filter_matches_requested_side() {
        let mine = CompanyId::new();
        let other = CompanyId::new();
        let record = ConnectionRecord {
            id: tradepost_core::ConnectionId::new(),
            requester_id: other,
            receiver_id: mine,
            status: ConnectionStatus::Pending,
            message: None,
            created_at_unix_ms: 1,
            responded_at_unix_ms: None,
        };

        assert!(ConnectionFilter::received(mine, ConnectionStatus::Pending).matches(&record));
        assert!(!ConnectionFilter::received(mine, ConnectionStatus::Rejected).matches(&record));
        assert!(!ConnectionFilter::sent(mine).matches(&record));
        assert!(ConnectionFilter::sent(other).matches(&record));
        let either = ConnectionFilter {
            side: ConnectionSide::Either,
            status: None,
            ..ConnectionFilter::sent(mine)
        };
        assert!(either.matches(&record));
    }

    #[test]
    fn sql_rendering_binds_every_scope() {
        let viewer = UserId::new();
        let peer = UserId::new();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT message_id FROM messages");
        let filter = MessageFilter::thread(viewer, peer);
        filter.push_where(&mut builder);
        filter.push_order(&mut builder);

        let sql = builder.sql();
        assert!(sql.contains("((sender_user_id = $1 AND receiver_user_id = $2)"));
        assert!(sql.contains("(sender_user_id = $3 AND receiver_user_id = $4))"));
        assert!(sql.ends_with("ORDER BY created_at_unix_ms ASC, seq ASC"));
    }
}
