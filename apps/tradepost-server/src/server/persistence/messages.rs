use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use tradepost_core::{MessageId, UserId};

use super::{invalid_filter, parse_stored_id, Gateway, MessageFilter};
use crate::server::{
    core::MessageRecord,
    errors::{storage_failure, ApiFailure},
};

const MESSAGE_COLUMNS: &str = "message_id, sender_user_id, sender_company_id, receiver_user_id,
                 receiver_company_id, subject, content, is_read, read_at_unix_ms, created_at_unix_ms";

fn message_from_row(row: &PgRow) -> Result<MessageRecord, ApiFailure> {
    Ok(MessageRecord {
        id: parse_stored_id(row.try_get("message_id").map_err(storage_failure)?)?,
        sender_id: parse_stored_id(row.try_get("sender_user_id").map_err(storage_failure)?)?,
        sender_company_id: parse_stored_id(
            row.try_get("sender_company_id").map_err(storage_failure)?,
        )?,
        receiver_id: parse_stored_id(row.try_get("receiver_user_id").map_err(storage_failure)?)?,
        receiver_company_id: parse_stored_id(
            row.try_get("receiver_company_id")
                .map_err(storage_failure)?,
        )?,
        subject: row.try_get("subject").map_err(storage_failure)?,
        content: row.try_get("content").map_err(storage_failure)?,
        is_read: row.try_get("is_read").map_err(storage_failure)?,
        read_at_unix_ms: row.try_get("read_at_unix_ms").map_err(storage_failure)?,
        created_at_unix_ms: row.try_get("created_at_unix_ms").map_err(storage_failure)?,
    })
}

fn select_messages(filter: &MessageFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages"));
    filter.push_where(&mut builder);
    filter.push_order(&mut builder);
    builder
}

fn mark_read(record: &mut MessageRecord, read_at_unix_ms: i64) {
    if !record.is_read {
        record.is_read = true;
        record.read_at_unix_ms = Some(read_at_unix_ms);
    }
}

impl Gateway {
    pub(crate) async fn insert_message(&self, record: &MessageRecord) -> Result<(), ApiFailure> {
        if let Some(pool) = self.pool().await? {
            sqlx::query(
                "INSERT INTO messages (message_id, sender_user_id, sender_company_id,
                    receiver_user_id, receiver_company_id, subject, content, is_read,
                    read_at_unix_ms, created_at_unix_ms)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(record.id.to_string())
            .bind(record.sender_id.to_string())
            .bind(record.sender_company_id.to_string())
            .bind(record.receiver_id.to_string())
            .bind(record.receiver_company_id.to_string())
            .bind(record.subject.as_deref())
            .bind(&record.content)
            .bind(record.is_read)
            .bind(record.read_at_unix_ms)
            .bind(record.created_at_unix_ms)
            .execute(pool)
            .await
            .map_err(storage_failure)?;
            return Ok(());
        }

        self.memory.messages.write().await.push(record.clone());
        Ok(())
    }

    pub(crate) async fn find_message(
        &self,
        message_id: MessageId,
    ) -> Result<Option<MessageRecord>, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let row = sqlx::query(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = $1"
            ))
            .bind(message_id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(storage_failure)?;
            return row.as_ref().map(message_from_row).transpose();
        }

        Ok(self
            .memory
            .messages
            .read()
            .await
            .iter()
            .find(|message| message.id == message_id)
            .cloned())
    }

    pub(crate) async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<MessageRecord>, ApiFailure> {
        filter.validate().map_err(invalid_filter)?;
        if let Some(pool) = self.pool().await? {
            let rows = select_messages(filter)
                .build()
                .fetch_all(pool)
                .await
                .map_err(storage_failure)?;
            return rows.iter().map(message_from_row).collect();
        }

        let mut records: Vec<MessageRecord> = self
            .memory
            .messages
            .read()
            .await
            .iter()
            .filter(|message| filter.matches(message))
            .cloned()
            .collect();
        filter.sort(&mut records);
        Ok(records)
    }

    pub(crate) async fn count_messages(&self, filter: &MessageFilter) -> Result<i64, ApiFailure> {
        filter.validate().map_err(invalid_filter)?;
        if let Some(pool) = self.pool().await? {
            let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM messages");
            filter.push_where(&mut builder);
            return builder
                .build_query_scalar::<i64>()
                .fetch_one(pool)
                .await
                .map_err(storage_failure);
        }

        let count = self
            .memory
            .messages
            .read()
            .await
            .iter()
            .filter(|message| filter.matches(message))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    /// Marks one message read. An already-read message keeps its original
    /// read time.
    pub(crate) async fn mark_message_read(
        &self,
        message_id: MessageId,
        read_at_unix_ms: i64,
    ) -> Result<Option<MessageRecord>, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let row = sqlx::query(&format!(
                "UPDATE messages
                 SET is_read = TRUE, read_at_unix_ms = COALESCE(read_at_unix_ms, $2)
                 WHERE message_id = $1
                 RETURNING {MESSAGE_COLUMNS}"
            ))
            .bind(message_id.to_string())
            .bind(read_at_unix_ms)
            .fetch_optional(pool)
            .await
            .map_err(storage_failure)?;
            return row.as_ref().map(message_from_row).transpose();
        }

        let mut messages = self.memory.messages.write().await;
        Ok(messages
            .iter_mut()
            .find(|message| message.id == message_id)
            .map(|message| {
                mark_read(message, read_at_unix_ms);
                message.clone()
            }))
    }

    /// Marks everything `peer` sent to `viewer` as read and returns the
    /// whole thread oldest-first, as one atomic step.
    pub(crate) async fn read_thread(
        &self,
        viewer: UserId,
        peer: UserId,
        read_at_unix_ms: i64,
    ) -> Result<Vec<MessageRecord>, ApiFailure> {
        let unread = MessageFilter::unread_in_thread(viewer, peer);
        let thread = MessageFilter::thread(viewer, peer);
        unread.validate().map_err(invalid_filter)?;
        thread.validate().map_err(invalid_filter)?;

        if let Some(pool) = self.pool().await? {
            let mut tx = pool.begin().await.map_err(storage_failure)?;
            let mut update = QueryBuilder::<Postgres>::new(
                "UPDATE messages SET is_read = TRUE, read_at_unix_ms = ",
            );
            update.push_bind(read_at_unix_ms);
            unread.push_where(&mut update);
            update
                .build()
                .execute(&mut *tx)
                .await
                .map_err(storage_failure)?;

            let rows = select_messages(&thread)
                .build()
                .fetch_all(&mut *tx)
                .await
                .map_err(storage_failure)?;
            tx.commit().await.map_err(storage_failure)?;
            return rows.iter().map(message_from_row).collect();
        }

        let mut messages = self.memory.messages.write().await;
        let mut records = Vec::new();
        for message in messages.iter_mut() {
            if unread.matches(message) {
                mark_read(message, read_at_unix_ms);
            }
            if thread.matches(message) {
                records.push(message.clone());
            }
        }
        thread.sort(&mut records);
        Ok(records)
    }
}
