use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use tradepost_core::{ConnectionId, ConnectionStatus};

use super::{invalid_filter, parse_stored_id, ConnectionFilter, Gateway};
use crate::server::{
    core::ConnectionRecord,
    errors::{storage_failure, ApiFailure},
};

const CONNECTION_COLUMNS: &str = "connection_id, requester_company_id, receiver_company_id,
                 status, message, created_at_unix_ms, responded_at_unix_ms";

#[derive(Debug)]
pub(crate) enum RespondOutcome {
    Updated(ConnectionRecord),
    NotPending(ConnectionStatus),
    Missing,
}

fn connection_from_row(row: &PgRow) -> Result<ConnectionRecord, ApiFailure> {
    let status: String = row.try_get("status").map_err(storage_failure)?;
    Ok(ConnectionRecord {
        id: parse_stored_id(row.try_get("connection_id").map_err(storage_failure)?)?,
        requester_id: parse_stored_id(
            row.try_get("requester_company_id")
                .map_err(storage_failure)?,
        )?,
        receiver_id: parse_stored_id(row.try_get("receiver_company_id").map_err(storage_failure)?)?,
        status: ConnectionStatus::try_from(status.as_str()).map_err(|_| ApiFailure::Internal)?,
        message: row.try_get("message").map_err(storage_failure)?,
        created_at_unix_ms: row.try_get("created_at_unix_ms").map_err(storage_failure)?,
        responded_at_unix_ms: row.try_get("responded_at_unix_ms").map_err(storage_failure)?,
    })
}

impl Gateway {
    /// Inserts a connection unless one already links the same pair, in
    /// either direction and in any status.
    pub(crate) async fn insert_connection(
        &self,
        record: &ConnectionRecord,
    ) -> Result<bool, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let result = sqlx::query(
                "INSERT INTO connections (connection_id, requester_company_id, receiver_company_id,
                    status, message, created_at_unix_ms, responded_at_unix_ms)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT DO NOTHING",
            )
            .bind(record.id.to_string())
            .bind(record.requester_id.to_string())
            .bind(record.receiver_id.to_string())
            .bind(record.status.as_str())
            .bind(record.message.as_deref())
            .bind(record.created_at_unix_ms)
            .bind(record.responded_at_unix_ms)
            .execute(pool)
            .await
            .map_err(storage_failure)?;
            return Ok(result.rows_affected() == 1);
        }

        let mut connections = self.memory.connections.write().await;
        if connections
            .iter()
            .any(|existing| existing.involves_pair(record.requester_id, record.receiver_id))
        {
            return Ok(false);
        }
        connections.push(record.clone());
        Ok(true)
    }

    pub(crate) async fn find_connection(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<ConnectionRecord>, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let row = sqlx::query(&format!(
                "SELECT {CONNECTION_COLUMNS} FROM connections WHERE connection_id = $1"
            ))
            .bind(connection_id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(storage_failure)?;
            return row.as_ref().map(connection_from_row).transpose();
        }

        Ok(self
            .memory
            .connections
            .read()
            .await
            .iter()
            .find(|connection| connection.id == connection_id)
            .cloned())
    }

    pub(crate) async fn list_connections(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Vec<ConnectionRecord>, ApiFailure> {
        filter.validate().map_err(invalid_filter)?;
        if let Some(pool) = self.pool().await? {
            let mut builder =
                QueryBuilder::<Postgres>::new(format!("SELECT {CONNECTION_COLUMNS} FROM connections"));
            filter.push_where(&mut builder);
            filter.push_order(&mut builder);
            let rows = builder
                .build()
                .fetch_all(pool)
                .await
                .map_err(storage_failure)?;
            return rows.iter().map(connection_from_row).collect();
        }

        let mut records: Vec<ConnectionRecord> = self
            .memory
            .connections
            .read()
            .await
            .iter()
            .filter(|connection| filter.matches(connection))
            .cloned()
            .collect();
        filter.sort(&mut records);
        Ok(records)
    }

    /// Moves a pending connection to `next`. Accepting also bumps the
    /// connection count of both companies in the same atomic step.
    pub(crate) async fn respond_to_connection(
        &self,
        connection_id: ConnectionId,
        next: ConnectionStatus,
        responded_at_unix_ms: i64,
    ) -> Result<RespondOutcome, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let mut tx = pool.begin().await.map_err(storage_failure)?;
            let row = sqlx::query(&format!(
                "UPDATE connections
                 SET status = $2, responded_at_unix_ms = $3
                 WHERE connection_id = $1 AND status = 'PENDING'
                 RETURNING {CONNECTION_COLUMNS}"
            ))
            .bind(connection_id.to_string())
            .bind(next.as_str())
            .bind(responded_at_unix_ms)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_failure)?;

            let Some(row) = row else {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM connections WHERE connection_id = $1")
                        .bind(connection_id.to_string())
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(storage_failure)?;
                tx.rollback().await.map_err(storage_failure)?;
                return match current {
                    Some(status) => Ok(RespondOutcome::NotPending(
                        ConnectionStatus::try_from(status.as_str())
                            .map_err(|_| ApiFailure::Internal)?,
                    )),
                    None => Ok(RespondOutcome::Missing),
                };
            };
            let updated = connection_from_row(&row)?;

            if next == ConnectionStatus::Accepted {
                sqlx::query(
                    "UPDATE companies SET connection_count = connection_count + 1
                     WHERE company_id IN ($1, $2)",
                )
                .bind(updated.requester_id.to_string())
                .bind(updated.receiver_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(storage_failure)?;
            }
            tx.commit().await.map_err(storage_failure)?;
            return Ok(RespondOutcome::Updated(updated));
        }

        let mut companies = self.memory.companies.write().await;
        let mut connections = self.memory.connections.write().await;
        let Some(connection) = connections
            .iter_mut()
            .find(|connection| connection.id == connection_id)
        else {
            return Ok(RespondOutcome::Missing);
        };
        if !connection.status.can_transition_to(next) {
            return Ok(RespondOutcome::NotPending(connection.status));
        }
        connection.status = next;
        connection.responded_at_unix_ms = Some(responded_at_unix_ms);

        if next == ConnectionStatus::Accepted {
            for company_id in [connection.requester_id, connection.receiver_id] {
                if let Some(company) = companies.get_mut(&company_id) {
                    company.connection_count += 1;
                }
            }
        }
        Ok(RespondOutcome::Updated(connection.clone()))
    }
}
