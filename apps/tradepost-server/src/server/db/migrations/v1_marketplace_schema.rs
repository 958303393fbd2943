use sqlx::{Postgres, Transaction};

const CREATE_COMPANIES_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS companies (
                    company_id TEXT PRIMARY KEY,
                    owner_user_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL,
                    logo TEXT NULL,
                    industry_type TEXT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    is_banned BOOLEAN NOT NULL DEFAULT FALSE,
                    connection_count BIGINT NOT NULL DEFAULT 0,
                    created_at_unix_ms BIGINT NOT NULL
                )";
const CREATE_CONNECTIONS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS connections (
                    connection_id TEXT PRIMARY KEY,
                    requester_company_id TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
                    receiver_company_id TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
                    status TEXT NOT NULL CHECK (status IN ('PENDING', 'ACCEPTED', 'REJECTED')),
                    message TEXT NULL,
                    created_at_unix_ms BIGINT NOT NULL,
                    responded_at_unix_ms BIGINT NULL,
                    CHECK (requester_company_id <> receiver_company_id)
                )";
const CREATE_MESSAGES_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS messages (
                    message_id TEXT PRIMARY KEY,
                    seq BIGINT GENERATED ALWAYS AS IDENTITY,
                    sender_user_id TEXT NOT NULL,
                    sender_company_id TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
                    receiver_user_id TEXT NOT NULL,
                    receiver_company_id TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
                    subject TEXT NULL,
                    content TEXT NOT NULL,
                    is_read BOOLEAN NOT NULL DEFAULT FALSE,
                    read_at_unix_ms BIGINT NULL,
                    created_at_unix_ms BIGINT NOT NULL
                )";
const CREATE_MESSAGES_RECEIVER_UNREAD_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_receiver_unread
                    ON messages(receiver_user_id, is_read)";
const CREATE_MESSAGES_SENDER_CREATED_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_sender_created
                    ON messages(sender_user_id, created_at_unix_ms DESC)";
const CREATE_CONNECTIONS_RECEIVER_STATUS_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_connections_receiver_status
                    ON connections(receiver_company_id, status, created_at_unix_ms DESC)";

pub(crate) async fn apply_marketplace_schema(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), sqlx::Error> {
    for statement in [
        CREATE_COMPANIES_TABLE_SQL,
        CREATE_CONNECTIONS_TABLE_SQL,
        CREATE_MESSAGES_TABLE_SQL,
        CREATE_MESSAGES_RECEIVER_UNREAD_INDEX_SQL,
        CREATE_MESSAGES_SENDER_CREATED_INDEX_SQL,
        CREATE_CONNECTIONS_RECEIVER_STATUS_INDEX_SQL,
    ] {
        sqlx::query(statement).execute(&mut **tx).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        CREATE_COMPANIES_TABLE_SQL, CREATE_CONNECTIONS_TABLE_SQL, CREATE_MESSAGES_TABLE_SQL,
    };

    #[test]
    fn company_table_enforces_one_company_per_owner() {
        assert!(CREATE_COMPANIES_TABLE_SQL.contains("owner_user_id TEXT NOT NULL UNIQUE"));
        assert!(CREATE_COMPANIES_TABLE_SQL.contains("connection_count BIGINT NOT NULL DEFAULT 0"));
    }

    #[test]
    fn connection_table_restricts_status_and_self_links() {
        assert!(CREATE_CONNECTIONS_TABLE_SQL.contains("'PENDING', 'ACCEPTED', 'REJECTED'"));
        assert!(CREATE_CONNECTIONS_TABLE_SQL
            .contains("CHECK (requester_company_id <> receiver_company_id)"));
    }

    #[test]
    fn message_table_carries_insertion_sequence_for_stable_ordering() {
        assert!(CREATE_MESSAGES_TABLE_SQL.contains("seq BIGINT GENERATED ALWAYS AS IDENTITY"));
        assert!(CREATE_MESSAGES_TABLE_SQL.contains("is_read BOOLEAN NOT NULL DEFAULT FALSE"));
    }
}
