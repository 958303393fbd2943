use sqlx::{Postgres, Transaction};

/// One connection per unordered company pair, whatever its status.
const CREATE_CONNECTIONS_PAIR_UNIQUE_INDEX_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_pair_unique
                    ON connections(
                        LEAST(requester_company_id, receiver_company_id),
                        GREATEST(requester_company_id, receiver_company_id)
                    )";

pub(crate) async fn apply_connection_pair_schema(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_CONNECTIONS_PAIR_UNIQUE_INDEX_SQL)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
