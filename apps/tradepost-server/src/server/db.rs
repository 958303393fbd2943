use sqlx::PgPool;
use tokio::sync::OnceCell;

mod migrations {
    pub(super) mod v1_marketplace_schema;
    pub(super) mod v2_connection_pair_schema;
}

use migrations::{
    v1_marketplace_schema::apply_marketplace_schema,
    v2_connection_pair_schema::apply_connection_pair_schema,
};

const SCHEMA_INIT_LOCK_ID: i64 = 0x5452_4144_4550_4f53;

/// Creates the marketplace tables once per process.
///
/// Concurrent instances serialise on a transaction-scoped advisory lock so
/// only one of them runs the DDL at a time.
pub(crate) async fn ensure_db_schema(
    pool: &PgPool,
    db_init: &OnceCell<()>,
) -> Result<(), sqlx::Error> {
    db_init
        .get_or_try_init(|| async move {
            let mut tx = pool.begin().await?;
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(SCHEMA_INIT_LOCK_ID)
                .execute(&mut *tx)
                .await?;

            apply_marketplace_schema(&mut tx).await?;
            apply_connection_pair_schema(&mut tx).await?;

            tx.commit().await?;
            tracing::info!(event = "persistence.schema.ready");
            Ok::<(), sqlx::Error>(())
        })
        .await?;
    Ok(())
}
