use std::collections::HashMap;

use anyhow::anyhow;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::{OnceCell, RwLock};
use tradepost_core::CompanyId;

use super::{
    core::{CompanyRecord, ConnectionRecord, MessageRecord},
    db::ensure_db_schema,
    errors::{storage_failure, ApiFailure},
};

mod companies;
mod connections;
pub(crate) mod filters;
mod messages;

pub(crate) use connections::RespondOutcome;
pub(crate) use filters::{ConnectionFilter, FilterError, MessageFilter};

/// Store for companies, connections and messages.
///
/// Backed by postgres when a database url is configured, otherwise by
/// process-local tables. Lock order for the in-memory tables is companies,
/// then connections, then messages.
pub(crate) struct Gateway {
    db_pool: Option<PgPool>,
    db_init: OnceCell<()>,
    memory: MemoryTables,
}

#[derive(Default)]
struct MemoryTables {
    companies: RwLock<HashMap<CompanyId, CompanyRecord>>,
    connections: RwLock<Vec<ConnectionRecord>>,
    messages: RwLock<Vec<MessageRecord>>,
}

impl Gateway {
    pub(crate) fn new(database_url: Option<&str>) -> anyhow::Result<Self> {
        let db_pool = if let Some(database_url) = database_url {
            Some(
                PgPoolOptions::new()
                    .max_connections(10)
                    .connect_lazy(database_url)
                    .map_err(|e| anyhow!("postgres pool init failed: {e}"))?,
            )
        } else {
            None
        };
        Ok(Self {
            db_pool,
            db_init: OnceCell::new(),
            memory: MemoryTables::default(),
        })
    }

    pub(crate) fn is_persistent(&self) -> bool {
        self.db_pool.is_some()
    }

    async fn pool(&self) -> Result<Option<&PgPool>, ApiFailure> {
        let Some(pool) = &self.db_pool else {
            return Ok(None);
        };
        ensure_db_schema(pool, &self.db_init)
            .await
            .map_err(storage_failure)?;
        Ok(Some(pool))
    }
}

fn invalid_filter(error: FilterError) -> ApiFailure {
    tracing::error!(event = "persistence.filter.rejected", error = %error);
    ApiFailure::Internal
}

fn parse_stored_id<T>(value: String) -> Result<T, ApiFailure>
where
    T: TryFrom<String>,
{
    T::try_from(value).map_err(|_| {
        tracing::error!(event = "persistence.row.invalid_id");
        ApiFailure::Internal
    })
}
