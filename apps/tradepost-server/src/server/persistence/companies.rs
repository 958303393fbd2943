use std::collections::HashMap;

use sqlx::{postgres::PgRow, Row};
use tradepost_core::{CompanyId, UserId};

use super::{parse_stored_id, Gateway};
use crate::server::{
    core::CompanyRecord,
    errors::{storage_failure, ApiFailure},
};

const COMPANY_COLUMNS: &str = "company_id, owner_user_id, name, slug, logo, industry_type,
                 is_active, is_banned, connection_count, created_at_unix_ms";

fn company_from_row(row: &PgRow) -> Result<CompanyRecord, ApiFailure> {
    Ok(CompanyRecord {
        id: parse_stored_id(row.try_get("company_id").map_err(storage_failure)?)?,
        owner_user_id: parse_stored_id(row.try_get("owner_user_id").map_err(storage_failure)?)?,
        name: row.try_get("name").map_err(storage_failure)?,
        slug: row.try_get("slug").map_err(storage_failure)?,
        logo: row.try_get("logo").map_err(storage_failure)?,
        industry_type: row.try_get("industry_type").map_err(storage_failure)?,
        is_active: row.try_get("is_active").map_err(storage_failure)?,
        is_banned: row.try_get("is_banned").map_err(storage_failure)?,
        connection_count: row.try_get("connection_count").map_err(storage_failure)?,
        created_at_unix_ms: row.try_get("created_at_unix_ms").map_err(storage_failure)?,
    })
}

impl Gateway {
    /// Inserts a company unless its owner already has one.
    pub(crate) async fn insert_company(&self, record: &CompanyRecord) -> Result<bool, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let result = sqlx::query(
                "INSERT INTO companies (company_id, owner_user_id, name, slug, logo, industry_type,
                    is_active, is_banned, connection_count, created_at_unix_ms)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (owner_user_id) DO NOTHING",
            )
            .bind(record.id.to_string())
            .bind(record.owner_user_id.to_string())
            .bind(&record.name)
            .bind(&record.slug)
            .bind(record.logo.as_deref())
            .bind(record.industry_type.as_deref())
            .bind(record.is_active)
            .bind(record.is_banned)
            .bind(record.connection_count)
            .bind(record.created_at_unix_ms)
            .execute(pool)
            .await
            .map_err(storage_failure)?;
            return Ok(result.rows_affected() == 1);
        }

        let mut companies = self.memory.companies.write().await;
        if companies
            .values()
            .any(|company| company.owner_user_id == record.owner_user_id)
        {
            return Ok(false);
        }
        companies.insert(record.id, record.clone());
        Ok(true)
    }

    pub(crate) async fn find_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyRecord>, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let row = sqlx::query(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE company_id = $1"
            ))
            .bind(company_id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(storage_failure)?;
            return row.as_ref().map(company_from_row).transpose();
        }

        Ok(self.memory.companies.read().await.get(&company_id).cloned())
    }

    pub(crate) async fn find_company_by_owner(
        &self,
        owner_user_id: UserId,
    ) -> Result<Option<CompanyRecord>, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let row = sqlx::query(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE owner_user_id = $1"
            ))
            .bind(owner_user_id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(storage_failure)?;
            return row.as_ref().map(company_from_row).transpose();
        }

        Ok(self
            .memory
            .companies
            .read()
            .await
            .values()
            .find(|company| company.owner_user_id == owner_user_id)
            .cloned())
    }

    /// Batch lookup used to attach company projections to listings.
    pub(crate) async fn find_companies(
        &self,
        company_ids: &[CompanyId],
    ) -> Result<HashMap<CompanyId, CompanyRecord>, ApiFailure> {
        if company_ids.is_empty() {
            return Ok(HashMap::new());
        }
        if let Some(pool) = self.pool().await? {
            let ids: Vec<String> = company_ids.iter().map(ToString::to_string).collect();
            let rows = sqlx::query(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies WHERE company_id = ANY($1)"
            ))
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(storage_failure)?;
            let mut companies = HashMap::with_capacity(rows.len());
            for row in &rows {
                let company = company_from_row(row)?;
                companies.insert(company.id, company);
            }
            return Ok(companies);
        }

        let companies = self.memory.companies.read().await;
        Ok(company_ids
            .iter()
            .filter_map(|id| companies.get(id).map(|company| (*id, company.clone())))
            .collect())
    }

    pub(crate) async fn set_company_banned(
        &self,
        company_id: CompanyId,
        banned: bool,
    ) -> Result<Option<CompanyRecord>, ApiFailure> {
        if let Some(pool) = self.pool().await? {
            let row = sqlx::query(&format!(
                "UPDATE companies SET is_banned = $2 WHERE company_id = $1
                 RETURNING {COMPANY_COLUMNS}"
            ))
            .bind(company_id.to_string())
            .bind(banned)
            .fetch_optional(pool)
            .await
            .map_err(storage_failure)?;
            return row.as_ref().map(company_from_row).transpose();
        }

        let mut companies = self.memory.companies.write().await;
        Ok(companies.get_mut(&company_id).map(|company| {
            company.is_banned = banned;
            company.clone()
        }))
    }
}
