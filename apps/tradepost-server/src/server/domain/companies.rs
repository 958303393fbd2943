use tradepost_core::{CompanyId, CompanyName, IndustryType, UserId};

use crate::server::{
    auth::now_unix_ms,
    core::{AppState, CompanyRecord, MAX_LOGO_URL_CHARS},
    errors::ApiFailure,
    types::{CompanyDetail, CreateCompanyRequest},
};

/// Resolves the company owned by `user_id`, the prerequisite for every
/// connection and messaging operation.
pub(crate) async fn require_company(
    state: &AppState,
    user_id: UserId,
) -> Result<CompanyRecord, ApiFailure> {
    state
        .gateway
        .find_company_by_owner(user_id)
        .await?
        .ok_or(ApiFailure::NoCompanyProfile)
}

/// Like [`require_company`], but a banned or deactivated company may not
/// start new conversations or connection requests.
pub(crate) async fn require_active_company(
    state: &AppState,
    user_id: UserId,
) -> Result<CompanyRecord, ApiFailure> {
    let company = require_company(state, user_id).await?;
    if !company.is_visible() {
        tracing::info!(
            event = "company.action.suspended",
            company_id = %company.id,
            user_id = %user_id,
        );
        return Err(ApiFailure::Forbidden);
    }
    Ok(company)
}

pub(crate) async fn create_company(
    state: &AppState,
    owner_user_id: UserId,
    request: CreateCompanyRequest,
) -> Result<CompanyDetail, ApiFailure> {
    let name = CompanyName::try_from(request.name)
        .map_err(|_| ApiFailure::InvalidContent { field: "name" })?;
    let industry_type = request
        .industry_type
        .map(IndustryType::try_from)
        .transpose()
        .map_err(|_| ApiFailure::InvalidContent {
            field: "industryType",
        })?;
    let logo = request.logo.map(validate_logo_url).transpose()?;

    let record = CompanyRecord {
        id: CompanyId::new(),
        owner_user_id,
        slug: name.slug(),
        name: name.as_str().to_owned(),
        logo,
        industry_type: industry_type.map(|value| value.as_str().to_owned()),
        is_active: true,
        is_banned: false,
        connection_count: 0,
        created_at_unix_ms: now_unix_ms(),
    };
    if !state.gateway.insert_company(&record).await? {
        return Err(ApiFailure::CompanyExists);
    }

    tracing::info!(
        event = "company.created",
        company_id = %record.id,
        owner_user_id = %owner_user_id,
    );
    Ok(CompanyDetail::from(&record))
}

pub(crate) async fn set_company_banned(
    state: &AppState,
    company_id: CompanyId,
    banned: bool,
    actor_user_id: UserId,
) -> Result<CompanyDetail, ApiFailure> {
    let record = state
        .gateway
        .set_company_banned(company_id, banned)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    tracing::info!(
        event = "company.moderation.updated",
        company_id = %company_id,
        banned,
        actor_user_id = %actor_user_id,
    );
    Ok(CompanyDetail::from(&record))
}

fn validate_logo_url(value: String) -> Result<String, ApiFailure> {
    let trimmed = value.trim();
    let well_formed = (trimmed.starts_with("https://") || trimmed.starts_with("http://"))
        && trimmed.len() <= MAX_LOGO_URL_CHARS
        && !trimmed.chars().any(|c| c.is_whitespace() || c.is_control());
    if !well_formed {
        return Err(ApiFailure::InvalidContent { field: "logo" });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::validate_logo_url;
    use crate::server::errors::ApiFailure;

    #[test]
    fn logo_must_be_an_http_url_without_spaces() {
        assert_eq!(
            validate_logo_url(String::from(" https://cdn.example/a.png ")),
            Ok(String::from("https://cdn.example/a.png"))
        );
        assert_eq!(
            validate_logo_url(String::from("javascript:alert(1)")),
            Err(ApiFailure::InvalidContent { field: "logo" })
        );
        assert!(validate_logo_url(String::from("https://cdn.example/a b.png")).is_err());
        assert!(validate_logo_url(format!("https://{}", "a".repeat(600))).is_err());
    }
}
