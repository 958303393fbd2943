use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tradepost_core::CompanyId;

use super::json_body;
use crate::server::{
    auth::{authenticate, require_admin},
    core::AppState,
    domain::{create_company, require_company, set_company_banned},
    errors::ApiFailure,
    types::{CompanyDetail, CreateCompanyRequest, IdPath},
};

pub(crate) async fn create_my_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateCompanyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CompanyDetail>), ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let request = json_body(payload)?;
    let company = create_company(&state, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

pub(crate) async fn get_my_company(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CompanyDetail>, ApiFailure> {
    let auth = authenticate(&state, &headers)?;
    let company = require_company(&state, auth.user_id).await?;
    Ok(Json(CompanyDetail::from(&company)))
}

pub(crate) async fn ban_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IdPath>,
) -> Result<Json<CompanyDetail>, ApiFailure> {
    moderate_company(&state, &headers, &path.id, true).await
}

pub(crate) async fn unban_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<IdPath>,
) -> Result<Json<CompanyDetail>, ApiFailure> {
    moderate_company(&state, &headers, &path.id, false).await
}

async fn moderate_company(
    state: &AppState,
    headers: &HeaderMap,
    company_id: &str,
    banned: bool,
) -> Result<Json<CompanyDetail>, ApiFailure> {
    let auth = authenticate(state, headers)?;
    require_admin(&auth)?;
    let company_id =
        CompanyId::try_from(company_id.to_owned()).map_err(|_| ApiFailure::NotFound)?;
    let company = set_company_banned(state, company_id, banned, auth.user_id).await?;
    Ok(Json(company))
}
