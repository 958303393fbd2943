use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use pasetors::{
    claims::{Claims, ClaimsValidationRules},
    keys::SymmetricKey,
    local,
    token::UntrustedToken,
    version4::V4,
    Local,
};
use tradepost_core::{Role, UserId};

use super::{
    core::{AppState, AuthContext, ACCESS_TOKEN_TTL_SECS},
    errors::ApiFailure,
};

const ROLE_CLAIM: &str = "role";

pub(crate) fn issue_access_token(
    key: &SymmetricKey<V4>,
    user_id: UserId,
    role: Role,
) -> anyhow::Result<String> {
    let mut claims = Claims::new_expires_in(&Duration::from_secs(ACCESS_TOKEN_TTL_SECS))
        .map_err(|e| anyhow!("claims init failed: {e}"))?;
    claims
        .subject(&user_id.to_string())
        .map_err(|e| anyhow!("claim sub failed: {e}"))?;
    claims
        .add_additional(ROLE_CLAIM, role.as_str())
        .map_err(|e| anyhow!("claim role failed: {e}"))?;

    local::encrypt(key, &claims, None, None).map_err(|e| anyhow!("access token mint failed: {e}"))
}

pub(crate) fn verify_access_token(key: &SymmetricKey<V4>, token: &str) -> anyhow::Result<Claims> {
    let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|e| anyhow!("{e}"))?;
    let validation_rules = ClaimsValidationRules::new();
    let trusted = local::decrypt(key, &untrusted, &validation_rules, None, None)
        .map_err(|e| anyhow!("token decrypt failed: {e}"))?;
    trusted
        .payload_claims()
        .cloned()
        .ok_or_else(|| anyhow!("token claims missing"))
}

pub(crate) fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiFailure> {
    let access_token = bearer_token(headers).ok_or(ApiFailure::Unauthorized)?;
    authenticate_with_token(state, access_token)
}

/// Resolves a bearer credential into the caller's identity.
///
/// Identity is owned by an external issuer; the token's subject is trusted
/// once the signature and expiry check out.
pub(crate) fn authenticate_with_token(
    state: &AppState,
    access_token: &str,
) -> Result<AuthContext, ApiFailure> {
    let claims =
        verify_access_token(&state.token_key, access_token).map_err(|_| ApiFailure::Unauthorized)?;
    let user_id = claims
        .get_claim("sub")
        .and_then(serde_json::Value::as_str)
        .ok_or(ApiFailure::Unauthorized)?;
    let user_id = UserId::try_from(user_id.to_owned()).map_err(|_| ApiFailure::Unauthorized)?;
    let role = match claims.get_claim(ROLE_CLAIM).and_then(serde_json::Value::as_str) {
        Some(role) => Role::try_from(role).map_err(|_| ApiFailure::Unauthorized)?,
        None => Role::User,
    };
    Ok(AuthContext { user_id, role })
}

pub(crate) fn require_admin(auth: &AuthContext) -> Result<(), ApiFailure> {
    if auth.role == Role::Admin {
        return Ok(());
    }
    Err(ApiFailure::Forbidden)
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

pub(crate) fn now_unix_ms() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}
