use axum::{http::StatusCode, response::IntoResponse, Json};

use super::{metrics::record_auth_failure, types::ErrorBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiFailure {
    NoCompanyProfile,
    CompanyExists,
    NotFound,
    Forbidden,
    SelfConnection,
    DuplicateConnection,
    AlreadyResponded,
    InvalidContent { field: &'static str },
    RecipientNotFound,
    Unauthorized,
    Internal,
}

impl ApiFailure {
    fn status(self) -> StatusCode {
        match self {
            Self::NoCompanyProfile
            | Self::SelfConnection
            | Self::DuplicateConnection
            | Self::InvalidContent { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::RecipientNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::CompanyExists | Self::AlreadyResponded => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::NoCompanyProfile => "no_company_profile",
            Self::CompanyExists => "company_exists",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::SelfConnection => "self_connection",
            Self::DuplicateConnection => "duplicate_connection",
            Self::AlreadyResponded => "already_responded",
            Self::InvalidContent { .. } => "invalid_content",
            Self::RecipientNotFound => "recipient_not_found",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal_error",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::NoCompanyProfile => "Create a company profile first",
            Self::CompanyExists => "You already have a company profile",
            Self::NotFound => "Not found",
            Self::Forbidden => "You are not allowed to perform this action",
            Self::SelfConnection => "Cannot connect with your own company",
            Self::DuplicateConnection => "A connection already exists with this company",
            Self::AlreadyResponded => "This connection request was already answered",
            Self::InvalidContent { .. } => "Request content is invalid",
            Self::RecipientNotFound => "Recipient not found",
            Self::Unauthorized => "Authentication required",
            Self::Internal => "Internal server error",
        }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Unauthorized => record_auth_failure("unauthorized"),
            Self::Forbidden => record_auth_failure("forbidden"),
            _ => {}
        }

        let field = match self {
            Self::InvalidContent { field } => Some(field),
            _ => None,
        };
        (
            self.status(),
            Json(ErrorBody {
                error: self.code(),
                message: self.message(),
                field,
            }),
        )
            .into_response()
    }
}

/// Logs a storage failure and collapses it into an opaque 500.
pub(crate) fn storage_failure(error: sqlx::Error) -> ApiFailure {
    tracing::error!(event = "persistence.query.failed", error = %error);
    ApiFailure::Internal
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .init();
}
