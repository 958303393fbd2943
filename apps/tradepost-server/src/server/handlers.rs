use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::Query,
    Json,
};

pub(crate) mod companies;
pub(crate) mod connections;
pub(crate) mod messages;

use super::errors::ApiFailure;

/// Malformed or mistyped bodies surface as a content error on `body`.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiFailure> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| ApiFailure::InvalidContent { field: "body" })
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiFailure> {
    query
        .map(|Query(value)| value)
        .map_err(|_| ApiFailure::InvalidContent { field: "query" })
}
