//! Error types for Market API.
//!
//! Every failure leaves the API as the envelope
//! `{"Status": false, "Errors": <string | {field: [messages]}>}`.
//!
//! | Error                        | Status |
//! |------------------------------|--------|
//! | Argument, Validation         | 400    |
//! | missing / unknown token      | 401    |
//! | buyer on a supplier endpoint | 403    |
//! | NotFound                     | 404    |
//! | Precondition, Uniqueness     | 409    |
//! | Network                      | 502    |
//! | anything else                | 500    |

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use market_core::{CoreError, ValidationError};
use market_db::DbError;
use serde_json::{json, Value};
use tracing::error;

/// Market API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("Only shops may use this endpoint")]
    Forbidden,

    #[error("Validation failed")]
    Fields(Vec<ValidationError>),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(DbError),
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Domain(core) => ApiError::Core(core),
            other => ApiError::Database(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::Core(CoreError::Validation(error))
    }
}

impl From<Vec<ValidationError>> for ApiError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ApiError::Fields(errors)
    }
}

/// Groups validation failures by field: `{field: [message, ...]}`.
fn field_errors<'a>(errors: impl IntoIterator<Item = &'a ValidationError>) -> Value {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for error in errors {
        fields
            .entry(error.field().to_string())
            .or_default()
            .push(error.to_string());
    }
    json!(fields)
}

impl ApiError {
    /// HTTP status and `Errors` body for this error.
    fn parts(&self) -> (StatusCode, Value) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, json!(self.to_string())),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, json!(self.to_string())),
            ApiError::Fields(errors) => (StatusCode::BAD_REQUEST, field_errors(errors)),
            ApiError::Core(core) => match core {
                CoreError::Validation(v) => {
                    (StatusCode::BAD_REQUEST, field_errors(std::iter::once(v)))
                }
                CoreError::Argument(_) => (StatusCode::BAD_REQUEST, json!(core.to_string())),
                CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, json!(core.to_string())),
                CoreError::Precondition(_) | CoreError::Uniqueness { .. } => {
                    (StatusCode::CONFLICT, json!(core.to_string()))
                }
                CoreError::Network(_) => (StatusCode::BAD_GATEWAY, json!(core.to_string())),
            },
            ApiError::Database(db) => match db {
                DbError::NotFound { .. } => (StatusCode::NOT_FOUND, json!(db.to_string())),
                DbError::UniqueViolation { .. } => (StatusCode::CONFLICT, json!(db.to_string())),
                _ => {
                    error!(error = %db, "Database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!("Internal server error"),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errors) = self.parts();
        (status, Json(json!({ "Status": false, "Errors": errors }))).into_response()
    }
}
