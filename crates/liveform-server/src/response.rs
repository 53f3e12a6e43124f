// File: src/response.rs
// Purpose: JSON replies of the validation endpoint

use crate::registry::ResolveError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use liveform_rules::FieldErrors;
use serde::Serialize;
use serde_json::json;

/// `{ "error": ... }` with a status, for setup faults.
#[derive(Debug)]
pub struct ErrorResponse {
    status: StatusCode,
    message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });

        (self.status, body).into_response()
    }
}

impl From<ResolveError> for ErrorResponse {
    fn from(err: ResolveError) -> Self {
        ErrorResponse::bad_request(err.to_string())
    }
}

/// Verdict of one validation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationReply {
    /// 200 `{ "valid": true }`
    Valid,
    /// 422 with the messages of the requested field.
    FieldInvalid(Vec<String>),
    /// 422 with messages for every failing field.
    FormInvalid(FieldErrors),
}

impl IntoResponse for ValidationReply {
    fn into_response(self) -> Response {
        match self {
            ValidationReply::Valid => (StatusCode::OK, Json(json!({ "valid": true }))).into_response(),
            ValidationReply::FieldInvalid(messages) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "valid": false, "errors": messages })),
            )
                .into_response(),
            ValidationReply::FormInvalid(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "valid": false, "errors": errors })),
            )
                .into_response(),
        }
    }
}
