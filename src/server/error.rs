//! JSON error envelope for HTTP responses
//!
//! Every failure, whether from a lookup, a malformed query string or an
//! unknown route, reaches the client as the same structured object:
//!
//! ```text
//! {"code": "upstream_unavailable", "message": "...", "details": {...}}
//! ```

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::service::LookupError;

/// Error returned by HTTP handlers
#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    /// 400 for a missing or unusable request parameter
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// 404 for unknown routes
    pub fn not_found(path: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no route for {}", path),
        )
    }

    /// 405 for known routes called with the wrong method
    pub fn method_not_allowed(method: &str) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            format!("method {} is not allowed here", method),
        )
    }

    /// 502 when no upstream or cached data could be produced
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "upstream_unavailable", message)
    }

    /// Attaches structured details for clients
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(self)
    }
}

impl From<LookupError> for ApiError {
    fn from(error: LookupError) -> Self {
        match &error {
            LookupError::InvalidRequest(message) => ApiError::invalid_request(message.clone()),
            LookupError::UpstreamUnavailable {
                region,
                candidates,
                last_error,
            } => ApiError::upstream_unavailable(error.to_string()).with_details(json!({
                "stage": "upstream",
                "region": region.as_str(),
                "candidates": candidates.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                "lastError": last_error,
            })),
        }
    }
}

/// Convenience alias for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;
