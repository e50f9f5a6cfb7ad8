//! Transport-level error envelope for Roster
//!
//! Domain crates keep their own error enums and render them through
//! [`error_response`] so every failure leaves the server in the same shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that are not owned by any domain: malformed requests, storage
/// outages surfaced outside a domain service
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::Database(_) | Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// `{"error": {"code": "...", "message": "..."}}`
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = Json(json!({
        "error": {
            "code": code,
            "message": message,
        }
    }));

    (status, body).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal server error");
            return error_response(status, self.error_code(), "Internal server error");
        }

        error_response(status, self.error_code(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_and_code_pairs() {
        let cases = [
            (Error::Validation("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (Error::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status);
            assert_eq!(error.error_code(), code);
        }
    }

    #[tokio::test]
    async fn test_validation_message_reaches_client() {
        let json = body_json(Error::Validation("contacts: too many".into()).into_response()).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["message"], "Validation error: contacts: too many");
    }

    #[tokio::test]
    async fn test_internal_error_response_hides_details() {
        let response = Error::Internal("connection string leaked".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Internal server error");
    }
}
