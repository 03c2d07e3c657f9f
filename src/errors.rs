use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed, unknown, or expired credential. Always reported with the
    /// same message so callers cannot distinguish which reason applied.
    #[error("invalid or expired credential")]
    InvalidCredential,

    #[error("client reached request limit")]
    QuotaExceeded,

    #[error("operation deadline exceeded")]
    Timeout,

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_credential",
                // Fixed text; never echoes why the credential was rejected.
                "invalid or expired credential".to_string(),
            ),
            AppError::QuotaExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "quota_exceeded",
                "client reached request limit".to_string(),
            ),
            AppError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout_error",
                "deadline_exceeded",
                "operation deadline exceeded".to_string(),
            ),
            AppError::Unavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable_error",
                "dependency_unavailable",
                detail.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        if matches!(self, AppError::QuotaExceeded) {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("1"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credential_maps_to_401_without_detail() {
        let resp = AppError::InvalidCredential.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn quota_exceeded_maps_to_429_with_retry_after() {
        let resp = AppError::QuotaExceeded.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("retry-after"));
    }

    #[test]
    fn timeout_and_unavailable_statuses() {
        assert_eq!(
            AppError::Timeout.into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Unavailable("cache down".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_errors_do_not_echo_diagnostics() {
        let resp = AppError::Internal(anyhow::anyhow!("pool exhausted at 10.0.0.3"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
