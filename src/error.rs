use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for the billing dashboard
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout")]
    RequestTimeout,

    /// The payment processor rejected or failed a request.
    #[error("Payment backend error: {0}")]
    PaymentBackend(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(String),
}

/// Error body returned to API clients.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl DashboardError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn payment_backend(msg: impl Into<String>) -> Self {
        Self::PaymentBackend(msg.into())
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            #[cfg(feature = "database")]
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::PaymentBackend(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message suitable for client responses.
    ///
    /// Client errors (4xx) carry their message. Server errors return a generic
    /// message; the full error is logged server-side only (CWE-209). Payment
    /// backend errors count as server errors on every route, including the
    /// failure message of a checkout attempt.
    pub fn safe_message(&self) -> String {
        match self {
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::BadRequest(msg) => format!("Bad request: {}", msg),
            Self::Unauthorized(msg) => format!("Unauthorized: {}", msg),
            Self::Conflict(msg) => format!("Conflict: {}", msg),
            Self::RequestTimeout => "Request timeout".to_string(),

            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
            Self::PaymentBackend(_) => "Payment provider error".to_string(),

            #[cfg(feature = "database")]
            Self::Database(_) => "Database error".to_string(),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let body = ErrorResponse {
            error: self.safe_message(),
            error_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, DashboardError>;

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            DashboardError::BadRequest(format!("JSON error: {}", err))
        } else {
            DashboardError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DashboardError::RequestTimeout
        } else if err.is_connect() {
            DashboardError::ServiceUnavailable(format!("Connection error: {}", err))
        } else if err.is_status() {
            if let Some(status) = err.status() {
                match status.as_u16() {
                    401 => {
                        DashboardError::Unauthorized("Upstream authentication failed".to_string())
                    }
                    404 => DashboardError::NotFound("Upstream resource not found".to_string()),
                    503 => DashboardError::ServiceUnavailable(
                        "Upstream service unavailable".to_string(),
                    ),
                    _ => DashboardError::Internal(format!("Upstream error: {}", err)),
                }
            } else {
                DashboardError::Internal(format!("HTTP error: {}", err))
            }
        } else if err.is_decode() {
            DashboardError::Internal(format!("Invalid upstream response: {}", err))
        } else {
            DashboardError::Internal(format!("Request error: {}", err))
        }
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for DashboardError {
    fn from(err: sea_orm::DbErr) -> Self {
        match &err {
            sea_orm::DbErr::RecordNotFound(msg) => DashboardError::NotFound(if msg.is_empty() {
                "Record not found".to_string()
            } else {
                msg.clone()
            }),
            sea_orm::DbErr::Query(inner) => {
                DashboardError::Database(format!("Query error: {}", inner))
            }
            sea_orm::DbErr::Conn(inner) => {
                DashboardError::Database(format!("Connection error: {}", inner))
            }
            sea_orm::DbErr::Type(inner) => {
                DashboardError::Database(format!("Type error: {}", inner))
            }
            _ => DashboardError::Database(format!("Database error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = DashboardError::not_found("Tier not found");
        assert_eq!(err.to_string(), "Not found: Tier not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_error() {
        let err = DashboardError::conflict("Checkout already in progress");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.safe_message(), "Conflict: Checkout already in progress");
    }

    #[test]
    fn test_payment_backend_error_hides_details() {
        let err = DashboardError::payment_backend("card_declined: sk_live_abc");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.safe_message(), "Payment provider error");
        assert!(err.to_string().contains("card_declined"));
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = DashboardError::internal("connection string postgres://secret");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[test]
    fn test_anyhow_error() {
        let err: DashboardError = anyhow::anyhow!("Something unexpected").into();
        assert!(matches!(err, DashboardError::Anyhow(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_syntax_error_is_bad_request() {
        let err: DashboardError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, DashboardError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = DashboardError::bad_request("missing priceId").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Bad request: missing priceId");
        assert!(body["error_id"].is_string());
    }
}
