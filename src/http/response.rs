use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::DashboardError;

/// Browser redirect for page loads: `302 Found` with a `Location` header.
///
/// A permanent redirect uses `308` so the method is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRedirect {
    pub location: String,
    pub permanent: bool,
}

impl PageRedirect {
    pub fn found(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            permanent: false,
        }
    }
}

impl IntoResponse for PageRedirect {
    fn into_response(self) -> Response {
        let status = if self.permanent {
            StatusCode::PERMANENT_REDIRECT
        } else {
            StatusCode::FOUND
        };

        match HeaderValue::from_str(&self.location) {
            Ok(location) => (status, [(header::LOCATION, location)]).into_response(),
            Err(_) => {
                tracing::warn!(
                    location = %self.location,
                    "Invalid Location header value in PageRedirect"
                );
                DashboardError::internal("Invalid redirect location").into_response()
            }
        }
    }
}

/// Where a JSON client should navigate next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectBody {
    pub redirect: String,
}

/// User-facing failure message with a chosen status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub status: StatusCode,
    pub error: String,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    error: &'a str,
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        (self.status, Json(MessageBody { error: &self.error })).into_response()
    }
}

/// Convenience type alias for JSON responses
pub type JsonResponse<T> = Result<Json<T>, DashboardError>;
