//! Response envelope and error-to-status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::error::ServiceError;

const NOT_FOUND_MESSAGE: &str = "The requested record was not found";
const UPSTREAM_MESSAGE: &str = "Something went wrong on our side, please try again later";

/// Every JSON response is `{success, message, ...data}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Malformed request the workflows never saw (bad JSON, bad query).
    BadRequest(String),
    Unauthorized,
    Forbidden,
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotAdmin => Self::Forbidden,
            AuthError::MissingToken | AuthError::InvalidToken(_) => Self::Unauthorized,
        }
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Service(ServiceError::Validation(msg)) | Self::BadRequest(msg) => {
                failure(StatusCode::BAD_REQUEST, &msg)
            }
            Self::Service(ServiceError::DuplicateEntry { position }) => (
                StatusCode::CONFLICT,
                Json(json!({
                    "success": false,
                    "message": format!("You're already on the waitlist at position #{position}"),
                    "position": position,
                })),
            )
                .into_response(),
            Self::Service(ServiceError::NotFound(detail)) => {
                warn!(%detail, "Record not found");
                failure(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
            }
            Self::Service(ServiceError::Upstream(detail)) => {
                error!(%detail, "Request failed upstream");
                failure(StatusCode::SERVICE_UNAVAILABLE, UPSTREAM_MESSAGE)
            }
            Self::Unauthorized => failure(StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::Forbidden => failure(StatusCode::FORBIDDEN, "Admin access required"),
        }
    }
}
