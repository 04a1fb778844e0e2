use super::auth::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use provenance_store::StoreError;

/// Request failure mapped to a status code and `{"error": ...}` body
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Validation(String),
    Core(provenance_core::Error),
    Store(StoreError),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    fn status_and_message(self) -> (StatusCode, String) {
        use provenance_core::Error as CoreError;

        match self {
            ApiError::Auth(AuthError::Forbidden) => {
                (StatusCode::FORBIDDEN, AuthError::Forbidden.to_string())
            }
            ApiError::Auth(e @ AuthError::Unavailable(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Auth(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Core(e @ (CoreError::Decode(_) | CoreError::InsufficientData(_))) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Core(e @ CoreError::ModelNotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Core(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Store(e @ StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Store(e @ (StoreError::Validation(_) | StoreError::Archive(_))) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            log::error!("Request failed: {}", message);
        } else {
            log::debug!("Request rejected ({}): {}", status, message);
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<provenance_core::Error> for ApiError {
    fn from(e: provenance_core::Error) -> Self {
        ApiError::Core(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {}", e))
    }
}
