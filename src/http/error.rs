use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::room::RoomError;

impl RoomError {
    pub fn status(&self) -> StatusCode {
        match self {
            RoomError::Unauthenticated | RoomError::Unauthorized => StatusCode::UNAUTHORIZED,
            RoomError::InvalidArgument(_) | RoomError::LimitExceeded { .. } => {
                StatusCode::BAD_REQUEST
            }
            RoomError::Conflict => StatusCode::CONFLICT,
            RoomError::NotFound => StatusCode::NOT_FOUND,
            RoomError::Expired => StatusCode::GONE,
            RoomError::Exhausted { .. } | RoomError::StoreUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let message = match &self {
            RoomError::Exhausted { .. } => "internal server error".to_string(),
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": self.kind(),
            "message": message,
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for RoomError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        RoomError::InvalidArgument(rejection.body_text())
    }
}
