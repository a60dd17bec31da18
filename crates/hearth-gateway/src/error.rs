use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or invalid session. Rejected outright.
    #[error("not authenticated")]
    Unauthenticated,

    /// A required field is missing or empty.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Acting identity does not own the resource.
    #[error("not authorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store failure: {0}")]
    StoreFailure(#[from] anyhow::Error),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Unauthenticated => "not_authenticated",
            ChatError::InvalidInput(_) => "invalid_input",
            ChatError::Unauthorized => "unauthorized",
            ChatError::Conflict(_) => "conflict",
            ChatError::StoreFailure(_) => "store_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::Unauthorized => StatusCode::FORBIDDEN,
            ChatError::Conflict(_) => StatusCode::CONFLICT,
            ChatError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        if let ChatError::StoreFailure(e) = &self {
            tracing::error!("Store failure: {:#}", e);
        }
        let body = serde_json::json!({ "error": self.code() });
        (self.status(), Json(body)).into_response()
    }
}
