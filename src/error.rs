use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;
use crate::store::blob::BlobError;

/// Stable codes shown to callers, independent of any collaborator's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    OrderNotFound,
    AgentNotFound,
    ProfileNotFound,
    AgentNotAvailable,
    OrderNotPending,
    InvalidTransition,
    BadRequest,
    Conflict,
    AccessDenied,
    StoreUnavailable,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::ProfileNotFound => "PROFILE_NOT_FOUND",
            Self::AgentNotAvailable => "AGENT_NOT_AVAILABLE",
            Self::OrderNotPending => "ORDER_NOT_PENDING",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::BadRequest => "BAD_REQUEST",
            Self::Conflict => "CONFLICT",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::OrderNotFound => "Requested order not found.",
            Self::AgentNotFound => "Requested delivery agent not found.",
            Self::ProfileNotFound => "Requested profile not found.",
            Self::AgentNotAvailable => "This delivery agent is not available right now.",
            Self::OrderNotPending => "This order can no longer be assigned.",
            Self::InvalidTransition => "That status change is not allowed.",
            Self::BadRequest => "The request was invalid.",
            Self::Conflict => "The record was changed by someone else. Please try again.",
            Self::AccessDenied => "Access denied. You do not have the required permissions.",
            Self::StoreUnavailable => "Service temporarily unavailable. Please try again later.",
            Self::Internal => "An unexpected error occurred. Please try again later.",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::OrderNotFound | Self::AgentNotFound | Self::ProfileNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::AgentNotAvailable | Self::OrderNotPending | Self::Conflict => {
                StatusCode::CONFLICT
            }
            Self::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("agent {0} not found")]
    AgentNotFound(Uuid),

    #[error("profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("agent {agent_id} not available: {reason}")]
    AgentNotAvailable { agent_id: Uuid, reason: String },

    #[error("order {order_id} is {status}, expected PENDING")]
    OrderNotPending { order_id: Uuid, status: String },

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            AppError::AgentNotFound(_) => ErrorCode::AgentNotFound,
            AppError::ProfileNotFound(_) => ErrorCode::ProfileNotFound,
            AppError::AgentNotAvailable { .. } => ErrorCode::AgentNotAvailable,
            AppError::OrderNotPending { .. } => ErrorCode::OrderNotPending,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::AccessDenied(_) => ErrorCode::AccessDenied,
            AppError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.code().user_message()
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        AppError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(sanitize(&msg)),
            StoreError::PermissionDenied(msg) => AppError::AccessDenied(sanitize(&msg)),
            StoreError::VersionConflict {
                id,
                expected,
                actual,
            } => AppError::Conflict(format!(
                "document {id} at version {actual}, expected {expected}"
            )),
            StoreError::NotFound(id) => AppError::Internal(format!("document {id} vanished")),
            StoreError::AlreadyExists(id) => {
                AppError::Conflict(format!("document {id} already exists"))
            }
        }
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Unauthorized(msg) => AppError::AccessDenied(sanitize(&msg)),
            BlobError::Unavailable(msg) => AppError::StoreUnavailable(sanitize(&msg)),
        }
    }
}

/// Strips a leading `[code]` tag that collaborators prepend to their messages.
fn sanitize(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.find(']') {
            return trimmed[end + 1..].trim().to_string();
        }
    }
    trimmed.to_string()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code == ErrorCode::Internal || code == ErrorCode::StoreUnavailable {
            tracing::error!(error = %self, code = code.as_str(), "request failed");
        }

        let body = Json(json!({
            "code": code.as_str(),
            "message": code.user_message(),
            "detail": self.to_string(),
        }));

        (code.status(), body).into_response()
    }
}
