//! Unified error handling for the kasirka backend
//!
//! Maps every failure in the callback/checkout/reconciliation pipeline to an
//! HTTP status, a machine-readable code and a user-facing message that leaks
//! no internal detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Callback payload is not decodable or too short to carry nonce + tag.
    #[error("malformed callback payload: {0}")]
    MalformedPayload(String),

    /// No key candidate produced an authenticated plaintext.
    #[error("callback payload failed authenticated decryption")]
    DecryptionFailed,

    #[error("checkout session {0} not found")]
    SessionNotFound(String),

    /// Channel missing from the request or not in the eligible set.
    #[error("invalid channel selection: {0}")]
    InvalidSelection(String),

    #[error("no payment channels available for this amount")]
    NoChannelsAvailable,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Non-2xx from the provider or a network-level failure.
    #[error("provider request failed: {0}")]
    UpstreamRequestFailed(String),

    /// Provider accepted the invoice but its response carried no redirect URL.
    #[error("provider response contained no redirect URL")]
    MissingRedirectUrl,

    #[error("invalid webhook payload: {0}")]
    InvalidWebhookPayload(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password reset token is invalid or expired")]
    TokenInvalid,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable error codes for client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedPayload,
    DecryptionFailed,
    SessionNotFound,
    InvalidSelection,
    NoChannelsAvailable,
    InvalidAmount,
    UpstreamRequestFailed,
    MissingRedirectUrl,
    InvalidWebhookPayload,
    PersistenceFailure,
    InvalidCredentials,
    TokenInvalid,
    InternalError,
}

impl AppError {
    /// Map error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::DecryptionFailed => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidSelection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoChannelsAvailable => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamRequestFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingRedirectUrl => StatusCode::BAD_GATEWAY,
            AppError::InvalidWebhookPayload(_) => StatusCode::BAD_REQUEST,
            AppError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::TokenInvalid => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::MalformedPayload(_) => ErrorCode::MalformedPayload,
            AppError::DecryptionFailed => ErrorCode::DecryptionFailed,
            AppError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            AppError::InvalidSelection(_) => ErrorCode::InvalidSelection,
            AppError::NoChannelsAvailable => ErrorCode::NoChannelsAvailable,
            AppError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            AppError::UpstreamRequestFailed(_) => ErrorCode::UpstreamRequestFailed,
            AppError::MissingRedirectUrl => ErrorCode::MissingRedirectUrl,
            AppError::InvalidWebhookPayload(_) => ErrorCode::InvalidWebhookPayload,
            AppError::PersistenceFailure(_) => ErrorCode::PersistenceFailure,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::TokenInvalid => ErrorCode::TokenInvalid,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// User-facing message. Decryption and persistence details never leak.
    pub fn user_message(&self) -> String {
        match self {
            AppError::MalformedPayload(_) | AppError::DecryptionFailed => {
                "The request could not be processed".to_string()
            }
            AppError::SessionNotFound(_) => "Checkout session not found".to_string(),
            AppError::InvalidSelection(_) => {
                "The chosen payment channel is not available for this payment".to_string()
            }
            AppError::NoChannelsAvailable => {
                "No payment channels are available for this amount".to_string()
            }
            AppError::InvalidAmount(_) => "The payment amount is invalid".to_string(),
            AppError::UpstreamRequestFailed(_) => {
                "The payment provider could not be reached. Please try again".to_string()
            }
            AppError::MissingRedirectUrl => {
                "The payment provider returned an unexpected response".to_string()
            }
            AppError::InvalidWebhookPayload(_) => "invalid payload".to_string(),
            AppError::PersistenceFailure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::TokenInvalid => {
                "This password reset link is invalid or has expired".to_string()
            }
            AppError::Internal(_) => {
                "An internal error occurred. Please try again later".to_string()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}

/// Standardized error response structure returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    pub message: String,
    /// ISO 8601 timestamp of the error
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::from_app_error(&self))).into_response()
    }
}
