use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Provider error: HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Provider response contained no redirect URL")]
    MissingRedirectUrl,

    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },
}

impl From<GatewayError> for crate::error::AppError {
    fn from(err: GatewayError) -> Self {
        use crate::error::AppError;

        match err {
            GatewayError::MissingRedirectUrl => AppError::MissingRedirectUrl,
            GatewayError::Network { message } => AppError::UpstreamRequestFailed(message),
            GatewayError::Upstream { status, body } => {
                AppError::UpstreamRequestFailed(format!("HTTP {}: {}", status, body))
            }
            GatewayError::InvalidResponse { message } => AppError::UpstreamRequestFailed(message),
        }
    }
}
