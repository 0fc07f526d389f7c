use callback_server::CallbackServerError;
use thiserror::Error;
use wemo_api::ApiError;

/// Errors returned by the SDK controller and endpoint handles
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Callback server error: {0}")]
    CallbackServer(#[from] CallbackServerError),

    #[error("Invalid device location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Endpoint {0} has no callback URL; events cannot be subscribed")]
    NoCallbackUrl(String),

    #[error("No tokio runtime available: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;
