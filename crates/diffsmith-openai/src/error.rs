//! Chat client errors

use diffsmith_core::TransportError;

/// Errors raised by [`OpenAiChatClient`](crate::OpenAiChatClient)
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// API key variable is unset or empty
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    /// Request could not be sent or the body could not be read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Service answered without any message content
    #[error("response contained no message content")]
    EmptyResponse,
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(ref e) if e.is_decode() => Self::InvalidResponse(err.to_string()),
            ClientError::Http(_) | ClientError::MissingApiKey(_) => Self::Connection(err.to_string()),
            ClientError::Api { .. } => Self::Service(err.to_string()),
            ClientError::EmptyResponse => Self::InvalidResponse(err.to_string()),
        }
    }
}
