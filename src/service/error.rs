//! Error types for the remote job service client

use thiserror::Error;

/// Result type alias for remote service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can occur when talking to the remote job service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error on {method} {endpoint} (status {status}): {message}; request body: {request}")]
    ApiError {
        method: String,
        endpoint: String,
        /// Request body that was sent, or empty
        request: String,
        status: u16,
        /// Response body returned by the API
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Failed to parse response from {endpoint}: {message}")]
    ParseError { endpoint: String, message: String },
}

impl ServiceError {
    pub fn parse_error(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}
