//! Network client error types.

use thiserror::Error;

/// Boxed underlying cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every way an API call can fail.
///
/// JSON parse failures are deliberately not a variant of their own: they
/// surface as [`NetworkError::Network`] wrapping the parser error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to encode request body: {0}")]
    RequestEncoding(String),

    #[error("Server returned status {0}")]
    BadStatusCode(u16),

    #[error("Failed to decode response body: {0}")]
    ResponseDecoding(String),

    #[error("Server returned no content")]
    NoContent,

    #[error("Network error: {0}")]
    Network(#[source] BoxError),
}

impl NetworkError {
    /// Wraps any error as a transport failure.
    pub fn network<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        NetworkError::Network(Box::new(err))
    }

    /// HTTP status carried by a [`NetworkError::BadStatusCode`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetworkError::BadStatusCode(code) => Some(*code),
            _ => None,
        }
    }
}
