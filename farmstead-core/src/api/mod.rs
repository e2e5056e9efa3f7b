//! REST API client.
//!
//! Requests carry the `X-API-Key` header and JSON bodies; responses are
//! mapped to [`NetworkError`] on any failure.

mod client;
pub mod endpoints;
mod error;

pub use client::{ApiClient, ApiResponse, API_KEY_HEADER};
pub use endpoints::paths;
pub use error::{BoxError, NetworkError};
