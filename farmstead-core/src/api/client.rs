//! HTTP client for the Farmstead REST API.
//!
//! Every call is attempted exactly once and returns a `Result`; nothing is
//! retried at this layer.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::NetworkError;
use crate::models::{Camera, Device, Farm, Owner, SensorReading, Silo, Weather};

/// Header carrying the client API key on every request.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Expected shape of a response body.
///
/// A raw `String` accepts an empty body as `""`. Every JSON shape treats an
/// empty body as [`NetworkError::NoContent`].
pub trait ApiResponse: Sized {
    fn from_body(body: String) -> Result<Self, NetworkError>;
}

impl ApiResponse for String {
    fn from_body(body: String) -> Result<Self, NetworkError> {
        Ok(body)
    }
}

impl ApiResponse for serde_json::Value {
    fn from_body(body: String) -> Result<Self, NetworkError> {
        decode_json(body)
    }
}

impl<T: DeserializeOwned> ApiResponse for Vec<T> {
    fn from_body(body: String) -> Result<Self, NetworkError> {
        decode_json(body)
    }
}

macro_rules! json_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ApiResponse for $ty {
                fn from_body(body: String) -> Result<Self, NetworkError> {
                    decode_json(body)
                }
            }
        )*
    };
}

json_response!(Owner, Farm, Device, SensorReading, Silo, Camera, Weather);

fn decode_json<T: DeserializeOwned>(body: String) -> Result<T, NetworkError> {
    if body.trim().is_empty() {
        return Err(NetworkError::NoContent);
    }
    serde_json::from_str(&body).map_err(NetworkError::network)
}

/// Stateless REST client bound to one base URL and API key.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a GET request with optional query parameters.
    pub async fn get<R: ApiResponse>(
        &self,
        path: &str,
        query: Option<&[(&str, String)]>,
    ) -> Result<R, NetworkError> {
        let url = self.url(path)?;
        debug!(method = "GET", %url, "API request");
        let mut request = self.http.get(url);
        if let Some(params) = query {
            request = request.query(params);
        }
        R::from_body(self.send(request).await?)
    }

    /// Sends a POST request with a JSON body.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, NetworkError>
    where
        B: Serialize + ?Sized,
        R: ApiResponse,
    {
        let url = self.url(path)?;
        debug!(method = "POST", %url, "API request");
        let request = self.http.post(url);
        R::from_body(self.send(with_json(request, body)?).await?)
    }

    /// Sends a PUT request with a JSON body.
    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R, NetworkError>
    where
        B: Serialize + ?Sized,
        R: ApiResponse,
    {
        let url = self.url(path)?;
        debug!(method = "PUT", %url, "API request");
        let request = self.http.put(url);
        R::from_body(self.send(with_json(request, body)?).await?)
    }

    /// Sends a DELETE request. Any response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), NetworkError> {
        let url = self.url(path)?;
        debug!(method = "DELETE", %url, "API request");
        self.send(self.http.delete(url)).await.map(|_| ())
    }

    /// Joins `path` onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, NetworkError> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", joined, e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, NetworkError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(NetworkError::network)?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "API request failed");
            return Err(NetworkError::BadStatusCode(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(NetworkError::network)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| NetworkError::ResponseDecoding(e.to_string()))
    }
}

fn with_json<B: Serialize + ?Sized>(
    request: RequestBuilder,
    body: &B,
) -> Result<RequestBuilder, NetworkError> {
    let encoded =
        serde_json::to_vec(body).map_err(|e| NetworkError::RequestEncoding(e.to_string()))?;
    Ok(request.header(CONTENT_TYPE, "application/json").body(encoded))
}
