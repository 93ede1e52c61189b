//! HTTP client and progress channel for the Uplink API.
//!
//! Provides the batch submission client with configurable auth (Bearer token or
//! X-API-Key), the WebSocket progress channel with reconnect backoff, and a
//! [`session::BatchSession`] that wires submission, subscription, and reduction
//! together. The CLI uses these types directly.

pub mod api;
pub mod progress;
pub mod session;

use reqwest::Client;
use serde::de::DeserializeOwned;
use uplink_core::validation::truncate_string;
use uplink_core::{AuthScheme, ClientConfig, UploadError, UploadOptions};

/// Longest error body kept in a rejection error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Authentication strategy for the API and the progress channel.
#[derive(Clone, Debug, Default)]
pub enum Auth {
    /// No credentials are sent.
    #[default]
    None,
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

impl Auth {
    pub fn from_config(config: &ClientConfig) -> Self {
        match (&config.api_key, config.auth_scheme) {
            (None, _) => Auth::None,
            (Some(key), AuthScheme::ApiKey) => Auth::XApiKey(key.clone()),
            (Some(key), AuthScheme::Bearer) => Auth::Bearer(key.clone()),
        }
    }

    /// Header name and value, if any.
    pub fn header(&self) -> Option<(&'static str, String)> {
        match self {
            Auth::None => None,
            Auth::Bearer(token) => Some(("Authorization", format!("Bearer {}", token))),
            Auth::XApiKey(key) => Some(("X-API-Key", key.clone())),
        }
    }
}

/// HTTP client for the Uplink API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    auth: Auth,
    options: UploadOptions,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_prefix: config.api_prefix(),
            auth: Auth::from_config(config),
            options: config.upload_options.clone(),
        })
    }

    /// Create client from environment (see [`ClientConfig::from_env`]).
    pub fn from_env() -> Result<Self, UploadError> {
        Self::new(&ClientConfig::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    pub fn upload_options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.header() {
            Some((name, value)) => request.header(name, value),
            None => request,
        }
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UploadError> {
        let url = self.build_url(path);
        let mut request = self.apply_auth(self.client.get(&url));

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(UploadError::submission_transport)?;

        Self::read_json(response).await
    }

    /// POST multipart form and deserialize response. Exactly one request is sent.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, UploadError> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).multipart(form));

        let response = request
            .send()
            .await
            .map_err(UploadError::submission_transport)?;

        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UploadError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadError::SubmissionRejected {
                status: status.as_u16(),
                body: truncate_string(&error_text, MAX_ERROR_BODY_CHARS),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(UploadError::submission_transport)?;

        serde_json::from_slice(&body).map_err(|e| {
            UploadError::InvalidResponse(format!("Failed to parse response as JSON: {}", e))
        })
    }

    /// Raw client for custom requests. Caller must apply auth via build_url and headers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

pub use progress::{
    ConnectionState, ProgressChannel, ProgressConnection, ProgressSubscription, ProgressTransport,
    WebSocketTransport,
};
pub use session::BatchSession;
