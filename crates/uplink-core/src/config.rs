//! Configuration module
//!
//! Client configuration for the submission endpoint, the progress channel,
//! the host-supplied upload options (quality values and feature-flag defaults),
//! and the reconnect policy. Host applications either build a [`ClientConfig`]
//! in code or load it from the environment with [`ClientConfig::from_env`].

use std::env;
use std::time::Duration;

use crate::backoff::{
    ReconnectPolicy, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_SECS,
};
use crate::error::UploadError;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_API_VERSION: &str = "v0";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_QUALITY_VALUES: &str = "low,medium,high,original";

/// How the API key is sent to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// `X-API-Key: {key}`
    #[default]
    ApiKey,
    /// `Authorization: Bearer {key}`
    Bearer,
}

impl std::str::FromStr for AuthScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api-key" | "api_key" | "apikey" | "x-api-key" => Ok(AuthScheme::ApiKey),
            "bearer" | "jwt" => Ok(AuthScheme::Bearer),
            _ => Err(anyhow::anyhow!("Invalid auth scheme: {}", s)),
        }
    }
}

/// Upload options supplied by the host application at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Accepted quality values, in display order.
    pub quality_values: Vec<String>,
    pub default_quality: String,
    pub default_transcription: bool,
    pub default_sync: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        let quality_values = parse_list(DEFAULT_QUALITY_VALUES);
        Self {
            default_quality: quality_values.first().cloned().unwrap_or_default(),
            quality_values,
            default_transcription: false,
            default_sync: false,
        }
    }
}

impl UploadOptions {
    pub fn allows_quality(&self, quality: &str) -> bool {
        self.quality_values.iter().any(|q| q == quality)
    }
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub ws_url: String,
    pub api_key: Option<String>,
    pub auth_scheme: AuthScheme,
    pub api_version: String,
    pub request_timeout_secs: u64,
    pub upload_options: UploadOptions,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_api_url(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Defaults pointed at `api_url`; the WebSocket URL is derived from it.
    pub fn for_api_url(api_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        Self {
            ws_url: derive_ws_url(&api_url),
            api_url,
            api_key: None,
            auth_scheme: AuthScheme::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            upload_options: UploadOptions::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// API path prefix (e.g. "/api/v0").
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn from_env() -> Result<Self, UploadError> {
        dotenvy::dotenv().ok();

        let api_url = env::var("UPLINK_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim_end_matches('/').to_string();

        let ws_url = env::var("UPLINK_WS_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| derive_ws_url(&api_url));

        let auth_scheme = match env::var("UPLINK_AUTH_SCHEME") {
            Ok(s) => s
                .parse()
                .map_err(|e: anyhow::Error| UploadError::Config(e.to_string()))?,
            Err(_) => AuthScheme::default(),
        };

        let quality_values = parse_list(
            &env::var("UPLINK_QUALITY_VALUES")
                .unwrap_or_else(|_| DEFAULT_QUALITY_VALUES.to_string()),
        );
        let default_quality = env::var("UPLINK_DEFAULT_QUALITY")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .or_else(|| quality_values.first().cloned())
            .unwrap_or_default();

        let config = ClientConfig {
            api_url,
            ws_url,
            api_key: env::var("UPLINK_API_KEY")
                .or_else(|_| env::var("API_KEY"))
                .ok()
                .filter(|s| !s.is_empty()),
            auth_scheme,
            api_version: env::var("UPLINK_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            request_timeout_secs: env::var("UPLINK_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            upload_options: UploadOptions {
                quality_values,
                default_quality,
                default_transcription: env::var("UPLINK_DEFAULT_TRANSCRIPTION")
                    .unwrap_or_else(|_| "false".to_string())
                    .to_lowercase()
                    .parse()
                    .unwrap_or(false),
                default_sync: env::var("UPLINK_DEFAULT_SYNC")
                    .unwrap_or_else(|_| "false".to_string())
                    .to_lowercase()
                    .parse()
                    .unwrap_or(false),
            },
            reconnect: ReconnectPolicy::new(
                Duration::from_millis(
                    env::var("UPLINK_RECONNECT_INITIAL_MS")
                        .unwrap_or_else(|_| DEFAULT_INITIAL_DELAY_MS.to_string())
                        .parse()
                        .unwrap_or(DEFAULT_INITIAL_DELAY_MS),
                ),
                Duration::from_secs(
                    env::var("UPLINK_RECONNECT_MAX_SECS")
                        .unwrap_or_else(|_| DEFAULT_MAX_DELAY_SECS.to_string())
                        .parse()
                        .unwrap_or(DEFAULT_MAX_DELAY_SECS),
                ),
                env::var("UPLINK_MAX_RECONNECT_ATTEMPTS")
                    .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        let api = url::Url::parse(&self.api_url)
            .map_err(|e| UploadError::Config(format!("UPLINK_API_URL is not a valid URL: {}", e)))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(UploadError::Config(
                "UPLINK_API_URL must use http or https".to_string(),
            ));
        }

        let ws = url::Url::parse(&self.ws_url)
            .map_err(|e| UploadError::Config(format!("UPLINK_WS_URL is not a valid URL: {}", e)))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(UploadError::Config(
                "UPLINK_WS_URL must use ws or wss".to_string(),
            ));
        }

        if self.upload_options.quality_values.is_empty() {
            return Err(UploadError::Config(
                "UPLINK_QUALITY_VALUES must list at least one value".to_string(),
            ));
        }

        if !self
            .upload_options
            .allows_quality(&self.upload_options.default_quality)
        {
            return Err(UploadError::Config(format!(
                "UPLINK_DEFAULT_QUALITY '{}' is not one of: {}",
                self.upload_options.default_quality,
                self.upload_options.quality_values.join(", ")
            )));
        }

        if self.reconnect.initial_delay.is_zero() {
            return Err(UploadError::Config(
                "UPLINK_RECONNECT_INITIAL_MS must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay < self.reconnect.initial_delay {
            return Err(UploadError::Config(
                "UPLINK_RECONNECT_MAX_SECS must not be below the initial delay".to_string(),
            ));
        }

        Ok(())
    }
}

/// `http://host:3000` becomes `ws://host:3000/ws`, `https://…` becomes `wss://…/ws`.
pub fn derive_ws_url(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let swapped = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws", swapped)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
