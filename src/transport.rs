use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::redact::redact_secrets;
use crate::types::{ApiRequest, ApiResponse, TokenPair, TokenResponse};

const REFRESH_PATH: &str = "auth/refresh";

const DEFAULT_TIMEOUT_SECONDS: u64 = 40;
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("refresh rejected")]
    RefreshRejected,
}

/// The wire boundary to the remote API: plain request dispatch plus the
/// refresh exchange. Session tests substitute this seam.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn dispatch(
        &self,
        req: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECONDS,
        }
    }
}

fn build_headers(bearer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(token) = bearer {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, value);
        }
    }
    headers
}

fn network_error(err: reqwest::Error) -> TransportError {
    TransportError::Network(redact_secrets(&err.to_string()).into_owned())
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_config(TransportConfig {
            base_url: base_url.into(),
            ..TransportConfig::default()
        })
    }

    pub fn with_config(config: TransportConfig) -> Result<Self, TransportError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
                .build()
                .map_err(network_error)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn dispatch(
        &self,
        req: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .http
            .request(req.method.clone(), self.url(&req.path))
            .headers(build_headers(bearer));
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let res = builder.send().await.map_err(network_error)?;
        let status = res.status();
        let body = res.bytes().await.map_err(network_error)?.to_vec();
        Ok(ApiResponse { status, body })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError> {
        let res = self
            .http
            .post(self.url(REFRESH_PATH))
            .headers(build_headers(None))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(network_error)?;

        if !res.status().is_success() {
            return Err(TransportError::RefreshRejected);
        }

        let tokens: TokenResponse = res.json().await.map_err(network_error)?;
        Ok(TokenPair {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}
