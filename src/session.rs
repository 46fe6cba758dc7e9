use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::store::{StoreError, TokenStore};
use crate::transport::{ApiTransport, TransportError};
use crate::types::{ApiRequest, ApiResponse, Credentials, TokenPair, TokenResponse};

const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const LOGOUT_PATH: &str = "auth/logout";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("secure storage unavailable")]
    Storage(#[from] StoreError),
    #[error("session expired")]
    SessionExpired,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => ApiError::Network(message),
            TransportError::RefreshRejected => ApiError::SessionExpired,
        }
    }
}

/// Shared API client for the view layer. Every call carries the stored
/// access token; an unauthorized response is recovered exactly once per call
/// through the refresh coordinator before it surfaces as `SessionExpired`.
pub struct SessionClient {
    transport: Arc<dyn ApiTransport>,
    store: Arc<dyn TokenStore>,
    refresh: RefreshCoordinator,
}

impl SessionClient {
    pub fn new(transport: Arc<dyn ApiTransport>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            store,
            refresh: RefreshCoordinator::new(),
        }
    }

    pub async fn request(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let res = self.dispatch(&req).await?;
        if res.status != StatusCode::UNAUTHORIZED {
            return Ok(res);
        }

        match self
            .refresh
            .run(self.store.as_ref(), self.transport.as_ref())
            .await
        {
            RefreshOutcome::Refreshed => {}
            RefreshOutcome::Failed => return Err(ApiError::SessionExpired),
        }

        // Second and final attempt, now with the refreshed token.
        let res = self.dispatch(&req).await?;
        if res.status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }
        Ok(res)
    }

    async fn dispatch(&self, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let pair = self.store.load().await?;
        let bearer = pair.as_ref().map(|p| p.access_token.as_str());
        Ok(self.transport.dispatch(req, bearer).await?)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::new(Method::POST, path).json(serde_json::to_value(body)?))
            .await
    }

    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::new(Method::PUT, path).json(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(ApiRequest::new(Method::DELETE, path)).await
    }

    /// Exchanges credentials for a token pair. The pair is persisted only on
    /// a success status; the response is returned either way so the caller
    /// can surface the server's rejection.
    pub async fn login(&self, credentials: &Credentials) -> Result<ApiResponse, ApiError> {
        let req =
            ApiRequest::new(Method::POST, LOGIN_PATH).json(serde_json::to_value(credentials)?);
        let res = self.request(req).await?;

        if res.is_success() {
            let tokens: TokenResponse = res.json()?;
            self.store
                .save(&TokenPair::new(tokens.access_token, tokens.refresh_token))
                .await?;
        }
        Ok(res)
    }

    /// Registration issues no tokens; the payload shape belongs to the
    /// caller.
    pub async fn register<T: Serialize>(&self, payload: &T) -> Result<ApiResponse, ApiError> {
        self.post(REGISTER_PATH, payload).await
    }

    /// Revokes the refresh token server-side when one is held, then clears
    /// the store unconditionally.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Ok(Some(pair)) = self.store.load().await {
            let req = ApiRequest::new(Method::POST, LOGOUT_PATH)
                .json(json!({ "refreshToken": pair.refresh_token }));
            if let Err(err) = self.request(req).await {
                debug!("logout revocation failed: {err}");
            }
        }
        self.store.clear().await?;
        Ok(())
    }
}
