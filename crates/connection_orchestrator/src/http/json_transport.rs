use async_trait::async_trait;
use common::domain::{Credential, DomainError, DomainResult, RawPayload};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::http::PollingTransport;

pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Plain JSON-over-HTTP polling: `GET {url}` with an optional bearer token
/// taken from the credential's `access_token` key.
pub struct HttpJsonTransport {
    url: String,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl HttpJsonTransport {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DomainError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            http,
            token: RwLock::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PollingTransport for HttpJsonTransport {
    async fn authenticate(&self, credential: &Credential) -> DomainResult<()> {
        *self.token.write().await = credential
            .get(ACCESS_TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        Ok(())
    }

    async fn fetch(&self) -> DomainResult<RawPayload> {
        let mut request = self.http.get(&self.url);
        if let Some(token) = self.token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| DomainError::Transport(format!("GET {} failed: {}", self.url, e)))?
            .json::<Value>()
            .await
            .map_err(|e| DomainError::Transport(format!("invalid JSON from {}: {}", self.url, e)))
    }

    async fn close(&self) {
        *self.token.write().await = None;
    }
}
