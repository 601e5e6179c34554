use async_trait::async_trait;
use common::domain::{Credential, DomainError, DomainResult, RawPayload};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::http::PollingTransport;

pub const NETATMO_CLIENT_ID: &str = "CLIENT_ID";
pub const NETATMO_CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const NETATMO_REFRESH_TOKEN: &str = "REFRESH_TOKEN";

/// Refresh this long before the server-side expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    10800
}

#[derive(Debug, Clone)]
struct ClientCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Session {
    client: Option<ClientCredentials>,
    token: Option<AccessToken>,
}

/// Netatmo weather station API over HTTPS.
///
/// Authentication uses the OAuth refresh-token grant against
/// `{host}/oauth2/token`; the access token is cached and obtained again once
/// it expires. Each fetch returns the `body.devices` station list from
/// `{host}/api/getstationsdata`.
pub struct NetatmoTransport {
    application_name: String,
    host: String,
    http: reqwest::Client,
    session: Mutex<Session>,
}

impl NetatmoTransport {
    pub fn new(
        application_name: impl Into<String>,
        host: impl Into<String>,
        request_timeout: Duration,
    ) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DomainError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            application_name: application_name.into(),
            host: host.into().trim_end_matches('/').to_string(),
            http,
            session: Mutex::new(Session::default()),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.host)
    }

    fn stations_url(&self) -> String {
        format!("{}/api/getstationsdata", self.host)
    }

    fn client_credentials(&self, credential: &Credential) -> DomainResult<ClientCredentials> {
        let field = |key: &str| {
            credential
                .get(key)
                .map(str::to_string)
                .ok_or_else(|| DomainError::Authentication {
                    application: self.application_name.clone(),
                    reason: format!("credential is missing {}", key),
                })
        };

        Ok(ClientCredentials {
            client_id: field(NETATMO_CLIENT_ID)?,
            client_secret: field(NETATMO_CLIENT_SECRET)?,
            refresh_token: field(NETATMO_REFRESH_TOKEN)?,
        })
    }

    async fn request_token(&self, client: &ClientCredentials) -> DomainResult<TokenResponse> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", client.refresh_token.as_str()),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DomainError::Transport(format!("token request failed: {}", e)))?;

        let status = response.status();
        if is_rejection(status) {
            return Err(DomainError::Authentication {
                application: self.application_name.clone(),
                reason: format!("token endpoint returned {}", status),
            });
        }

        response
            .error_for_status()
            .map_err(|e| DomainError::Transport(format!("token request failed: {}", e)))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| DomainError::Transport(format!("invalid token response: {}", e)))
    }

    /// Return a valid access token, obtaining a new one if needed
    async fn access_token(&self) -> DomainResult<String> {
        let mut session = self.session.lock().await;

        if let Some(token) = session.token.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
            debug!(application = %self.application_name, "access token expired");
        }

        let mut client = session.client.clone().ok_or_else(|| DomainError::Authentication {
            application: self.application_name.clone(),
            reason: "transport has not been authenticated".to_string(),
        })?;

        let response = self.request_token(&client).await?;
        if let Some(rotated) = response.refresh_token {
            client.refresh_token = rotated;
        }

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        session.client = Some(client);
        session.token = Some(AccessToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        info!(
            application = %self.application_name,
            expires_in_secs = lifetime.as_secs(),
            "obtained netatmo access token"
        );
        Ok(response.access_token)
    }
}

fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

/// Pull the station list out of a getstationsdata response.
///
/// A response without `body.devices` is returned whole so that the unpacker
/// reports the missing keys.
pub fn station_list(response: Value) -> RawPayload {
    match response.pointer("/body/devices") {
        Some(devices) => devices.clone(),
        None => response,
    }
}

#[async_trait]
impl PollingTransport for NetatmoTransport {
    async fn authenticate(&self, credential: &Credential) -> DomainResult<()> {
        let client = self.client_credentials(credential)?;
        {
            let mut session = self.session.lock().await;
            session.client = Some(client);
            session.token = None;
        }
        self.access_token().await.map(|_| ())
    }

    async fn fetch(&self) -> DomainResult<RawPayload> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(self.stations_url())
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DomainError::Transport(format!("getstationsdata failed: {}", e)))?;

        if response.status() == StatusCode::FORBIDDEN || response.status() == StatusCode::UNAUTHORIZED {
            self.session.lock().await.token = None;
        }

        let body = response
            .error_for_status()
            .map_err(|e| DomainError::Transport(format!("getstationsdata failed: {}", e)))?
            .json::<Value>()
            .await
            .map_err(|e| DomainError::Transport(format!("invalid getstationsdata response: {}", e)))?;

        Ok(station_list(body))
    }

    async fn close(&self) {
        let mut session = self.session.lock().await;
        session.token = None;
        debug!(application = %self.application_name, "netatmo session closed");
    }
}
