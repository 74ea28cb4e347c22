//! Token sources backing the [`TokenManager`](crate::services::TokenManager).
//!
//! Two sources are supported:
//!
//! - [`OAuthTokenExchange`] talks to the OAuth token endpoint. The first exchange
//!   redeems the configured authorization code; once the endpoint has issued a refresh
//!   token, later exchanges use the refresh-token grant.
//! - [`PersonalAccessToken`] hands out a fixed token with a configured lifetime.
//!
//! Obtaining the authorization code (the browser redirect) is outside this crate; the
//! code arrives through configuration.

use std::future::Future;

use chrono::Duration;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::github::error::CredentialRefreshError;
use crate::types::{Credential, TokenGrant};

/// GitHub's OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// Source of fresh credentials.
pub trait TokenExchange: Send + Sync + 'static {
    /// Obtains a new grant. `previous` is the credential being replaced, if any.
    fn exchange(
        &self,
        previous: Option<&Credential>,
    ) -> impl Future<Output = Result<TokenGrant, CredentialRefreshError>> + Send;
}

/// OAuth application settings used by [`OAuthTokenExchange`]
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub authorization_code: Option<String>,
    pub user_agent: String,
    /// Overall deadline of one token request
    pub timeout: std::time::Duration,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("has_authorization_code", &self.authorization_code.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Successful token response.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    refresh_token_expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Error response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Combined response type for token endpoint (can be success or error).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Success(AccessTokenResponse),
    Error(TokenErrorResponse),
}

/// Exchanges authorization codes and refresh tokens at the OAuth token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthTokenExchange {
    http: Client,
    config: OAuthClientConfig,
}

impl OAuthTokenExchange {
    pub fn new(config: OAuthClientConfig) -> Result<Self, CredentialRefreshError> {
        let timeout = std::cmp::max(config.timeout, std::time::Duration::from_secs(1));
        let connect_timeout = std::cmp::min(timeout, std::time::Duration::from_secs(10));

        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                CredentialRefreshError::new(format!("failed to build token client: {}", e))
            })?;

        Ok(Self { http, config })
    }

    fn grant_form(
        &self,
        previous: Option<&Credential>,
    ) -> Result<Vec<(&'static str, String)>, CredentialRefreshError> {
        if let Some(refresh_token) = previous.and_then(|credential| credential.refresh_token()) {
            return Ok(vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.to_string()),
            ]);
        }

        let code = self.config.authorization_code.as_ref().ok_or_else(|| {
            CredentialRefreshError::new("no authorization code or refresh token available")
        })?;

        Ok(vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.clone()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("scope", self.config.scope.clone()),
        ])
    }
}

impl TokenExchange for OAuthTokenExchange {
    async fn exchange(
        &self,
        previous: Option<&Credential>,
    ) -> Result<TokenGrant, CredentialRefreshError> {
        let form = self.grant_form(previous)?;
        debug!(
            "Requesting access token from {} with grant_type={}",
            self.config.token_url, form[0].1
        );

        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.config.user_agent)
            .form(&form)
            .send()
            .await
            .map_err(|e| CredentialRefreshError::new(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            CredentialRefreshError::new(format!("failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            return Err(CredentialRefreshError::new(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(TokenResponse::Success(token)) => {
                info!(
                    "GitHub access token refreshed (type: {:?}, scope: {:?}, expires_in: {:?}, refresh_token_expires_in: {:?})",
                    token.token_type, token.scope, token.expires_in, token.refresh_token_expires_in
                );
                Ok(TokenGrant {
                    access_token: token.access_token,
                    expires_in: token.expires_in,
                    // Keep the old refresh token when the endpoint does not rotate it.
                    refresh_token: token.refresh_token.or_else(|| {
                        previous.and_then(|c| c.refresh_token().map(str::to_string))
                    }),
                })
            }
            Ok(TokenResponse::Error(error)) => Err(CredentialRefreshError::new(
                match error.error_description {
                    Some(description) => format!("{}: {}", error.error, description),
                    None => error.error,
                },
            )),
            Err(e) => Err(CredentialRefreshError::new(format!(
                "failed to parse token response: {}",
                e
            ))),
        }
    }
}

/// A fixed token, typically a personal access token.
#[derive(Clone)]
pub struct PersonalAccessToken {
    token: String,
    lifetime: Duration,
}

impl PersonalAccessToken {
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            token: token.into(),
            lifetime,
        }
    }
}

impl std::fmt::Debug for PersonalAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalAccessToken")
            .field("token", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl TokenExchange for PersonalAccessToken {
    async fn exchange(
        &self,
        _previous: Option<&Credential>,
    ) -> Result<TokenGrant, CredentialRefreshError> {
        Ok(TokenGrant {
            access_token: self.token.clone(),
            expires_in: Some(self.lifetime.num_seconds().max(0) as u64),
            refresh_token: None,
        })
    }
}

/// The token source selected by configuration.
#[derive(Debug, Clone)]
pub enum TokenSource {
    Personal(PersonalAccessToken),
    OAuth(OAuthTokenExchange),
}

impl TokenExchange for TokenSource {
    async fn exchange(
        &self,
        previous: Option<&Credential>,
    ) -> Result<TokenGrant, CredentialRefreshError> {
        match self {
            Self::Personal(source) => source.exchange(previous).await,
            Self::OAuth(source) => source.exchange(previous).await,
        }
    }
}
