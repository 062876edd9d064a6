//! Google OAuth2 authorization-code client.
//!
//! Builds the consent URL, exchanges the returned code for an access token
//! and reads the user's hosted domain from the user-info endpoint. Failures
//! are reported once; nothing here retries.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

const STATE_TOKEN_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),
    #[error("code exchange wrong: {0}")]
    TokenExchange(String),
    #[error("failed getting user info: {0}")]
    UserInfo(String),
}

/// Provider endpoints; Google unless overridden in configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The subset of the user-info document the proxy cares about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    /// Hosted domain; absent (empty) for consumer accounts.
    #[serde(rename = "hd", default)]
    pub hosted_domain: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    endpoints: OAuthEndpoints,
}

impl fmt::Debug for GoogleOAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleOAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Fresh anti-forgery token for one login attempt.
pub fn generate_state_token() -> String {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl GoogleOAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        endpoints: OAuthEndpoints,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoints,
        }
    }

    /// Consent URL the browser is sent to.
    pub fn authorization_url(&self, redirect_url: &str, state: &str) -> Result<Url, OAuthError> {
        let scope = SCOPES.join(" ");
        let url = Url::parse_with_params(
            &self.endpoints.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_url),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str, redirect_url: &str) -> Result<String, OAuthError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_url),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| OAuthError::TokenExchange(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| OAuthError::TokenExchange(err.to_string()))?;
        debug!("exchanged authorization code for access token");
        Ok(token.access_token)
    }

    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| OAuthError::UserInfo(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::UserInfo(format!("provider answered {status}")));
        }

        response
            .json()
            .await
            .map_err(|err| OAuthError::UserInfo(err.to_string()))
    }
}
