//! Authentication against the hosted platform's auth service.
//!
//! The sign-in flow is OAuth redirect based: the client builds an
//! authorize URL, the user completes it in a browser, and the provider
//! redirects back with tokens in the URL fragment. From there this
//! client only ever handles refresh tokens; exchanging one yields a full
//! session, and sessions near expiry are re-exchanged transparently.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine as _};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::types::errors::AuthError;
use crate::types::session::{AuthSession, JwtClaims};

/// Trait defining authentication operations.
#[async_trait]
pub trait AuthClientTrait: Send + Sync {
    /// Builds the OAuth authorize URL the user opens in a browser.
    fn authorize_url(&self, redirect_to: &str) -> String;

    /// Exchanges a refresh token for a full session.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;

    /// Returns the session unchanged when it is still comfortably valid,
    /// otherwise exchanges its refresh token for a fresh one.
    async fn refresh_if_needed(&self, session: &AuthSession) -> Result<AuthSession, AuthError>;

    /// Revokes the session remotely. Best effort; local sign-out proceeds
    /// regardless.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Decodes the claims from an access token without verifying the
    /// signature.
    fn decode_claims(&self, access_token: &str) -> Result<JwtClaims, AuthError>;
}

/// Token endpoint response from the auth service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// Error body returned by the auth service.
#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
}

/// Auth service client for the hosted platform.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    provider: String,
}

impl AuthClient {
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str, provider: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            provider: provider.to_string(),
        }
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, endpoint)
    }

    async fn status_error(response: reqwest::Response) -> AuthError {
        let status = response.status().as_u16();
        let message = response
            .json::<AuthErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "no error detail".to_string());
        if status == 400 || status == 401 {
            AuthError::AuthFailed(message)
        } else {
            AuthError::ApiError(format!("status {}: {}", status, message))
        }
    }
}

#[async_trait]
impl AuthClientTrait for AuthClient {
    fn authorize_url(&self, redirect_to: &str) -> String {
        // base_url is validated at config load, so parsing cannot fail here
        let mut url = match Url::parse(&self.auth_url("authorize")) {
            Ok(url) => url,
            Err(_) => return self.auth_url("authorize"),
        };
        url.query_pairs_mut()
            .append_pair("provider", &self.provider)
            .append_pair("redirect_to", redirect_to);
        url.to_string()
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(format!("malformed token response: {}", e)))?;

        debug!(user_id = %token.user.id, "exchanged refresh token");

        Ok(AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_id: token.user.id,
            email: token.user.email,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    async fn refresh_if_needed(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        if !session.needs_refresh() {
            return Ok(session.clone());
        }
        debug!(user_id = %session.user_id, "session near expiry, refreshing");
        self.exchange_refresh_token(&session.refresh_token).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "remote sign-out failed");
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }

    fn decode_claims(&self, access_token: &str) -> Result<JwtClaims, AuthError> {
        let payload = access_token
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::InvalidToken("not a JWT".to_string()))?;

        let bytes = BASE64_URL
            .decode(payload)
            .map_err(|e| AuthError::InvalidToken(format!("payload decode: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidToken(format!("claims parse: {}", e)))
    }
}
