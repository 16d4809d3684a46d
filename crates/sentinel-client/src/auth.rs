//! Client-credentials token exchange and bearer authorization.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use ndvi_common::{NdviError, NdviResult};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::credentials::Credentials;
use crate::http::provider_message;

/// Something that can authorize an outgoing request.
///
/// Call sites never assemble `Authorization` headers themselves; they hand the
/// request to an authorizer.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, request: RequestBuilder) -> NdviResult<RequestBuilder>;
}

/// Short-lived bearer token.
///
/// Opaque to this crate beyond its use as a bearer credential.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Authorizer for AccessToken {
    fn authorize(&self, request: RequestBuilder) -> NdviResult<RequestBuilder> {
        if self.is_expired() {
            return Err(NdviError::AuthenticationRejected {
                status: None,
                message: format!("access token expired at {}", self.expires_at.to_rfc3339()),
            });
        }
        Ok(request.bearer_auth(&self.value))
    }
}

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Exchanges credentials for an [`AccessToken`].
pub struct TokenAcquirer {
    client: Client,
    token_url: String,
}

impl TokenAcquirer {
    pub fn new(client: Client, token_url: impl Into<String>) -> Self {
        Self {
            client,
            token_url: token_url.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Perform one client-credentials exchange.
    ///
    /// No retry happens here; retry policy belongs to the caller.
    #[instrument(skip(self, credentials), fields(token_url = %self.token_url, client_id = %credentials.client_id()))]
    pub async fn acquire(&self, credentials: &Credentials) -> NdviResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form[..])
            .send()
            .await
            .map_err(|e| NdviError::AuthenticationUnavailable(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            NdviError::AuthenticationUnavailable(format!("failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            let message = provider_message(&body, status.canonical_reason().unwrap_or("error"));
            warn!(status = status.as_u16(), message = %message, "Token request rejected");
            return Err(NdviError::AuthenticationRejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            NdviError::AuthenticationProtocolError(format!("token response is not valid JSON: {}", e))
        })?;

        let value = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                NdviError::AuthenticationProtocolError("token response has no access_token".to_string())
            })?;

        let expires_in = parsed.expires_in.ok_or_else(|| {
            NdviError::AuthenticationProtocolError("token response has no expires_in".to_string())
        })?;
        if expires_in <= 0 {
            return Err(NdviError::AuthenticationProtocolError(format!(
                "token response has non-positive expires_in: {}",
                expires_in
            )));
        }

        if let Some(token_type) = parsed.token_type.as_deref() {
            if !token_type.eq_ignore_ascii_case("bearer") {
                debug!(token_type = %token_type, "Unexpected token type, using as bearer");
            }
        }

        let token = AccessToken::new(value, Utc::now() + Duration::seconds(expires_in));
        info!(expires_in_secs = expires_in, "Access token acquired");

        Ok(token)
    }
}
