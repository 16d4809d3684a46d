//! Shared HTTP client construction and provider diagnostics.

use std::time::Duration;

use ndvi_common::{NdviError, NdviResult};
use reqwest::Client;

/// Transport settings for both endpoints.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Whole-request timeout, including the response body
    pub request_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(300), // rendering large areas is slow
            connect_timeout: Duration::from_secs(30),
            user_agent: concat!("ndvi-pipeline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    /// Build the reqwest client used by the token acquirer and fetcher.
    pub fn build_client(&self) -> NdviResult<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .tcp_nodelay(true)
            .build()
            .map_err(|e| NdviError::NetworkUnavailable(format!("failed to create HTTP client: {}", e)))
    }
}

const MAX_DIAGNOSTIC_LEN: usize = 500;

/// Pull a human readable message out of a provider error body.
///
/// Understands the OAuth2 shape (`error_description` / `error`), the
/// processing API shape (`{"error": {"message": ...}}`), a bare
/// `{"error": "..."}` and `{"message": ...}`. Falls back to the raw body.
pub(crate) fn provider_message(body: &str, fallback: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("error_description"),
            value.pointer("/error/message"),
            value.get("error"),
            value.get("message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str() {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    if trimmed.len() > MAX_DIAGNOSTIC_LEN {
        let mut end = MAX_DIAGNOSTIC_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        return format!("{}...", &trimmed[..end]);
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_error_string() {
        assert_eq!(
            provider_message(r#"{"error": "no data found"}"#, "Bad Request"),
            "no data found"
        );
    }

    #[test]
    fn test_processing_api_error_object() {
        let body = r#"{"error":{"status":400,"reason":"Bad Request","message":"Invalid evalscript","code":"RENDERER_EXCEPTION"}}"#;
        assert_eq!(provider_message(body, "Bad Request"), "Invalid evalscript");
    }

    #[test]
    fn test_oauth_error_prefers_description() {
        let body = r#"{"error":"invalid_client","error_description":"Invalid client credentials"}"#;
        assert_eq!(provider_message(body, "Unauthorized"), "Invalid client credentials");
    }

    #[test]
    fn test_plain_text_and_empty_bodies() {
        assert_eq!(provider_message("  gateway down \n", "Bad Gateway"), "gateway down");
        assert_eq!(provider_message("", "Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(2000);
        let message = provider_message(&body, "");
        assert_eq!(message.len(), MAX_DIAGNOSTIC_LEN + 3);
    }
}
