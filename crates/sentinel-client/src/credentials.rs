//! OAuth2 client credentials.

use std::fmt;

use ndvi_common::{NdviError, NdviResult};

/// Client identifier and secret for the client-credentials grant.
///
/// Immutable once constructed. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Create credentials, rejecting empty or whitespace-only values.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> NdviResult<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.trim().is_empty() {
            return Err(NdviError::AuthenticationRejected {
                status: None,
                message: "client_id is empty".to_string(),
            });
        }
        if client_secret.trim().is_empty() {
            return Err(NdviError::AuthenticationRejected {
                status: None,
                message: "client_secret is empty".to_string(),
            });
        }

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_rejected() {
        assert!(matches!(
            Credentials::new("", "secret"),
            Err(NdviError::AuthenticationRejected { status: None, .. })
        ));
        assert!(matches!(
            Credentials::new("id", "   "),
            Err(NdviError::AuthenticationRejected { status: None, .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("sh-client", "hunter2").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("sh-client"));
        assert!(!debug.contains("hunter2"));
    }
}
