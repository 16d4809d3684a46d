//! Common test fixtures for ndvi-pipeline tests.
//!
//! The Gorizia area and provider response bodies shared by several crates'
//! tests.

/// Areas of interest.
pub mod areas {
    /// Gorizia, Italy. Closed ring, lon/lat in EPSG:4326.
    pub const GORIZIA: [[f64; 2]; 9] = [
        [13.431473, 45.843278],
        [13.407070, 45.901024],
        [13.374575, 45.944087],
        [13.401089, 45.984709],
        [13.480989, 46.000895],
        [13.524993, 45.966807],
        [13.572922, 45.916585],
        [13.499877, 45.885294],
        [13.431473, 45.843278],
    ];
}

/// Provider responses.
pub mod responses {
    /// Successful token endpoint body.
    pub fn token_json(token: &str, expires_in: i64) -> String {
        format!(
            r#"{{"access_token":"{}","expires_in":{},"refresh_expires_in":0,"token_type":"Bearer","not-before-policy":0,"scope":"email profile"}}"#,
            token, expires_in
        )
    }

    /// OAuth2 error body for rejected credentials.
    pub const INVALID_CLIENT: &str =
        r#"{"error":"invalid_client","error_description":"Invalid client or Invalid client credentials"}"#;

    /// Processing API error for an empty scene.
    pub const NO_DATA_FOUND: &str = r#"{"error":"no data found"}"#;

    /// HTML maintenance page served with a 200.
    pub const HTML_MAINTENANCE: &str =
        "<!DOCTYPE html><html><body><h1>Scheduled maintenance</h1></body></html>";
}
