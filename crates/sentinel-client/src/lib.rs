//! Sentinel Hub client.
//!
//! Covers the network half of the NDVI pipeline:
//!
//! - [`TokenAcquirer`]: client-credentials token exchange
//! - [`build_request`]: declarative processing request from parameters
//! - [`ArchiveFetcher`]: submits the request and stores the response archive
//!
//! # Example
//!
//! ```ignore
//! let client = HttpSettings::default().build_client()?;
//! let token = TokenAcquirer::new(client.clone(), DEFAULT_TOKEN_URL)
//!     .acquire(&credentials)
//!     .await?;
//! let request = build_request(&params)?;
//! let archive = ArchiveFetcher::new(client, DEFAULT_PROCESS_URL)
//!     .fetch(&request, &token, Path::new("retrieved_files.tar"))
//!     .await?;
//! ```

pub mod auth;
pub mod credentials;
pub mod evalscript;
pub mod fetch;
pub mod http;
pub mod request;

pub use auth::{AccessToken, Authorizer, TokenAcquirer};
pub use credentials::Credentials;
pub use evalscript::{DEFAULT_NDVI_EVALSCRIPT, DEFAULT_NO_DATA_VALUE, DEFAULT_VALUE_DIVISOR};
pub use fetch::{ArchiveFetcher, ContainerKind, FetchedArchive};
pub use http::HttpSettings;
pub use request::{
    build_request, OrbitDirection, OutputFormat, ProcessPayload, ProcessingRequest,
    RequestParameters,
};

/// Copernicus Data Space Ecosystem identity provider.
pub const DEFAULT_TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";

/// Copernicus Data Space Ecosystem Sentinel Hub processing API.
pub const DEFAULT_PROCESS_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/process";
