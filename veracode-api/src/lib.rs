//! # Veracode REST client
//!
//! Signed access to the Veracode REST APIs used by the terminal browser:
//! applications and sandboxes, findings and static flaw data paths, the
//! identity of the calling API principal, and annotation creation.
//!
//! Every request is authenticated with the `VERACODE-HMAC-SHA-256` scheme
//! (see [`auth`]). Requests go through the [`Transport`] trait so resource
//! clients can be exercised against a recording transport in tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use veracode_api::{ApplicationQuery, VeracodeClient, VeracodeConfig, VeracodeRegion};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VeracodeConfig::new("your_key_id", "your_hex_key_secret")
//!         .with_region(VeracodeRegion::European);
//!     let client = VeracodeClient::new(config)?;
//!
//!     let page = client
//!         .applications_api()
//!         .get_applications(&ApplicationQuery::new().with_name("demo"))
//!         .await?;
//!     println!("{} applications", page.total_elements());
//!     Ok(())
//! }
//! ```

pub mod annotations;
pub mod app;
pub mod auth;
pub mod client;
pub mod findings;
pub mod identity;
pub mod json_validator;
pub mod validation;

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

pub use annotations::{
    AnnotationAction, AnnotationData, AnnotationErrorResponse, AnnotationResponse,
    AnnotationsApi,
};
pub use app::{
    Application, ApplicationQuery, ApplicationScan, ApplicationsApi, PageMetadata,
    PagedResource, Sandbox,
};
pub use client::{HttpError, Transport, VeracodeClient};
pub use findings::{
    DataPath, Finding, FindingDetails, FindingsApi, FindingsQuery, PolicyFilter, ScanType,
    Severity, StaticFlawInfo,
};
pub use identity::{ApiCredentials, IdentityApi, Principal};
pub use validation::ValidationError;

/// Re-exported so [`Transport`] implementations need no direct reqwest dependency
pub use reqwest::Method;

/// Error type for every Veracode API operation.
///
/// The variants mirror where a call failed: before any request was attempted
/// (`Configuration`, `Validation`), below the HTTP layer (`Transport`), with a
/// completed non-2xx response (`Http`), or while decoding a 2xx body (`Decode`).
#[derive(Debug, thiserror::Error)]
#[must_use = "Need to handle all error enum types."]
pub enum VeracodeError {
    /// Malformed or missing credentials, unparsable URL
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A required call parameter was missing or out of range
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Network, TLS or timeout failure; the request never produced a response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered outside [200, 300)
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The response body was not the JSON document the endpoint promises
    #[error("Failed to decode {context} response: {message}")]
    Decode {
        context: &'static str,
        message: String,
        body: String,
    },
}

impl VeracodeError {
    /// HTTP status code when the error came from a completed response.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            VeracodeError::Http(e) => Some(e.status_code),
            VeracodeError::Configuration(_)
            | VeracodeError::Validation(_)
            | VeracodeError::Transport(_)
            | VeracodeError::Decode { .. } => None,
        }
    }

    /// Whether the failure happened below the HTTP layer because of the request timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, VeracodeError::Transport(e) if e.is_timeout())
    }
}

/// API key pair used to sign requests.
///
/// Both halves are held as secrets and never appear in `Debug` output.
#[derive(Clone)]
pub struct VeracodeCredentials {
    key_id: SecretString,
    key_secret: SecretString,
}

impl VeracodeCredentials {
    #[must_use]
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: SecretString::from(key_id.into()),
            key_secret: SecretString::from(key_secret.into()),
        }
    }

    /// Expose the key ID for header construction
    #[must_use]
    pub fn expose_key_id(&self) -> &str {
        self.key_id.expose_secret()
    }

    /// Expose the hex key secret for signing
    #[must_use]
    pub fn expose_key_secret(&self) -> &str {
        self.key_secret.expose_secret()
    }
}

impl fmt::Debug for VeracodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VeracodeCredentials")
            .field("key_id", &"[REDACTED]")
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Veracode regions for API access.
///
/// Different regions use different API endpoints. Choose the region
/// that matches your Veracode account configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VeracodeRegion {
    /// Commercial region (default) - api.veracode.com
    #[default]
    Commercial,
    /// European region - api.veracode.eu
    European,
    /// US Federal region - api.veracode.us
    Federal,
}

impl VeracodeRegion {
    /// REST API base URL for the region
    #[must_use]
    pub fn rest_base_url(self) -> &'static str {
        match self {
            VeracodeRegion::Commercial => "https://api.veracode.com",
            VeracodeRegion::European => "https://api.veracode.eu",
            VeracodeRegion::Federal => "https://api.veracode.us",
        }
    }
}

impl std::str::FromStr for VeracodeRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "commercial" => Ok(VeracodeRegion::Commercial),
            "european" | "eu" => Ok(VeracodeRegion::European),
            "federal" | "us" => Ok(VeracodeRegion::Federal),
            _ => Err(format!(
                "Invalid region: '{s}'. Must be one of: commercial, european, federal"
            )),
        }
    }
}

/// Fixed per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection establishment timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the Veracode API client.
#[derive(Debug, Clone)]
pub struct VeracodeConfig {
    /// Signing credentials
    pub credentials: VeracodeCredentials,
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Veracode region for your account
    pub region: VeracodeRegion,
    /// Whether to validate TLS certificates (default: true)
    pub validate_certificates: bool,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl VeracodeConfig {
    /// Create a configuration for the Commercial region.
    ///
    /// # Arguments
    ///
    /// * `key_id` - Your Veracode API key ID
    /// * `key_secret` - Your Veracode API key secret (hex)
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self::from_credentials(VeracodeCredentials::new(key_id, key_secret))
    }

    /// Create a configuration around already loaded credentials.
    #[must_use]
    pub fn from_credentials(credentials: VeracodeCredentials) -> Self {
        let region = VeracodeRegion::Commercial;
        Self {
            credentials,
            base_url: region.rest_base_url().to_string(),
            region,
            validate_certificates: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the region; the base URL follows it.
    #[must_use]
    pub fn with_region(mut self, region: VeracodeRegion) -> Self {
        self.region = region;
        self.base_url = region.rest_base_url().to_string();
        self
    }

    /// Point the client at a different host, e.g. a local test server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Disable certificate validation for development environments.
    ///
    /// WARNING: This should only be used in development environments with
    /// self-signed certificates. Never use this in production.
    #[must_use]
    pub fn with_certificate_validation_disabled(mut self) -> Self {
        self.validate_certificates = false;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout: Duration, request_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.request_timeout = request_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = VeracodeConfig::new("test_key_id", "abcdef");

        assert_eq!(config.credentials.expose_key_id(), "test_key_id");
        assert_eq!(config.credentials.expose_key_secret(), "abcdef");
        assert_eq!(config.base_url, "https://api.veracode.com");
        assert_eq!(config.region, VeracodeRegion::Commercial);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.validate_certificates);
    }

    #[test]
    fn test_regional_base_urls() {
        let eu = VeracodeConfig::new("id", "ab").with_region(VeracodeRegion::European);
        assert_eq!(eu.base_url, "https://api.veracode.eu");

        let us = VeracodeConfig::new("id", "ab").with_region(VeracodeRegion::Federal);
        assert_eq!(us.base_url, "https://api.veracode.us");
    }

    #[test]
    fn test_base_url_override_strips_trailing_slash() {
        let config = VeracodeConfig::new("id", "ab").with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_region_parsing() {
        assert_eq!(
            "commercial".parse::<VeracodeRegion>(),
            Ok(VeracodeRegion::Commercial)
        );
        assert_eq!("EU".parse::<VeracodeRegion>(), Ok(VeracodeRegion::European));
        assert_eq!("federal".parse::<VeracodeRegion>(), Ok(VeracodeRegion::Federal));
        assert!("mars".parse::<VeracodeRegion>().is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = VeracodeCredentials::new("visible-id", "deadbeef");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("visible-id"));
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_error_display() {
        let error = VeracodeError::Configuration("Invalid API key".to_string());
        assert_eq!(format!("{error}"), "Invalid configuration: Invalid API key");
        assert_eq!(error.status_code(), None);
    }

    #[test]
    fn test_http_error_status_code() {
        let error = VeracodeError::from(HttpError::new(404, "404 Not Found", b"{}".to_vec()));
        assert_eq!(error.status_code(), Some(404));
        assert!(!error.is_timeout());
    }
}
