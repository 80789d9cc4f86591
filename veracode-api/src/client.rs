//! Core Veracode API client implementation.
//!
//! This module contains the signed HTTP transport every resource client goes
//! through. A request's URL, query string included, is fully built before it
//! is signed, because the signature covers the query parameters.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use std::borrow::Cow;

use crate::annotations::AnnotationsApi;
use crate::app::ApplicationsApi;
use crate::findings::FindingsApi;
use crate::identity::IdentityApi;
use crate::{VeracodeConfig, VeracodeError, auth};

const USER_AGENT: &str = concat!("veratui/", env!("CARGO_PKG_VERSION"));
const HEALTHCHECK_PATH: &str = "/healthcheck/status";

/// A completed response outside the 2xx range.
///
/// The body is kept byte for byte so it can be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status_code}: {}", String::from_utf8_lossy(.body))]
pub struct HttpError {
    /// Numeric status, e.g. 404
    pub status_code: u16,
    /// Status line text, e.g. "404 Not Found"
    pub status: String,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpError {
    #[must_use]
    pub fn new(status_code: u16, status: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status_code,
            status: status.into(),
            body,
        }
    }

    /// Body decoded as UTF-8 for display
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Executes one signed request and returns the raw body of a 2xx response.
///
/// Resource clients depend on this trait rather than on [`VeracodeClient`]
/// so they can run against a recording transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// `HttpError` for any status outside [200, 300), `Transport` for network or
    /// timeout failures, `Configuration` if the request cannot be signed.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, VeracodeError>;
}

/// Build the full request URL; parameters are percent-encoded and kept in order.
#[must_use]
pub fn build_url(base_url: &str, path: &str, query: &[(String, String)]) -> String {
    let estimated_capacity = base_url
        .len()
        .saturating_add(path.len())
        .saturating_add(query.len().saturating_mul(32));

    let mut url = String::with_capacity(estimated_capacity);
    url.push_str(base_url);
    url.push_str(path);

    for (i, (key, value)) in query.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }

    url
}

/// Map a completed response onto the body or an [`HttpError`].
///
/// # Errors
///
/// Returns `VeracodeError::Http` when `status` is outside [200, 300).
pub fn ensure_success(status: StatusCode, body: Vec<u8>) -> Result<Vec<u8>, VeracodeError> {
    if status.is_success() {
        return Ok(body);
    }
    Err(HttpError::new(status.as_u16(), status.to_string(), body).into())
}

/// Core Veracode API client.
///
/// Holds the configuration and a reqwest client with the fixed request
/// timeout. Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct VeracodeClient {
    config: VeracodeConfig,
    client: Client,
}

impl VeracodeClient {
    /// Create a new Veracode API client.
    ///
    /// The key secret is checked here so a malformed secret fails before any
    /// request is attempted.
    ///
    /// # Errors
    ///
    /// Returns `VeracodeError::Configuration` if the key secret is not hex or
    /// the HTTP client cannot be built.
    pub fn new(config: VeracodeConfig) -> Result<Self, VeracodeError> {
        auth::validate_key_secret(config.credentials.expose_key_secret())?;

        let mut client_builder = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout);

        if !config.validate_certificates {
            warn!("TLS certificate validation is disabled");
            client_builder = client_builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| VeracodeError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Get the base URL for API requests.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get access to the configuration
    #[must_use]
    pub fn config(&self) -> &VeracodeConfig {
        &self.config
    }

    /// Applications and sandboxes
    #[must_use]
    pub fn applications_api(&self) -> ApplicationsApi<'_, Self> {
        ApplicationsApi::new(self)
    }

    /// Findings and static flaw data paths
    #[must_use]
    pub fn findings_api(&self) -> FindingsApi<'_, Self> {
        FindingsApi::new(self)
    }

    /// Calling principal and its API credentials
    #[must_use]
    pub fn identity_api(&self) -> IdentityApi<'_, Self> {
        IdentityApi::new(self)
    }

    /// Annotation creation
    #[must_use]
    pub fn annotations_api(&self) -> AnnotationsApi<'_, Self> {
        AnnotationsApi::new(self)
    }

    /// Generate the authorization header for a fully built URL.
    ///
    /// # Errors
    ///
    /// Returns `VeracodeError::Configuration` if the URL cannot be parsed or the
    /// key secret is not hex.
    pub fn generate_auth_header(&self, method: &str, url: &str) -> Result<String, VeracodeError> {
        auth::sign(
            self.config.credentials.expose_key_id(),
            self.config.credentials.expose_key_secret(),
            method,
            url,
        )
    }

    /// Verify that the authentication service answers with 2xx.
    ///
    /// # Errors
    ///
    /// Any transport or HTTP error from the health check endpoint.
    pub async fn health_check(&self) -> Result<(), VeracodeError> {
        self.request(Method::GET, HEALTHCHECK_PATH, &[], None)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Transport for VeracodeClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, VeracodeError> {
        let url = build_url(&self.config.base_url, path, query);
        let auth_header = self.generate_auth_header(method.as_str(), &url)?;

        debug!(">>> {method} {url}");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, auth_header)
            .header(ACCEPT, "application/json");

        if let Some(body) = body {
            debug!(">>> body: {} bytes", body.len());
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!("{method} {path} failed before a response arrived: {e}");
            VeracodeError::Transport(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!("<<< {status} {method} {path} ({} bytes)", bytes.len());

        ensure_success(status, bytes.to_vec())
    }
}
