//! API credential loading.
//!
//! Credentials come from the Veracode credentials file
//! (`~/.veracode/veracode.yml` unless a path is given):
//!
//! ```yaml
//! api:
//!   key-id: 0123abcd...
//!   key-secret: 89ef...
//! ```
//!
//! `VERACODE_API_KEY_ID` and `VERACODE_API_KEY_SECRET` override the file
//! field by field. When both variables are set the file is not read at all.

use log::{debug, info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use veracode_api::{VeracodeConfig, VeracodeCredentials, VeracodeRegion};
use veracode_api::auth::validate_key_secret;

pub const ENV_KEY_ID: &str = "VERACODE_API_KEY_ID";
pub const ENV_KEY_SECRET: &str = "VERACODE_API_KEY_SECRET";
/// Any value disables TLS certificate validation
pub const ENV_DISABLE_CERT_VALIDATION: &str = "VERATUI_DISABLE_CERT_VALIDATION";

/// Custom error types for credential operations
#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Could not determine the home directory for the default credentials file")]
    NoHomeDirectory,

    #[error("Failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required credentials: {missing}")]
    MissingCredentials { missing: String },

    #[error("Credential validation failed: {field}: {message}")]
    ValidationError { field: String, message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CredentialsFile {
    api: ApiSection,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ApiSection {
    #[serde(rename = "key-id")]
    key_id: String,
    #[serde(rename = "key-secret")]
    key_secret: String,
}

impl std::fmt::Debug for ApiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSection")
            .field("key_id", &"[REDACTED]")
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// `~/.veracode/veracode.yml`
pub fn default_credentials_path() -> Result<PathBuf, CredentialError> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".veracode").join("veracode.yml"))
        .ok_or(CredentialError::NoHomeDirectory)
}

/// Parse the YAML credentials document.
pub fn parse_credentials_file(path: &Path, contents: &str) -> Result<(String, String), CredentialError> {
    let parsed: CredentialsFile =
        serde_yaml::from_str(contents).map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((parsed.api.key_id, parsed.api.key_secret))
}

/// Load credentials from the file at `path` (or the default location) and
/// apply environment overrides.
pub fn load_credentials(path: Option<&Path>) -> Result<VeracodeCredentials, CredentialError> {
    load_credentials_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_credentials`] with an injectable environment lookup.
pub fn load_credentials_with_env<F>(
    path: Option<&Path>,
    env: F,
) -> Result<VeracodeCredentials, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_id = env(ENV_KEY_ID).filter(|v| !v.trim().is_empty());
    let env_secret = env(ENV_KEY_SECRET).filter(|v| !v.trim().is_empty());

    let (file_id, file_secret) = if env_id.is_some() && env_secret.is_some() {
        debug!("Both credential environment variables set, skipping credentials file");
        (String::new(), String::new())
    } else {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_credentials_path()?,
        };
        debug!("Reading credentials from {}", path.display());
        let contents = std::fs::read_to_string(&path).map_err(|source| CredentialError::Read {
            path: path.clone(),
            source,
        })?;
        parse_credentials_file(&path, &contents)?
    };

    let key_id = env_id.unwrap_or(file_id).trim().to_string();
    let key_secret = env_secret.unwrap_or(file_secret).trim().to_string();

    let mut missing = Vec::new();
    if key_id.is_empty() {
        missing.push("api.key-id");
    }
    if key_secret.is_empty() {
        missing.push("api.key-secret");
    }
    if !missing.is_empty() {
        return Err(CredentialError::MissingCredentials {
            missing: missing.join(", "),
        });
    }

    validate_key_id(&key_id)?;
    validate_key_secret(&key_secret).map_err(|e| CredentialError::ValidationError {
        field: "api.key-secret".to_string(),
        message: e.to_string(),
    })?;

    info!("Loaded Veracode API credentials");
    Ok(VeracodeCredentials::new(key_id, key_secret))
}

/// Client configuration for `region`, with environment settings applied.
#[must_use]
pub fn create_veracode_config(
    credentials: VeracodeCredentials,
    region: VeracodeRegion,
) -> VeracodeConfig {
    create_veracode_config_with_env(credentials, region, |name| std::env::var(name).ok())
}

/// Same as [`create_veracode_config`] with an injectable environment lookup.
pub fn create_veracode_config_with_env<F>(
    credentials: VeracodeCredentials,
    region: VeracodeRegion,
    env: F,
) -> VeracodeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = VeracodeConfig::from_credentials(credentials).with_region(region);
    if env(ENV_DISABLE_CERT_VALIDATION).is_some() {
        config = config.with_certificate_validation_disabled();
        warn!(
            "Certificate validation disabled for Veracode API via {ENV_DISABLE_CERT_VALIDATION}"
        );
        warn!("This should only be used in development environments!");
    }
    debug!("Using Veracode API at {}", config.base_url);
    config
}

fn validate_key_id(value: &str) -> Result<(), CredentialError> {
    if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(CredentialError::ValidationError {
            field: "api.key-id".to_string(),
            message: "must contain only alphanumeric characters".to_string(),
        });
    }
    Ok(())
}
