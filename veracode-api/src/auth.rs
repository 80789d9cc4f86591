//! HMAC request signing for the `VERACODE-HMAC-SHA-256` authorization scheme.
//!
//! Every REST call carries a header proving possession of the API key secret
//! without sending it. The signing key is derived through a four round
//! HMAC-SHA-256 chain over the nonce, the timestamp and the protocol version
//! string, and the final round signs the canonical request description.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

use crate::VeracodeError;

type HmacSha256 = Hmac<Sha256>;

/// Scheme name prefixed to every authorization header
pub const AUTH_SCHEME: &str = "VERACODE-HMAC-SHA-256";

/// Protocol constant mixed into the third round of the key chain
const REQUEST_VERSION: &str = "vcode_request_version_1";

/// Nonce length in bytes
pub const NONCE_LEN: usize = 16;

const INVALID_URL_MSG: &str = "Invalid URL";
const INVALID_KEY_SECRET_MSG: &str = "Invalid API key secret format - must be hex string";
const EMPTY_KEY_SECRET_MSG: &str = "API key secret cannot be empty";
const HMAC_CREATION_FAILED_MSG: &str = "Failed to create HMAC";

/// Build an authorization header for one outbound request.
///
/// A fresh timestamp and a random 16 byte nonce are generated per call, so two
/// headers for the same request never repeat.
///
/// # Arguments
///
/// * `key_id` - API key ID
/// * `key_secret_hex` - API key secret, hex encoded
/// * `method` - HTTP method, upper case (e.g. `GET`)
/// * `url` - Fully constructed request URL, query string included
///
/// # Errors
///
/// Returns `VeracodeError::Configuration` if the secret is not valid hex or the
/// URL cannot be parsed.
pub fn sign(
    key_id: &str,
    key_secret_hex: &str,
    method: &str,
    url: &str,
) -> Result<String, VeracodeError> {
    let timestamp = current_timestamp_millis()?;
    let nonce: [u8; NONCE_LEN] = rand::random();
    sign_with(key_id, key_secret_hex, method, url, timestamp, &nonce)
}

/// Deterministic form of [`sign`] with the timestamp and nonce supplied by the caller.
///
/// # Errors
///
/// Returns `VeracodeError::Configuration` if the secret is not valid hex or the
/// URL cannot be parsed.
pub fn sign_with(
    key_id: &str,
    key_secret_hex: &str,
    method: &str,
    url: &str,
    timestamp_millis: u64,
    nonce: &[u8; NONCE_LEN],
) -> Result<String, VeracodeError> {
    let (host, request_uri) = split_url(url)?;
    let key = decode_key_secret(key_secret_hex)?;
    let timestamp = timestamp_millis.to_string();

    let data = format!("id={key_id}&host={host}&url={request_uri}&method={method}");
    let signature = chain_signature(&key, nonce, timestamp.as_bytes(), data.as_bytes())?;

    Ok(format!(
        "{AUTH_SCHEME} id={key_id},ts={timestamp},nonce={},sig={}",
        hex::encode_upper(nonce),
        hex::encode_upper(signature)
    ))
}

/// Check that a key secret decodes as hex without signing anything.
///
/// # Errors
///
/// Returns `VeracodeError::Configuration` for an empty or non-hex secret.
pub fn validate_key_secret(key_secret_hex: &str) -> Result<(), VeracodeError> {
    decode_key_secret(key_secret_hex).map(|_| ())
}

fn decode_key_secret(key_secret_hex: &str) -> Result<Vec<u8>, VeracodeError> {
    if key_secret_hex.is_empty() {
        return Err(VeracodeError::Configuration(EMPTY_KEY_SECRET_MSG.to_string()));
    }
    hex::decode(key_secret_hex)
        .map_err(|_| VeracodeError::Configuration(INVALID_KEY_SECRET_MSG.to_string()))
}

/// Split a URL into the host and the request URI (path plus query) that get signed.
fn split_url(url: &str) -> Result<(String, String), VeracodeError> {
    let parsed =
        Url::parse(url).map_err(|_| VeracodeError::Configuration(INVALID_URL_MSG.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| VeracodeError::Configuration(INVALID_URL_MSG.to_string()))?
        .to_string();

    let request_uri = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    Ok((host, request_uri))
}

fn chain_signature(
    key: &[u8],
    nonce: &[u8],
    timestamp: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, VeracodeError> {
    let hashed_nonce = hmac_sha256(key, nonce)?;
    let hashed_timestamp = hmac_sha256(&hashed_nonce, timestamp)?;
    let signing_key = hmac_sha256(&hashed_timestamp, REQUEST_VERSION.as_bytes())?;
    hmac_sha256(&signing_key, data)
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, VeracodeError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| VeracodeError::Configuration(HMAC_CREATION_FAILED_MSG.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn current_timestamp_millis() -> Result<u64, VeracodeError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VeracodeError::Configuration(format!("System time error: {e}")))?;
    Ok(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
