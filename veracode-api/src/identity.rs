//! Identity of the calling API principal.
//!
//! Read-only access to `/api/authn/v2`: who the configured API key belongs
//! to, and when that key expires.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};

use crate::client::Transport;
use crate::json_validator::decode_json;
use crate::VeracodeError;

const PRINCIPAL_PATH: &str = "/api/authn/v2/principal";
const API_CREDENTIALS_PATH: &str = "/api/authn/v2/api_credentials";

/// The user or API service account behind the configured credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Principal {
    pub email: Option<String>,
    pub features: Vec<String>,
    pub organization_id: Option<u64>,
    pub organization_name: Option<String>,
    pub organization_uuid: Option<String>,
    pub permissions: Vec<String>,
    pub pin_required: bool,
    pub roles: Vec<String>,
    pub saml_user: bool,
    pub sandbox_enabled: bool,
    pub user_first_name: Option<String>,
    pub user_id: Option<u64>,
    pub user_last_name: Option<String>,
    pub user_uuid: Option<String>,
    pub username: String,
}

impl Principal {
    /// "First Last" when both names are present, otherwise the username
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.user_first_name.as_deref(), self.user_last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{first} {last}")
            }
            _ => self.username.clone(),
        }
    }
}

/// Metadata of the API key in use. The secret is never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiCredentials {
    pub api_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub expiration_ts: Option<DateTime<Utc>>,
    pub org_id: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub revocation_ts: Option<DateTime<Utc>>,
    pub revocation_user: Option<String>,
    pub user_id: Option<String>,
}

impl ApiCredentials {
    /// Whole days until expiry relative to `now`; negative once expired
    #[must_use]
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expiration_ts.map(|ts| (ts - now).num_days())
    }
}

/// The authn service writes offsets as `+0000`, which RFC 3339 parsing rejects.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .or_else(|_| DateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f%z"))
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
}

/// Identity API operations.
pub struct IdentityApi<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> IdentityApi<'a, T> {
    #[must_use]
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// # Errors
    ///
    /// Any transport, HTTP or decode error.
    pub async fn get_principal(&self) -> Result<Principal, VeracodeError> {
        let body = self
            .transport
            .request(Method::GET, PRINCIPAL_PATH, &[], None)
            .await?;
        decode_json("principal", &body)
    }

    /// # Errors
    ///
    /// Any transport, HTTP or decode error.
    pub async fn get_api_credentials(&self) -> Result<ApiCredentials, VeracodeError> {
        let body = self
            .transport
            .request(Method::GET, API_CREDENTIALS_PATH, &[], None)
            .await?;
        decode_json("api credentials", &body)
    }
}
