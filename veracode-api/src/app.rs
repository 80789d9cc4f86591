//! Applications and sandboxes.
//!
//! Wraps `/appsec/v1/applications` and the per-application sandbox
//! endpoints. Listing responses come back as [`PagedResource`] pages which
//! are replaced wholesale by the caller on every fetch.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::client::Transport;
use crate::json_validator::decode_json;
use crate::validation::{require_segment, validate_date, validate_page_size};
use crate::VeracodeError;

const APPLICATIONS_PATH: &str = "/appsec/v1/applications";

/// Scan status values accepted by the `scan_status` filter.
pub const SCAN_STATUS_OPTIONS: &[&str] = &[
    "PUBLISHED",
    "INCOMPLETE",
    "IN_PROGRESS",
    "SCAN_IN_PROGRESS",
    "UNPUBLISHED",
    "DELETED",
    "SCAN_SUBMITTED",
    "IN_QUEUE",
    "SCAN_CANCELED",
    "ANALYSIS_ERRORS",
];

/// Scan type values accepted by the application `scan_type` filter.
pub const APPLICATION_SCAN_TYPE_OPTIONS: &[&str] = &["STATIC", "DYNAMIC", "MANUAL"];

/// Pagination block returned with every listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMetadata {
    /// Current page number (0-based)
    pub number: u32,
    /// Number of items per page
    pub size: u32,
    /// Total number of elements across all pages
    pub total_elements: u64,
    /// Total number of pages
    pub total_pages: u32,
}

/// One page of a HAL listing.
///
/// The server nests the items under `_embedded.<resource name>`, and omits
/// `_embedded` entirely for an empty page.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResource<T> {
    items: Vec<T>,
    page: PageMetadata,
}

#[derive(Deserialize)]
struct RawPagedResource<T> {
    #[serde(rename = "_embedded")]
    embedded: Option<BTreeMap<String, Vec<T>>>,
    page: Option<PageMetadata>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PagedResource<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawPagedResource::<T>::deserialize(deserializer)?;
        let items = raw
            .embedded
            .and_then(|embedded| embedded.into_values().next())
            .unwrap_or_default();
        Ok(Self {
            items,
            page: raw.page.unwrap_or_default(),
        })
    }
}

impl<T> PagedResource<T> {
    #[must_use]
    pub fn new(items: Vec<T>, page: PageMetadata) -> Self {
        Self { items, page }
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    #[must_use]
    pub fn page(&self) -> PageMetadata {
        self.page
    }

    #[must_use]
    pub fn total_elements(&self) -> u64 {
        self.page.total_elements
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.page.total_pages
    }
}

/// Represents a Veracode application profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Globally unique identifier (GUID) for the application
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub id: u64,
    /// Numeric identifier used by the XML APIs
    #[serde(default)]
    pub legacy_id: u64,
    pub app_profile_url: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub last_completed_scan_date: Option<DateTime<Utc>>,
    pub oid: Option<u64>,
    pub organization_id: Option<u64>,
    pub profile: Option<Profile>,
    pub results_url: Option<String>,
    #[serde(default)]
    pub scans: Vec<ApplicationScan>,
}

impl Application {
    /// Profile name, or "Unknown" when the profile block is absent
    #[must_use]
    pub fn name(&self) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown")
    }

    /// Compliance status of the first attached policy
    #[must_use]
    pub fn policy_compliance_status(&self) -> Option<&str> {
        self.profile
            .as_ref()?
            .policies
            .first()?
            .policy_compliance_status
            .as_deref()
    }

    /// Status of the most recent scan listed for the application
    #[must_use]
    pub fn scan_status(&self) -> Option<&str> {
        self.scans.first()?.status.as_deref()
    }

    #[must_use]
    pub fn business_unit_name(&self) -> Option<&str> {
        self.profile.as_ref()?.business_unit.as_ref()?.name.as_deref()
    }
}

/// Application profile information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub business_criticality: Option<String>,
    pub business_unit: Option<BusinessUnit>,
    #[serde(default)]
    pub business_owners: Vec<BusinessOwner>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub teams: Vec<Team>,
    pub tags: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    pub archer_app_name: Option<String>,
    pub git_repo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessUnit {
    pub guid: Option<String>,
    pub id: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessOwner {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Policy attached to an application profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    /// PASSED, DID_NOT_PASS, CONDITIONAL_PASS, ...
    pub policy_compliance_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub guid: Option<String>,
    pub team_id: Option<u64>,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: Option<String>,
    pub value: Option<String>,
}

/// Scan summary embedded in an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationScan {
    /// STATIC, DYNAMIC, MANUAL, ...
    pub scan_type: Option<String>,
    pub status: Option<String>,
    pub internal_status: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub scan_url: Option<String>,
}

/// Represents a Veracode sandbox under an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sandbox {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub application_guid: Option<String>,
    pub organization_id: Option<u64>,
    pub owner_username: Option<String>,
    #[serde(default)]
    pub auto_recreate: bool,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Query parameters for filtering applications.
///
/// Unset fields, empty strings and zero numbers are left out of the query
/// string entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub business_unit: Option<String>,
    pub custom_field_names: Vec<String>,
    pub custom_field_values: Vec<String>,
    pub legacy_id: Option<u64>,
    /// yyyy-MM-dd
    pub modified_after: Option<String>,
    /// Partial match on the profile name
    pub name: Option<String>,
    /// Page number (0-based)
    pub page: Option<u32>,
    pub policy: Option<String>,
    pub policy_compliance: Option<String>,
    /// yyyy-MM-dd
    pub policy_compliance_checked_after: Option<String>,
    pub policy_guid: Option<String>,
    pub scan_status: Vec<String>,
    pub scan_type: Option<String>,
    /// Items per page, at most 500
    pub size: Option<u32>,
    pub sort_by_custom_field_name: Option<String>,
    pub tag: Option<String>,
    pub team: Option<String>,
}

impl ApplicationQuery {
    /// Create a new empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_business_unit(mut self, business_unit: impl Into<String>) -> Self {
        self.business_unit = Some(business_unit.into());
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    #[must_use]
    pub fn with_policy_compliance(mut self, compliance: impl Into<String>) -> Self {
        self.policy_compliance = Some(compliance.into());
        self
    }

    /// Filter applications modified after a `yyyy-MM-dd` date.
    #[must_use]
    pub fn with_modified_after(mut self, date: impl Into<String>) -> Self {
        self.modified_after = Some(date.into());
        self
    }

    #[must_use]
    pub fn with_scan_status(mut self, status: impl Into<String>) -> Self {
        self.scan_status.push(status.into());
        self
    }

    #[must_use]
    pub fn with_scan_type(mut self, scan_type: impl Into<String>) -> Self {
        self.scan_type = Some(scan_type.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Check values the server would otherwise reject with a 400.
    ///
    /// # Errors
    ///
    /// `ValidationError` for a bad page size or a malformed date filter.
    pub fn validate(&self) -> Result<(), crate::ValidationError> {
        if let Some(size) = self.size.filter(|s| *s > 0) {
            validate_page_size(size)?;
        }
        for date in [&self.modified_after, &self.policy_compliance_checked_after]
            .into_iter()
            .flatten()
            .filter(|d| !d.is_empty())
        {
            validate_date(date)?;
        }
        Ok(())
    }

    /// Convert the query to URL query parameters.
    #[must_use]
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        push_text(&mut params, "business_unit", self.business_unit.as_deref());
        for name in &self.custom_field_names {
            params.push(("custom_field_names".to_string(), name.clone()));
        }
        for value in &self.custom_field_values {
            params.push(("custom_field_values".to_string(), value.clone()));
        }
        if let Some(legacy_id) = self.legacy_id.filter(|id| *id > 0) {
            params.push(("legacy_id".to_string(), legacy_id.to_string()));
        }
        push_text(&mut params, "modified_after", self.modified_after.as_deref());
        push_text(&mut params, "name", self.name.as_deref());
        if let Some(page) = self.page.filter(|p| *p > 0) {
            params.push(("page".to_string(), page.to_string()));
        }
        push_text(&mut params, "policy", self.policy.as_deref());
        push_text(&mut params, "policy_compliance", self.policy_compliance.as_deref());
        push_text(
            &mut params,
            "policy_compliance_checked_after",
            self.policy_compliance_checked_after.as_deref(),
        );
        push_text(&mut params, "policy_guid", self.policy_guid.as_deref());
        for status in self.scan_status.iter().filter(|s| !s.is_empty()) {
            params.push(("scan_status".to_string(), status.clone()));
        }
        push_text(&mut params, "scan_type", self.scan_type.as_deref());
        if let Some(size) = self.size.filter(|s| *s > 0) {
            params.push(("size".to_string(), size.to_string()));
        }
        push_text(
            &mut params,
            "sort_by_custom_field_name",
            self.sort_by_custom_field_name.as_deref(),
        );
        push_text(&mut params, "tag", self.tag.as_deref());
        push_text(&mut params, "team", self.team.as_deref());

        params
    }
}

fn push_text(params: &mut Vec<(String, String)>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        params.push((key.to_string(), value.to_string()));
    }
}

/// Applications API operations.
pub struct ApplicationsApi<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> ApplicationsApi<'a, T> {
    #[must_use]
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// List applications matching `query`.
    ///
    /// # Errors
    ///
    /// `Validation` for an out-of-range page size or malformed date filter,
    /// otherwise any transport, HTTP or decode error.
    pub async fn get_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<PagedResource<Application>, VeracodeError> {
        query.validate()?;
        let params = query.to_query_params();

        let body = self
            .transport
            .request(Method::GET, APPLICATIONS_PATH, &params, None)
            .await?;
        decode_json("applications", &body)
    }

    /// Get a specific application by its GUID.
    ///
    /// # Errors
    ///
    /// `Validation` when `guid` is empty, otherwise any request error.
    pub async fn get_application(&self, guid: &str) -> Result<Application, VeracodeError> {
        let guid = require_segment("application GUID", guid)?;
        let path = format!("{APPLICATIONS_PATH}/{guid}");

        let body = self.transport.request(Method::GET, &path, &[], None).await?;
        decode_json("application", &body)
    }

    /// List the sandboxes of an application.
    ///
    /// # Errors
    ///
    /// `Validation` when `application_guid` is empty or `size` exceeds the
    /// API maximum, otherwise any request error.
    pub async fn get_sandboxes(
        &self,
        application_guid: &str,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<PagedResource<Sandbox>, VeracodeError> {
        let guid = require_segment("application GUID", application_guid)?;

        let mut params = Vec::new();
        if let Some(page) = page.filter(|p| *p > 0) {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = size.filter(|s| *s > 0) {
            params.push(("size".to_string(), validate_page_size(size)?.to_string()));
        }

        let path = format!("{APPLICATIONS_PATH}/{guid}/sandboxes");
        let body = self
            .transport
            .request(Method::GET, &path, &params, None)
            .await?;
        decode_json("sandboxes", &body)
    }

    /// Get a single sandbox.
    ///
    /// # Errors
    ///
    /// `Validation` when either GUID is empty, otherwise any request error.
    pub async fn get_sandbox(
        &self,
        application_guid: &str,
        sandbox_guid: &str,
    ) -> Result<Sandbox, VeracodeError> {
        let app_guid = require_segment("application GUID", application_guid)?;
        let sandbox_guid = require_segment("sandbox GUID", sandbox_guid)?;
        let path = format!("{APPLICATIONS_PATH}/{app_guid}/sandboxes/{sandbox_guid}");

        let body = self.transport.request(Method::GET, &path, &[], None).await?;
        decode_json("sandbox", &body)
    }
}
