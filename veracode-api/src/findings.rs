//! Findings API for retrieving security findings and static flaw data paths.
//!
//! Findings are addressed per application, optionally narrowed to a sandbox
//! through the `context` parameter. Each finding carries a scan-type specific
//! detail block which is decoded into [`FindingDetails`] according to the
//! finding's declared `scan_type`.

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app::PagedResource;
use crate::client::Transport;
use crate::json_validator::decode_json;
use crate::validation::{ValidationError, require_segment, validate_page_size};
use crate::VeracodeError;

const APPLICATIONS_V2_PATH: &str = "/appsec/v2/applications";

/// Highest severity the platform reports.
pub const MAX_SEVERITY: u8 = 5;

/// Category of analysis that produced a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanType {
    Static,
    Dynamic,
    Manual,
    Sca,
    /// A scan type this client does not model; kept verbatim
    Other(String),
}

impl ScanType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ScanType::Static => "STATIC",
            ScanType::Dynamic => "DYNAMIC",
            ScanType::Manual => "MANUAL",
            ScanType::Sca => "SCA",
            ScanType::Other(other) => other,
        }
    }

    /// Whether `include_annot` may be sent for this scan type
    #[must_use]
    pub fn supports_annotations(&self) -> bool {
        !matches!(self, ScanType::Sca)
    }
}

impl From<String> for ScanType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "STATIC" => ScanType::Static,
            "DYNAMIC" => ScanType::Dynamic,
            "MANUAL" => ScanType::Manual,
            "SCA" => ScanType::Sca,
            _ => ScanType::Other(value),
        }
    }
}

impl From<ScanType> for String {
    fn from(value: ScanType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level 0-5, where 5 is the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(pub u8);

impl Severity {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self.0 {
            5 => "Very High",
            4 => "High",
            3 => "Medium",
            2 => "Low",
            1 => "Very Low",
            0 => "Informational",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Policy-violation filter offered for findings listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyFilter {
    #[default]
    All,
    Violations,
    NonViolations,
}

impl PolicyFilter {
    pub const OPTIONS: [PolicyFilter; 3] = [
        PolicyFilter::All,
        PolicyFilter::Violations,
        PolicyFilter::NonViolations,
    ];

    /// Value of the `violates_policy` parameter; `None` leaves it out
    #[must_use]
    pub fn violates_policy(self) -> Option<bool> {
        match self {
            PolicyFilter::All => None,
            PolicyFilter::Violations => Some(true),
            PolicyFilter::NonViolations => Some(false),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PolicyFilter::All => "All",
            PolicyFilter::Violations => "Violations",
            PolicyFilter::NonViolations => "Non-Violations",
        }
    }
}

/// CWE (Common Weakness Enumeration) information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CweInfo {
    pub id: u32,
    pub name: String,
    pub href: Option<String>,
}

/// Finding category information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingCategory {
    pub id: u32,
    pub name: String,
    pub href: Option<String>,
}

/// Detail block of a static analysis finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticDetails {
    pub severity: Severity,
    pub cwe: Option<CweInfo>,
    pub finding_category: Option<FindingCategory>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_line_number: Option<u32>,
    pub module: Option<String>,
    pub procedure: Option<String>,
    pub relative_location: Option<i32>,
    pub exploitability: Option<i32>,
    pub attack_vector: Option<String>,
}

/// Detail block of a dynamic analysis finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicDetails {
    pub severity: Severity,
    pub cwe: Option<CweInfo>,
    pub finding_category: Option<FindingCategory>,
    pub url: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
    pub vulnerable_parameter: Option<String>,
    pub attack_vector: Option<String>,
    pub plugin: Option<String>,
    pub discovered_by_vsa: Option<String>,
}

/// Detail block of a manual penetration test finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualDetails {
    pub severity: Severity,
    pub cwe: Option<CweInfo>,
    pub capec_id: Option<u32>,
    pub exploit_desc: Option<String>,
    pub exploitability: Option<i32>,
    pub input_vector: Option<String>,
    pub location: Option<String>,
    pub module: Option<String>,
    pub remediation_desc: Option<String>,
    pub severity_desc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cvss3 {
    pub score: Option<f64>,
    pub severity: Option<String>,
    pub vector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CveInfo {
    pub name: Option<String>,
    pub cvss: Option<f64>,
    pub href: Option<String>,
    pub severity: Option<String>,
    pub vector: Option<String>,
    pub cvss3: Option<Cvss3>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentPath {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub license_id: Option<String>,
    pub risk_rating: Option<String>,
}

/// Detail block of a software composition analysis finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaDetails {
    pub severity: Severity,
    pub cwe: Option<CweInfo>,
    pub component_id: Option<String>,
    pub component_filename: Option<String>,
    pub component_path: Vec<ComponentPath>,
    pub language: Option<String>,
    pub licenses: Vec<License>,
    pub version: Option<String>,
    pub product_id: Option<String>,
    pub cve: Option<CveInfo>,
}

/// Scan-type specific detail of a finding.
#[derive(Debug, Clone, PartialEq)]
pub enum FindingDetails {
    Static(StaticDetails),
    Dynamic(DynamicDetails),
    Manual(ManualDetails),
    Sca(ScaDetails),
    /// No detail block, or a scan type without a modelled schema
    None,
}

impl FindingDetails {
    fn decode(scan_type: &ScanType, raw: Option<serde_json::Value>) -> Result<Self, serde_json::Error> {
        let Some(value) = raw.filter(|v| !v.is_null()) else {
            return Ok(FindingDetails::None);
        };
        Ok(match scan_type {
            ScanType::Static => FindingDetails::Static(serde_json::from_value(value)?),
            ScanType::Dynamic => FindingDetails::Dynamic(serde_json::from_value(value)?),
            ScanType::Manual => FindingDetails::Manual(serde_json::from_value(value)?),
            ScanType::Sca => FindingDetails::Sca(serde_json::from_value(value)?),
            ScanType::Other(other) => {
                debug!("No detail schema for scan type {other}");
                FindingDetails::None
            }
        })
    }

    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        match self {
            FindingDetails::Static(d) => Some(d.severity),
            FindingDetails::Dynamic(d) => Some(d.severity),
            FindingDetails::Manual(d) => Some(d.severity),
            FindingDetails::Sca(d) => Some(d.severity),
            FindingDetails::None => None,
        }
    }

    #[must_use]
    pub fn cwe(&self) -> Option<&CweInfo> {
        match self {
            FindingDetails::Static(d) => d.cwe.as_ref(),
            FindingDetails::Dynamic(d) => d.cwe.as_ref(),
            FindingDetails::Manual(d) => d.cwe.as_ref(),
            FindingDetails::Sca(d) => d.cwe.as_ref(),
            FindingDetails::None => None,
        }
    }

    /// Where the finding lives: file and line, URL, component or location
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            FindingDetails::Static(d) => {
                let file = d.file_path.as_deref().or(d.file_name.as_deref())?;
                Some(match d.file_line_number {
                    Some(line) => format!("{file}:{line}"),
                    None => file.to_string(),
                })
            }
            FindingDetails::Dynamic(d) => d.url.clone().or_else(|| d.path.clone()),
            FindingDetails::Manual(d) => d.location.clone(),
            FindingDetails::Sca(d) => d.component_filename.clone(),
            FindingDetails::None => None,
        }
    }
}

/// Status information for a finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingStatus {
    pub first_found_date: Option<DateTime<Utc>>,
    pub last_seen_date: Option<DateTime<Utc>>,
    /// OPEN, CLOSED, REOPENED
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub resolution_status: Option<String>,
    pub new: bool,
    pub mitigation_review_status: Option<String>,
}

/// A mitigation annotation returned with `include_annot=true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingAnnotation {
    pub action: Option<String>,
    pub comment: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub user_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
struct RawFinding {
    #[serde(default)]
    issue_id: u64,
    scan_type: Option<ScanType>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    count: u32,
    context_type: Option<String>,
    context_guid: Option<String>,
    #[serde(default)]
    violates_policy: bool,
    finding_status: Option<FindingStatus>,
    finding_details: Option<serde_json::Value>,
    #[serde(default)]
    annotations: Vec<FindingAnnotation>,
    grace_period_expires_date: Option<DateTime<Utc>>,
    build_id: Option<u64>,
}

/// A security finding from a Veracode scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFinding")]
pub struct Finding {
    pub issue_id: u64,
    pub scan_type: ScanType,
    pub description: String,
    pub count: u32,
    /// APPLICATION or SANDBOX
    pub context_type: Option<String>,
    pub context_guid: Option<String>,
    pub violates_policy: bool,
    pub finding_status: Option<FindingStatus>,
    pub details: FindingDetails,
    pub annotations: Vec<FindingAnnotation>,
    pub grace_period_expires_date: Option<DateTime<Utc>>,
    pub build_id: Option<u64>,
}

impl TryFrom<RawFinding> for Finding {
    type Error = serde_json::Error;

    fn try_from(raw: RawFinding) -> Result<Self, Self::Error> {
        let scan_type = raw
            .scan_type
            .unwrap_or_else(|| ScanType::Other(String::new()));
        let details = FindingDetails::decode(&scan_type, raw.finding_details)?;
        Ok(Self {
            issue_id: raw.issue_id,
            scan_type,
            description: raw.description,
            count: raw.count,
            context_type: raw.context_type,
            context_guid: raw.context_guid,
            violates_policy: raw.violates_policy,
            finding_status: raw.finding_status,
            details,
            annotations: raw.annotations,
            grace_period_expires_date: raw.grace_period_expires_date,
            build_id: raw.build_id,
        })
    }
}

impl Finding {
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        self.details.severity()
    }

    /// CWE name when known, otherwise the first line of the description
    #[must_use]
    pub fn title(&self) -> &str {
        self.details
            .cwe()
            .map(|cwe| cwe.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.description.lines().next().unwrap_or_default())
    }

    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.finding_status.as_ref()?.status.as_deref()
    }

    #[must_use]
    pub fn resolution_status(&self) -> Option<&str> {
        self.finding_status.as_ref()?.resolution_status.as_deref()
    }
}

/// Query parameters for the findings listing.
///
/// Numeric filters follow the "greater than zero means active" rule, so a
/// severity of 0 cannot be requested on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingsQuery {
    /// Sandbox GUID; `None` addresses the policy (application) scope
    pub context: Option<String>,
    pub scan_types: Vec<ScanType>,
    pub severity: Option<u8>,
    pub severity_gte: Option<u8>,
    pub violates_policy: Option<bool>,
    /// Not valid for SCA findings
    pub include_annotations: bool,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl FindingsQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the listing to a sandbox.
    #[must_use]
    pub fn with_context(mut self, sandbox_guid: impl Into<String>) -> Self {
        self.context = Some(sandbox_guid.into());
        self
    }

    #[must_use]
    pub fn with_scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_types.push(scan_type);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: u8) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_severity_gte(mut self, severity: u8) -> Self {
        self.severity_gte = Some(severity);
        self
    }

    #[must_use]
    pub fn with_policy_filter(mut self, filter: PolicyFilter) -> Self {
        self.violates_policy = filter.violates_policy();
        self
    }

    #[must_use]
    pub fn with_annotations(mut self, include: bool) -> Self {
        self.include_annotations = include;
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

    /// # Errors
    ///
    /// `ValidationError` for a severity above 5 or a bad page size.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for severity in [self.severity, self.severity_gte].into_iter().flatten() {
            if severity > MAX_SEVERITY {
                return Err(ValidationError::InvalidSeverity(severity));
            }
        }
        if let Some(size) = self.size.filter(|s| *s > 0) {
            validate_page_size(size)?;
        }
        Ok(())
    }

    /// Convert the query to URL query parameters.
    #[must_use]
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(context) = self.context.as_deref().filter(|c| !c.is_empty()) {
            params.push(("context".to_string(), context.to_string()));
        }
        for scan_type in &self.scan_types {
            params.push(("scan_type".to_string(), scan_type.to_string()));
        }
        if let Some(severity) = self.severity.filter(|s| *s > 0) {
            params.push(("severity".to_string(), severity.to_string()));
        }
        if let Some(severity) = self.severity_gte.filter(|s| *s > 0) {
            params.push(("severity_gte".to_string(), severity.to_string()));
        }
        if let Some(violates) = self.violates_policy {
            params.push(("violates_policy".to_string(), violates.to_string()));
        }
        if self.include_annotations {
            params.push(("include_annot".to_string(), "true".to_string()));
        }
        if let Some(size) = self.size.filter(|s| *s > 0) {
            params.push(("size".to_string(), size.to_string()));
        }
        if let Some(page) = self.page.filter(|p| *p > 0) {
            params.push(("page".to_string(), page.to_string()));
        }

        params
    }
}

/// Data path information for a static flaw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFlawInfo {
    pub issue_summary: Option<IssueSummary>,
    pub data_paths: Vec<DataPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueSummary {
    pub app_guid: Option<String>,
    pub name: Option<String>,
    pub build_id: Option<u64>,
    pub issue_id: Option<u64>,
    pub context: Option<String>,
}

/// One call stack leading to the flaw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPath {
    pub module_name: Option<String>,
    pub steps: u32,
    pub local_path: Option<String>,
    pub function_name: Option<String>,
    pub line_number: Option<u32>,
    pub calls: Vec<Call>,
}

/// A single frame in a data path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Call {
    pub data_path: u32,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub function_name: Option<String>,
    pub line_number: Option<u32>,
}

/// Findings API operations.
pub struct FindingsApi<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> FindingsApi<'a, T> {
    #[must_use]
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// List findings of an application, or of one of its sandboxes when the
    /// query carries a context.
    ///
    /// # Errors
    ///
    /// `Validation` when `application_guid` is empty or the query is out of
    /// range, otherwise any transport, HTTP or decode error.
    pub async fn get_findings(
        &self,
        application_guid: &str,
        query: &FindingsQuery,
    ) -> Result<PagedResource<Finding>, VeracodeError> {
        let guid = require_segment("application GUID", application_guid)?;
        query.validate()?;
        let params = query.to_query_params();

        let path = format!("{APPLICATIONS_V2_PATH}/{guid}/findings");
        let body = self
            .transport
            .request(Method::GET, &path, &params, None)
            .await?;
        decode_json("findings", &body)
    }

    /// Get the data paths of a static flaw.
    ///
    /// No `context` parameter is sent: the endpoint answers 404 when it is
    /// present, and returns sandbox flaws correctly without it.
    ///
    /// # Errors
    ///
    /// `Validation` when `application_guid` is empty or `issue_id` is 0,
    /// otherwise any transport, HTTP or decode error.
    pub async fn get_static_flaw_info(
        &self,
        application_guid: &str,
        issue_id: u64,
    ) -> Result<StaticFlawInfo, VeracodeError> {
        let guid = require_segment("application GUID", application_guid)?;
        if issue_id == 0 {
            return Err(ValidationError::InvalidIssueId.into());
        }

        let path = format!("{APPLICATIONS_V2_PATH}/{guid}/findings/{issue_id}/static_flaw_info");
        let body = self.transport.request(Method::GET, &path, &[], None).await?;
        decode_json("static flaw info", &body)
    }
}
