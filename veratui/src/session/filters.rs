//! Filter sets, page cursor and text entry buffers.
//!
//! An empty or zero filter value means the filter is inactive and is left out
//! of the request. Applying a change reports whether anything actually
//! changed; the session only resets paging and refetches when it did.

use chrono::NaiveDate;
use veracode_api::validation::{DATE_FORMAT, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, validate_date};
use veracode_api::{ApplicationQuery, FindingsQuery, PolicyFilter, ScanType, ValidationError};

/// Position within a paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page_index: u32,
    page_size: u32,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PageCursor {
    /// Page size is clamped to 1..=500.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn reset(&mut self) {
        self.page_index = 0;
    }

    /// Move forward when another page exists; `false` leaves the cursor as is.
    pub fn advance(&mut self, total_pages: u32) -> bool {
        if self.page_index.saturating_add(1) < total_pages {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    /// Move back unless already on the first page.
    pub fn retreat(&mut self) -> bool {
        if self.page_index > 0 {
            self.page_index -= 1;
            true
        } else {
            false
        }
    }
}

/// Filters of the application listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilters {
    pub name: String,
    pub scan_status: Option<String>,
    pub scan_type: Option<String>,
    pub modified_after: Option<NaiveDate>,
}

/// One application filter mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationFilter {
    Name(String),
    ScanStatus(Option<String>),
    ScanType(Option<String>),
    ModifiedAfter(Option<NaiveDate>),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ApplicationFilters {
    /// Apply a change; `true` when the filter set differs afterwards.
    pub fn apply(&mut self, change: ApplicationFilter) -> bool {
        match change {
            ApplicationFilter::Name(name) => {
                replace_if_changed(&mut self.name, name.trim().to_string())
            }
            ApplicationFilter::ScanStatus(status) => {
                replace_if_changed(&mut self.scan_status, non_empty(status))
            }
            ApplicationFilter::ScanType(scan_type) => {
                replace_if_changed(&mut self.scan_type, non_empty(scan_type))
            }
            ApplicationFilter::ModifiedAfter(date) => {
                replace_if_changed(&mut self.modified_after, date)
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.name.is_empty()
            || self.scan_status.is_some()
            || self.scan_type.is_some()
            || self.modified_after.is_some()
    }

    /// Listing query for the cursor's page.
    #[must_use]
    pub fn to_query(&self, cursor: &PageCursor) -> ApplicationQuery {
        let mut query = ApplicationQuery::new()
            .with_page(cursor.page_index())
            .with_size(cursor.page_size());
        if !self.name.is_empty() {
            query = query.with_name(self.name.clone());
        }
        if let Some(status) = &self.scan_status {
            query = query.with_scan_status(status.clone());
        }
        if let Some(scan_type) = &self.scan_type {
            query = query.with_scan_type(scan_type.clone());
        }
        if let Some(date) = self.modified_after {
            query = query.with_modified_after(date.format(DATE_FORMAT).to_string());
        }
        query
    }
}

/// Scan types offered by the findings scan type filter.
pub const FINDING_SCAN_TYPE_OPTIONS: [ScanType; 3] =
    [ScanType::Static, ScanType::Dynamic, ScanType::Sca];

/// Filters of a findings listing.
///
/// `severity` 0 means unset; informational findings cannot be filtered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingFilters {
    pub scan_type: ScanType,
    pub severity: u8,
    pub policy: PolicyFilter,
}

impl Default for FindingFilters {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Static,
            severity: 0,
            policy: PolicyFilter::All,
        }
    }
}

/// One findings filter mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingFilter {
    ScanType(ScanType),
    Severity(u8),
    Policy(PolicyFilter),
}

impl FindingFilters {
    /// Apply a change; `true` when the filter set differs afterwards.
    pub fn apply(&mut self, change: FindingFilter) -> bool {
        match change {
            FindingFilter::ScanType(scan_type) => replace_if_changed(&mut self.scan_type, scan_type),
            FindingFilter::Severity(severity) => replace_if_changed(&mut self.severity, severity),
            FindingFilter::Policy(policy) => replace_if_changed(&mut self.policy, policy),
        }
    }

    /// Findings query for `context` (`None` is the policy scope).
    ///
    /// Annotations are requested for every scan type except SCA.
    #[must_use]
    pub fn to_query(&self, context: Option<&str>, cursor: &PageCursor) -> FindingsQuery {
        let mut query = FindingsQuery::new()
            .with_scan_type(self.scan_type.clone())
            .with_policy_filter(self.policy)
            .with_annotations(self.scan_type.supports_annotations())
            .with_page(cursor.page_index())
            .with_size(cursor.page_size());
        if let Some(context) = context {
            query = query.with_context(context);
        }
        if self.severity > 0 {
            query = query.with_severity(self.severity);
        }
        query
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Single-line text entry buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    text: String,
}

impl TextInput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn push(&mut self, c: char) {
        if !c.is_control() {
            self.text.push(c);
        }
    }

    pub fn pop(&mut self) {
        self.text.pop();
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// Parse the modified-after entry: blank clears the filter.
///
/// # Errors
///
/// `InvalidDate` for anything that is not a real `yyyy-MM-dd` date.
pub fn parse_modified_after(text: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    validate_date(trimmed).map(Some)
}
