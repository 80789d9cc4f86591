//! Input validation applied before any request leaves the process.
//!
//! Required path parameters are checked here so that a missing identifier is
//! reported as a [`ValidationError`] instead of a 404 from the server.

use chrono::NaiveDate;
use thiserror::Error;

/// Maximum accepted length of a GUID path segment
pub const MAX_GUID_LEN: usize = 128;

/// Page size used when the caller does not pick one
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the REST API accepts
pub const MAX_PAGE_SIZE: u32 = 500;

/// Date format accepted by `modified_after` style filters
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation errors for call parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[must_use = "Need to handle all error enum types."]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("{name} too long: {actual} chars (max: {max})")]
    SegmentTooLong {
        name: &'static str,
        actual: usize,
        max: usize,
    },

    #[error("Invalid path characters in {0} (possible path traversal)")]
    InvalidPathCharacters(&'static str),

    #[error("Control characters not allowed in {0}")]
    ControlCharactersNotAllowed(&'static str),

    #[error("Invalid page size: {0} (must be 1-{MAX_PAGE_SIZE})")]
    InvalidPageSize(u32),

    #[error("Invalid severity: {0} (must be 0-5)")]
    InvalidSeverity(u8),

    #[error("Issue id must be greater than zero")]
    InvalidIssueId,

    #[error("Annotation issue list cannot be empty")]
    EmptyIssueList,

    #[error("Invalid date format. Please use yyyy-MM-dd (e.g., 2025-12-17)")]
    InvalidDate(String),
}

/// Validate a required identifier that is placed into the URL path.
///
/// # Errors
///
/// `MissingParameter` when empty, otherwise a path-safety error.
pub fn require_segment<'a>(name: &'static str, segment: &'a str) -> Result<&'a str, ValidationError> {
    if segment.trim().is_empty() {
        return Err(ValidationError::MissingParameter(name));
    }

    if segment.len() > MAX_GUID_LEN {
        return Err(ValidationError::SegmentTooLong {
            name,
            actual: segment.len(),
            max: MAX_GUID_LEN,
        });
    }

    // Reject path traversal sequences
    if segment.contains("..")
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('?')
        || segment.contains('#')
    {
        return Err(ValidationError::InvalidPathCharacters(name));
    }

    if segment.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharactersNotAllowed(name));
    }

    Ok(segment)
}

/// Check a page size against the API maximum.
///
/// # Errors
///
/// `InvalidPageSize` for 0 or anything above [`MAX_PAGE_SIZE`].
pub fn validate_page_size(size: u32) -> Result<u32, ValidationError> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ValidationError::InvalidPageSize(size));
    }
    Ok(size)
}

/// Parse a strict `yyyy-MM-dd` date.
///
/// Calendar-invalid values such as `2025-13-45` or `2025-02-30` are rejected,
/// as are signs and single-digit fields: the text must be exactly `dddd-dd-dd`.
///
/// # Errors
///
/// `InvalidDate` carrying the rejected input.
pub fn validate_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let well_formed = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(ValidationError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}
