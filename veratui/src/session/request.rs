//! Fetches issued by the session and the completions fed back to it.

use veracode_api::{
    AnnotationData, AnnotationErrorResponse, AnnotationResponse, ApiCredentials, Application,
    ApplicationQuery, Finding, FindingsQuery, PagedResource, Principal, Sandbox, StaticFlawInfo,
    VeracodeError,
};

use super::scope::Ticket;

/// Work order for the fetch dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    Applications {
        ticket: Ticket,
        query: ApplicationQuery,
    },
    Sandboxes {
        ticket: Ticket,
        application_guid: String,
    },
    Findings {
        ticket: Ticket,
        application_guid: String,
        query: FindingsQuery,
    },
    StaticFlawInfo {
        ticket: Ticket,
        application_guid: String,
        issue_id: u64,
    },
    /// One `size=1` findings request per scan type, read for `total_elements`
    FindingCounts {
        ticket: Ticket,
        application_guid: String,
        context: Option<String>,
    },
    Principal {
        ticket: Ticket,
    },
    CreateAnnotation {
        ticket: Ticket,
        application_guid: String,
        annotation: AnnotationData,
        context: Option<String>,
    },
}

impl FetchRequest {
    #[must_use]
    pub fn ticket(&self) -> Ticket {
        match self {
            FetchRequest::Applications { ticket, .. }
            | FetchRequest::Sandboxes { ticket, .. }
            | FetchRequest::Findings { ticket, .. }
            | FetchRequest::StaticFlawInfo { ticket, .. }
            | FetchRequest::FindingCounts { ticket, .. }
            | FetchRequest::Principal { ticket }
            | FetchRequest::CreateAnnotation { ticket, .. } => *ticket,
        }
    }
}

/// Identity shown in the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub principal: Principal,
    /// `None` when the key metadata could not be read
    pub credentials: Option<ApiCredentials>,
}

/// Finding totals per scan type for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindingCounts {
    pub static_count: u64,
    pub dynamic_count: u64,
    pub sca_count: u64,
}

impl FindingCounts {
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "STATIC {} • DYNAMIC {} • SCA {}",
            self.static_count, self.dynamic_count, self.sca_count
        )
    }
}

/// Successful result payload of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Applications(PagedResource<Application>),
    Sandboxes(Vec<Sandbox>),
    Findings(PagedResource<Finding>),
    StaticFlawInfo(StaticFlawInfo),
    FindingCounts(FindingCounts),
    Identity(Identity),
    Annotation(AnnotationResponse),
}

/// A finished fetch, delivered back to the event loop.
#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub result: Result<FetchOutcome, VeracodeError>,
}

impl Completion {
    #[must_use]
    pub fn new(ticket: Ticket, result: Result<FetchOutcome, VeracodeError>) -> Self {
        Self { ticket, result }
    }
}

/// Operator-facing text for a failed fetch.
#[must_use]
pub fn describe_error(err: &VeracodeError) -> String {
    if let VeracodeError::Http(http) = err
        && let Some(api_errors) = AnnotationErrorResponse::parse(&http.body)
    {
        let messages = api_errors.messages();
        if !messages.is_empty() {
            return format!("Error: HTTP {}: {}", http.status_code, messages.join("; "));
        }
    }
    if err.is_timeout() {
        return "Error: request timed out".to_string();
    }
    format!("Error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use veracode_api::{HttpError, ValidationError};

    #[test]
    fn test_http_errors_keep_body() {
        let err: VeracodeError =
            HttpError::new(404, "404 Not Found", br#"{"message":"not found"}"#.to_vec()).into();
        assert_eq!(describe_error(&err), r#"Error: HTTP 404: {"message":"not found"}"#);
    }

    #[test]
    fn test_api_errors_are_summarised() {
        let body = br#"{"_embedded": {"api_errors": [{"detail": "Issue 99 does not exist"}]}}"#;
        let err: VeracodeError = HttpError::new(400, "400 Bad Request", body.to_vec()).into();
        assert_eq!(
            describe_error(&err),
            "Error: HTTP 400: Issue 99 does not exist"
        );
    }

    #[test]
    fn test_validation_errors() {
        let err: VeracodeError = ValidationError::InvalidIssueId.into();
        assert!(describe_error(&err).starts_with("Error: Invalid request:"));
    }
}
