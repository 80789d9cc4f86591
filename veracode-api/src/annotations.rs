//! Annotation creation: the only write call this client makes.
//!
//! An annotation attaches a mitigation action and comment to one or more
//! findings of an application, optionally inside a sandbox context.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::Transport;
use crate::json_validator::decode_json;
use crate::validation::{ValidationError, require_segment};
use crate::VeracodeError;

const APPLICATIONS_V2_PATH: &str = "/appsec/v2/applications";

/// Mitigation action recorded by an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnnotationAction {
    /// Plain comment
    Comment,
    /// False positive
    #[serde(rename = "FP")]
    FalsePositive,
    /// Mitigated by application design
    AppDesign,
    /// Mitigated by operating system environment
    OsEnv,
    /// Mitigated by network environment
    NetEnv,
    /// Reject a proposed mitigation
    Rejected,
    /// Accept a proposed mitigation
    Accepted,
    /// Reported in a library
    Library,
    /// Accept the risk
    AcceptRisk,
}

impl AnnotationAction {
    pub const ALL: [AnnotationAction; 9] = [
        AnnotationAction::Comment,
        AnnotationAction::FalsePositive,
        AnnotationAction::AppDesign,
        AnnotationAction::OsEnv,
        AnnotationAction::NetEnv,
        AnnotationAction::Rejected,
        AnnotationAction::Accepted,
        AnnotationAction::Library,
        AnnotationAction::AcceptRisk,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationAction::Comment => "COMMENT",
            AnnotationAction::FalsePositive => "FP",
            AnnotationAction::AppDesign => "APPDESIGN",
            AnnotationAction::OsEnv => "OSENV",
            AnnotationAction::NetEnv => "NETENV",
            AnnotationAction::Rejected => "REJECTED",
            AnnotationAction::Accepted => "ACCEPTED",
            AnnotationAction::Library => "LIBRARY",
            AnnotationAction::AcceptRisk => "ACCEPTRISK",
        }
    }

    /// Human readable label for pickers
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AnnotationAction::Comment => "Comment",
            AnnotationAction::FalsePositive => "False Positive",
            AnnotationAction::AppDesign => "Mitigate by Design",
            AnnotationAction::OsEnv => "Mitigate by OS Environment",
            AnnotationAction::NetEnv => "Mitigate by Network Environment",
            AnnotationAction::Rejected => "Reject Mitigation",
            AnnotationAction::Accepted => "Accept Mitigation",
            AnnotationAction::Library => "Reported Library",
            AnnotationAction::AcceptRisk => "Accept Risk",
        }
    }
}

impl fmt::Display for AnnotationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for annotation creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationData {
    /// Comma separated issue ids
    pub issue_list: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub action: AnnotationAction,
}

impl AnnotationData {
    #[must_use]
    pub fn new(issue_ids: &[u64], action: AnnotationAction, comment: impl Into<String>) -> Self {
        let issue_list = issue_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self {
            issue_list,
            comment: comment.into(),
            action,
        }
    }
}

/// Successful creation response; the server may also answer with no body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnnotationResponse {
    /// Link to the findings of the application
    pub findings: Option<String>,
}

/// One entry of an `_embedded.api_errors` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub id: Option<String>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub detail: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct EmbeddedApiErrors {
    api_errors: Vec<ApiError>,
}

/// Error body returned by the annotations endpoint on rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnnotationErrorResponse {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedApiErrors,
}

impl AnnotationErrorResponse {
    /// Parse an HTTP error body, `None` when it is not an `api_errors` document.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .filter(|parsed| !parsed.embedded.api_errors.is_empty())
    }

    #[must_use]
    pub fn errors(&self) -> &[ApiError] {
        &self.embedded.api_errors
    }

    /// One line per error: detail, falling back to title, then code
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.embedded
            .api_errors
            .iter()
            .filter_map(|e| {
                e.detail
                    .as_deref()
                    .or(e.title.as_deref())
                    .or(e.code.as_deref())
                    .map(str::to_string)
            })
            .collect()
    }
}

/// Annotations API operations.
pub struct AnnotationsApi<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> AnnotationsApi<'a, T> {
    #[must_use]
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Create an annotation for findings of an application.
    ///
    /// `context` is the sandbox GUID when the findings belong to a sandbox.
    ///
    /// # Errors
    ///
    /// `Validation` when the GUID or issue list is empty, otherwise any
    /// transport, HTTP or decode error. Rejections carry the server's
    /// `api_errors` body, which [`AnnotationErrorResponse::parse`] reads.
    pub async fn create_annotation(
        &self,
        application_guid: &str,
        annotation: &AnnotationData,
        context: Option<&str>,
    ) -> Result<AnnotationResponse, VeracodeError> {
        let guid = require_segment("application GUID", application_guid)?;
        if annotation.issue_list.trim().is_empty() {
            return Err(ValidationError::EmptyIssueList.into());
        }

        let mut params = Vec::new();
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            params.push(("context".to_string(), context.to_string()));
        }

        let payload = serde_json::to_vec(annotation).map_err(|e| {
            VeracodeError::Configuration(format!("Failed to encode annotation: {e}"))
        })?;

        let path = format!("{APPLICATIONS_V2_PATH}/{guid}/annotations");
        let body = self
            .transport
            .request(Method::POST, &path, &params, Some(payload))
            .await?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(AnnotationResponse::default());
        }
        decode_json("annotation", &body)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        let names: Vec<String> = AnnotationAction::ALL
            .iter()
            .map(|a| serde_json::to_value(a).expect("serializes"))
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "COMMENT",
                "FP",
                "APPDESIGN",
                "OSENV",
                "NETENV",
                "REJECTED",
                "ACCEPTED",
                "LIBRARY",
                "ACCEPTRISK"
            ]
        );
        for action in AnnotationAction::ALL {
            assert_eq!(
                serde_json::to_value(action).expect("serializes"),
                serde_json::Value::String(action.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_annotation_body() {
        let data = AnnotationData::new(&[123, 456], AnnotationAction::FalsePositive, "Not reachable");
        let json = serde_json::to_value(&data).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({"issue_list": "123,456", "comment": "Not reachable", "action": "FP"})
        );

        let bare = AnnotationData::new(&[7], AnnotationAction::Comment, "");
        let json = serde_json::to_value(&bare).expect("serializes");
        assert!(json.get("comment").is_none());
    }

    #[test]
    fn test_error_response_messages() {
        let body = br#"{"_embedded": {"api_errors": [
            {"id": "1", "code": "BAD_REQUEST", "title": "Bad Request", "detail": "Issue 99 does not exist", "status": "400"},
            {"code": "FORBIDDEN"}
        ]}}"#;
        let parsed = AnnotationErrorResponse::parse(body).expect("api errors parse");
        assert_eq!(parsed.errors().len(), 2);
        assert_eq!(
            parsed.messages(),
            vec!["Issue 99 does not exist".to_string(), "FORBIDDEN".to_string()]
        );
    }

    #[test]
    fn test_error_response_parse_rejects_other_bodies() {
        assert!(AnnotationErrorResponse::parse(b"{}").is_none());
        assert!(AnnotationErrorResponse::parse(b"not json").is_none());
    }
}
