//! Wire types returned by the template backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Server-side processing state of an uploaded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Processing,
    Completed,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body of a publish, update or status request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub uid: String,
    pub status: PublishStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A published template as listed by a language section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudTemplate {
    pub uid: String,
    pub title: String,
    pub version: String,
    pub language_section_uid: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub package_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_without_error_message() {
        let r: PublishResponse =
            serde_json::from_str(r#"{"uid":"abc","status":"processing"}"#).unwrap();
        assert_eq!(r.uid, "abc");
        assert_eq!(r.status, PublishStatus::Processing);
        assert_eq!(r.error_message, None);
    }

    #[test]
    fn failed_response_keeps_message() {
        let r: PublishResponse = serde_json::from_str(
            r#"{"uid":"abc","status":"failed","error_message":"corrupt zip"}"#,
        )
        .unwrap();
        assert_eq!(r.status, PublishStatus::Failed);
        assert_eq!(r.error_message.as_deref(), Some("corrupt zip"));
    }

    #[test]
    fn unknown_status_rejected() {
        assert!(serde_json::from_str::<PublishResponse>(r#"{"uid":"a","status":"queued"}"#).is_err());
    }

    #[test]
    fn cloud_template_defaults() {
        let t: CloudTemplate = serde_json::from_str(
            r#"{"uid":"u","title":"T","version":"1.0","language_section_uid":"en",
                "created_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(t.tags.is_empty());
        assert_eq!(t.package_url, None);
    }
}
