//! Trait and types for a source of survey submissions.

use anyhow::Result;
use serde_json::Value;

/// A deployed form visible to the API token.
#[derive(Debug, Clone, PartialEq)]
pub struct FormAsset {
    pub uid: String,
    pub name: String,
    pub date_created: Option<String>,
    pub submission_count: Option<u64>,
}

/// Abstraction over a form-data provider (e.g., KoboToolbox).
#[async_trait::async_trait]
pub trait SubmissionSource {
    /// Returns the survey forms the caller can read.
    async fn list_forms(&self) -> Result<Vec<FormAsset>>;

    /// Returns the raw submissions payload for one form, unparsed.
    async fn fetch_submissions(&self, form_uid: &str) -> Result<Value>;
}
