//! Publishes the dashboard JSON to S3 for a static front end to read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::transform::TransformOutput;

pub const DEFAULT_KEY: &str = "dashboard/latest.json";

/// The published document: the pipeline output plus when it was generated.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub form_id: Option<&'a str>,
    #[serde(flatten)]
    pub output: &'a TransformOutput,
}

impl<'a> DashboardDocument<'a> {
    pub fn new(output: &'a TransformOutput, form_id: Option<&'a str>) -> Self {
        Self {
            generated_at: Utc::now(),
            form_id,
            output,
        }
    }
}

/// Serializes a value to JSON and uploads it to an S3 bucket with `application/json` content type.
#[tracing::instrument(skip(client, value))]
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(value)?;
    let bytes = body.len();

    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(body.into())
        .content_type("application/json")
        .send()
        .await?;

    info!(bytes, "Dashboard JSON published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transform;
    use serde_json::json;

    #[test]
    fn test_document_flattens_output() {
        let output = transform(&json!([{"Are_you_a": "student", "School_Name": "a"}]));
        let doc = serde_json::to_value(DashboardDocument::new(&output, Some("akGk"))).unwrap();

        assert_eq!(doc["formId"], "akGk");
        assert!(doc.get("generatedAt").is_some());
        assert_eq!(doc["students"].as_array().unwrap().len(), 1);
        assert_eq!(doc["summary"]["totalStudents"], 1);
    }
}
