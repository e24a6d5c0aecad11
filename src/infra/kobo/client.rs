use anyhow::{Context, Result};
use async_trait::async_trait;
use lamp_survey::config::KoboConfig;
use lamp_survey::fetch::auth::ApiKey;
use lamp_survey::fetch::{BasicClient, HttpClient, RetryOn429, fetch_json};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

use crate::services::submission_api::{FormAsset, SubmissionSource};

/// The client stack used against a live server.
pub type AuthenticatedClient = ApiKey<RetryOn429<BasicClient>>;

pub struct KoboClient<C> {
    http: C,
    base_url: String,
    page_limit: u32,
    form_version: Option<String>,
}

impl KoboClient<AuthenticatedClient> {
    /// Builds a token-authenticated client that retries on rate limiting.
    pub fn from_config(config: &KoboConfig) -> Result<Self> {
        let token = config.require_token()?;
        let http = ApiKey::token(RetryOn429::new(BasicClient::new()?), token)?;
        Ok(Self::with_client(http, config))
    }
}

impl<C: HttpClient> KoboClient<C> {
    pub fn with_client(http: C, config: &KoboConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            page_limit: config.page_limit,
            form_version: config.form_version.clone(),
        }
    }

    fn assets_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid KoboToolbox URL '{}'", self.base_url))?
            .join("api/v2/assets/")?;
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }

    fn submissions_url(&self, form_uid: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid KoboToolbox URL '{}'", self.base_url))?
            .join(&format!("api/v2/assets/{form_uid}/data/"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_limit.to_string());
            if let Some(version) = &self.form_version {
                query.append_pair("version", version);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl<C: HttpClient> SubmissionSource for KoboClient<C> {
    async fn list_forms(&self) -> Result<Vec<FormAsset>> {
        let url = self.assets_url()?;
        let json = fetch_json(&self.http, url.as_str()).await?;

        // Parse as generic JSON to extract only the fields we need
        let forms: Vec<FormAsset> = json["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item["asset_type"].as_str().unwrap_or("survey") == "survey")
                    .filter_map(|item| {
                        let uid = item["uid"].as_str()?.to_string();
                        let name = item["name"].as_str().unwrap_or("").to_string();
                        let date_created = item["date_created"].as_str().map(str::to_string);
                        let submission_count = item["deployment__submission_count"].as_u64();
                        Some(FormAsset {
                            uid,
                            name,
                            date_created,
                            submission_count,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!(forms = forms.len(), "Form list fetched");
        Ok(forms)
    }

    async fn fetch_submissions(&self, form_uid: &str) -> Result<Value> {
        let url = self.submissions_url(form_uid)?;
        info!(form_uid, url = %url, "Fetching submissions");
        let payload = fetch_json(&self.http, url.as_str()).await?;

        if let Some(count) = payload["count"].as_u64() {
            info!(form_uid, count, "Submissions received");
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl HttpClient for Canned {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let response = http::Response::builder().status(200).body(self.0).unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    fn config() -> KoboConfig {
        KoboConfig {
            base_url: "https://kobo.example.org/".to_string(),
            form_version: Some("vRuW".to_string()),
            page_limit: 200,
            ..KoboConfig::default()
        }
    }

    #[test]
    fn test_submissions_url() {
        let client = KoboClient::with_client(Canned("{}"), &config());
        let url = client.submissions_url("akGk").unwrap();
        assert_eq!(
            url.as_str(),
            "https://kobo.example.org/api/v2/assets/akGk/data/?limit=200&version=vRuW"
        );
    }

    #[test]
    fn test_assets_url() {
        let client = KoboClient::with_client(Canned("{}"), &KoboConfig::default());
        assert_eq!(
            client.assets_url().unwrap().as_str(),
            "https://kf.kobotoolbox.org/api/v2/assets/?format=json"
        );
    }

    #[test]
    fn test_from_config_requires_token() {
        assert!(KoboClient::from_config(&KoboConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_list_forms_keeps_surveys_with_uid() {
        let body = r#"{"count": 3, "results": [
            {"uid": "akGk", "name": "Lamp distribution", "asset_type": "survey",
             "date_created": "2024-02-01T10:00:00Z", "deployment__submission_count": 412},
            {"uid": "blk1", "name": "Question block", "asset_type": "block"},
            {"name": "No uid", "asset_type": "survey"}
        ]}"#;
        let client = KoboClient::with_client(Canned(body), &config());

        let forms = client.list_forms().await.unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].uid, "akGk");
        assert_eq!(forms[0].submission_count, Some(412));
    }

    #[tokio::test]
    async fn test_fetch_submissions_returns_payload() {
        let client = KoboClient::with_client(
            Canned(r#"{"count": 1, "results": [{"Are_you_a": "student"}]}"#),
            &config(),
        );

        let payload = client.fetch_submissions("akGk").await.unwrap();
        assert_eq!(payload["results"][0]["Are_you_a"], "student");
    }
}
