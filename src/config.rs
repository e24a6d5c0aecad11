//! Runtime configuration read from the environment (and `.env`).

use anyhow::{Context, Result, anyhow};
use std::time::Duration;

pub const DEFAULT_KOBO_URL: &str = "https://kf.kobotoolbox.org/";
pub const DEFAULT_PAGE_LIMIT: u32 = 1500;
pub const DEFAULT_CACHE_PATH: &str = "cache/lamp_survey.json";
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 6;

/// Connection and cache settings for the KoboToolbox form API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KoboConfig {
    /// Server root, always ending in `/`.
    pub base_url: String,
    pub token: Option<String>,
    pub form_id: Option<String>,
    pub form_version: Option<String>,
    pub page_limit: u32,
    pub cache_path: String,
    pub cache_ttl: Duration,
}

impl Default for KoboConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_KOBO_URL.to_string(),
            token: None,
            form_id: None,
            form_version: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_HOURS * 3600),
        }
    }
}

impl KoboConfig {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()` first
    /// to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, treating blank values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let page_limit = match get("KOBOTOOLBOX_PAGE_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("KOBOTOOLBOX_PAGE_LIMIT is not a number: '{raw}'"))?,
            None => defaults.page_limit,
        };

        let cache_ttl = match get("LAMP_SURVEY_CACHE_TTL_HOURS") {
            Some(raw) => {
                let hours: u64 = raw.trim().parse().with_context(|| {
                    format!("LAMP_SURVEY_CACHE_TTL_HOURS is not a number: '{raw}'")
                })?;
                ttl_from_hours(hours).context("LAMP_SURVEY_CACHE_TTL_HOURS")?
            }
            None => defaults.cache_ttl,
        };

        Ok(Self {
            base_url: normalize_base_url(
                get("KOBOTOOLBOX_URL").as_deref().unwrap_or(DEFAULT_KOBO_URL),
            ),
            token: get("KOBOTOOLBOX_TOKEN"),
            form_id: get("KOBOTOOLBOX_FORM_ID"),
            form_version: get("KOBOTOOLBOX_FORM_VERSION"),
            page_limit,
            cache_path: get("LAMP_SURVEY_CACHE_PATH").unwrap_or(defaults.cache_path),
            cache_ttl,
        })
    }

    /// The API token, or an error naming the variable to set.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| anyhow!("KOBOTOOLBOX_TOKEN must be set"))
    }

    /// Picks the form to fetch: an explicit override wins over `KOBOTOOLBOX_FORM_ID`.
    pub fn resolve_form_id<'a>(&'a self, form_override: Option<&'a str>) -> Result<&'a str> {
        form_override
            .or(self.form_id.as_deref())
            .ok_or_else(|| anyhow!("no form id given; pass --form-id or set KOBOTOOLBOX_FORM_ID"))
    }
}

/// Converts a TTL given in hours, rejecting values too large to represent.
pub fn ttl_from_hours(hours: u64) -> Result<Duration> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow!("cache TTL of {hours} hours is too large"))
}

fn normalize_base_url(raw: &str) -> String {
    format!("{}/", raw.trim().trim_end_matches('/'))
}
