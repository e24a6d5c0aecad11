//! File-backed cache of transformed output with a fixed time-to-live.
//!
//! A fresh entry for the requested form lets the CLI skip both the network
//! fetch and the pipeline. An entry written for another form is a miss.

use crate::transform::TransformOutput;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    form_id: String,
    stored_at: DateTime<Utc>,
    output: TransformOutput,
}

pub struct OutputCache {
    path: PathBuf,
    ttl: Duration,
}

impl OutputCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached output for `form_id` if present and younger than the TTL.
    pub fn load(&self, form_id: &str) -> Option<TransformOutput> {
        self.load_at(form_id, Utc::now())
    }

    fn load_at(&self, form_id: &str, now: DateTime<Utc>) -> Option<TransformOutput> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache entry");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache unreadable, ignoring");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache entry corrupt, ignoring");
                return None;
            }
        };

        if entry.form_id != form_id {
            debug!(cached = %entry.form_id, requested = form_id, "Cache entry is for another form");
            return None;
        }

        let age = now.signed_duration_since(entry.stored_at);
        let fresh = chrono::Duration::from_std(self.ttl)
            .map(|ttl| age < ttl)
            .unwrap_or(true);
        if !fresh {
            debug!(age_minutes = age.num_minutes(), "Cache entry expired");
            return None;
        }

        debug!(age_minutes = age.num_minutes(), "Cache hit");
        let mut output = entry.output;
        output.relink_schools();
        Some(output)
    }

    /// Writes `output` as the current entry for `form_id`, creating parent directories.
    pub fn store(&self, form_id: &str, output: &TransformOutput) -> Result<()> {
        self.store_at(form_id, output, Utc::now())
    }

    fn store_at(
        &self,
        form_id: &str,
        output: &TransformOutput,
        stored_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        #[derive(Serialize)]
        struct CacheEntryRef<'a> {
            form_id: &'a str,
            stored_at: DateTime<Utc>,
            output: &'a TransformOutput,
        }

        let body = serde_json::to_vec(&CacheEntryRef {
            form_id,
            stored_at,
            output,
        })?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("writing cache entry {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Cache entry stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transform;
    use serde_json::json;
    use std::env;
    use std::fs;
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn sample_output() -> TransformOutput {
        transform(&json!([
            {"_id": 1, "Are_you_a": "student", "School_Name": "green_valley"},
            {"_id": 2, "Are_you_a": "student", "School_Name": "green_valley"}
        ]))
    }

    #[test]
    fn test_missing_entry_is_none() {
        let cache = OutputCache::new(temp_path("lamp_survey_cache_missing.json"), Duration::from_secs(60));
        let _ = fs::remove_file(cache.path());
        assert!(cache.load("akGk").is_none());
    }

    #[test]
    fn test_store_then_load_fresh_entry() {
        let path = temp_path("lamp_survey_cache_fresh/entry.json");
        let _ = fs::remove_file(&path);
        let cache = OutputCache::new(&path, Duration::from_secs(6 * 3600));

        let output = sample_output();
        cache.store("akGk", &output).unwrap();
        let loaded = cache.load("akGk").unwrap();

        assert_eq!(loaded, output);
        assert!(Arc::ptr_eq(&loaded.students[0].school, &loaded.summary.schools[0]));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_expired_entry_is_ignored() {
        let path = temp_path("lamp_survey_cache_expired.json");
        let cache = OutputCache::new(&path, Duration::from_secs(6 * 3600));

        let stored_at = Utc::now() - chrono::Duration::hours(7);
        cache.store_at("akGk", &sample_output(), stored_at).unwrap();

        assert!(cache.load("akGk").is_none());
        assert!(cache.load_at("akGk", stored_at + chrono::Duration::hours(5)).is_some());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_corrupt_entry_is_ignored() {
        let path = temp_path("lamp_survey_cache_corrupt.json");
        fs::write(&path, b"{not json").unwrap();

        let cache = OutputCache::new(&path, Duration::from_secs(60));
        assert!(cache.load("akGk").is_none());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_entry_for_another_form_is_ignored() {
        let path = temp_path("lamp_survey_cache_other_form.json");
        let cache = OutputCache::new(&path, Duration::from_secs(6 * 3600));

        cache.store("formA", &sample_output()).unwrap();
        assert!(cache.load("formB").is_none());
        assert!(cache.load("formA").is_some());

        cache.store("formB", &TransformOutput::empty()).unwrap();
        assert!(cache.load("formA").is_none());
        assert_eq!(cache.load("formB").unwrap(), TransformOutput::empty());

        fs::remove_file(&path).unwrap();
    }
}
