//! HTTP plumbing: a small client trait plus wrappers for auth and retries.
//!
//! Clients compose by nesting, e.g.
//! `ApiKey::token(RetryOn429::new(BasicClient::new()?), &token)?`.

pub mod auth;
mod basic;
mod client;
mod retry;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use retry::RetryOn429;

use anyhow::{Result, anyhow, bail};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const NOT_FOUND_MESSAGE: &str =
    "No submissions found for this form. Check URL, permissions, or version.";

fn get_request(url: &str) -> Result<reqwest::Request> {
    let mut req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    req.headers_mut().insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    Ok(req)
}

/// Fetches a URL and returns the body bytes, failing on non-2xx statuses.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let resp = client.execute(get_request(url)?).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("request to {url} failed with status {status}: {body}");
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Fetches a JSON document from the form API.
///
/// A 404 is not an error: the form simply has no reachable submissions, so an
/// empty result page carrying [`NOT_FOUND_MESSAGE`] is returned instead.
pub async fn fetch_json<C: HttpClient>(client: &C, url: &str) -> Result<Value> {
    let resp = client.execute(get_request(url)?).await?;
    let status = resp.status();
    debug!(url, %status, "Form API responded");

    if status.is_success() {
        return resp
            .json::<Value>()
            .await
            .map_err(|e| anyhow!("failed to decode JSON from {url}: {e}"));
    }

    let body = resp.text().await.unwrap_or_default();
    classify_failure(status, &body)
}

/// Maps a non-success status to either an empty result page or an error.
fn classify_failure(status: StatusCode, body: &str) -> Result<Value> {
    match status {
        StatusCode::NOT_FOUND => {
            warn!(%status, "No submissions found");
            Ok(json!({"results": [], "count": 0, "message": NOT_FOUND_MESSAGE}))
        }
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            bail!("unauthorized access to this form's submissions ({status})")
        }
        StatusCode::TOO_MANY_REQUESTS => {
            bail!("rate limited by the form API, retries exhausted")
        }
        _ => bail!("failed to fetch form data: {status}: {body}"),
    }
}
