use async_trait::async_trait;
use reqwest::{Request, Response};

/// Anything that can send a prepared request. Auth and retry behaviour are
/// layered on by wrapping one client in another.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
