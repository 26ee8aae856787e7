use async_trait::async_trait;
use reqwest::{Request, Response};

/// Minimal HTTP execution seam; implementations may decorate the request
/// (authentication, tracing) before sending it.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
