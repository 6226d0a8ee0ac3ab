use anyhow::Result;
use async_trait::async_trait;

/// Source of raw listing-page HTML.
/// Keeps the runner independent of how pages are actually retrieved.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page behind a resolved request URL
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Name used in log lines
    fn name(&self) -> &'static str;
}
