use crate::error::ScrapeResult;
use crate::models::ScrapeOutcome;
use crate::scrapers::extract::Extraction;
use async_trait::async_trait;
use std::time::Duration;

/// A single rendered browser page.
///
/// Lookups that merely probe for markup (`has_selector`, `wait_for_selector`,
/// `wait_for_navigation`) never fail; they report absence as `false`.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url`, failing with `ScrapeError::Navigation` on timeout or error
    async fn navigate(&self, url: &str, timeout: Duration) -> ScrapeResult<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool;

    /// Whether `selector` matches right now, without waiting
    async fn has_selector(&self, selector: &str) -> bool;

    async fn click(&self, selector: &str) -> ScrapeResult<()>;

    /// Focus the element and type `text` into it
    async fn type_into(&self, selector: &str, text: &str) -> ScrapeResult<()>;

    async fn press_enter(&self) -> ScrapeResult<()>;

    /// Wait for a full page navigation; AJAX transitions report `false`
    async fn wait_for_navigation(&self, timeout: Duration) -> bool;

    async fn current_url(&self) -> String;

    /// Outer HTML of the current document
    async fn content(&self) -> ScrapeResult<String>;

    /// Best-effort diagnostic capture; failures are logged, never returned
    async fn snapshot(&self, label: &str);

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Turns one page of markup into listing records
pub trait ListingExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Extraction;
}

/// Common trait for listing sources
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Run one bounded scraping pass for `location`
    async fn scrape(&self, location: &str) -> ScrapeOutcome;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}
