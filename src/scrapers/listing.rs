use crate::models::ScrapeOutcome;
use crate::scrapers::browser::ChromeRenderer;
use crate::scrapers::extract::RecordExtractor;
use crate::scrapers::pagination::PaginationWalker;
use crate::scrapers::resolver::LocationResolver;
use crate::scrapers::traits::{ListingSource, PageDriver};
use crate::scrapers::types::{ScrapeConfig, LISTING_MARKER};
use async_trait::async_trait;
use tracing::{error, info, warn};
use url::Url;

/// Browser-driven listing scraper: resolve location, walk result pages, extract.
///
/// Holds the location cache, so reuse one instance to avoid repeated searches.
pub struct ListingScraper {
    config: ScrapeConfig,
    resolver: LocationResolver,
}

impl ListingScraper {
    pub fn new(config: ScrapeConfig) -> Self {
        let resolver = LocationResolver::new(config.base_url.clone(), config.timeout());
        Self { config, resolver }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Scrape using an already opened page. The caller owns the session.
    pub async fn scrape_with<P>(&self, page: &P, location: &str) -> ScrapeOutcome
    where
        P: PageDriver + ?Sized,
    {
        let url = match self.resolver.resolve(page, location).await {
            Ok(url) => url,
            Err(e) => {
                error!("{}", e);
                return ScrapeOutcome::failed(location, vec![e.to_string()]);
            }
        };

        if page.current_url().await != url {
            if let Err(e) = page.navigate(&url, self.config.timeout()).await {
                error!("{}", e);
                return ScrapeOutcome::failed(location, vec![e.to_string()]);
            }
        }

        if !page.wait_for_selector(LISTING_MARKER, self.config.timeout()).await {
            warn!("No listing markers visible on {}", url);
        }
        page.snapshot("listing_index").await;

        let base = match Url::parse(&url) {
            Ok(base) => base,
            Err(e) => {
                let message = format!("resolved URL {url} is not absolute: {e}");
                error!("{}", message);
                return ScrapeOutcome::failed(location, vec![message]);
            }
        };

        let extractor = RecordExtractor::new(base, location.trim());
        let walk = PaginationWalker::new(self.config.timeout())
            .collect_all(page, &extractor)
            .await;

        ScrapeOutcome::completed(
            location,
            url,
            walk.records,
            walk.attempted,
            walk.pages,
            walk.warnings,
        )
    }
}

#[async_trait]
impl ListingSource for ListingScraper {
    async fn scrape(&self, location: &str) -> ScrapeOutcome {
        info!("Starting scrape for '{}'", location);

        let renderer = match ChromeRenderer::launch(&self.config, location) {
            Ok(renderer) => renderer,
            Err(e) => {
                error!("{}", e);
                return ScrapeOutcome::failed(location, vec![e.to_string()]);
            }
        };

        let outcome = match renderer.open_page() {
            Ok(page) => self.scrape_with(&page, location).await,
            Err(e) => {
                error!("{}", e);
                ScrapeOutcome::failed(location, vec![e.to_string()])
            }
        };

        renderer.close();
        outcome
    }

    fn source_name(&self) -> &'static str {
        "Property24"
    }
}
