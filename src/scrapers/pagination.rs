use crate::models::ListingRecord;
use crate::scrapers::traits::{ListingExtractor, PageDriver};
use crate::scrapers::types::{LISTING_MARKER, MAX_PAGES, NEXT_PAGE_SELECTORS};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything gathered while walking the result pages
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Page order, then listing order within a page
    pub records: Vec<ListingRecord>,
    pub attempted: usize,
    pub pages: usize,
    pub warnings: Vec<String>,
}

/// Extracts a page, follows "next", repeats until there is no next control or `MAX_PAGES`.
pub struct PaginationWalker {
    timeout: Duration,
}

impl PaginationWalker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn collect_all<P, E>(&self, page: &P, extractor: &E) -> WalkResult
    where
        P: PageDriver + ?Sized,
        E: ListingExtractor + ?Sized,
    {
        let mut result = WalkResult::default();

        loop {
            result.pages += 1;
            let html = match page.content().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Page {}: {}", result.pages, e);
                    result.warnings.push(format!("page {}: {}", result.pages, e));
                    String::new()
                }
            };

            let extraction = extractor.extract(&html);
            info!(
                "Page {}: {} listings from {} containers",
                result.pages,
                extraction.records.len(),
                extraction.attempted
            );
            result.attempted += extraction.attempted;
            result.records.extend(extraction.records);
            result.warnings.extend(
                extraction
                    .warnings
                    .into_iter()
                    .map(|w| format!("page {}: {}", result.pages, w)),
            );

            if result.pages >= MAX_PAGES {
                warn!("Reached the {} page safety cap, stopping", MAX_PAGES);
                result
                    .warnings
                    .push(format!("stopped at the {MAX_PAGES} page safety cap"));
                break;
            }

            if !self.advance(page, result.pages + 1).await {
                break;
            }
        }

        info!(
            "Collected {} listings across {} pages",
            result.records.len(),
            result.pages
        );
        result
    }

    /// Activate the first next-page control. Returns false when there is none.
    async fn advance<P>(&self, page: &P, next_page: usize) -> bool
    where
        P: PageDriver + ?Sized,
    {
        for selector in NEXT_PAGE_SELECTORS {
            if !page.has_selector(selector).await {
                continue;
            }

            debug!("Moving to page {} via {}", next_page, selector);
            if let Err(e) = page.click(selector).await {
                warn!("Next-page control {} could not be activated: {}", selector, e);
                return false;
            }

            if !page.wait_for_navigation(self.timeout).await
                && !page.wait_for_selector(LISTING_MARKER, self.timeout).await
            {
                warn!("Page {} did not finish loading in time, scanning anyway", next_page);
            }
            page.snapshot(&format!("page_{next_page}")).await;
            return true;
        }

        debug!("No next-page control found");
        false
    }
}
