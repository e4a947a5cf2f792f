use crate::error::{ScrapeError, ScrapeResult};
use crate::scrapers::traits::PageDriver;
use crate::scrapers::types::{
    CONSENT_SELECTORS, CONSENT_SETTLE, SEARCH_BUTTON_SELECTORS, SEARCH_INPUT_SELECTORS,
    SEARCH_SETTLE,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Whole path segments that mark a listing index page, besides any `*for-sale*` segment
const LISTING_PATH_HINTS: &[&str] = &["listing", "listings", "property", "properties"];

/// Whether `url` looks like a listing index rather than a landing page.
pub fn looks_like_listing_index(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(segments) = parsed.path_segments() else {
        return false;
    };
    segments
        .map(str::to_lowercase)
        .any(|segment| segment.contains("for-sale") || LISTING_PATH_HINTS.contains(&segment.as_str()))
}

fn same_page(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Turns a free-text location into a listing index URL by driving the site search.
///
/// Resolved URLs are memoised per instance; a fresh resolver searches again.
pub struct LocationResolver {
    base_url: String,
    timeout: Duration,
    cache: Mutex<HashMap<String, String>>,
}

impl LocationResolver {
    /// `base_url` is kept in the form the browser reports (`https://site/`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: Url::parse(&base_url).map(String::from).unwrap_or(base_url),
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_key(query: &str) -> String {
        query.trim().to_lowercase()
    }

    pub fn cached(&self, query: &str) -> Option<String> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&Self::cache_key(query)).cloned())
    }

    fn remember(&self, query: &str, url: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(Self::cache_key(query), url.to_string());
        }
    }

    pub async fn resolve<P>(&self, page: &P, query: &str) -> ScrapeResult<String>
    where
        P: PageDriver + ?Sized,
    {
        if let Some(url) = self.cached(query) {
            debug!("Using cached listing URL for '{}': {}", query, url);
            return Ok(url);
        }

        info!("Resolving listing page for '{}'", query);
        page.navigate(&self.base_url, self.timeout).await?;
        page.snapshot("home").await;
        self.dismiss_consent(page).await;

        let mut tried = 0;
        for selector in SEARCH_INPUT_SELECTORS {
            if !page.has_selector(selector).await {
                debug!("Search input {} not present", selector);
                continue;
            }
            tried += 1;

            if let Some(url) = self.search_with(page, selector, query).await {
                info!("Resolved '{}' to {}", query, url);
                self.remember(query, &url);
                return Ok(url);
            }

            // A failed attempt may have left the landing page; start over for the next input.
            if !same_page(&page.current_url().await, &self.base_url) {
                match page.navigate(&self.base_url, self.timeout).await {
                    Ok(()) => page.snapshot("home_retry").await,
                    Err(e) => warn!("Could not return to {}: {}", self.base_url, e),
                }
            }
        }

        Err(ScrapeError::Resolution {
            query: query.to_string(),
            tried,
        })
    }

    /// Clicks the first consent button found. Absence or failure is ignored.
    async fn dismiss_consent<P>(&self, page: &P)
    where
        P: PageDriver + ?Sized,
    {
        for selector in CONSENT_SELECTORS {
            if !page.has_selector(selector).await {
                continue;
            }
            match page.click(selector).await {
                Ok(()) => {
                    debug!("Dismissed consent banner via {}", selector);
                    page.pause(CONSENT_SETTLE).await;
                    page.snapshot("consent_dismissed").await;
                }
                Err(e) => warn!("Consent banner click failed: {}", e),
            }
            return;
        }
    }

    async fn search_with<P>(&self, page: &P, selector: &str, query: &str) -> Option<String>
    where
        P: PageDriver + ?Sized,
    {
        debug!("Searching via {}", selector);
        if let Err(e) = page.type_into(selector, query).await {
            warn!("{}", e);
            return None;
        }
        page.pause(SEARCH_SETTLE).await;

        if let Err(e) = page.press_enter().await {
            warn!("{}", e);
        }
        page.snapshot("search_submitted").await;

        for button in SEARCH_BUTTON_SELECTORS {
            if page.has_selector(button).await {
                if let Err(e) = page.click(button).await {
                    debug!("Search button click failed: {}", e);
                }
                break;
            }
        }

        if !page.wait_for_navigation(self.timeout).await {
            debug!("No full navigation after search submit; checking URL anyway");
        }

        let url = page.current_url().await;
        page.snapshot("search_result").await;

        if looks_like_listing_index(&url) {
            Some(url)
        } else {
            warn!("Search via {} landed on {}, not a listing page", selector, url);
            None
        }
    }
}
