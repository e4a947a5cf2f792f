use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Hard upper bound on result pages walked in one run
pub const MAX_PAGES: usize = 50;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_BASE_URL: &str = "https://www.property24.com";

/// Delay after typing a query so type-ahead suggestions can load
pub const SEARCH_SETTLE: Duration = Duration::from_millis(1_500);

/// Delay after dismissing a consent banner
pub const CONSENT_SETTLE: Duration = Duration::from_millis(500);

/// Cookie / consent banner buttons, tried in order
pub const CONSENT_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "button[id*=\"accept\"]",
    "button[class*=\"consent\"]",
    "button[aria-label*=\"Accept\"]",
    ".cookie-banner button",
];

/// Location search inputs, tried in order
pub const SEARCH_INPUT_SELECTORS: &[&str] = &[
    "input[data-testid*=\"search\"]",
    "#token-input-AutoCompleteItems",
    "input[name*=\"search\"]",
    "input[placeholder*=\"Search\"]",
    "input[placeholder*=\"suburb\"]",
    "input[type=\"search\"]",
];

/// Buttons that submit the location search
pub const SEARCH_BUTTON_SELECTORS: &[&str] = &[
    "button[data-testid*=\"search\"]",
    "button[type=\"submit\"]",
    ".js_searchButton",
    "button[class*=\"search\"]",
];

/// Controls that move to the next result page, tried in order
pub const NEXT_PAGE_SELECTORS: &[&str] = &[
    "a[rel=\"next\"]:not([aria-disabled=\"true\"])",
    "[data-testid*=\"pagination-next\"]:not([disabled])",
    ".pagination a.next:not(.disabled)",
    "a[class*=\"pageNext\"]:not(.disabled)",
    "a[aria-label*=\"Next\"]:not([aria-disabled=\"true\"])",
];

/// Present once listing cards have rendered
pub const LISTING_MARKER: &str =
    "[data-testid*=\"listing\"], [class*=\"listing\"], [class*=\"result-tile\"], article";

/// Listing container strategies: semantic markers, class substrings, bare structure.
pub const CONTAINER_STRATEGIES: &[&[&str]] = &[
    &["[data-testid*=\"listing-card\"]", "[data-testid*=\"result\"]"],
    &[
        "[class*=\"listing-result\"]",
        "[class*=\"result-tile\"]",
        "[class*=\"property-card\"]",
        "[class*=\"js_resultTile\"]",
        "[class*=\"listing-card\"]",
    ],
    &["article"],
];

/// Settings for one scraping run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Site root where the search UI lives
    pub base_url: String,
    pub headless: bool,
    /// Per-navigation timeout in milliseconds
    pub timeout_ms: u64,
    /// Directory under which per-run snapshot folders are created
    pub snapshot_root: PathBuf,
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headless: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            snapshot_root: PathBuf::from("debug"),
        }
    }
}
