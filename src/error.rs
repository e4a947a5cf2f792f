use thiserror::Error;

/// Errors raised by the browser-driven part of a scrape.
///
/// Only `Launch`, `Navigation` (of the entry pages) and `Resolution` are fatal
/// to a run; everything else is caught close to where it happens and logged.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The headless browser could not be started or no tab could be opened.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A navigation timed out or the target was unreachable.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// No search strategy produced a listing index URL.
    #[error("could not resolve a listing page for '{query}' after trying {tried} search inputs")]
    Resolution { query: String, tried: usize },

    /// Any other failure reported by the browser driver.
    #[error("browser error: {0}")]
    Browser(String),
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
