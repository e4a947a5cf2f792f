//! Scripted in-memory page used by the resolver, pagination and scraper tests.

use crate::error::{ScrapeError, ScrapeResult};
use crate::scrapers::traits::PageDriver;
use crate::scrapers::types::NEXT_PAGE_SELECTORS;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeState {
    pub url: String,
    /// HTML per result page; `content()` returns the current one
    pub pages: Vec<String>,
    pub current_page: usize,
    /// Keep offering a next-page control past the last page
    pub endless_next: bool,
    /// Selectors that exist on every page
    pub present: HashSet<String>,
    /// URL the page lands on after submitting from a given search input
    pub search_results: HashMap<String, String>,
    pub unreachable: HashSet<String>,
    /// Selectors whose click reports a browser error
    pub fail_clicks: HashSet<String>,
    pub full_navigation: bool,
    pub last_input: Option<String>,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub snapshots: Vec<String>,
}

pub struct FakePage {
    pub state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_pages(pages: Vec<String>) -> Self {
        Self::new(FakeState {
            url: "https://homes.test/for-sale/sandton".to_string(),
            pages,
            ..Default::default()
        })
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn is_next_control(selector: &str) -> bool {
        NEXT_PAGE_SELECTORS.contains(&selector)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> ScrapeResult<()> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        if state.unreachable.contains(url) {
            return Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: "unreachable".to_string(),
            });
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> bool {
        self.has_selector(selector).await
    }

    async fn has_selector(&self, selector: &str) -> bool {
        let state = self.state();
        if Self::is_next_control(selector) {
            return state.endless_next || state.current_page + 1 < state.pages.len();
        }
        state.present.contains(selector)
    }

    async fn click(&self, selector: &str) -> ScrapeResult<()> {
        let mut state = self.state();
        state.clicks.push(selector.to_string());
        if state.fail_clicks.contains(selector) {
            return Err(ScrapeError::Browser(format!("{selector} is not clickable")));
        }
        if Self::is_next_control(selector) {
            state.current_page += 1;
        }
        Ok(())
    }

    async fn type_into(&self, selector: &str, text: &str) -> ScrapeResult<()> {
        let mut state = self.state();
        state.typed.push((selector.to_string(), text.to_string()));
        state.last_input = Some(selector.to_string());
        Ok(())
    }

    async fn press_enter(&self) -> ScrapeResult<()> {
        let mut state = self.state();
        let landed = state
            .last_input
            .as_ref()
            .and_then(|input| state.search_results.get(input))
            .cloned();
        if let Some(url) = landed {
            state.url = url;
        }
        Ok(())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> bool {
        self.state().full_navigation
    }

    async fn current_url(&self) -> String {
        self.state().url.clone()
    }

    async fn content(&self) -> ScrapeResult<String> {
        let state = self.state();
        let idx = state.current_page.min(state.pages.len().saturating_sub(1));
        Ok(state.pages.get(idx).cloned().unwrap_or_default())
    }

    async fn snapshot(&self, label: &str) {
        self.state().snapshots.push(label.to_string());
    }

    async fn pause(&self, _duration: Duration) {}
}
