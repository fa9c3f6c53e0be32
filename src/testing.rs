//! In-memory stand-ins for the browser and for whole passes.
//!
//! Lets the pipeline run against canned HTML without launching Chrome.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::crawler::fetcher::{BrowserSession, SessionFactory};
use crate::crawler::models::Listing;
use crate::crawler::service::PassRunner;
use crate::error::{BrowserError, BrowserResult, ScrapeError};
use crate::events::{Observer, ScrapeEvent};

/// A canned page. Each successful scroll reveals the next stage; the last
/// stage stays put.
#[derive(Debug, Clone)]
pub struct FixturePage {
    stages: Vec<String>,
}

impl FixturePage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            stages: vec![html.into()],
        }
    }

    pub fn staged(stages: Vec<String>) -> Self {
        Self { stages }
    }

    fn stage(&self, index: usize) -> &str {
        let last = self.stages.len().saturating_sub(1);
        self.stages.get(index.min(last)).map_or("", String::as_str)
    }
}

/// Hands out [`FixtureSession`]s over a shared set of pages.
///
/// Clones share pages and counters, so a test can keep one handle and
/// inspect how many sessions were opened and released.
#[derive(Debug, Clone, Default)]
pub struct FixtureFactory {
    pages: Arc<RwLock<HashMap<String, FixturePage>>>,
    overrides: Arc<RwLock<HashMap<(usize, String), FixturePage>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    fail_open: bool,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl FixtureFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, page: FixturePage) -> Self {
        self.pages.write().unwrap().insert(url.into(), page);
        self
    }

    /// Serve `page` for `url` only in the `session`-th opened session (1-based).
    pub fn with_session_page(
        self,
        session: usize,
        url: impl Into<String>,
        page: FixturePage,
    ) -> Self {
        self.overrides
            .write()
            .unwrap()
            .insert((session, url.into()), page);
        self
    }

    /// Navigating to `url` fails.
    pub fn failing_url(self, url: impl Into<String>) -> Self {
        self.failing.write().unwrap().insert(url.into());
        self
    }

    /// Every attempt to open a session fails.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FixtureFactory {
    type Session = FixtureSession;

    async fn open(&self) -> BrowserResult<FixtureSession> {
        if self.fail_open {
            return Err(BrowserError::Launch("fixture launch failure".into()));
        }
        let index = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FixtureSession {
            index,
            pages: Arc::clone(&self.pages),
            overrides: Arc::clone(&self.overrides),
            failing: Arc::clone(&self.failing),
            released: Arc::clone(&self.released),
            current: None,
            stage: 0,
            scrolls: 0,
        })
    }
}

#[derive(Debug)]
pub struct FixtureSession {
    index: usize,
    pages: Arc<RwLock<HashMap<String, FixturePage>>>,
    overrides: Arc<RwLock<HashMap<(usize, String), FixturePage>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    released: Arc<AtomicUsize>,
    current: Option<String>,
    stage: usize,
    scrolls: u32,
}

impl FixtureSession {
    /// Successful scrolls so far.
    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }

    fn html(&self) -> String {
        let Some(url) = self.current.as_ref() else {
            return String::new();
        };
        let overrides = self.overrides.read().unwrap();
        let pages = self.pages.read().unwrap();
        overrides
            .get(&(self.index, url.clone()))
            .or_else(|| pages.get(url))
            .map_or_else(String::new, |page| page.stage(self.stage).to_string())
    }
}

fn select_count(html: &str, selector: &str) -> BrowserResult<usize> {
    let selector = Selector::parse(selector)
        .map_err(|e| BrowserError::Script(format!("invalid selector {selector}: {e:?}")))?;
    Ok(Html::parse_document(html).select(&selector).count())
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        if self.failing.read().unwrap().contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "fixture navigation failure".into(),
            });
        }
        self.current = Some(url.to_string());
        self.stage = 0;
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> BrowserResult<bool> {
        Ok(select_count(&self.html(), selector)? > 0)
    }

    async fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        select_count(&self.html(), selector)
    }

    async fn scroll_to_bottom(&mut self, selector: &str) -> BrowserResult<bool> {
        if select_count(&self.html(), selector)? == 0 {
            return Ok(false);
        }
        self.scrolls += 1;
        self.stage += 1;
        Ok(true)
    }

    async fn content(&mut self) -> BrowserResult<String> {
        Ok(self.html())
    }

    async fn close(self) -> BrowserResult<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observer that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ScrapeEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ScrapeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &ScrapeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// [`PassRunner`] replaying a fixed script, one entry per pass.
///
/// Passes beyond the script come back empty.
#[derive(Debug, Default)]
pub struct ScriptedPasses {
    script: Vec<Result<Vec<Listing>, String>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedPasses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(mut self, listings: Vec<Listing>) -> Self {
        self.script.push(Ok(listings));
        self
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.script.push(Err(error.into()));
        self
    }

    /// Shared counter of passes run so far.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PassRunner for ScriptedPasses {
    async fn run_pass(&self, _query: &str) -> Result<Vec<Listing>, ScrapeError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(index) {
            Some(Ok(listings)) => Ok(listings.clone()),
            Some(Err(message)) => Err(BrowserError::Protocol(message.clone()).into()),
            None => Ok(Vec::new()),
        }
    }
}
