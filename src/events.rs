//! Pipeline events and the observer they are reported to.
//!
//! Scraping components never log directly. Every recovery, skip and
//! milestone becomes a [`ScrapeEvent`] handed to an injected [`Observer`];
//! [`TracingObserver`] turns them into `tracing` records.

use tracing::{debug, info, warn};

use crate::crawler::parser::DetailField;

/// Facts about what happened during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    // ------------------------------------------------------------------
    // Run / pass
    // ------------------------------------------------------------------
    PassStarted {
        pass: u32,
        of: u32,
    },

    PassCompleted {
        pass: u32,
        listings: usize,
    },

    PassFailed {
        pass: u32,
        error: String,
    },

    PersistFailed {
        pass: Option<u32>,
        error: String,
    },

    RunCompleted {
        query: String,
        passes: u32,
        failed_passes: u32,
        listings: usize,
    },

    SessionReleaseFailed {
        error: String,
    },

    // ------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------
    FeedTimeout {
        url: String,
    },

    FeedMissing {
        iteration: u32,
    },

    ScrollFailed {
        iteration: u32,
        error: String,
    },

    ScrollFinished {
        iterations: u32,
        stopped_early: bool,
    },

    LinksCollected {
        found: usize,
        kept: usize,
    },

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------
    ListingScraped {
        index: usize,
        total: usize,
        title: String,
    },

    ListingSkipped {
        index: usize,
        url: String,
    },

    ListingFailed {
        index: usize,
        url: String,
        error: String,
    },

    DetailTimeout {
        url: String,
    },

    /// The detail view could not be read from the browser.
    DetailUnreadable {
        url: String,
        error: String,
    },

    FieldMalformed {
        url: String,
        field: DetailField,
        raw: String,
    },
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: &ScrapeEvent);
}

/// Reports events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &ScrapeEvent) {
        match event {
            ScrapeEvent::PassStarted { pass, of } => info!(pass, of, "Starting pass"),
            ScrapeEvent::PassCompleted { pass, listings } => {
                info!(pass, listings, "Pass completed")
            }
            ScrapeEvent::PassFailed { pass, error } => {
                warn!(pass, error = %error, "Pass failed, counting it as empty")
            }
            ScrapeEvent::PersistFailed { pass, error } => {
                warn!(pass = ?pass, error = %error, "Failed to persist results")
            }
            ScrapeEvent::RunCompleted {
                query,
                passes,
                failed_passes,
                listings,
            } => info!(
                query = %query,
                passes,
                failed_passes,
                listings,
                "DONE: all passes merged"
            ),
            ScrapeEvent::SessionReleaseFailed { error } => {
                warn!(error = %error, "Failed to close browser session")
            }
            ScrapeEvent::FeedTimeout { url } => {
                warn!(url = %url, "Timeout waiting for results feed")
            }
            ScrapeEvent::FeedMissing { iteration } => {
                warn!(iteration, "Could not find scrollable results feed")
            }
            ScrapeEvent::ScrollFailed { iteration, error } => {
                warn!(iteration, error = %error, "Feed scroll failed")
            }
            ScrapeEvent::ScrollFinished {
                iterations,
                stopped_early,
            } => debug!(iterations, stopped_early, "Feed scrolling finished"),
            ScrapeEvent::LinksCollected { found, kept } => {
                info!(found, kept, "Found unique places to scrape")
            }
            ScrapeEvent::ListingScraped {
                index,
                total,
                title,
            } => info!(index, total, title = %title, "Scraped place"),
            ScrapeEvent::ListingSkipped { index, url } => {
                debug!(index, url = %url, "No title extracted, skipping")
            }
            ScrapeEvent::ListingFailed { index, url, error } => {
                warn!(index, url = %url, error = %error, "Error processing place")
            }
            ScrapeEvent::DetailTimeout { url } => {
                debug!(url = %url, "Detail view never showed a heading")
            }
            ScrapeEvent::DetailUnreadable { url, error } => {
                warn!(url = %url, error = %error, "Could not read detail view")
            }
            ScrapeEvent::FieldMalformed { url, field, raw } => {
                debug!(url = %url, field = ?field, raw = %raw, "Unparsable field value")
            }
        }
    }
}
