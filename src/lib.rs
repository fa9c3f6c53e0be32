//! Multi-pass scraper for business listings in infinite-scroll map search
//! feeds.
//!
//! A single pass drives a browser through the results feed and every listing
//! it exposes. Because any one pass can silently miss items, a request runs
//! several passes and folds them into one deduplicated result keyed by
//! `(title, address)`.
//!
//! - [`crawler`] - browser sessions, feed pagination, detail parsing, merging
//! - [`request`] - request validation and the top-level service
//! - [`storage`] - per-pass and merged JSON files
//! - [`events`] - pipeline events and observers
//! - [`testing`] - fixture sessions for running the pipeline without Chrome

pub mod config;
pub mod crawler;
pub mod error;
pub mod events;
pub mod request;
pub mod storage;
pub mod testing;

pub use config::Config;
pub use crawler::models::{Listing, ScrapeResult};
pub use error::{BrowserError, RequestError, ScrapeError, StorageError};
pub use events::{Observer, ScrapeEvent, TracingObserver};
pub use request::ScrapeService;
