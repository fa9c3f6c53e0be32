//! Entry point for a scrape request, independent of any HTTP framework.

use std::sync::Arc;

use crate::config::Config;
use crate::crawler::fetcher::SessionFactory;
use crate::crawler::models::ScrapeResult;
use crate::crawler::service::{PassRunner, RunAggregator};
use crate::crawler::SinglePassScraper;
use crate::error::RequestError;
use crate::events::Observer;
use crate::storage::RunStore;

pub struct ScrapeService<R: PassRunner> {
    aggregator: RunAggregator<R>,
    passes: u32,
}

impl<F: SessionFactory> ScrapeService<SinglePassScraper<F>> {
    /// Wire a browser-backed pipeline from configuration.
    pub fn with_browser(factory: F, config: Config, observer: Arc<dyn Observer>) -> Self {
        let store = RunStore::new(config.output_dir.clone());
        let passes = config.passes;
        let scraper = SinglePassScraper::new(factory, Arc::new(config), Arc::clone(&observer));
        Self::new(RunAggregator::new(scraper, store, observer), passes)
    }
}

impl<R: PassRunner> ScrapeService<R> {
    pub fn new(aggregator: RunAggregator<R>, passes: u32) -> Self {
        Self { aggregator, passes }
    }

    /// Validate `query`, run every pass and return the merged result.
    pub async fn scrape(&self, query: &str) -> Result<ScrapeResult, RequestError> {
        if query.trim().is_empty() {
            return Err(RequestError::InvalidQuery);
        }

        self.aggregator
            .aggregate(query, self.passes)
            .await
            .map_err(|e| RequestError::Internal(e.to_string()))
    }
}
