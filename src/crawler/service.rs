use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info_span, Instrument};

use crate::crawler::fetcher::SessionFactory;
use crate::crawler::merge::CanonicalSet;
use crate::crawler::models::{Listing, ScrapeResult};
use crate::crawler::SinglePassScraper;
use crate::error::ScrapeError;
use crate::events::{Observer, ScrapeEvent};
use crate::storage::RunStore;

/// Anything that can produce one pass worth of listings for a query.
#[async_trait]
pub trait PassRunner: Send + Sync {
    async fn run_pass(&self, query: &str) -> Result<Vec<Listing>, ScrapeError>;
}

#[async_trait]
impl<F: SessionFactory> PassRunner for SinglePassScraper<F> {
    async fn run_pass(&self, query: &str) -> Result<Vec<Listing>, ScrapeError> {
        self.scrape(query).await
    }
}

/// Runs repeated passes and merges them into one canonical result.
pub struct RunAggregator<R: PassRunner> {
    runner: R,
    store: RunStore,
    observer: Arc<dyn Observer>,
}

impl<R: PassRunner> RunAggregator<R> {
    pub fn new(runner: R, store: RunStore, observer: Arc<dyn Observer>) -> Self {
        Self {
            runner,
            store,
            observer,
        }
    }

    /// Execute `pass_count` passes in sequence and merge them.
    ///
    /// A failed pass counts as empty. Only failing to write `final.json`
    /// fails the run.
    pub async fn aggregate(&self, query: &str, pass_count: u32) -> Result<ScrapeResult, ScrapeError> {
        let mut canonical = CanonicalSet::new();
        let mut failed_passes = 0u32;

        for pass in 1..=pass_count {
            self.observer.on_event(&ScrapeEvent::PassStarted {
                pass,
                of: pass_count,
            });

            let listings = match self
                .runner
                .run_pass(query)
                .instrument(info_span!("pass", pass))
                .await
            {
                Ok(v) => {
                    self.observer.on_event(&ScrapeEvent::PassCompleted {
                        pass,
                        listings: v.len(),
                    });
                    v
                }
                Err(e) => {
                    failed_passes += 1;
                    self.observer.on_event(&ScrapeEvent::PassFailed {
                        pass,
                        error: e.to_string(),
                    });
                    Vec::new()
                }
            };

            let pass_result = ScrapeResult::new(query, listings);
            if let Err(e) = self.store.save_pass(query, pass, &pass_result).await {
                self.observer.on_event(&ScrapeEvent::PersistFailed {
                    pass: Some(pass),
                    error: e.to_string(),
                });
            }

            canonical.absorb_all(pass_result.into_listings());
        }

        let result = ScrapeResult::new(query, canonical.into_listings());
        if let Err(e) = self.store.save_final(query, &result).await {
            self.observer.on_event(&ScrapeEvent::PersistFailed {
                pass: None,
                error: e.to_string(),
            });
            return Err(e.into());
        }

        self.observer.on_event(&ScrapeEvent::RunCompleted {
            query: query.to_string(),
            passes: pass_count,
            failed_passes,
            listings: result.total_results(),
        });
        Ok(result)
    }
}
