use std::sync::Arc;

use tokio::time::sleep;
use url::Url;

use crate::config::Config;
use crate::crawler::feed::FeedPaginator;
use crate::crawler::fetcher::{search_url, BrowserSession, SessionFactory};
use crate::crawler::models::Listing;
use crate::error::{BrowserResult, ScrapeError};
use crate::events::{Observer, ScrapeEvent};

pub mod chrome;
pub mod feed;
pub mod fetcher;
pub mod locator;
pub mod merge;
pub mod models;
pub mod parser;
pub mod service;

/// One full pass over the search feed for a query.
///
/// Every pass opens its own browser session and closes it before returning,
/// whatever happened in between.
pub struct SinglePassScraper<F: SessionFactory> {
    factory: F,
    config: Arc<Config>,
    observer: Arc<dyn Observer>,
}

impl<F: SessionFactory> SinglePassScraper<F> {
    pub fn new(factory: F, config: Arc<Config>, observer: Arc<dyn Observer>) -> Self {
        Self {
            factory,
            config,
            observer,
        }
    }

    pub async fn scrape(&self, query: &str) -> Result<Vec<Listing>, ScrapeError> {
        let mut session = self.factory.open().await?;
        let outcome = self.run(&mut session, query).await;

        if let Err(e) = session.close().await {
            self.observer.on_event(&ScrapeEvent::SessionReleaseFailed {
                error: e.to_string(),
            });
        }

        outcome.map_err(ScrapeError::from)
    }

    async fn run(&self, session: &mut F::Session, query: &str) -> BrowserResult<Vec<Listing>> {
        let cfg = self.config.as_ref();
        let url = search_url(&cfg.search_base_url, query);
        session.goto(&url).await?;

        let feed_selector = cfg.feed_selector();
        if !session
            .wait_for(&feed_selector, cfg.feed_wait, cfg.poll_interval)
            .await?
        {
            self.observer.on_event(&ScrapeEvent::FeedTimeout { url });
            return Ok(Vec::new());
        }

        FeedPaginator::new(
            &cfg.scroll,
            &feed_selector,
            &cfg.listing_path,
            self.observer.as_ref(),
        )
        .paginate(session)
        .await;
        sleep(cfg.post_scroll_settle).await;

        let html = session.content().await?;
        let base = Url::parse(&url).ok();
        let (scope_attr, scope_value) = &cfg.feed_scope;
        let mut links = parser::collect_links(
            &html,
            base.as_ref(),
            (scope_attr.as_str(), scope_value),
            &cfg.listing_path,
        );
        let found = links.len();
        links.truncate(cfg.max_listings);
        self.observer.on_event(&ScrapeEvent::LinksCollected {
            found,
            kept: links.len(),
        });

        let total = links.len();
        let mut listings = Vec::new();

        for (i, link) in links.into_iter().enumerate() {
            let index = i + 1;
            match self.visit(session, &link).await {
                Ok(Some(listing)) => {
                    self.observer.on_event(&ScrapeEvent::ListingScraped {
                        index,
                        total,
                        title: listing.title.clone(),
                    });
                    listings.push(listing);
                }
                Ok(None) => {
                    self.observer
                        .on_event(&ScrapeEvent::ListingSkipped { index, url: link });
                }
                Err(e) => {
                    self.observer.on_event(&ScrapeEvent::ListingFailed {
                        index,
                        url: link,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(listings)
    }

    async fn visit(&self, session: &mut F::Session, url: &str) -> BrowserResult<Option<Listing>> {
        session.goto(url).await?;
        sleep(self.config.detail_settle).await;

        let record =
            parser::extract_detail(session, &self.config, self.observer.as_ref(), url).await;
        Ok(record.into_listing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureFactory, FixturePage, RecordingObserver};

    const SEARCH: &str = "https://maps.test/search/cafes+in+Lyon";

    fn feed(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|h| format!(r#"<a href="{h}">x</a>"#))
            .collect();
        format!(r#"<div role="feed">{anchors}</div>"#)
    }

    fn detail(title: &str, address: &str) -> String {
        format!(
            r#"<h1>{title}</h1>
               <button data-item-id="address" aria-label="Address: {address}"></button>"#
        )
    }

    fn build(
        factory: FixtureFactory,
        config: Config,
    ) -> (SinglePassScraper<FixtureFactory>, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let config = config
            .without_delays()
            .with_search_base_url("https://maps.test/search");
        let scraper = SinglePassScraper::new(factory, Arc::new(config), observer.clone());
        (scraper, observer)
    }

    #[tokio::test]
    async fn scrapes_titled_listings_and_releases_session() {
        let factory = FixtureFactory::new()
            .with_page(SEARCH, FixturePage::new(feed(&["/maps/place/a", "/maps/place/b", "/maps/place/a"])))
            .with_page("https://maps.test/maps/place/a", FixturePage::new(detail("Cafe A", "1 Rue X")))
            .with_page("https://maps.test/maps/place/b", FixturePage::new("<h1> </h1><p>no title</p>"));
        let (scraper, observer) = build(factory.clone(), Config::default());

        let listings = scraper.scrape("cafes in Lyon").await.unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Cafe A");
        assert_eq!(listings[0].address.as_deref(), Some("1 Rue X"));
        assert_eq!(factory.opened(), 1);
        assert_eq!(factory.released(), 1);
        assert!(observer.events().contains(&ScrapeEvent::LinksCollected { found: 2, kept: 2 }));
        assert!(observer.events().contains(&ScrapeEvent::ListingSkipped {
            index: 2,
            url: "https://maps.test/maps/place/b".into(),
        }));
    }

    #[tokio::test]
    async fn feed_timeout_yields_empty_pass() {
        let factory = FixtureFactory::new().with_page(SEARCH, FixturePage::new("<p>loading</p>"));
        let (scraper, observer) = build(factory.clone(), Config::default());

        let listings = scraper.scrape("cafes in Lyon").await.unwrap();

        assert!(listings.is_empty());
        assert_eq!(factory.released(), 1);
        assert!(observer
            .events()
            .contains(&ScrapeEvent::FeedTimeout { url: SEARCH.into() }));
    }

    #[tokio::test]
    async fn failing_link_is_skipped() {
        let factory = FixtureFactory::new()
            .with_page(SEARCH, FixturePage::new(feed(&["/maps/place/a", "/maps/place/b"])))
            .with_page("https://maps.test/maps/place/b", FixturePage::new(detail("Cafe B", "2 Rue Y")))
            .failing_url("https://maps.test/maps/place/a");
        let (scraper, observer) = build(factory.clone(), Config::default());

        let listings = scraper.scrape("cafes in Lyon").await.unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Cafe B");
        assert_eq!(factory.opened(), 1);
        assert_eq!(factory.released(), 1);
        assert!(observer.events().iter().any(|e| matches!(
            e,
            ScrapeEvent::ListingFailed { index: 1, url, .. } if url == "https://maps.test/maps/place/a"
        )));
    }

    #[tokio::test]
    async fn caps_links_per_pass() {
        let factory = FixtureFactory::new()
            .with_page(SEARCH, FixturePage::new(feed(&["/maps/place/a", "/maps/place/b", "/maps/place/c"])))
            .with_page("https://maps.test/maps/place/a", FixturePage::new(detail("A", "1")))
            .with_page("https://maps.test/maps/place/b", FixturePage::new(detail("B", "2")))
            .with_page("https://maps.test/maps/place/c", FixturePage::new(detail("C", "3")));
        let (scraper, observer) = build(factory.clone(), Config::default().with_max_listings(2));

        let listings = scraper.scrape("cafes in Lyon").await.unwrap();

        let titles: Vec<_> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert!(observer.events().contains(&ScrapeEvent::LinksCollected { found: 3, kept: 2 }));
    }

    #[tokio::test]
    async fn search_navigation_failure_still_releases_session() {
        let factory = FixtureFactory::new().failing_url(SEARCH);
        let (scraper, _) = build(factory.clone(), Config::default());

        let err = scraper.scrape("cafes in Lyon").await.unwrap_err();

        assert!(matches!(err, ScrapeError::Browser(_)));
        assert_eq!(factory.opened(), 1);
        assert_eq!(factory.released(), 1);
    }

    #[tokio::test]
    async fn session_launch_failure_is_a_pass_error() {
        let factory = FixtureFactory::new().failing_open();
        let (scraper, _) = build(factory.clone(), Config::default());

        assert!(scraper.scrape("cafes in Lyon").await.is_err());
        assert_eq!(factory.released(), 0);
    }
}
