use tokio::time::{sleep, Duration};

use crate::crawler::fetcher::BrowserSession;
use crate::events::{Observer, ScrapeEvent};

/// How hard to push an infinite-scroll feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPolicy {
    /// Upper bound on scroll-to-bottom operations.
    pub max_iterations: u32,
    /// Pause after each scroll so new items can render.
    pub settle: Duration,
    /// Stop once the link count has not changed across this many
    /// consecutive scrolls. `None` or `Some(0)` always runs `max_iterations`.
    pub stable_rounds: Option<u32>,
}

impl ScrollPolicy {
    fn convergence_rounds(&self) -> Option<u32> {
        self.stable_rounds.filter(|&rounds| rounds > 0)
    }
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            settle: Duration::from_millis(500),
            stable_rounds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollReport {
    pub iterations: u32,
    pub stopped_early: bool,
}

/// Scrolls the results feed to make it load more listings.
pub struct FeedPaginator<'a> {
    policy: &'a ScrollPolicy,
    feed_selector: &'a str,
    link_selector: String,
    observer: &'a dyn Observer,
}

impl<'a> FeedPaginator<'a> {
    pub fn new(
        policy: &'a ScrollPolicy,
        feed_selector: &'a str,
        path_fragment: &str,
        observer: &'a dyn Observer,
    ) -> Self {
        Self {
            policy,
            feed_selector,
            link_selector: format!(r#"{feed_selector} a[href*="{path_fragment}"]"#),
            observer,
        }
    }

    /// Never fails: a missing feed or a broken scroll just ends pagination.
    pub async fn paginate<S: BrowserSession>(&self, session: &mut S) -> ScrollReport {
        let mut report = ScrollReport::default();
        let mut last_count = match self.policy.convergence_rounds() {
            Some(_) => session.count(&self.link_selector).await.ok(),
            None => None,
        };
        let mut unchanged = 0u32;

        for iteration in 1..=self.policy.max_iterations {
            match session.scroll_to_bottom(self.feed_selector).await {
                Ok(true) => {}
                Ok(false) => {
                    self.observer
                        .on_event(&ScrapeEvent::FeedMissing { iteration });
                    break;
                }
                Err(e) => {
                    self.observer.on_event(&ScrapeEvent::ScrollFailed {
                        iteration,
                        error: e.to_string(),
                    });
                    break;
                }
            }
            report.iterations = iteration;
            sleep(self.policy.settle).await;

            let Some(rounds) = self.policy.convergence_rounds() else {
                continue;
            };
            match session.count(&self.link_selector).await {
                Ok(count) => {
                    if last_count == Some(count) {
                        unchanged += 1;
                    } else {
                        unchanged = 0;
                    }
                    last_count = Some(count);
                }
                Err(_) => {
                    unchanged = 0;
                    last_count = None;
                }
            }
            if unchanged >= rounds {
                report.stopped_early = iteration < self.policy.max_iterations;
                break;
            }
        }

        self.observer.on_event(&ScrapeEvent::ScrollFinished {
            iterations: report.iterations,
            stopped_early: report.stopped_early,
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureFactory, FixturePage, RecordingObserver};
    use crate::crawler::fetcher::SessionFactory;

    const FEED: &str = r#"div[role="feed"]"#;

    fn stage(links: usize) -> String {
        let anchors: String = (0..links)
            .map(|i| format!(r#"<a href="/maps/place/{i}">{i}</a>"#))
            .collect();
        format!(r#"<div role="feed">{anchors}</div>"#)
    }

    fn policy(max_iterations: u32, stable_rounds: Option<u32>) -> ScrollPolicy {
        ScrollPolicy {
            max_iterations,
            settle: Duration::ZERO,
            stable_rounds,
        }
    }

    #[tokio::test]
    async fn runs_fixed_number_of_scrolls_by_default() {
        let factory = FixtureFactory::new().with_page(
            "https://maps.test/search",
            FixturePage::staged(vec![stage(1), stage(2)]),
        );
        let observer = RecordingObserver::default();
        let mut session = factory.open().await.unwrap();
        session.goto("https://maps.test/search").await.unwrap();

        let policy = policy(6, None);
        let report = FeedPaginator::new(&policy, FEED, "/maps/place/", &observer)
            .paginate(&mut session)
            .await;

        assert_eq!(report.iterations, 6);
        assert!(!report.stopped_early);
        assert_eq!(session.scrolls(), 6);
    }

    #[tokio::test]
    async fn missing_feed_is_not_fatal() {
        let factory = FixtureFactory::new()
            .with_page("https://maps.test/search", FixturePage::new("<p>consent wall</p>"));
        let observer = RecordingObserver::default();
        let mut session = factory.open().await.unwrap();
        session.goto("https://maps.test/search").await.unwrap();

        let policy = policy(15, None);
        let report = FeedPaginator::new(&policy, FEED, "/maps/place/", &observer)
            .paginate(&mut session)
            .await;

        assert_eq!(report.iterations, 0);
        assert!(observer
            .events()
            .contains(&ScrapeEvent::FeedMissing { iteration: 1 }));
    }

    #[tokio::test]
    async fn zero_stable_rounds_keeps_the_full_ceiling() {
        let factory = FixtureFactory::new().with_page(
            "https://maps.test/search",
            FixturePage::staged(vec![stage(3)]),
        );
        let observer = RecordingObserver::default();
        let mut session = factory.open().await.unwrap();
        session.goto("https://maps.test/search").await.unwrap();

        let policy = policy(5, Some(0));
        let report = FeedPaginator::new(&policy, FEED, "/maps/place/", &observer)
            .paginate(&mut session)
            .await;

        assert_eq!(report.iterations, 5);
        assert!(!report.stopped_early);
    }

    #[tokio::test]
    async fn stops_once_link_count_settles() {
        let factory = FixtureFactory::new().with_page(
            "https://maps.test/search",
            FixturePage::staged(vec![stage(2), stage(4), stage(6)]),
        );
        let observer = RecordingObserver::default();
        let mut session = factory.open().await.unwrap();
        session.goto("https://maps.test/search").await.unwrap();

        // Counts after each scroll: 4, 6, 6, 6 -> two unchanged rounds after scroll 4.
        let policy = policy(15, Some(2));
        let report = FeedPaginator::new(&policy, FEED, "/maps/place/", &observer)
            .paginate(&mut session)
            .await;

        assert_eq!(report.iterations, 4);
        assert!(report.stopped_early);
    }
}
