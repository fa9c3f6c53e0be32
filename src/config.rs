use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::crawler::feed::ScrollPolicy;
use crate::crawler::locator::TextMatch;
use crate::crawler::parser::DetailMarkup;

/// Tunables for a scrape run.
///
/// `Default` holds the production values; `from_env` overrides them from
/// `MAPS_*` variables and tests shrink them through the `with_*` builders.
#[derive(Debug, Clone)]
pub struct Config {
    pub search_base_url: String,
    pub output_dir: PathBuf,
    /// Passes per request.
    pub passes: u32,
    /// Listings visited per pass.
    pub max_listings: usize,
    pub feed_wait: Duration,
    pub detail_wait: Duration,
    /// Pause after navigating to a listing.
    pub detail_settle: Duration,
    /// Extra pause once the detail heading has appeared.
    pub detail_stabilize: Duration,
    /// Pause between the last scroll and link collection.
    pub post_scroll_settle: Duration,
    pub poll_interval: Duration,
    pub scroll: ScrollPolicy,
    /// Attribute and value identifying the results feed container.
    pub feed_scope: (String, TextMatch),
    pub heading_selector: String,
    /// Path fragment identifying listing links inside the feed.
    pub listing_path: String,
    pub markup: DetailMarkup,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_base_url: "https://www.google.com/maps/search".into(),
            output_dir: PathBuf::from("results"),
            passes: 10,
            max_listings: 40,
            feed_wait: Duration::from_secs(10),
            detail_wait: Duration::from_secs(5),
            detail_settle: Duration::from_millis(1500),
            detail_stabilize: Duration::from_millis(500),
            post_scroll_settle: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            scroll: ScrollPolicy::default(),
            feed_scope: ("role".into(), TextMatch::exact("feed")),
            heading_selector: "h1".into(),
            listing_path: "/maps/place/".into(),
            markup: DetailMarkup::default(),
        }
    }
}

fn var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("cannot read {name}")),
    }
}

fn millis(name: &str) -> anyhow::Result<Option<Duration>> {
    Ok(var::<u64>(name)?.map(Duration::from_millis))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = var("MAPS_SEARCH_URL")? {
            cfg.search_base_url = v;
        }
        if let Some(v) = var("MAPS_OUTPUT_DIR")? {
            cfg.output_dir = v;
        }
        if let Some(v) = var("MAPS_PASSES")? {
            cfg.passes = v;
        }
        if let Some(v) = var("MAPS_MAX_LISTINGS")? {
            cfg.max_listings = v;
        }
        if let Some(v) = millis("MAPS_FEED_WAIT_MS")? {
            cfg.feed_wait = v;
        }
        if let Some(v) = millis("MAPS_DETAIL_WAIT_MS")? {
            cfg.detail_wait = v;
        }
        if let Some(v) = millis("MAPS_DETAIL_SETTLE_MS")? {
            cfg.detail_settle = v;
        }
        if let Some(v) = millis("MAPS_DETAIL_STABILIZE_MS")? {
            cfg.detail_stabilize = v;
        }
        if let Some(v) = millis("MAPS_POST_SCROLL_SETTLE_MS")? {
            cfg.post_scroll_settle = v;
        }
        if let Some(v) = var("MAPS_SCROLL_ITERATIONS")? {
            cfg.scroll.max_iterations = v;
        }
        if let Some(v) = millis("MAPS_SCROLL_SETTLE_MS")? {
            cfg.scroll.settle = v;
        }
        if let Some(v) = var::<u32>("MAPS_SCROLL_STABLE_ROUNDS")? {
            // Zero rounds would stop after the first scroll; treat it as unset.
            cfg.scroll.stable_rounds = (v > 0).then_some(v);
        }

        Ok(cfg)
    }

    /// CSS selector for the results feed container.
    pub fn feed_selector(&self) -> String {
        self.feed_scope.1.css_attribute(&self.feed_scope.0)
    }

    /// Zero every pause and wait; useful with scripted sessions.
    pub fn without_delays(mut self) -> Self {
        self.feed_wait = Duration::ZERO;
        self.detail_wait = Duration::ZERO;
        self.detail_settle = Duration::ZERO;
        self.detail_stabilize = Duration::ZERO;
        self.post_scroll_settle = Duration::ZERO;
        self.poll_interval = Duration::ZERO;
        self.scroll.settle = Duration::ZERO;
        self
    }

    pub fn with_search_base_url(mut self, url: impl Into<String>) -> Self {
        self.search_base_url = url.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_max_listings(mut self, max: usize) -> Self {
        self.max_listings = max;
        self
    }

    pub fn with_scroll(mut self, scroll: ScrollPolicy) -> Self {
        self.scroll = scroll;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_caps() {
        let cfg = Config::default();
        assert_eq!(cfg.passes, 10);
        assert_eq!(cfg.max_listings, 40);
        assert_eq!(cfg.scroll.max_iterations, 15);
        assert_eq!(cfg.scroll.stable_rounds, None);
        assert_eq!(cfg.feed_wait, Duration::from_secs(10));
        assert_eq!(cfg.detail_wait, Duration::from_secs(5));
        assert_eq!(cfg.detail_settle, Duration::from_millis(1500));
    }

    #[test]
    fn feed_selector_follows_scope() {
        let mut cfg = Config::default();
        assert_eq!(cfg.feed_selector(), r#"[role="feed"]"#);

        cfg.feed_scope = ("aria-label".into(), TextMatch::contains("Results for"));
        assert_eq!(cfg.feed_selector(), r#"[aria-label*="Results for"]"#);
    }

    #[test]
    fn zero_stable_rounds_from_env_means_unset() {
        env::set_var("MAPS_SCROLL_STABLE_ROUNDS", "0");
        let zero = Config::from_env().unwrap().scroll.stable_rounds;
        env::set_var("MAPS_SCROLL_STABLE_ROUNDS", "3");
        let three = Config::from_env().unwrap().scroll.stable_rounds;
        env::remove_var("MAPS_SCROLL_STABLE_ROUNDS");

        assert_eq!(zero, None);
        assert_eq!(three, Some(3));
    }

    #[test]
    fn builders_override_caps() {
        let cfg = Config::default()
            .without_delays()
            .with_passes(2)
            .with_max_listings(3);

        assert_eq!(cfg.passes, 2);
        assert_eq!(cfg.max_listings, 3);
        assert_eq!(cfg.scroll.settle, Duration::ZERO);
        assert_eq!(cfg.detail_settle, Duration::ZERO);
    }
}
