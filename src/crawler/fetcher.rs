use async_trait::async_trait;
use tokio::time::{sleep, Duration, Instant};

use crate::error::BrowserResult;

/// A live, rendered browser tab driven by the scraper.
///
/// A session is owned by exactly one pass and must be handed back through
/// [`BrowserSession::close`] when the pass ends.
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;

    /// Whether at least one element matches the CSS selector right now.
    async fn exists(&mut self, selector: &str) -> BrowserResult<bool>;

    async fn count(&mut self, selector: &str) -> BrowserResult<usize>;

    /// Scroll the first matching container to its bottom edge.
    ///
    /// Returns `false` when no element matches.
    async fn scroll_to_bottom(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Serialized DOM of the current page.
    async fn content(&mut self) -> BrowserResult<String>;

    async fn close(self) -> BrowserResult<()>;

    /// Poll until `selector` matches or `timeout` elapses.
    ///
    /// `Ok(false)` means the deadline passed without a match.
    async fn wait_for(
        &mut self,
        selector: &str,
        timeout: Duration,
        poll: Duration,
    ) -> BrowserResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(poll.min(deadline - now)).await;
        }
    }
}

/// Hands out fresh browser sessions, one per pass.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession;

    async fn open(&self) -> BrowserResult<Self::Session>;
}

/// Search results URL for `query`, form-encoded (`cafes in Lyon` → `cafes+in+Lyon`).
pub fn search_url(base: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query() {
        assert_eq!(
            search_url("https://www.google.com/maps/search/", " cafes in Lyon "),
            "https://www.google.com/maps/search/cafes+in+Lyon"
        );
        assert_eq!(
            search_url("https://maps.example/search", "bars & pubs"),
            "https://maps.example/search/bars+%26+pubs"
        );
    }
}
