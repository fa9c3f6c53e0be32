//! Chrome over the DevTools protocol, via `chromiumoxide`.

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::crawler::fetcher::{BrowserSession, SessionFactory};
use crate::error::{BrowserError, BrowserResult};

/// Launches a local Chrome per session with the crate's default flags.
#[derive(Debug, Clone, Default)]
pub struct ChromeFactory;

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

#[async_trait]
impl SessionFactory for ChromeFactory {
    type Session = ChromeSession;

    async fn open(&self) -> BrowserResult<ChromeSession> {
        let config = BrowserConfig::builder().build().map_err(BrowserError::Launch)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        debug!("browser session opened");
        Ok(ChromeSession {
            browser,
            page,
            handler,
        })
    }
}

async fn eval<T: DeserializeOwned>(page: &Page, script: String) -> BrowserResult<T> {
    page.evaluate(script)
        .await
        .map_err(|e| BrowserError::Protocol(e.to_string()))?
        .into_value::<T>()
        .map_err(|e| BrowserError::Script(e.to_string()))
}

/// Embed a CSS selector as a JS string literal.
fn js_literal(selector: &str) -> BrowserResult<String> {
    serde_json::to_string(selector).map_err(|e| BrowserError::Script(e.to_string()))
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> BrowserResult<bool> {
        let sel = js_literal(selector)?;
        eval(&self.page, format!("document.querySelector({sel}) !== null")).await
    }

    async fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        let sel = js_literal(selector)?;
        eval(&self.page, format!("document.querySelectorAll({sel}).length")).await
    }

    async fn scroll_to_bottom(&mut self, selector: &str) -> BrowserResult<bool> {
        let sel = js_literal(selector)?;
        eval(
            &self.page,
            format!(
                r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.scrollTo(0, el.scrollHeight);
                return true;
            }})()"#
            ),
        )
        .await
    }

    async fn content(&mut self) -> BrowserResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn close(mut self) -> BrowserResult<()> {
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()));
        if closed.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
        debug!("browser session closed");
        closed.map(|_| ())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // The browser process itself is killed by `Browser`'s own drop.
        self.handler.abort();
    }
}
