//! Typed errors for the scraping pipeline.
//!
//! Field-level misses never show up here: they collapse to `None` inside the
//! detail parser. What remains are failures of a whole listing, a whole pass,
//! or a whole request.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started or connected to
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation to a URL failed
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A DevTools protocol command failed
    #[error("browser protocol error: {0}")]
    Protocol(String),

    /// An in-page script returned something unexpected
    #[error("script error: {0}")]
    Script(String),
}

/// Errors raised while persisting run results.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a pass or a run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced to whoever issued the scrape request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The query was empty or whitespace-only
    #[error("Query parameter cannot be empty")]
    InvalidQuery,

    /// The run failed as a whole
    #[error("Scraping failed: {0}")]
    Internal(String),
}

impl RequestError {
    /// HTTP status code an embedding server should answer with.
    pub fn status(&self) -> u16 {
        match self {
            RequestError::InvalidQuery => 400,
            RequestError::Internal(_) => 500,
        }
    }

    /// Human-readable failure description.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_map_to_status_codes() {
        assert_eq!(RequestError::InvalidQuery.status(), 400);

        let err = RequestError::Internal("session crashed".into());
        assert_eq!(err.status(), 500);
        assert_eq!(err.detail(), "Scraping failed: session crashed");
    }

    #[test]
    fn scrape_error_is_transparent_over_browser_error() {
        let err: ScrapeError = BrowserError::Launch("no chrome binary".into()).into();
        assert_eq!(err.to_string(), "failed to launch browser: no chrome binary");
    }
}
