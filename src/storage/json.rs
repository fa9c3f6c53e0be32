use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;

use crate::crawler::models::ScrapeResult;
use crate::error::{StorageError, StorageResult};

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w \-]").unwrap());

/// Directory name for a query: anything but word characters, space and
/// hyphen becomes `_`.
pub fn sanitize_query(query: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(query, "_");
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Writes per-pass and merged results under `<root>/<sanitized query>/`.
///
/// Files are overwritten on every run of the same query.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, query: &str) -> PathBuf {
        self.root.join(sanitize_query(query))
    }

    pub async fn save_pass(
        &self,
        query: &str,
        pass: u32,
        result: &ScrapeResult,
    ) -> StorageResult<PathBuf> {
        self.write(query, &format!("pass{pass}.json"), result).await
    }

    pub async fn save_final(&self, query: &str, result: &ScrapeResult) -> StorageResult<PathBuf> {
        self.write(query, "final.json", result).await
    }

    async fn write(
        &self,
        query: &str,
        file_name: &str,
        result: &ScrapeResult,
    ) -> StorageResult<PathBuf> {
        let dir = self.run_dir(query);
        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;

        let path = dir.join(file_name);
        let body = serde_json::to_vec_pretty(result)?;
        fs::write(&path, body).await.map_err(|e| io_error(&path, e))?;
        Ok(path)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}
