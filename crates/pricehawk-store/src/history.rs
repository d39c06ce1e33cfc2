use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use pricehawk_core::error::AppError;
use pricehawk_core::models::{Price, PriceEntry};
use pricehawk_core::traits::HistoryStore;
use tokio::sync::Mutex;

/// Default number of observations kept per product.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

type History = BTreeMap<String, Vec<PriceEntry>>;

/// Price history persisted as one pretty-printed JSON document.
///
/// The file maps product name to observations, oldest first:
///
/// ```json
/// { "Laptop": [ { "price": 799.99, "timestamp": "2024-03-01T12:30:00Z" } ] }
/// ```
///
/// The whole document is rewritten after every record.
#[derive(Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
    limit: usize,
    history: Arc<Mutex<History>>,
}

impl JsonHistoryStore {
    /// Load the history at `path`.
    ///
    /// A missing file starts an empty history. So does an unreadable or
    /// corrupt one, after a warning; it is overwritten on the next record.
    pub async fn open(path: impl Into<PathBuf>, limit: usize) -> Self {
        let path = path.into();
        let history = load(&path).await;
        Self {
            path,
            limit: limit.max(1),
            history: Arc::new(Mutex::new(history)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of every product with recorded prices.
    pub async fn products(&self) -> Vec<String> {
        self.history.lock().await.keys().cloned().collect()
    }

    async fn persist(&self, history: &History) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(history)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::StorageError(format!("{}: {e}", parent.display())))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::StorageError(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AppError::StorageError(format!("{}: {e}", self.path.display())))
    }
}

async fn load(path: &Path) -> History {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No price history yet");
            return History::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read price history, starting fresh");
            return History::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not parse price history, starting fresh");
            History::new()
        }
    }
}

impl HistoryStore for JsonHistoryStore {
    async fn record(&self, product: &str, price: Price) -> Result<PriceEntry, AppError> {
        let entry = PriceEntry {
            price: price.value(),
            timestamp: Utc::now(),
        };

        let mut history = self.history.lock().await;
        // Memory only changes once the file holds the new entry.
        let mut updated = history.clone();
        let entries = updated.entry(product.to_string()).or_default();
        entries.push(entry.clone());
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }

        self.persist(&updated).await?;
        *history = updated;
        tracing::debug!(%product, price = %price, "Recorded price");
        Ok(entry)
    }

    async fn history(&self, product: &str, limit: usize) -> Result<Vec<PriceEntry>, AppError> {
        let history = self.history.lock().await;
        Ok(history
            .get(product)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(value: f64) -> Price {
        Price::new(value).unwrap()
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::open(dir.path().join("history.json"), 10).await;

        assert!(store.products().await.is_empty());
        assert!(store.history("Laptop", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keeps_newest_entries_up_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::open(dir.path().join("history.json"), 3).await;

        for value in [10.0, 11.0, 12.0, 13.0, 14.0] {
            store.record("Cable", price(value)).await.unwrap();
        }

        let prices: Vec<f64> = store
            .history("Cable", 10)
            .await
            .unwrap()
            .iter()
            .map(|e| e.price)
            .collect();
        assert_eq!(prices, vec![14.0, 13.0, 12.0]);
    }

    #[tokio::test]
    async fn zero_limit_keeps_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::open(dir.path().join("history.json"), 0).await;

        store.record("Cable", price(1.0)).await.unwrap();
        store.record("Cable", price(2.0)).await.unwrap();

        assert_eq!(store.history("Cable", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_history_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = JsonHistoryStore::open(&path, 5).await;
        store.record("Cable", price(12.0)).await.unwrap();

        // a directory where the temp file goes makes the write fail
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        let result = store.record("Cable", price(9.0)).await;

        assert!(matches!(result, Err(AppError::StorageError(_))));
        let prices: Vec<f64> = store
            .history("Cable", 5)
            .await
            .unwrap()
            .iter()
            .map(|e| e.price)
            .collect();
        assert_eq!(prices, vec![12.0]);
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/history.json");
        let store = JsonHistoryStore::open(&path, 5).await;
        assert_eq!(store.path(), path);

        store.record("Cable", price(1.0)).await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
