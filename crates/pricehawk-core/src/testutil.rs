//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::error::AppError;
use crate::models::{Price, PriceAlert, PriceEntry, PriceMatch};
use crate::traits::{Fetcher, HistoryStore, Notifier, PriceExtractor};

/// Build a [`PriceMatch`] for a known-valid value.
pub fn price_match(value: f64) -> PriceMatch {
    PriceMatch {
        price: Price::new(value).expect("test price within bounds"),
        source_pattern: "span.a-offscreen".into(),
        raw_text: format!("${value:.2}"),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    /// URLs requested, in order.
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns queued results regardless of the HTML.
#[derive(Clone)]
pub struct MockExtractor {
    /// If empty, every call reports `NoPriceFound`.
    responses: Arc<Mutex<Vec<Result<PriceMatch, AppError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockExtractor {
    pub fn new(value: f64) -> Self {
        Self::with_responses(vec![Ok(price_match(value))])
    }

    /// Extractor that never finds a price.
    pub fn empty() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<Result<PriceMatch, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl PriceExtractor for MockExtractor {
    fn extract(&self, _html: &str) -> Result<PriceMatch, AppError> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(AppError::NoPriceFound {
                title: "Unknown".into(),
            })
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory history store that can be told to fail.
#[derive(Clone)]
pub struct MockStore {
    pub entries: Arc<Mutex<BTreeMap<String, Vec<PriceEntry>>>>,
    record_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            record_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Store pre-seeded with prices for one product, oldest first.
    pub fn with_prices(product: &str, prices: &[f64]) -> Self {
        let store = Self::empty();
        let seeded = prices
            .iter()
            .map(|&price| PriceEntry {
                price,
                timestamp: Utc::now(),
            })
            .collect();
        store
            .entries
            .lock()
            .unwrap()
            .insert(product.to_string(), seeded);
        store
    }

    /// Store whose next `record` fails.
    pub fn with_record_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.record_error.lock().unwrap() = Some(error);
        store
    }

    pub fn prices(&self, product: &str) -> Vec<f64> {
        self.entries
            .lock()
            .unwrap()
            .get(product)
            .map(|entries| entries.iter().map(|e| e.price).collect())
            .unwrap_or_default()
    }
}

impl HistoryStore for MockStore {
    async fn record(&self, product: &str, price: Price) -> Result<PriceEntry, AppError> {
        if let Some(e) = self.record_error.lock().unwrap().take() {
            return Err(e);
        }
        let entry = PriceEntry {
            price: price.value(),
            timestamp: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap()
            .entry(product.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn history(&self, product: &str, limit: usize) -> Result<Vec<PriceEntry>, AppError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(product)
            .map(|list| list.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Notifier that records alerts instead of sending them.
#[derive(Clone)]
pub struct MockNotifier {
    pub sent: Arc<Mutex<Vec<PriceAlert>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Notifier whose next delivery fails.
    pub fn with_error(error: AppError) -> Self {
        let notifier = Self::new();
        *notifier.error.lock().unwrap() = Some(error);
        notifier
    }

    pub fn sent(&self) -> Vec<PriceAlert> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MockNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<(), AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
