use std::future::Future;

use crate::error::AppError;
use crate::models::{Price, PriceAlert, PriceEntry, PriceMatch};

/// Fetches raw HTML content from a URL.
///
/// One call is one attempt: implementations do not retry. Non-2xx statuses
/// come back as [`AppError::HttpStatus`].
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Finds the displayed price in a product page.
pub trait PriceExtractor: Send + Sync + Clone {
    /// Returns the first candidate that parses and validates, or
    /// [`AppError::NoPriceFound`] carrying the page title.
    fn extract(&self, html: &str) -> Result<PriceMatch, AppError>;
}

/// Persists observed prices per product.
pub trait HistoryStore: Send + Sync + Clone {
    /// Append an observation stamped with the current time.
    fn record(
        &self,
        product: &str,
        price: Price,
    ) -> impl Future<Output = Result<PriceEntry, AppError>> + Send;

    /// Recorded prices for a product, newest first.
    fn history(
        &self,
        product: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<PriceEntry>, AppError>> + Send;
}

/// Delivers price alerts.
pub trait Notifier: Send + Sync + Clone {
    fn notify(&self, alert: &PriceAlert) -> impl Future<Output = Result<(), AppError>> + Send;
}
