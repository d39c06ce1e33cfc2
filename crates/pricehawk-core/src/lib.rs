pub mod config;
pub mod detect;
pub mod error;
pub mod models;
pub mod parse;
pub mod retry;
pub mod service;
pub mod tracker;
pub mod traits;
pub mod validate;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{RunMode, TrackerConfig};
pub use detect::{PageClass, classify};
pub use error::AppError;
pub use models::{
    AttemptOutcome, CheckOutcome, CycleReport, FetchAttempt, Price, PriceAlert, PriceCandidate,
    PriceEntry, PriceMatch, Product,
};
pub use parse::{ParseError, parse_price};
pub use retry::RetryConfig;
pub use service::PriceService;
pub use tracker::{Tracker, TrackerSettings};
pub use traits::{Fetcher, HistoryStore, Notifier, PriceExtractor};
pub use validate::validate_price;
