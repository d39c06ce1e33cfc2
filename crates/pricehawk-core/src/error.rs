use thiserror::Error;

/// Application-wide error types for pricehawk.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The target URL cannot be requested at all.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The page is a block or CAPTCHA page. Carries the matched indicator.
    #[error("Bot detection triggered ({0})")]
    BotDetected(String),

    /// No structural pattern produced a valid price.
    #[error("No price found (page title: {title})")]
    NoPriceFound { title: String },

    /// Every attempt ended on a block page.
    #[error("Blocked by bot detection after {attempts} attempts")]
    BlockedExhausted { attempts: u32 },

    /// Every attempt ended in a network-layer failure.
    #[error("Network failure after {attempts} attempts: {last_error}")]
    NetworkExhausted { attempts: u32, last_error: String },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Price history could not be read or written.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Alert delivery failed.
    #[error("Notification error: {0}")]
    NotifyError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if a fresh fetch attempt may succeed where this one failed.
    ///
    /// Every network-layer failure is retryable, including non-2xx statuses,
    /// and so is a block page.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::HttpStatus { .. }
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::BotDetected(_)
        )
    }

    /// Returns true for the "try again next cycle" outcomes of a price lookup.
    pub fn is_price_failure(&self) -> bool {
        matches!(
            self,
            AppError::NoPriceFound { .. }
                | AppError::BlockedExhausted { .. }
                | AppError::NetworkExhausted { .. }
        )
    }
}
