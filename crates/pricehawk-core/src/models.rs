use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::validate_price;

/// A validated monetary amount, always within `0.01..=50000`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    /// Wrap a value, or `None` if it falls outside the plausible bound.
    pub fn new(value: f64) -> Option<Self> {
        validate_price(value).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Price::new(value).ok_or_else(|| {
            serde::de::Error::custom(format!("price {value} is outside the plausible range"))
        })
    }
}

/// A price-bearing text fragment found by one structural pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCandidate {
    /// Selector (or other identifier) of the pattern that matched.
    pub source_pattern: String,
    pub raw_text: String,
    /// `None` when the text did not parse as a number.
    pub parsed_value: Option<f64>,
}

/// The winning candidate of an extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatch {
    pub price: Price,
    pub source_pattern: String,
    pub raw_text: String,
}

/// How a single fetch attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Clean page fetched; carries the body length.
    Success(usize),
    Timeout,
    NetworkError(String),
    BotDetected(String),
    HttpError(u16),
}

/// One iteration of the retry loop. Discarded once the loop ends.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchAttempt {
    /// 1-based.
    pub attempt_number: u32,
    pub delay_before: Duration,
    pub outcome: AttemptOutcome,
}

/// A product the tracker watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub url: String,
    pub target_price: f64,
}

/// One recorded observation in the price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Payload handed to a [`Notifier`](crate::traits::Notifier) when a target is hit.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub product: String,
    pub url: String,
    pub current: f64,
    pub target: f64,
    /// Price recorded just before the current one, if any.
    pub previous: Option<f64>,
}

impl PriceAlert {
    pub fn subject(&self) -> String {
        format!(
            "PRICE ALERT: {} dropped to ${:.2}!",
            self.product, self.current
        )
    }

    /// `(amount, percent)` saved against the previous price, only when it dropped.
    pub fn savings(&self) -> Option<(f64, f64)> {
        let previous = self.previous?;
        if previous > self.current {
            let amount = previous - self.current;
            Some((amount, amount / previous * 100.0))
        } else {
            None
        }
    }
}

/// Result of checking one product within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Price at or below target and an alert was attempted.
    Alerted { price: f64 },
    AboveTarget { price: f64 },
    /// Price lookup failed; the product is skipped this cycle.
    Failed { reason: String },
}

/// Per-product outcomes of one tracker cycle, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<(String, CheckOutcome)>,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CheckOutcome::Failed { .. }))
            .count()
    }

    pub fn alerts(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CheckOutcome::Alerted { .. }))
            .count()
    }
}
