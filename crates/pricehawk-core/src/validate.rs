//! Plausibility bound for parsed prices.
//!
//! Rejects values that parse as numbers but cannot be a consumer price,
//! such as a stray `0` or a year picked up from nearby markup.

/// Smallest accepted price.
pub const MIN_PRICE: f64 = 0.01;

/// Largest accepted price.
pub const MAX_PRICE: f64 = 50_000.0;

/// Returns true iff `MIN_PRICE <= value <= MAX_PRICE`.
///
/// NaN is never valid.
pub fn validate_price(value: f64) -> bool {
    (MIN_PRICE..=MAX_PRICE).contains(&value)
}
