//! Price text parsing.
//!
//! Turns a raw, price-bearing text fragment (currency symbols, thousands
//! separators, stray whitespace) into a number. The cleaned text is tried
//! against an ordered list of number formats and the first format that
//! matches and yields a finite number wins.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Why a text fragment could not be read as a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("price text is empty")]
    Empty,

    #[error("no numeric value in {0:?}")]
    NoNumber(String),
}

/// A number layout, tried in priority order.
pub struct NumberFormat {
    pub name: &'static str,
    pattern: Regex,
}

impl NumberFormat {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid number format regex"),
        }
    }

    /// Read the first match in `cleaned`, dropping grouping commas.
    fn read(&self, cleaned: &str) -> Option<f64> {
        let matched = self.pattern.captures(cleaned)?.get(1)?.as_str();
        let value: f64 = matched.replace(',', "").parse().ok()?;
        value.is_finite().then_some(value)
    }
}

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.,\-]").expect("valid cleaning regex"));

/// Number formats in priority order.
///
/// The comma-decimal entry can never win: the grouped format matches any
/// string containing a digit, so a value like `1234,56` is read as `1234`.
/// It stays in the list so the lookup order is explicit.
pub static NUMBER_FORMATS: LazyLock<Vec<NumberFormat>> = LazyLock::new(|| {
    vec![
        NumberFormat::new("grouped", r"([0-9]+(?:,[0-9]{3})*\.?[0-9]*)"),
        NumberFormat::new("dot-decimal", r"([0-9]+\.?[0-9]*)"),
        NumberFormat::new("comma-decimal", r"([0-9]+,[0-9]+)"),
    ]
});

/// Strip everything except digits, `.`, `,` and `-`.
pub fn clean_price_text(raw: &str) -> String {
    DISALLOWED.replace_all(raw, "").into_owned()
}

/// Parse a price fragment such as `"$1,234.56"` into `1234.56`.
///
/// Never falls back to a default: empty or digit-free text is an error.
pub fn parse_price(raw: &str) -> Result<f64, ParseError> {
    parse_price_with_format(raw).map(|(value, _)| value)
}

/// Like [`parse_price`], also naming the number format that matched.
pub fn parse_price_with_format(raw: &str) -> Result<(f64, &'static str), ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let cleaned = clean_price_text(trimmed);
    NUMBER_FORMATS
        .iter()
        .find_map(|format| format.read(&cleaned).map(|value| (value, format.name)))
        .ok_or_else(|| ParseError::NoNumber(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_currency_with_grouping() {
        assert_eq!(parse_price("$1,234.56"), Ok(1234.56));
        assert_eq!(parse_price("  $12,345,678.90 "), Ok(12_345_678.90));
    }

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(parse_price("1234.56"), Ok(1234.56));
        assert_eq!(parse_price("$799.99"), Ok(799.99));
    }

    #[test]
    fn parses_integers_and_trailing_dot() {
        assert_eq!(parse_price("€100"), Ok(100.0));
        assert_eq!(parse_price("50."), Ok(50.0));
    }

    #[test]
    fn strips_markup_remnants() {
        assert_eq!(parse_price("US $ 49.99\n"), Ok(49.99));
        assert_eq!(parse_price("Price: $12"), Ok(12.0));
    }

    #[test]
    fn takes_lower_bound_of_range() {
        assert_eq!(parse_price("$19.99 - $29.99"), Ok(19.99));
    }

    #[test]
    fn empty_text_is_an_error() {
        assert_eq!(parse_price(""), Err(ParseError::Empty));
        assert_eq!(parse_price("   \n\t"), Err(ParseError::Empty));
    }

    #[test]
    fn digit_free_text_is_an_error() {
        assert!(matches!(parse_price("N/A"), Err(ParseError::NoNumber(_))));
        assert!(matches!(parse_price("$"), Err(ParseError::NoNumber(_))));
        assert!(matches!(parse_price("-.-,"), Err(ParseError::NoNumber(_))));
    }

    #[test]
    fn comma_decimal_is_read_by_grouped_format() {
        assert_eq!(parse_price_with_format("1234,56"), Ok((1234.0, "grouped")));
        assert_eq!(parse_price("1.234,56 €"), Ok(1.234));
    }

    #[test]
    fn grouped_format_wins_for_plain_numbers() {
        assert_eq!(parse_price_with_format("1234.56"), Ok((1234.56, "grouped")));
    }

    #[test]
    fn cleaning_keeps_only_number_characters() {
        assert_eq!(clean_price_text("$1,234.56 USD"), "1,234.56");
        assert_eq!(clean_price_text("-€5"), "-5");
    }

    #[test]
    fn formats_are_in_priority_order() {
        let names: Vec<_> = NUMBER_FORMATS.iter().map(|f| f.name).collect();
        assert_eq!(names, ["grouped", "dot-decimal", "comma-decimal"]);
    }
}
