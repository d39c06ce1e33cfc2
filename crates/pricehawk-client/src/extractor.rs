use std::sync::{Arc, LazyLock};

use pricehawk_core::error::AppError;
use pricehawk_core::models::{Price, PriceCandidate, PriceMatch};
use pricehawk_core::parse::parse_price;
use pricehawk_core::traits::PriceExtractor;
use scraper::{ElementRef, Html, Selector};

/// Price selectors for Amazon product pages, in priority order.
///
/// Update this list when the retailer changes its markup; earlier entries
/// win when several match.
pub const PRICE_SELECTORS: [&str; 12] = [
    "span.a-offscreen",
    "span#priceblock_dealprice",
    "span#priceblock_ourprice",
    "span.a-price-whole",
    "span.a-price.a-text-price.a-size-medium.apexPriceToPay",
    "span.a-price-range",
    ".a-price .a-offscreen",
    "#corePrice_feature_div .a-price .a-offscreen",
    "#apex_desktop .a-price .a-offscreen",
    ".a-price-to-pay .a-offscreen",
    "#priceblock_pactprice",
    ".a-price.a-text-price.a-size-medium.apexPriceToPay .a-offscreen",
];

const TITLE_LIMIT: usize = 100;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));

static DEFAULT_PATTERNS: LazyLock<Arc<[PricePattern]>> = LazyLock::new(|| {
    PRICE_SELECTORS
        .iter()
        .map(|s| PricePattern::parse(s).expect("valid built-in price selector"))
        .collect()
});

#[derive(Debug, Clone)]
struct PricePattern {
    source: String,
    selector: Selector,
}

impl PricePattern {
    fn parse(source: &str) -> Result<Self, AppError> {
        let selector = Selector::parse(source)
            .map_err(|e| AppError::ConfigError(format!("invalid price selector '{source}': {e}")))?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }
}

/// Price extractor driven by an ordered list of CSS selectors.
///
/// Candidates are visited pattern by pattern, document order within a
/// pattern, and the first one that parses to a plausible price wins.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    patterns: Arc<[PricePattern]>,
    retailer: String,
}

impl Default for SelectorExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorExtractor {
    /// Extractor over [`PRICE_SELECTORS`].
    pub fn new() -> Self {
        Self {
            patterns: Arc::clone(&*DEFAULT_PATTERNS),
            retailer: "amazon".into(),
        }
    }

    /// Extractor over a custom selector list.
    ///
    /// Fails with `ConfigError` if any selector does not parse, so a bad list
    /// is caught before any page is fetched.
    pub fn with_selectors<S: AsRef<str>>(selectors: &[S]) -> Result<Self, AppError> {
        if selectors.is_empty() {
            return Err(AppError::ConfigError(
                "at least one price selector is required".into(),
            ));
        }
        let patterns = selectors
            .iter()
            .map(|s| PricePattern::parse(s.as_ref()))
            .collect::<Result<Arc<[_]>, _>>()?;
        Ok(Self {
            patterns,
            retailer: "amazon".into(),
        })
    }

    /// Name expected in page titles; used only for a diagnostic hint.
    pub fn with_retailer(mut self, retailer: impl Into<String>) -> Self {
        self.retailer = retailer.into().to_lowercase();
        self
    }

    /// Every candidate on the page, in the order extraction visits them.
    pub fn candidates(&self, html: &str) -> Vec<PriceCandidate> {
        let document = Html::parse_document(html);
        self.patterns
            .iter()
            .flat_map(|pattern| {
                document
                    .select(&pattern.selector)
                    .map(|element| candidate(&pattern.source, element))
            })
            .collect()
    }

    fn no_price(&self, document: &Html) -> AppError {
        let title = page_title(document);
        let lower = title.to_lowercase();
        if !lower.contains(&self.retailer) && !lower.contains("error") {
            tracing::debug!(%title, "Page title does not look like a product page, possibly redirected");
        }
        AppError::NoPriceFound { title }
    }
}

impl PriceExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Result<PriceMatch, AppError> {
        let document = Html::parse_document(html);

        let found = self.patterns.iter().find_map(|pattern| {
            document.select(&pattern.selector).find_map(|element| {
                let candidate = candidate(&pattern.source, element);
                let price = candidate.parsed_value.and_then(Price::new)?;
                Some(PriceMatch {
                    price,
                    source_pattern: candidate.source_pattern,
                    raw_text: candidate.raw_text,
                })
            })
        });

        found.ok_or_else(|| self.no_price(&document))
    }
}

fn candidate(source: &str, element: ElementRef<'_>) -> PriceCandidate {
    let raw_text = element.text().collect::<String>().trim().to_string();
    let parsed_value = parse_price(&raw_text).ok();
    PriceCandidate {
        source_pattern: source.to_string(),
        raw_text,
        parsed_value,
    }
}

/// First `<title>`, trimmed and cut to 100 characters, or `"Unknown"`.
fn page_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|e| e.text().collect::<String>().trim().chars().take(TITLE_LIMIT).collect::<String>())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}
