use std::time::Duration;

use crate::detect::{PageClass, classify};
use crate::error::AppError;
use crate::models::{AttemptOutcome, FetchAttempt, PriceMatch};
use crate::retry::RetryConfig;
use crate::traits::{Fetcher, PriceExtractor};

/// Orchestrates one price lookup: fetch → classify → extract, with retries.
///
/// Attempts run one after another; the only suspension points are the
/// backoff before each retry and the cool-down after a block page. With
/// default settings a lookup can take up to
/// [`RetryConfig::worst_case_latency`] (about 110 seconds).
pub struct PriceService<F, E>
where
    F: Fetcher,
    E: PriceExtractor,
{
    fetcher: F,
    extractor: E,
    retry: RetryConfig,
}

impl<F, E> PriceService<F, E>
where
    F: Fetcher,
    E: PriceExtractor,
{
    /// Create a new PriceService with the default retry schedule.
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self::with_retry(fetcher, extractor, RetryConfig::default())
    }

    pub fn with_retry(fetcher: F, extractor: E, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            extractor,
            retry,
        }
    }

    /// Look up the current price at `url`.
    ///
    /// Fails with `NetworkExhausted`, `BlockedExhausted` or `NoPriceFound`
    /// depending on how the last attempt ended, or immediately with any
    /// non-retryable fetch error.
    pub async fn fetch_price(&self, url: &str) -> Result<PriceMatch, AppError> {
        self.fetch_price_with_attempts(url).await.0
    }

    /// Like [`fetch_price`](Self::fetch_price), also returning the attempt log.
    pub async fn fetch_price_with_attempts(
        &self,
        url: &str,
    ) -> (Result<PriceMatch, AppError>, Vec<FetchAttempt>) {
        let attempts = self.retry.attempts();
        let mut log = Vec::with_capacity(attempts as usize);
        let mut last_failure = None;
        let mut cooldown = Duration::ZERO;

        for index in 0..attempts {
            let attempt_number = index + 1;
            let backoff = self.retry.draw_backoff(index, &mut rand::thread_rng());
            if !backoff.is_zero() {
                tracing::info!(
                    attempt = attempt_number,
                    delay_secs = format_args!("{:.1}", backoff.as_secs_f64()),
                    "Retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            let delay_before = backoff + std::mem::take(&mut cooldown);

            let mut record = |outcome| {
                log.push(FetchAttempt {
                    attempt_number,
                    delay_before,
                    outcome,
                });
            };

            let html = match self.fetcher.fetch(url).await {
                Ok(html) => html,
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt = attempt_number, %url, error = %e, "Fetch attempt failed");
                    record(outcome_for(&e));
                    last_failure = Some(e);
                    continue;
                }
                Err(e) => {
                    tracing::error!(%url, error = %e, "Fetch failed permanently");
                    return (Err(e), log);
                }
            };

            if let PageClass::Blocked(indicator) = classify(&html) {
                tracing::warn!(attempt = attempt_number, %indicator, "Bot detection triggered");
                record(AttemptOutcome::BotDetected(indicator.to_string()));
                last_failure = Some(AppError::BotDetected(indicator.to_string()));
                if attempt_number < attempts {
                    cooldown = self.retry.draw_cooldown(&mut rand::thread_rng());
                    tracing::info!(
                        delay_secs = format_args!("{:.1}", cooldown.as_secs_f64()),
                        "Cooling down before retry"
                    );
                    tokio::time::sleep(cooldown).await;
                }
                continue;
            }

            record(AttemptOutcome::Success(html.len()));
            match self.extractor.extract(&html) {
                Ok(found) => {
                    tracing::info!(
                        price = %found.price,
                        selector = %found.source_pattern,
                        attempt = attempt_number,
                        "Found price"
                    );
                    return (Ok(found), log);
                }
                Err(AppError::NoPriceFound { title }) => {
                    tracing::warn!(attempt = attempt_number, %title, "No price found");
                    last_failure = Some(AppError::NoPriceFound { title });
                }
                Err(e) => return (Err(e), log),
            }
        }

        tracing::error!(%url, attempts, "Failed to get price");
        tracing::debug!(?log, "Attempt log");
        (Err(exhausted(attempts, last_failure)), log)
    }
}

fn outcome_for(error: &AppError) -> AttemptOutcome {
    match error {
        AppError::Timeout(_) => AttemptOutcome::Timeout,
        AppError::HttpStatus { status, .. } => AttemptOutcome::HttpError(*status),
        other => AttemptOutcome::NetworkError(other.to_string()),
    }
}

/// Terminal failure once the attempt budget is spent.
fn exhausted(attempts: u32, last_failure: Option<AppError>) -> AppError {
    match last_failure {
        Some(AppError::BotDetected(_)) => AppError::BlockedExhausted { attempts },
        Some(e @ AppError::NoPriceFound { .. }) => e,
        Some(e) => AppError::NetworkExhausted {
            attempts,
            last_error: e.to_string(),
        },
        None => AppError::NetworkExhausted {
            attempts,
            last_error: "no attempt was made".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use tokio::time::Instant;

    const URL: &str = "https://www.amazon.com/dp/B0TEST";
    const PRODUCT_PAGE: &str =
        r#"<html><head><title>Amazon.com: Laptop</title></head><body><span class="a-offscreen">$799.99</span></body></html>"#;
    const BLOCK_PAGE: &str =
        "<html><body>Type the characters you see in this image</body></html>";

    fn service(
        fetcher: &MockFetcher,
        extractor: &MockExtractor,
    ) -> PriceService<MockFetcher, MockExtractor> {
        PriceService::new(fetcher.clone(), extractor.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_first_attempt() {
        let fetcher = MockFetcher::new(PRODUCT_PAGE);
        let extractor = MockExtractor::new(799.99);

        let (result, attempts) = service(&fetcher, &extractor)
            .fetch_price_with_attempts(URL)
            .await;

        assert_eq!(result.unwrap().price.value(), 799.99);
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].delay_before, Duration::ZERO);
        assert_eq!(
            attempts[0].outcome,
            AttemptOutcome::Success(PRODUCT_PAGE.len())
        );
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn three_timeouts_exhaust_network_budget() {
        let fetcher = MockFetcher::with_responses(vec![
            Err(AppError::Timeout(20)),
            Err(AppError::Timeout(20)),
            Err(AppError::Timeout(20)),
        ]);
        let extractor = MockExtractor::new(799.99);

        let (result, attempts) = service(&fetcher, &extractor)
            .fetch_price_with_attempts(URL)
            .await;

        assert!(matches!(
            result,
            Err(AppError::NetworkExhausted { attempts: 3, .. })
        ));
        assert_eq!(extractor.call_count(), 0);
        assert_eq!(fetcher.call_count(), 3);
        assert!(attempts.iter().all(|a| a.outcome == AttemptOutcome::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_then_success() {
        let fetcher = MockFetcher::with_responses(vec![
            Err(AppError::NetworkError("connection reset".into())),
            Ok(PRODUCT_PAGE.to_string()),
        ]);
        let extractor = MockExtractor::new(799.99);

        let start = Instant::now();
        let (result, attempts) = service(&fetcher, &extractor)
            .fetch_price_with_attempts(URL)
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.len(), 2);
        let backoff = attempts[1].delay_before;
        assert!(backoff >= Duration::from_secs(3) && backoff <= Duration::from_secs(4));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn http_status_is_recorded_and_retried() {
        let fetcher = MockFetcher::with_responses(vec![
            Err(AppError::HttpStatus {
                status: 503,
                url: URL.into(),
            }),
            Ok(PRODUCT_PAGE.to_string()),
        ]);
        let extractor = MockExtractor::new(799.99);

        let (result, attempts) = service(&fetcher, &extractor)
            .fetch_price_with_attempts(URL)
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts[0].outcome, AttemptOutcome::HttpError(503));
    }

    #[tokio::test(start_paused = true)]
    async fn block_page_triggers_cooldown_then_retry() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok(BLOCK_PAGE.to_string()),
            Ok(PRODUCT_PAGE.to_string()),
        ]);
        let extractor = MockExtractor::new(799.99);

        let start = Instant::now();
        let (result, attempts) = service(&fetcher, &extractor)
            .fetch_price_with_attempts(URL)
            .await;

        assert_eq!(result.unwrap().price.value(), 799.99);
        assert!(matches!(attempts[0].outcome, AttemptOutcome::BotDetected(_)));
        // 10-20s cool-down plus 3-4s backoff
        assert!(attempts[1].delay_before >= Duration::from_secs(13));
        assert!(start.elapsed() >= Duration::from_secs(13));
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn all_blocked_is_blocked_exhausted() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok(BLOCK_PAGE.to_string()),
            Ok(BLOCK_PAGE.to_string()),
            Ok(BLOCK_PAGE.to_string()),
        ]);
        let extractor = MockExtractor::new(799.99);

        let result = service(&fetcher, &extractor).fetch_price(URL).await;

        assert!(matches!(
            result,
            Err(AppError::BlockedExhausted { attempts: 3 })
        ));
        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_cooldown_after_last_blocked_attempt() {
        let fetcher = MockFetcher::with_responses(vec![Ok(BLOCK_PAGE.to_string())]);
        let extractor = MockExtractor::empty();
        let svc = PriceService::with_retry(
            fetcher,
            extractor,
            RetryConfig::default().with_max_retries(1),
        );

        let start = Instant::now();
        let result = svc.fetch_price(URL).await;

        assert!(matches!(
            result,
            Err(AppError::BlockedExhausted { attempts: 1 })
        ));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_price_is_retried_then_reported() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok(PRODUCT_PAGE.to_string()),
            Ok(PRODUCT_PAGE.to_string()),
            Ok(PRODUCT_PAGE.to_string()),
        ]);
        let extractor = MockExtractor::empty();

        let result = service(&fetcher, &extractor).fetch_price(URL).await;

        assert!(matches!(result, Err(AppError::NoPriceFound { .. })));
        assert_eq!(extractor.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_follows_last_attempt() {
        let fetcher = MockFetcher::with_responses(vec![
            Ok(BLOCK_PAGE.to_string()),
            Ok(PRODUCT_PAGE.to_string()),
            Err(AppError::Timeout(20)),
        ]);
        let extractor = MockExtractor::empty();

        let result = service(&fetcher, &extractor).fetch_price(URL).await;

        assert!(matches!(
            result,
            Err(AppError::NetworkExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let fetcher = MockFetcher::with_error(AppError::InvalidUrl("ftp://example.com".into()));
        let extractor = MockExtractor::new(1.0);

        let result = service(&fetcher, &extractor).fetch_price("ftp://example.com").await;

        assert!(matches!(result, Err(AppError::InvalidUrl(_))));
        assert_eq!(fetcher.call_count(), 1);
    }
}
