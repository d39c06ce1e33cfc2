use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{CheckOutcome, CycleReport, PriceAlert, Product};
use crate::service::PriceService;
use crate::traits::{Fetcher, HistoryStore, Notifier, PriceExtractor};

/// Timing knobs for the tracker loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    /// Mean pause between two products of the same cycle.
    pub check_interval: Duration,
    /// Pause between cycles in continuous mode.
    pub cycle_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            cycle_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl TrackerSettings {
    /// Pause between products for a sample in `[0.5, 1.5]`.
    pub fn pacing_delay(&self, factor: f64) -> Duration {
        self.check_interval.mul_f64(factor.clamp(0.5, 1.5))
    }

    fn draw_pacing<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.pacing_delay(rng.gen_range(0.5..=1.5))
    }
}

/// Checks a list of products, records prices and sends alerts.
pub struct Tracker<F, E, S, N>
where
    F: Fetcher,
    E: PriceExtractor,
    S: HistoryStore,
    N: Notifier,
{
    service: PriceService<F, E>,
    store: S,
    notifier: N,
    settings: TrackerSettings,
}

impl<F, E, S, N> Tracker<F, E, S, N>
where
    F: Fetcher,
    E: PriceExtractor,
    S: HistoryStore,
    N: Notifier,
{
    pub fn new(
        service: PriceService<F, E>,
        store: S,
        notifier: N,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            service,
            store,
            notifier,
            settings,
        }
    }

    /// Check every product once, in order, pacing between them.
    ///
    /// A failing product is reported and skipped. Storage and notification
    /// errors are logged and never end the cycle early.
    pub async fn run_cycle(&self, products: &[Product]) -> CycleReport {
        tracing::info!(products = products.len(), "Starting price check cycle");
        let mut report = CycleReport::default();

        for (i, product) in products.iter().enumerate() {
            if i > 0 {
                let pause = self.settings.draw_pacing(&mut rand::thread_rng());
                tracing::debug!(
                    delay_secs = format_args!("{:.1}", pause.as_secs_f64()),
                    "Pausing before next product"
                );
                tokio::time::sleep(pause).await;
            }
            let outcome = self.check_product(product).await;
            report.outcomes.push((product.name.clone(), outcome));
        }

        tracing::info!(
            checked = report.outcomes.len(),
            alerts = report.alerts(),
            failures = report.failures(),
            "Price check cycle complete"
        );
        report
    }

    /// Run cycles every `cycle_interval` until cancellation.
    pub async fn run(
        &self,
        products: &[Product],
        cancel_token: CancellationToken,
    ) -> Result<(), AppError> {
        tracing::info!(
            interval_mins = self.settings.cycle_interval.as_secs() / 60,
            "Continuous tracking started"
        );

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = self.run_cycle(products) => {}
                () = cancel_token.cancelled() => break,
            }

            tokio::select! {
                () = tokio::time::sleep(self.settings.cycle_interval) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        tracing::info!("Continuous tracking stopped");
        Ok(())
    }

    async fn check_product(&self, product: &Product) -> CheckOutcome {
        tracing::info!(product = %product.name, "Checking price");

        let found = match self.service.fetch_price(&product.url).await {
            Ok(found) => found,
            Err(e) => {
                if e.is_price_failure() {
                    tracing::warn!(product = %product.name, error = %e, "Skipping product this cycle");
                } else {
                    tracing::error!(product = %product.name, error = %e, "Failed to get price");
                }
                return CheckOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };
        let price = found.price.value();

        let recorded = match self.store.record(&product.name, found.price).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(product = %product.name, error = %e, "Failed to record price");
                false
            }
        };

        if price > product.target_price {
            tracing::info!(
                product = %product.name,
                price = %found.price,
                target = format_args!("${:.2}", product.target_price),
                "Price above target"
            );
            return CheckOutcome::AboveTarget { price };
        }

        let alert = PriceAlert {
            product: product.name.clone(),
            url: product.url.clone(),
            current: price,
            target: product.target_price,
            previous: self.previous_price(&product.name, recorded).await,
        };
        tracing::info!(product = %product.name, price = %found.price, "Target price reached");

        match self.notifier.notify(&alert).await {
            Ok(()) => tracing::info!(product = %product.name, "Alert sent"),
            Err(e) => {
                tracing::error!(product = %product.name, error = %e, "Failed to send alert")
            }
        }
        CheckOutcome::Alerted { price }
    }

    /// The observation before the current one.
    async fn previous_price(&self, product: &str, recorded: bool) -> Option<f64> {
        let skip = usize::from(recorded);
        match self.store.history(product, skip + 1).await {
            Ok(entries) => entries.get(skip).map(|e| e.price),
            Err(e) => {
                tracing::warn!(%product, error = %e, "Failed to read price history");
                None
            }
        }
    }
}
