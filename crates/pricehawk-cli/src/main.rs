use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pricehawk_client::{LogNotifier, ReqwestFetcher, SelectorExtractor, SendGridNotifier};
use pricehawk_core::config::{DEFAULT_CONFIG_FILE, RunMode, TrackerConfig};
use pricehawk_core::models::{AttemptOutcome, CheckOutcome, CycleReport};
use pricehawk_core::retry::RetryConfig;
use pricehawk_core::service::PriceService;
use pricehawk_core::tracker::Tracker;
use pricehawk_core::traits::{HistoryStore, Notifier};
use pricehawk_store::JsonHistoryStore;

#[derive(Parser)]
#[command(name = "pricehawk", version, about = "Track product prices and get alerted on drops")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every configured product and alert on target prices
    Check {
        /// Path to the TOML config file
        #[arg(short, long, env = "PRICEHAWK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Keep checking every `interval_minutes` until Ctrl-C
        #[arg(long, default_value_t = false)]
        continuous: bool,

        /// Log alerts instead of sending e-mail
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Look up the current price of a single product page
    Price {
        /// Product page URL
        #[arg(short, long)]
        url: String,

        /// Fetch attempts before giving up
        #[arg(short, long, default_value_t = 3)]
        max_retries: u32,
    },

    /// Show recorded prices for a product, newest first
    History {
        /// Product name as written in the config
        #[arg(short, long)]
        product: String,

        /// Number of entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Path to the TOML config file
        #[arg(short, long, env = "PRICEHAWK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricehawk=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            config,
            continuous,
            dry_run,
        } => {
            let config = load_config(&config)?;
            cmd_check(&config, continuous, dry_run).await?;
        }
        Commands::Price { url, max_retries } => {
            cmd_price(&url, max_retries).await?;
        }
        Commands::History {
            product,
            limit,
            config,
        } => {
            let config = load_config(&config)?;
            cmd_history(&config, &product, limit).await?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<TrackerConfig> {
    TrackerConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn price_service(retry: RetryConfig) -> Result<PriceService<ReqwestFetcher, SelectorExtractor>> {
    let fetcher = ReqwestFetcher::with_timeout(retry.request_timeout)
        .context("Failed to create HTTP client")?;
    Ok(PriceService::with_retry(fetcher, SelectorExtractor::new(), retry))
}

async fn cmd_check(config: &TrackerConfig, continuous: bool, dry_run: bool) -> Result<()> {
    let service = price_service(config.retry_config())?;
    let store =
        JsonHistoryStore::open(&config.tracking.history_file, config.tracking.history_limit).await;
    tracing::info!(path = %store.path().display(), "Using price history");
    let continuous = continuous || config.tracking.run_mode == RunMode::Continuous;
    let settings = config.tracker_settings();

    if dry_run {
        let tracker = Tracker::new(service, store, LogNotifier, settings);
        return run_tracker(config, tracker, continuous).await;
    }

    let api_key = config.email.api_key().with_context(|| {
        format!(
            "No SendGrid API key: set [email] api_key or {}",
            pricehawk_core::config::API_KEY_ENV
        )
    })?;
    let notifier = SendGridNotifier::new(&api_key, &config.email.sender, &config.email.recipient)
        .context("Failed to create e-mail notifier")?;
    let tracker = Tracker::new(service, store, notifier, settings);
    run_tracker(config, tracker, continuous).await
}

async fn run_tracker<S, N>(
    config: &TrackerConfig,
    tracker: Tracker<ReqwestFetcher, SelectorExtractor, S, N>,
    continuous: bool,
) -> Result<()>
where
    S: HistoryStore,
    N: Notifier,
{
    if !continuous {
        let report = tracker.run_cycle(&config.products).await;
        print_report(&report);
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    tracker.run(&config.products, cancel_token).await?;
    Ok(())
}

fn print_report(report: &CycleReport) {
    for (product, outcome) in &report.outcomes {
        match outcome {
            CheckOutcome::Alerted { price } => println!("  [ALERT] {product}: ${price:.2}"),
            CheckOutcome::AboveTarget { price } => println!("  [ok]    {product}: ${price:.2}"),
            CheckOutcome::Failed { reason } => println!("  [FAIL]  {product}: {reason}"),
        }
    }
    println!(
        "\nChecked {} products: {} alerts, {} failures",
        report.outcomes.len(),
        report.alerts(),
        report.failures()
    );
}

async fn cmd_price(url: &str, max_retries: u32) -> Result<()> {
    let service = price_service(RetryConfig::default().with_max_retries(max_retries))?;

    tracing::info!("Fetching price for {}", url);
    let (result, attempts) = service.fetch_price_with_attempts(url).await;

    for attempt in &attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Success(bytes) => format!("fetched {bytes} bytes"),
            AttemptOutcome::Timeout => "timed out".to_string(),
            AttemptOutcome::NetworkError(e) => format!("network error: {e}"),
            AttemptOutcome::BotDetected(indicator) => format!("blocked ({indicator})"),
            AttemptOutcome::HttpError(status) => format!("HTTP {status}"),
        };
        tracing::info!(
            attempt = attempt.attempt_number,
            waited_secs = format_args!("{:.1}", attempt.delay_before.as_secs_f64()),
            "{outcome}"
        );
    }

    let found = result.with_context(|| format!("No price for {url}"))?;
    println!("{}", found.price);
    tracing::info!(selector = %found.source_pattern, raw = %found.raw_text, "Price found");
    Ok(())
}

async fn cmd_history(config: &TrackerConfig, product: &str, limit: usize) -> Result<()> {
    if config.product(product).is_none() {
        tracing::warn!(%product, "Product is not in the config");
    }

    let store =
        JsonHistoryStore::open(&config.tracking.history_file, config.tracking.history_limit).await;
    let entries = store.history(product, limit).await?;

    if entries.is_empty() {
        bail!("No price history for {product}");
    }

    println!("Price history for {product}:\n");
    for entry in &entries {
        println!(
            "  {}  ${:.2}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.price
        );
    }
    println!("\nTotal: {} entries", entries.len());

    Ok(())
}
