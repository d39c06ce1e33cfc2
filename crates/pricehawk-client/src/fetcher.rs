use std::time::Duration;

use pricehawk_core::error::AppError;
use pricehawk_core::retry::DEFAULT_REQUEST_TIMEOUT;
use pricehawk_core::traits::Fetcher;
use reqwest::Client;
use reqwest::redirect::Policy;
use url::Url;

use crate::identity::{IdentityPool, draw_identity};

const MAX_REDIRECTS: usize = 10;

/// HTTP fetcher using reqwest.
///
/// Each call is a single GET with a freshly drawn browser identity. Redirects
/// are followed (up to 10) and any non-2xx final status is an error; retrying
/// is left to the caller.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    identities: IdentityPool,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            identities: IdentityPool::default(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Replace the identity pool used for request headers.
    pub fn with_identities(mut self, identities: IdentityPool) -> Self {
        self.identities = identities;
        self
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        validate_url(url)?;

        let headers = draw_identity(&self.identities, &mut rand::thread_rng(), url);
        tracing::debug!(
            %url,
            user_agent = ?headers.get(reqwest::header::USER_AGENT),
            "Sending request"
        );

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else if e.is_redirect() {
                    AppError::NetworkError(format!("Too many redirects: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })
    }
}

/// Only absolute `http`/`https` URLs with a host can be fetched.
fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(AppError::InvalidUrl(format!("{url}: URL has no host")));
    }
    Ok(())
}
