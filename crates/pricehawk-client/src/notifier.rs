use std::time::Duration;

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use pricehawk_core::error::AppError;
use pricehawk_core::models::PriceAlert;
use pricehawk_core::traits::Notifier;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";
const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends price alerts as e-mail through the SendGrid v3 mail API.
#[derive(Clone)]
pub struct SendGridNotifier {
    client: Client,
    base_url: String,
    api_key: String,
    sender: String,
    recipient: String,
    timeout_secs: u64,
}

impl SendGridNotifier {
    pub fn new(api_key: &str, sender: &str, recipient: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, sender, recipient, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: &str,
        sender: &str,
        recipient: &str,
        base_url: &str,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("SendGrid API key is empty".into()));
        }
        let client = Client::builder()
            .timeout(DEFAULT_NOTIFY_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            timeout_secs: DEFAULT_NOTIFY_TIMEOUT.as_secs(),
        })
    }

    fn message(&self, alert: &PriceAlert, sent_at: DateTime<Utc>) -> MailRequest {
        MailRequest {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: self.recipient.clone(),
                }],
            }],
            from: Address {
                email: self.sender.clone(),
            },
            subject: alert.subject(),
            content: vec![
                Content {
                    content_type: "text/plain".into(),
                    value: render_text(alert, sent_at),
                },
                Content {
                    content_type: "text/html".into(),
                    value: render_html(alert, sent_at),
                },
            ],
        }
    }
}

// ---- SendGrid API types ----

#[derive(Serialize)]
struct MailRequest {
    personalizations: Vec<Personalization>,
    from: Address,
    subject: String,
    content: Vec<Content>,
}

#[derive(Serialize)]
struct Personalization {
    to: Vec<Address>,
}

#[derive(Serialize)]
struct Address {
    email: String,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Deserialize)]
struct ApiErrors {
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl Notifier for SendGridNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<(), AppError> {
        let url = format!("{}/v3/mail/send", self.base_url);
        let request = self.message(alert, Utc::now());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrors>(&body)
                .ok()
                .and_then(|e| e.errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status_code}: {body}"));
            return Err(AppError::NotifyError(message));
        }

        tracing::debug!(product = %alert.product, status = status.as_u16(), "SendGrid accepted alert");
        Ok(())
    }
}

/// Notifier that only logs alerts. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, alert: &PriceAlert) -> Result<(), AppError> {
        tracing::info!(
            product = %alert.product,
            url = %alert.url,
            subject = %alert.subject(),
            "Alert not sent (dry run)"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn savings_line(alert: &PriceAlert) -> Option<String> {
    let previous = alert.previous?;
    let (amount, percent) = alert.savings()?;
    Some(format!(
        "You save ${amount:.2} ({percent:.1}%) from the previous price of ${previous:.2}"
    ))
}

/// Plain-text alert body.
pub fn render_text(alert: &PriceAlert, sent_at: DateTime<Utc>) -> String {
    let mut body = format!(
        "Price Alert: {}\n\nCurrent Price: ${:.2}\nTarget Price: ${:.2}\n",
        alert.product, alert.current, alert.target
    );
    if let Some(line) = savings_line(alert) {
        body.push_str(&line);
        body.push('\n');
    }
    body.push_str(&format!(
        "\nBuy now: {}\n\nSent by pricehawk at {}",
        alert.url,
        sent_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body
}

/// HTML alert body.
pub fn render_html(alert: &PriceAlert, sent_at: DateTime<Utc>) -> String {
    let savings = savings_line(alert)
        .map(|line| format!("<p><strong>{}</strong></p>", encode_text(&line)))
        .unwrap_or_default();

    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; line-height: 1.5; max-width: 600px; margin: 0 auto;">
    <h2>Price Alert!</h2>
    <h3>{product}</h3>
    <p style="font-size: 18px;">
      Current Price: <strong style="color: #28a745;">${current:.2}</strong><br>
      Target Price: <strong>${target:.2}</strong>
    </p>
    {savings}
    <p><a href="{url}">Buy now</a></p>
    <hr>
    <small>Sent by pricehawk at {sent_at}</small>
  </body>
</html>"#,
        product = encode_text(&alert.product),
        current = alert.current,
        target = alert.target,
        url = encode_double_quoted_attribute(&alert.url),
        sent_at = sent_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
