//! Failure alerting over a configurable webhook channel.
//!
//! Delivery problems are logged and swallowed; an alert failure must never
//! take down the pass that produced it. Deliveries are throttled so a
//! flapping rule cannot turn into an alert storm.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::domain::models::{AlertConfig, RunSummary};

pub struct AlertNotifier {
    client: reqwest::Client,
    webhook_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl AlertNotifier {
    /// Build a notifier from config; `None` when no webhook is configured.
    pub fn from_config(config: &AlertConfig) -> Option<Self> {
        let webhook_url = config.webhook_url.clone()?;
        let per_minute =
            NonZeroU32::new(config.max_alerts_per_minute).unwrap_or(NonZeroU32::MIN);
        Some(Self {
            client: reqwest::Client::new(),
            webhook_url,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    pub fn with_url(webhook_url: impl Into<String>, max_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(max_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    /// Notify the channel about a pass with failed actions.
    pub async fn notify_failures(&self, summary: &RunSummary) {
        if self.limiter.check().is_err() {
            tracing::debug!("Alert throttled; skipping webhook delivery");
            return;
        }

        let payload = serde_json::json!({
            "source": "adwatch",
            "kind": "pass_failures",
            "triggered": summary.triggered,
            "succeeded": summary.succeeded,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "failures": summary.failures,
        });

        match self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!(failed = summary.failed, "Delivered failure alert");
            }
            Ok(response) => {
                tracing::warn!(
                    status = %response.status(),
                    "Alert webhook rejected delivery"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Alert webhook delivery failed");
            }
        }
    }
}

impl std::fmt::Debug for AlertNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertNotifier")
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_webhook_url() {
        assert!(AlertNotifier::from_config(&AlertConfig::default()).is_none());

        let config = AlertConfig {
            webhook_url: Some("http://localhost:9/hook".to_string()),
            max_alerts_per_minute: 6,
        };
        assert!(AlertNotifier::from_config(&config).is_some());
    }

    #[tokio::test]
    async fn unreachable_webhook_is_swallowed() {
        // Port 9 (discard) refuses connections; delivery must not panic or
        // propagate the error.
        let notifier = AlertNotifier::with_url("http://127.0.0.1:9/hook", 6);
        let summary = RunSummary {
            triggered: 1,
            failed: 1,
            ..RunSummary::default()
        };
        notifier.notify_failures(&summary).await;
    }
}
