// SPDX-FileCopyrightText: 2026 Painel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the CRM proxy endpoint.
//!
//! Provides [`ProxyClient`], the sole [`RecordSource`] implementation: every
//! remote call is a POST of `{method, params}` to one proxy URL, paced by a
//! process-wide [`RateLimiter`].

use std::time::Duration;

use async_trait::async_trait;
use painel_config::CrmConfig;
use painel_core::{CallResponse, PainelError, RecordSource};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Cooperative minimum-interval limiter shared by all remote calls.
///
/// Callers queue on the internal mutex, which is held across the pacing
/// sleep so back-to-back dispatches are serialized. The last-dispatch stamp
/// is taken when the call is released, not when its response arrives, so
/// the interval measures dispatch-to-dispatch time.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Waits until at least `min_interval` has passed since the previous
    /// dispatch, then records the current instant as the new dispatch time.
    pub async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// HTTP client for the CRM proxy.
///
/// The proxy forwards `{method, params}` bodies to the CRM and passes its
/// JSON responses back verbatim, including `{error, error_description}`
/// payloads, which this client surfaces as [`PainelError::Remote`].
#[derive(Debug)]
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    limiter: RateLimiter,
}

impl ProxyClient {
    /// Builds a client from the CRM section of the configuration.
    pub fn from_config(config: &CrmConfig) -> Result<Self, PainelError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PainelError::Remote {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.proxy_url.clone(),
            timeout,
            limiter: RateLimiter::new(Duration::from_millis(config.rate_limit_ms)),
        })
    }

    /// Overrides the proxy URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl RecordSource for ProxyClient {
    async fn call(&self, method: &str, params: Value) -> Result<CallResponse, PainelError> {
        self.limiter.acquire().await;
        debug!(method, "dispatching CRM call");

        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({ "method": method, "params": params }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PainelError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    PainelError::Remote {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| PainelError::Remote {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        // The proxy forwards CRM error payloads with a non-2xx status; the
        // payload is the more diagnostic of the two, so check it first.
        if let Some(error) = body.get("error") {
            let code = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            let description = body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(PainelError::remote(format!(
                "{method} failed: {code}: {description}"
            )));
        }
        if !status.is_success() {
            return Err(PainelError::remote(format!("{method} returned {status}")));
        }

        serde_json::from_value(body).map_err(|e| PainelError::Remote {
            message: format!("malformed {method} response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}
