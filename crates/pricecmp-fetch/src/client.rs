//! HTTP client shared by every chain in a run.
//!
//! One [`PriceClient`] is built by the caller and handed down through the
//! coordinator, so connection pooling and identity headers are owned by the
//! run instead of by process globals.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::error::FetchError;
use crate::retry::{retry_with_jitter, RetryPolicy};

/// Bytes of one fetched file together with how they were obtained.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// Requests issued, across the primary URL and any alternates.
    pub attempts: u32,
    /// URL that finally answered.
    pub url: String,
}

pub struct PriceClient {
    client: Client,
    policy: RetryPolicy,
}

impl PriceClient {
    /// Creates a client with the given timeout, `User-Agent` and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unreachable`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, policy })
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GETs `url` as text, retrying transient failures.
    ///
    /// # Errors
    ///
    /// [`FetchError::Exhausted`] once retries run out, or the first
    /// non-retriable error.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let attempted = retry_with_jitter(&self.policy, url, || async move {
            let response = self.send_checked(self.client.get(url), url).await?;
            Ok(response.text().await?)
        })
        .await?;
        Ok(attempted.value)
    }

    /// POSTs `form` as `application/x-www-form-urlencoded` and returns the
    /// body as text, retrying transient failures.
    ///
    /// # Errors
    ///
    /// [`FetchError::Exhausted`] once retries run out, or the first
    /// non-retriable error.
    pub async fn post_form_text(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let attempted = retry_with_jitter(&self.policy, url, || async move {
            let request = self.client.post(url).form(form);
            let response = self.send_checked(request, url).await?;
            Ok(response.text().await?)
        })
        .await?;
        Ok(attempted.value)
    }

    /// Downloads one file.
    ///
    /// Transient failures are retried with jittered delays. A bot-block
    /// response stops the retry loop and walks the policy's alternate URLs
    /// once each, presenting the fallback browser identity.
    ///
    /// # Errors
    ///
    /// - [`FetchError::BotBlocked`] when the primary URL and every alternate
    ///   were refused or failed.
    /// - [`FetchError::Exhausted`] when transient failures outlast the policy.
    /// - Any non-retriable error from the primary URL.
    pub async fn fetch_file(&self, url: &str) -> Result<Fetched, FetchError> {
        let primary = retry_with_jitter(&self.policy, url, || async move {
            self.get_bytes(self.client.get(url), url).await
        })
        .await;

        let blocked_after = match primary {
            Ok(attempted) => {
                return Ok(Fetched {
                    bytes: attempted.value,
                    attempts: attempted.attempts,
                    url: url.to_string(),
                });
            }
            Err(FetchError::BotBlocked { .. }) => 1u32,
            Err(err) => return Err(err),
        };

        let alternates = self.policy.alternate_urls(url);
        tracing::warn!(
            url,
            alternates = alternates.len(),
            "bot-blocked; trying alternate URLs"
        );

        let mut attempts = blocked_after;
        for alternate in alternates {
            attempts += 1;
            let request = self
                .client
                .get(&alternate)
                .header(reqwest::header::USER_AGENT, &self.policy.fallback_user_agent)
                .header(
                    reqwest::header::ACCEPT,
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                );
            match self.get_bytes(request, &alternate).await {
                Ok(bytes) => {
                    tracing::info!(url, alternate, attempts, "alternate URL succeeded");
                    return Ok(Fetched {
                        bytes,
                        attempts,
                        url: alternate,
                    });
                }
                Err(err) => {
                    tracing::debug!(alternate, error = %err, "alternate URL failed");
                }
            }
        }

        Err(FetchError::BotBlocked {
            url: url.to_string(),
        })
    }

    async fn get_bytes(&self, request: RequestBuilder, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.send_checked(request, url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Sends `request` and maps non-2xx statuses onto typed errors.
    async fn send_checked(&self, request: RequestBuilder, url: &str) -> Result<Response, FetchError> {
        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == self.policy.bot_block_status {
            return Err(FetchError::BotBlocked {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}
