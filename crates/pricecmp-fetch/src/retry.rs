//! Bounded retry with jittered delays, plus the alternate-URL fallback used
//! when a server rejects us as a bot.
//!
//! [`retry_with_jitter`] retries transient failures (network errors, 429,
//! 5xx). A bot-block response is not transient: it is returned immediately so
//! the caller can switch to [`RetryPolicy::alternate_urls`] with a different
//! client identity instead of hammering the same URL.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

pub(crate) const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Longest delay between two attempts, whatever the base.
const MAX_DELAY_MS: u64 = 60_000;

/// Substitutes one path fragment for another to build an alternate URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

impl PathRewrite {
    #[must_use]
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn apply(&self, url: &str) -> Option<String> {
        url.contains(&self.from)
            .then(|| url.replacen(&self.from, &self.to, 1))
            .filter(|rewritten| rewritten != url)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per URL, including the first one.
    pub max_attempts: u32,
    /// Width of each delay window. Retry `n` sleeps a random duration in
    /// `[n * base, (n + 1) * base)`.
    pub delay_base_ms: u64,
    /// Non-standard status a server answers with when it blocks automation.
    pub bot_block_status: u16,
    pub alternate_rewrites: Vec<PathRewrite>,
    pub fallback_user_agent: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_base_ms: 1_000,
            bot_block_status: 418,
            alternate_rewrites: vec![
                PathRewrite::new("/file/d/", "/file/"),
                PathRewrite::new("/Download/", "/download/"),
            ],
            fallback_user_agent: BROWSER_FALLBACK_UA.to_string(),
        }
    }
}

impl RetryPolicy {
    /// Alternate URLs for `url`, in rewrite order, without duplicates.
    #[must_use]
    pub fn alternate_urls(&self, url: &str) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for rewrite in &self.alternate_rewrites {
            if let Some(alt) = rewrite.apply(url) {
                if !urls.contains(&alt) {
                    urls.push(alt);
                }
            }
        }
        urls
    }

    /// Delay before retry number `retry` (1-based).
    pub(crate) fn jittered_delay(&self, retry: u32) -> Duration {
        if self.delay_base_ms == 0 {
            return Duration::ZERO;
        }
        let floor = self.delay_base_ms.saturating_mul(u64::from(retry));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jitter = (self.delay_base_ms as f64 * rand::random::<f64>()) as u64;
        Duration::from_millis(floor.saturating_add(jitter).min(MAX_DELAY_MS))
    }
}

/// Returns `true` for errors worth another attempt after a delay.
///
/// **Retriable:** transport failures, HTTP 429 and 5xx.
///
/// **Not retriable:** bot blocks (handled by the fallback path), other 4xx,
/// malformed bodies, extraction and filesystem errors.
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Unreachable(_) => true,
        FetchError::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Value produced by [`retry_with_jitter`] together with the number of
/// attempts it took.
#[derive(Debug)]
pub(crate) struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Runs `operation` up to `policy.max_attempts` times.
///
/// Non-retriable errors are returned as-is after the attempt that produced
/// them. Once the attempts are used up the last error is wrapped in
/// [`FetchError::Exhausted`].
pub(crate) async fn retry_with_jitter<T, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut operation: F,
) -> Result<Attempted<T>, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(Attempted { value, attempts }),
            Err(err) if !is_retriable(&err) => return Err(err),
            Err(err) if attempts >= max_attempts => {
                return Err(FetchError::Exhausted {
                    context: context.to_string(),
                    attempts,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                let delay = policy.jittered_delay(attempts);
                tracing::warn!(
                    context,
                    attempt = attempts,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient fetch error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
