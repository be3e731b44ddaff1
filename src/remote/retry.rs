//! Retry/backoff decorator for remote stores
//!
//! A single wrapper owns the retry policy so call sites stay free of
//! duplicated retry loops. Only retryable errors (rate limits, transport
//! failures) are retried; auth and not-found errors surface immediately.

use std::time::Duration;

use async_trait::async_trait;

use super::RemoteStore;
use crate::error::{Result, SyncError};
use crate::types::{Block, RemotePage, SyncConfig};

/// Wraps any [`RemoteStore`] with the configured retry policy
pub struct Retrying<S> {
    inner: S,
    max_retries: u32,
    retry_delay: Duration,
}

impl<S: RemoteStore> Retrying<S> {
    /// Wrap a store with the retry policy from `config`
    pub fn new(inner: S, config: &SyncConfig) -> Self {
        Self {
            inner,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    async fn run<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(&err, attempt);
                    tracing::warn!(
                        "Retryable error (attempt {}/{}), waiting {:?}: {}",
                        attempt,
                        self.max_retries,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Linear backoff; a rate limit's server-supplied delay wins when longer
    fn delay_for(&self, err: &SyncError, attempt: u32) -> Duration {
        let backoff = self.retry_delay * attempt;
        match err {
            SyncError::RateLimited(seconds) => backoff.max(Duration::from_secs(*seconds)),
            _ => backoff,
        }
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for Retrying<S> {
    async fn get_page(&self, id: &str) -> Result<RemotePage> {
        self.run(|| self.inner.get_page(id)).await
    }

    async fn replace_children(&self, id: &str, blocks: &[Block]) -> Result<()> {
        self.run(|| self.inner.replace_children(id, blocks)).await
    }
}
