//! Remote document store access
//!
//! [`RemoteStore`] is the seam between the sync engine and the remote API:
//! every component takes a store handle instead of reaching for a shared
//! client, so tests substitute doubles. [`ApiClient`] is the HTTP
//! implementation; [`Retrying`] wraps any store with the configured
//! retry/backoff policy.

mod client;
mod retry;

pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use retry::Retrying;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Block, RemotePage};

/// Operations the sync engine needs from the remote document store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a page snapshot with its direct block children
    async fn get_page(&self, id: &str) -> Result<RemotePage>;

    /// Replace a page's block children with a new set
    async fn replace_children(&self, id: &str, blocks: &[Block]) -> Result<()>;
}
