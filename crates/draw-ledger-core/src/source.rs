//! Abstraction over the external draw provider.
//!
//! A [`DrawSource`] performs exactly one request per call. Retrying,
//! backoff, and fallbacks are layered on top by the application crate, so
//! implementations stay thin and test doubles stay scriptable.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SourceDraw;

#[async_trait]
pub trait DrawSource: Send + Sync {
    /// Fetches the payload for one round.
    ///
    /// Transport errors, timeouts, and payloads whose status marker is not
    /// a success all surface as `Err`.
    async fn fetch_draw(&self, id: u32) -> Result<SourceDraw>;

    /// Reads the provider's current latest round.
    async fn probe_latest(&self) -> Result<u32>;
}
