//! Storage abstraction for Draw Ledger.
//!
//! The [`RecordStore`] trait is the whole persistence contract the engine
//! relies on, enabling pluggable backends (SQLite in the application crate,
//! in-memory here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DrawRecord;

/// Key-value-by-round store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_in_range`](RecordStore::find_in_range) | Records in `start..=end`, ascending by id |
/// | [`find_max_id`](RecordStore::find_max_id) | Highest stored round |
/// | [`upsert_if_absent`](RecordStore::upsert_if_absent) | Insert unless the round exists |
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns stored records with `start <= id <= end`, ascending by id.
    async fn find_in_range(&self, start: u32, end: u32) -> Result<Vec<DrawRecord>>;

    /// Returns the highest stored round, if any.
    async fn find_max_id(&self) -> Result<Option<u32>>;

    /// Inserts `record` unless its id is already stored.
    ///
    /// Returns `true` when a row was written. An existing id is a no-op
    /// (`Ok(false)`), including when two callers race on the same id.
    async fn upsert_if_absent(&self, record: &DrawRecord) -> Result<bool>;
}
