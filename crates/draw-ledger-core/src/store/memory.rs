//! In-memory [`RecordStore`] implementation for testing.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so range scans come back
//! ordered without an explicit sort.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::DrawRecord;

use super::RecordStore;

/// In-memory store, used by the engine tests.
pub struct InMemoryStore {
    draws: RwLock<BTreeMap<u32, DrawRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            draws: RwLock::new(BTreeMap::new()),
        }
    }

    /// Builds a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = DrawRecord>) -> Self {
        let draws = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            draws: RwLock::new(draws),
        }
    }

    pub fn len(&self) -> usize {
        self.draws.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored ids, ascending.
    pub fn ids(&self) -> Vec<u32> {
        self.draws
            .read()
            .map(|d| d.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn find_in_range(&self, start: u32, end: u32) -> Result<Vec<DrawRecord>> {
        if start > end {
            return Ok(Vec::new());
        }
        let draws = self.draws.read().map_err(|_| anyhow!("draw map poisoned"))?;
        Ok(draws.range(start..=end).map(|(_, r)| r.clone()).collect())
    }

    async fn find_max_id(&self) -> Result<Option<u32>> {
        let draws = self.draws.read().map_err(|_| anyhow!("draw map poisoned"))?;
        Ok(draws.keys().next_back().copied())
    }

    async fn upsert_if_absent(&self, record: &DrawRecord) -> Result<bool> {
        let mut draws = self.draws.write().map_err(|_| anyhow!("draw map poisoned"))?;
        if draws.contains_key(&record.id) {
            return Ok(false);
        }
        draws.insert(record.id, record.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: u32) -> DrawRecord {
        DrawRecord {
            id,
            draw_date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            winning_numbers: [1, 2, 3, 4, 5, 6],
            bonus_number: 7,
            first_tier_prize_amount: 0,
            first_tier_winner_count: 0,
            total_sales_amount: 0,
            source_status: "success".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_if_absent_is_idempotent() {
        let store = InMemoryStore::new();
        assert!(store.upsert_if_absent(&record(10)).await.unwrap());

        let mut changed = record(10);
        changed.bonus_number = 44;
        assert!(!store.upsert_if_absent(&changed).await.unwrap());

        let stored = store.find_in_range(10, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].bonus_number, 7, "existing record must not be overwritten");
    }

    #[tokio::test]
    async fn test_find_in_range_ascending() {
        let store = InMemoryStore::with_records([record(5), record(2), record(9), record(4)]);
        let ids: Vec<u32> = store
            .find_in_range(3, 9)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![4, 5, 9]);
        assert!(store.find_in_range(9, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_max_id() {
        let store = InMemoryStore::new();
        assert_eq!(store.find_max_id().await.unwrap(), None);
        store.upsert_if_absent(&record(3)).await.unwrap();
        store.upsert_if_absent(&record(12)).await.unwrap();
        assert_eq!(store.find_max_id().await.unwrap(), Some(12));
    }
}
