//! Backfill orchestration.
//!
//! Fetches missing rounds from the source and persists them, one round at a
//! time. The provider penalises bursts, so nothing here runs concurrently:
//! batches are processed in order, rounds inside a batch are processed in
//! order, and cooperative sleeps separate them.
//!
//! # Modes
//!
//! | Mode | Used by | Behaviour |
//! |------|---------|-----------|
//! | [`BackfillMode::Bounded`] | range queries | fetch at most `cap` rounds, defer the rest |
//! | [`BackfillMode::Unbounded`] | bulk loads | fetch everything, batch by batch |
//!
//! A round that cannot be fetched or normalized is reported as unresolved
//! and the run moves on. Only a store failure aborts a run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use draw_ledger_core::error::{LedgerError, LedgerResult};
use draw_ledger_core::gap::{detect_missing, partition};
use draw_ledger_core::models::{BackfillReport, DrawRecord, RoundRange};
use draw_ledger_core::retry::RetryPolicy;
use draw_ledger_core::store::RecordStore;

use crate::config::Config;
use crate::fetcher::Fetcher;

/// Whether a run caps the number of rounds it fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillMode {
    Bounded { cap: usize },
    Unbounded,
}

/// Pacing and retry settings for one run.
#[derive(Debug, Clone)]
pub struct BackfillPlan {
    pub batch_size: usize,
    /// Wait between consecutive rounds of a batch.
    pub item_delay: Duration,
    /// Wait between batches.
    pub batch_delay: Duration,
    pub retry: RetryPolicy,
    pub mode: BackfillMode,
}

impl BackfillPlan {
    /// Plan used while answering a range query.
    pub fn for_query(config: &Config) -> Self {
        let cap = config.backfill.query_fetch_cap;
        Self {
            batch_size: cap.max(1),
            item_delay: Duration::from_millis(config.backfill.item_delay_ms),
            batch_delay: Duration::from_millis(config.backfill.batch_delay_ms),
            retry: config.source.query_retry(),
            mode: BackfillMode::Bounded { cap },
        }
    }

    /// Plan used by bulk loads; `batch_size`/`batch_delay` come from the request.
    pub fn for_load(config: &Config, batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            item_delay: Duration::from_millis(config.backfill.item_delay_ms),
            batch_delay,
            retry: config.source.bulk_retry(),
            mode: BackfillMode::Unbounded,
        }
    }
}

/// Result of one run: the report plus every record it obtained.
#[derive(Debug, Clone, Default)]
pub struct BackfillOutcome {
    pub report: BackfillReport,
    /// Records fetched (and stored) by this run, ascending by id.
    pub records: Vec<DrawRecord>,
}

/// Sequential fetch-and-persist engine.
#[derive(Clone)]
pub struct Backfiller {
    store: Arc<dyn RecordStore>,
    fetcher: Fetcher,
}

impl Backfiller {
    /// Creates a backfiller writing into `store`.
    ///
    /// # Arguments
    ///
    /// - `store`: destination for fetched rounds. Existing rows are never
    ///   overwritten.
    /// - `fetcher`: retrying wrapper around the draw source. Its retry policy
    ///   is supplied per run through [`BackfillPlan::retry`].
    pub fn new(store: Arc<dyn RecordStore>, fetcher: Fetcher) -> Self {
        Self { store, fetcher }
    }

    /// Fetches and stores `missing_ids` according to `plan`.
    ///
    /// Per-round failures end up in the report. Only
    /// [`LedgerError::StoreUnavailable`] is returned as an error.
    pub async fn run(&self, missing_ids: &[u32], plan: &BackfillPlan) -> LedgerResult<BackfillOutcome> {
        let (to_fetch, deferred) = match plan.mode {
            BackfillMode::Bounded { cap } => missing_ids.split_at(cap.min(missing_ids.len())),
            BackfillMode::Unbounded => (missing_ids, &[][..]),
        };

        if !deferred.is_empty() {
            info!(
                fetching = to_fetch.len(),
                deferred = deferred.len(),
                "fetch cap reached, remaining rounds will be handled on a later request"
            );
        }

        let batches = partition(to_fetch, plan.batch_size);
        let mut records = Vec::with_capacity(to_fetch.len());
        let mut failed = Vec::new();

        for (batch_index, batch) in batches.iter().enumerate() {
            debug!(
                batch = batch_index + 1,
                batches = batches.len(),
                rounds = ?batch,
                "processing batch"
            );

            for (item_index, &id) in batch.iter().enumerate() {
                match self.fetch_and_store(id, &plan.retry).await {
                    Ok(record) => {
                        records.push(record);
                        info!(
                            round = id,
                            done = records.len(),
                            total = to_fetch.len(),
                            "round stored"
                        );
                    }
                    Err(e @ LedgerError::StoreUnavailable(_)) => return Err(e),
                    Err(e) => {
                        warn!(round = id, error = %e, "round left unresolved");
                        failed.push(id);
                    }
                }

                if item_index + 1 < batch.len() {
                    pause(plan.item_delay).await;
                }
            }

            if batch_index + 1 < batches.len() {
                debug!(delay_ms = plan.batch_delay.as_millis() as u64, "waiting before next batch");
                pause(plan.batch_delay).await;
            }
        }

        let mut unresolved_ids: Vec<u32> = failed.iter().chain(deferred).copied().collect();
        unresolved_ids.sort_unstable();
        records.sort_by_key(|r| r.id);

        Ok(BackfillOutcome {
            report: BackfillReport {
                success_count: records.len(),
                failure_count: failed.len(),
                unresolved_ids,
                deferred_count: deferred.len(),
            },
            records,
        })
    }

    /// Reads `range` from the store and backfills whatever is missing.
    pub async fn backfill_range(&self, range: RoundRange, plan: &BackfillPlan) -> LedgerResult<BackfillOutcome> {
        let existing = self
            .store
            .find_in_range(range.start, range.end)
            .await
            .map_err(LedgerError::store)?;
        let present: HashSet<u32> = existing.iter().map(|r| r.id).collect();
        let missing = detect_missing(range.start, range.end, &present);

        info!(
            start = range.start,
            end = range.end,
            present = existing.len(),
            missing = missing.len(),
            "backfill range scanned"
        );
        if missing.is_empty() {
            return Ok(BackfillOutcome::default());
        }
        self.run(&missing, plan).await
    }

    /// Runs [`backfill_range`](Self::backfill_range) as a detached task.
    ///
    /// The caller gets nothing back but the task handle: the run's only
    /// observable effect is later store state, and its errors are logged.
    pub fn spawn_range(&self, range: RoundRange, plan: BackfillPlan) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match this.backfill_range(range, &plan).await {
                Ok(outcome) => info!(
                    start = range.start,
                    end = range.end,
                    success = outcome.report.success_count,
                    failure = outcome.report.failure_count,
                    unresolved = ?outcome.report.unresolved_ids,
                    "background load finished"
                ),
                Err(e) => error!(
                    start = range.start,
                    end = range.end,
                    error = %e,
                    "background load aborted"
                ),
            }
        })
    }

    async fn fetch_and_store(&self, id: u32, retry: &RetryPolicy) -> LedgerResult<DrawRecord> {
        let record = self.fetcher.fetch_record(id, retry).await?.normalize()?;
        let inserted = self
            .store
            .upsert_if_absent(&record)
            .await
            .map_err(LedgerError::store)?;
        if !inserted {
            debug!(round = id, "round was stored concurrently, keeping existing row");
        }
        Ok(record)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
