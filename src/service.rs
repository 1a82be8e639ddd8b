//! Range query facade.
//!
//! Turns client requests into reconciled answers: resolves the requested
//! bounds, reads what the store already has, backfills the gaps, and
//! explains any rounds it could not supply in the response metadata.
//! Shared by the HTTP server and the CLI.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use draw_ledger_core::error::{LedgerError, LedgerResult};
use draw_ledger_core::gap::{detect_missing, summarize_missing};
use draw_ledger_core::models::{BackfillReport, DrawRecord, RoundRange};
use draw_ledger_core::source::DrawSource;
use draw_ledger_core::store::RecordStore;
use draw_ledger_core::win::{evaluate, Ticket, WinResult};

use crate::backfill::{BackfillPlan, Backfiller};
use crate::config::Config;
use crate::fetcher::{calendar_estimate, Fetcher};
use crate::latest::{LatestResolver, ResolvedLatest};
use crate::source_http::HttpDrawSource;
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

/// How many missing ids the metadata summary lists before truncating.
const MISSING_SHOWN: usize = 10;

/// Parameters of a range query.
#[derive(Debug, Clone, Default)]
pub struct RangeQuery {
    pub start: Option<u32>,
    pub end: Option<u32>,
    /// Most recent N rounds; overrides `start`/`end` when positive.
    pub latest: Option<u32>,
    /// Answer from the store alone, never fetch.
    pub store_only: bool,
    /// Lift the span limit.
    pub no_limit: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeMeta {
    pub total_rounds: u32,
    pub returned_rounds: usize,
    pub requested_range: RoundRange,
    /// Summary of rounds still absent, `null` when the answer is complete.
    pub missing_rounds: Option<String>,
    /// How many of the missing rounds were not attempted because of the
    /// fetch cap. Repeating the request picks them up.
    pub deferred_rounds: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeAnswer {
    pub draws: Vec<DrawRecord>,
    pub meta: RangeMeta,
}

/// Parameters of a bulk load. Unset fields take configured defaults.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub batch_size: Option<usize>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSettings {
    pub batch_size: usize,
    pub delay: u64,
}

/// Immediate reply to a background load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadAck {
    pub message: String,
    pub range: RoundRange,
    pub settings: LoadSettings,
}

/// Result of a foreground load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub range: RoundRange,
    pub settings: LoadSettings,
    pub report: BackfillReport,
}

/// Every ledger operation, bound to one store and one source.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct RangeService {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    backfiller: Backfiller,
    resolver: LatestResolver,
}

impl RangeService {
    /// Builds the service and its backfiller and latest-round resolver.
    ///
    /// # Arguments
    ///
    /// - `config`: pacing, retry, and span settings.
    /// - `store`: persistent record store shared with background loads.
    /// - `source`: single-attempt provider client; retries are added here.
    pub fn new(config: Arc<Config>, store: Arc<dyn RecordStore>, source: Arc<dyn DrawSource>) -> Self {
        let fetcher = Fetcher::new(source);
        let backfiller = Backfiller::new(store.clone(), fetcher.clone());
        let resolver = LatestResolver::new(fetcher, store.clone(), config.source.fallback_latest_id);
        Self {
            config,
            store,
            backfiller,
            resolver,
        }
    }

    /// Resolves the latest round through the fallback chain. Never fails.
    pub async fn latest(&self) -> ResolvedLatest {
        self.resolver.resolve().await
    }

    /// Answers a range query, backfilling up to the configured cap.
    ///
    /// # Returns
    ///
    /// The stored and newly fetched draws in ascending order, plus metadata
    /// describing any rounds that are still missing. Fails with
    /// [`LedgerError::RangeTooLarge`] when `end - start` exceeds
    /// `[query].max_span` without `no_limit`, and with
    /// [`LedgerError::StoreUnavailable`] when the store cannot be read or written.
    pub async fn answer_range(&self, query: &RangeQuery) -> LedgerResult<RangeAnswer> {
        let range = self.query_bounds(query).await?;
        let span = range.span();
        let max = self.config.query.max_span;
        if range.end - range.start > max && !query.no_limit {
            return Err(LedgerError::RangeTooLarge { span, max });
        }

        info!(start = range.start, end = range.end, span, "range query");

        let mut draws = self
            .store
            .find_in_range(range.start, range.end)
            .await
            .map_err(LedgerError::store)?;
        let present: HashSet<u32> = draws.iter().map(|r| r.id).collect();
        let mut missing = detect_missing(range.start, range.end, &present);
        let mut deferred_rounds = 0;

        if query.store_only {
            debug!(missing = missing.len(), "store-only query, skipping backfill");
        } else if !missing.is_empty() {
            info!(missing = missing.len(), "backfilling missing rounds");
            let outcome = self
                .backfiller
                .run(&missing, &BackfillPlan::for_query(&self.config))
                .await?;
            draws.extend(outcome.records);
            draws.sort_by_key(|r| r.id);
            draws.dedup_by_key(|r| r.id);
            missing = outcome.report.unresolved_ids;
            deferred_rounds = outcome.report.deferred_count;
        }

        let meta = RangeMeta {
            total_rounds: span,
            returned_rounds: draws.len(),
            requested_range: range,
            missing_rounds: summarize_missing(&missing, MISSING_SHOWN),
            deferred_rounds,
        };
        Ok(RangeAnswer { draws, meta })
    }

    /// Starts a background load and acknowledges it without waiting.
    pub async fn start_load(&self, request: &LoadRequest) -> LedgerResult<LoadAck> {
        let (range, plan, settings) = self.load_plan(request).await?;
        info!(
            start = range.start,
            end = range.end,
            batch_size = settings.batch_size,
            delay_ms = settings.delay,
            "starting background load"
        );
        self.backfiller.spawn_range(range, plan);
        Ok(LoadAck {
            message: "Loading draws in the background.".to_string(),
            range,
            settings,
        })
    }

    /// Runs a load to completion and returns its report.
    pub async fn load_range(&self, request: &LoadRequest) -> LedgerResult<LoadSummary> {
        let (range, plan, settings) = self.load_plan(request).await?;
        let outcome = self.backfiller.backfill_range(range, &plan).await?;
        Ok(LoadSummary {
            range,
            settings,
            report: outcome.report,
        })
    }

    /// Evaluates `ticket` against `round`, fetching the draw if it is not stored yet.
    pub async fn check_ticket(&self, round: u32, ticket: &Ticket) -> LedgerResult<WinResult> {
        let range = RoundRange::new(round, round)?;
        let mut found = self
            .store
            .find_in_range(range.start, range.end)
            .await
            .map_err(LedgerError::store)?;

        if found.is_empty() {
            debug!(round, "draw not stored, fetching");
            let outcome = self
                .backfiller
                .run(&[round], &BackfillPlan::for_query(&self.config))
                .await?;
            found = outcome.records;
        }

        let draw = found.pop().ok_or(LedgerError::DrawNotFound(round))?;
        Ok(evaluate(ticket, &draw))
    }

    async fn query_bounds(&self, query: &RangeQuery) -> LedgerResult<RoundRange> {
        if let Some(count) = query.latest.filter(|n| *n > 0) {
            let latest = self.latest().await.id;
            let start = latest.saturating_sub(count - 1).max(1);
            return RoundRange::new(start, latest);
        }

        let start = query.start.unwrap_or(1);
        let (end, latest) = match query.end {
            Some(end) => (end, None),
            None => {
                let latest = self.latest().await.id;
                (latest, Some(latest))
            }
        };
        bounded_range(start, end, latest)
    }

    async fn load_plan(&self, request: &LoadRequest) -> LedgerResult<(RoundRange, BackfillPlan, LoadSettings)> {
        let latest = match (request.start, request.end) {
            (Some(_), Some(_)) => None,
            _ => Some(self.latest().await.id),
        };
        let latest_or_one = latest.unwrap_or(1);
        let window = self.config.query.default_load_span.max(1);
        let start = request
            .start
            .unwrap_or_else(|| latest_or_one.saturating_sub(window - 1).max(1));
        let end = request.end.unwrap_or(latest_or_one);
        let range = bounded_range(start, end, latest)?;

        let batch_size = request
            .batch_size
            .filter(|b| *b > 0)
            .unwrap_or(self.config.backfill.batch_size);
        let delay = request.delay_ms.unwrap_or(self.config.backfill.batch_delay_ms);
        let plan = BackfillPlan::for_load(&self.config, batch_size, Duration::from_millis(delay));
        let settings = LoadSettings {
            batch_size: plan.batch_size,
            delay,
        };
        Ok((range, plan, settings))
    }
}

/// Builds a range whose end is clamped to the last round that can exist.
///
/// Draws are weekly, so the calendar estimate is an upper bound on the
/// provider's latest round. Anything past it cannot be fetched and would
/// only inflate the missing-id scan.
fn bounded_range(start: u32, end: u32, latest: Option<u32>) -> LedgerResult<RoundRange> {
    let ceiling = calendar_estimate().max(latest.unwrap_or(0));
    if end > ceiling {
        warn!(requested_end = end, ceiling, "end is past the latest possible round, clamping");
    }
    RoundRange::new(start, end.min(ceiling))
}

/// Wires the production collaborators: SQLite store and HTTP source.
pub async fn open_service(config: &Config) -> anyhow::Result<RangeService> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let source = Arc::new(HttpDrawSource::new(&config.source)?);
    Ok(RangeService::new(Arc::new(config.clone()), store, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, ScriptedSource};
    use draw_ledger_core::store::memory::InMemoryStore;

    fn fast_config() -> Config {
        let mut config = Config::minimal("unused.sqlite");
        config.source.initial_retry_delay_ms = 0;
        config.source.bulk_initial_retry_delay_ms = 0;
        config.source.max_attempts = 2;
        config.backfill.item_delay_ms = 0;
        config.backfill.batch_delay_ms = 0;
        config
    }

    fn service(
        store: Arc<InMemoryStore>,
        source: ScriptedSource,
    ) -> (RangeService, Arc<ScriptedSource>) {
        let source = Arc::new(source);
        let svc = RangeService::new(Arc::new(fast_config()), store, source.clone());
        (svc, source)
    }

    fn range(start: u32, end: u32) -> RangeQuery {
        RangeQuery {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_gaps_are_backfilled() {
        let store = Arc::new(InMemoryStore::with_records([record(1160), record(1162), record(1164)]));
        let (svc, source) = service(store.clone(), ScriptedSource::new());

        let answer = svc.answer_range(&range(1160, 1165)).await.unwrap();

        assert_eq!(source.calls(), vec![1161, 1163, 1165]);
        let ids: Vec<u32> = answer.draws.iter().map(|d| d.id).collect();
        assert_eq!(ids, (1160..=1165).collect::<Vec<_>>());
        assert_eq!(answer.meta.total_rounds, 6);
        assert_eq!(answer.meta.returned_rounds, 6);
        assert_eq!(answer.meta.missing_rounds, None);
        assert_eq!(store.len(), 6);
    }

    #[tokio::test]
    async fn test_store_only_never_fetches() {
        let store = Arc::new(InMemoryStore::with_records([record(1160), record(1162), record(1164)]));
        let (svc, source) = service(store, ScriptedSource::new());

        let answer = svc
            .answer_range(&RangeQuery {
                store_only: true,
                ..range(1160, 1165)
            })
            .await
            .unwrap();

        assert!(source.calls().is_empty());
        assert_eq!(answer.meta.returned_rounds, 3);
        assert_eq!(
            answer.meta.missing_rounds.as_deref(),
            Some("3 rounds missing (1161, 1163, 1165)")
        );
    }

    #[tokio::test]
    async fn test_latest_window() {
        let (svc, _source) = service(
            Arc::new(InMemoryStore::new()),
            ScriptedSource::new().with_latest(1168),
        );
        let answer = svc
            .answer_range(&RangeQuery {
                latest: Some(10),
                store_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(answer.meta.requested_range, RoundRange { start: 1159, end: 1168 });
        assert_eq!(answer.meta.total_rounds, 10);
    }

    #[tokio::test]
    async fn test_latest_window_clamps_to_first_round() {
        let (svc, _source) = service(
            Arc::new(InMemoryStore::new()),
            ScriptedSource::new().with_latest(5),
        );
        let answer = svc
            .answer_range(&RangeQuery {
                latest: Some(10),
                store_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(answer.meta.requested_range, RoundRange { start: 1, end: 5 });
    }

    #[tokio::test]
    async fn test_missing_end_defaults_to_latest() {
        let (svc, _source) = service(
            Arc::new(InMemoryStore::new()),
            ScriptedSource::new().with_latest(1168),
        );
        let answer = svc
            .answer_range(&RangeQuery {
                start: Some(1100),
                store_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(answer.meta.requested_range, RoundRange { start: 1100, end: 1168 });
    }

    #[tokio::test]
    async fn test_span_limit() {
        let (svc, source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new());

        let err = svc.answer_range(&range(1, 600)).await.unwrap_err();
        assert!(matches!(err, LedgerError::RangeTooLarge { span: 600, max: 500 }));
        assert!(source.calls().is_empty());

        let answer = svc
            .answer_range(&RangeQuery {
                no_limit: true,
                store_only: true,
                ..range(1, 600)
            })
            .await
            .unwrap();
        assert_eq!(answer.meta.total_rounds, 600);
    }

    #[tokio::test]
    async fn test_span_boundary_measures_end_minus_start() {
        let (svc, _source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new());
        let answer = svc
            .answer_range(&RangeQuery {
                store_only: true,
                ..range(1, 501)
            })
            .await
            .unwrap();
        assert_eq!(answer.meta.total_rounds, 501);

        let err = svc
            .answer_range(&RangeQuery {
                store_only: true,
                ..range(1, 502)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RangeTooLarge { span: 502, max: 500 }));
    }

    #[tokio::test]
    async fn test_unlimited_query_end_is_clamped() {
        let (svc, _source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new());
        let answer = svc
            .answer_range(&RangeQuery {
                no_limit: true,
                store_only: true,
                ..range(1, u32::MAX)
            })
            .await
            .unwrap();
        let ceiling = calendar_estimate();
        assert_eq!(answer.meta.requested_range, RoundRange { start: 1, end: ceiling });
        assert_eq!(answer.meta.total_rounds, ceiling);
    }

    #[tokio::test]
    async fn test_load_end_is_clamped() {
        let store = Arc::new(InMemoryStore::new());
        let (svc, source) = service(store.clone(), ScriptedSource::new());
        let ceiling = calendar_estimate();

        let summary = svc
            .load_range(&LoadRequest {
                start: Some(ceiling - 2),
                end: Some(u32::MAX),
                batch_size: Some(5),
                delay_ms: Some(0),
            })
            .await
            .unwrap();

        assert_eq!(summary.range, RoundRange { start: ceiling - 2, end: ceiling });
        assert_eq!(source.calls(), vec![ceiling - 2, ceiling - 1, ceiling]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_load_entirely_past_ceiling_is_rejected() {
        let (svc, source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new());
        let start = calendar_estimate() + 100;
        let err = svc
            .start_load(&LoadRequest {
                start: Some(start),
                end: Some(u32::MAX),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange { .. }));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let (svc, _source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new());
        let err = svc.answer_range(&range(20, 10)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange { start: 20, end: 10 }));
    }

    #[tokio::test]
    async fn test_query_fetches_at_most_cap() {
        let store = Arc::new(InMemoryStore::new());
        let (svc, source) = service(store.clone(), ScriptedSource::new());

        let answer = svc.answer_range(&range(1, 25)).await.unwrap();

        assert_eq!(source.calls().len(), 10);
        assert_eq!(answer.meta.returned_rounds, 10);
        assert_eq!(answer.meta.deferred_rounds, 15);
        assert_eq!(
            answer.meta.missing_rounds.as_deref(),
            Some("15 rounds missing (11, 12, 13, 14, 15, 16, 17, 18, 19, 20) and 5 more")
        );

        // the next request picks up where the last one stopped
        let answer = svc.answer_range(&range(1, 25)).await.unwrap();
        assert_eq!(answer.meta.returned_rounds, 20);
        assert_eq!(store.len(), 20);
    }

    #[tokio::test]
    async fn test_failed_round_reported_in_meta() {
        let (svc, _source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new().failing(3));
        let answer = svc.answer_range(&range(1, 5)).await.unwrap();
        assert_eq!(answer.meta.returned_rounds, 4);
        assert_eq!(answer.meta.missing_rounds.as_deref(), Some("1 round missing (3)"));
        assert_eq!(answer.meta.deferred_rounds, 0);
    }

    #[tokio::test]
    async fn test_check_ticket_fetches_absent_round() {
        let store = Arc::new(InMemoryStore::new());
        let (svc, source) = service(store.clone(), ScriptedSource::new());
        let draw = record(1168);
        let ticket = Ticket::new(&draw.winning_numbers).unwrap();

        let result = svc.check_ticket(1168, &ticket).await.unwrap();
        assert_eq!(result.tier, 1);
        assert_eq!(source.calls(), vec![1168]);
        assert_eq!(store.ids(), vec![1168]);

        // second check is served from the store
        svc.check_ticket(1168, &ticket).await.unwrap();
        assert_eq!(source.calls(), vec![1168]);
    }

    #[tokio::test]
    async fn test_check_ticket_unknown_round() {
        let (svc, _source) = service(Arc::new(InMemoryStore::new()), ScriptedSource::new().failing(99999));
        let ticket = Ticket::new(&[1, 2, 3, 4, 5, 6]).unwrap();
        let err = svc.check_ticket(99999, &ticket).await.unwrap_err();
        assert!(matches!(err, LedgerError::DrawNotFound(99999)));
    }

    #[tokio::test]
    async fn test_load_range_in_foreground() {
        let store = Arc::new(InMemoryStore::with_records([record(3)]));
        let (svc, _source) = service(store.clone(), ScriptedSource::new().failing(5));

        let summary = svc
            .load_range(&LoadRequest {
                start: Some(1),
                end: Some(8),
                batch_size: Some(3),
                delay_ms: Some(0),
            })
            .await
            .unwrap();

        assert_eq!(summary.range, RoundRange { start: 1, end: 8 });
        assert_eq!(summary.settings.batch_size, 3);
        assert_eq!(summary.report.success_count, 6);
        assert_eq!(summary.report.unresolved_ids, vec![5]);
        assert_eq!(store.ids(), vec![1, 2, 3, 4, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_load_defaults_to_recent_window() {
        let mut config = fast_config();
        config.query.default_load_span = 5;
        let store = Arc::new(InMemoryStore::new());
        let svc = RangeService::new(
            Arc::new(config),
            store.clone(),
            Arc::new(ScriptedSource::new().with_latest(1168)),
        );

        let summary = svc.load_range(&LoadRequest::default()).await.unwrap();
        assert_eq!(summary.range, RoundRange { start: 1164, end: 1168 });
        assert_eq!(summary.settings.batch_size, 5);
        assert_eq!(summary.settings.delay, 0);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_start_load_acknowledges_then_fills_store() {
        let store = Arc::new(InMemoryStore::new());
        let (svc, _source) = service(store.clone(), ScriptedSource::new());

        let ack = svc
            .start_load(&LoadRequest {
                start: Some(10),
                end: Some(14),
                batch_size: Some(2),
                delay_ms: Some(0),
            })
            .await
            .unwrap();
        assert_eq!(ack.range, RoundRange { start: 10, end: 14 });
        assert_eq!(ack.settings.batch_size, 2);

        for _ in 0..100 {
            if store.len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.ids(), vec![10, 11, 12, 13, 14]);
    }
}
