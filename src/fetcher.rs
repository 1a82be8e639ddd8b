//! Retrying fetch and latest-round resolution on top of a [`DrawSource`].
//!
//! # Retry Strategy
//!
//! Driven by a [`RetryPolicy`] value object and an explicit attempt counter:
//! - transport errors, timeouts, and source-reported failures → retry
//! - wait `initial_delay × growth_factor^(n-1)` after failed attempt `n`
//! - after `max_attempts` failures → [`LedgerError::SourceUnavailable`]

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, warn};

use draw_ledger_core::error::{LedgerError, LedgerResult};
use draw_ledger_core::models::SourceDraw;
use draw_ledger_core::retry::RetryPolicy;
use draw_ledger_core::round::estimate_latest_round;
use draw_ledger_core::source::DrawSource;

/// Wraps a single-attempt [`DrawSource`] with retry and fallback behaviour.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn DrawSource>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn DrawSource>) -> Self {
        Self { source }
    }

    /// Fetches one round, retrying per `policy`.
    pub async fn fetch_record(&self, id: u32, policy: &RetryPolicy) -> LedgerResult<SourceDraw> {
        let attempts = policy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(round = id, attempt, "fetching draw");

            let err = match self.source.fetch_draw(id).await {
                Ok(draw) => return Ok(draw),
                Err(e) => e,
            };

            match policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        round = id,
                        attempt,
                        remaining = attempts - attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(LedgerError::SourceUnavailable {
                        id,
                        attempts: attempt,
                        last_error: format!("{:#}", err),
                    });
                }
            }
        }
    }

    /// Asks the source for its latest round.
    pub async fn probe_latest_id(&self) -> LedgerResult<u32> {
        match self.source.probe_latest().await {
            Ok(0) => Err(LedgerError::ProbeFailed("probe returned round 0".to_string())),
            Ok(id) => Ok(id),
            Err(e) => Err(LedgerError::ProbeFailed(format!("{:#}", e))),
        }
    }

    /// Best-effort latest round: live probe, else the calendar estimate. Never fails.
    pub async fn resolve_latest_id(&self) -> u32 {
        match self.probe_latest_id().await {
            Ok(id) => id,
            Err(e) => {
                let estimate = calendar_estimate();
                warn!(error = %e, estimate, "falling back to calendar estimate");
                estimate
            }
        }
    }
}

/// Calendar estimate for today, clamped to at least round 1.
pub fn calendar_estimate() -> u32 {
    estimate_latest_round(Local::now().date_naive()).unwrap_or(1)
}
