//! Latest-round resolution with graceful degradation.
//!
//! Tried in order until one answers:
//!
//! 1. live probe of the provider's main page
//! 2. highest round already in the store
//! 3. `source.fallback_latest_id` from configuration
//! 4. calendar estimate from the first draw date
//!
//! The last step cannot fail, so resolution always yields a round.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use draw_ledger_core::store::RecordStore;

use crate::fetcher::{calendar_estimate, Fetcher};

/// Which step of the chain produced the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestStrategy {
    Probe,
    Store,
    Configured,
    Calendar,
}

impl fmt::Display for LatestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LatestStrategy::Probe => "probe",
            LatestStrategy::Store => "store",
            LatestStrategy::Configured => "configured",
            LatestStrategy::Calendar => "calendar",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedLatest {
    pub id: u32,
    pub strategy: LatestStrategy,
}

/// Walks the fallback chain described in the module docs.
///
/// Holds no cache: every [`resolve`](Self::resolve) call starts again from
/// the live page check.
pub struct LatestResolver {
    fetcher: Fetcher,
    store: Arc<dyn RecordStore>,
    fallback: Option<u32>,
}

impl LatestResolver {
    /// # Arguments
    ///
    /// - `fetcher`: reads the provider's main page.
    /// - `store`: consulted for its highest round when the page is unreachable.
    /// - `fallback`: configured round used before the calendar estimate. `None`
    ///   or `Some(0)` skips that step.
    pub fn new(fetcher: Fetcher, store: Arc<dyn RecordStore>, fallback: Option<u32>) -> Self {
        Self {
            fetcher,
            store,
            fallback,
        }
    }

    /// Returns the first round any step of the chain produces, tagged with
    /// the step that produced it.
    pub async fn resolve(&self) -> ResolvedLatest {
        let probe_err = match self.fetcher.probe_latest_id().await {
            Ok(id) => {
                debug!(round = id, "latest round from probe");
                return ResolvedLatest {
                    id,
                    strategy: LatestStrategy::Probe,
                };
            }
            Err(e) => e,
        };
        warn!(error = %probe_err, "latest round probe failed, trying store");

        match self.store.find_max_id().await {
            Ok(Some(id)) => {
                return ResolvedLatest {
                    id,
                    strategy: LatestStrategy::Store,
                }
            }
            Ok(None) => debug!("store is empty"),
            Err(e) => warn!(error = %e, "could not read highest stored round"),
        }

        if let Some(id) = self.fallback.filter(|id| *id > 0) {
            warn!(round = id, "using configured fallback latest round");
            return ResolvedLatest {
                id,
                strategy: LatestStrategy::Configured,
            };
        }

        let id = calendar_estimate();
        warn!(round = id, "using calendar estimate for latest round");
        ResolvedLatest {
            id,
            strategy: LatestStrategy::Calendar,
        }
    }
}
