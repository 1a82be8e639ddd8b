//! Error taxonomy shared by the engine and its collaborators.

use thiserror::Error;

/// Errors raised by the reconciliation and backfill engine.
///
/// Only [`LedgerError::StoreUnavailable`] is fatal to a running backfill.
/// Per-round failures (`SourceUnavailable`, `InvalidDrawDate`, `InvalidDraw`)
/// are recovered inside the orchestrator and reported as unresolved rounds.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Every retry attempt for one round failed.
    #[error("source unavailable for round {id} after {attempts} attempt(s): {last_error}")]
    SourceUnavailable {
        id: u32,
        attempts: u32,
        last_error: String,
    },

    /// The requested span exceeds the configured maximum.
    #[error("range spans {span} rounds, end - start may be at most {max} (set noLimit=true to override)")]
    RangeTooLarge { span: u32, max: u32 },

    /// Bounds are inverted or not positive.
    #[error("invalid range: start={start}, end={end}")]
    InvalidRange { start: u32, end: u32 },

    /// The live latest-round probe failed or returned garbage.
    #[error("latest round probe failed: {0}")]
    ProbeFailed(String),

    /// The persistent store could not be read or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// The source payload carried a date outside the expected `YYYY-MM-DD` format.
    #[error("round {id}: unparseable draw date '{raw}'")]
    InvalidDrawDate { id: u32, raw: String },

    /// The source payload failed structural validation.
    #[error("round {id}: invalid draw payload: {reason}")]
    InvalidDraw { id: u32, reason: String },

    /// The ticket is not six distinct numbers in 1..=45.
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    /// The round is neither stored nor obtainable from the source.
    #[error("draw not found: round {0}")]
    DrawNotFound(u32),
}

impl LedgerError {
    /// Wraps any store-level failure.
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        LedgerError::StoreUnavailable(err.into())
    }

    /// True for errors that represent a bad request rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LedgerError::RangeTooLarge { .. }
                | LedgerError::InvalidRange { .. }
                | LedgerError::InvalidTicket(_)
        )
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
