//! Core data models used throughout Draw Ledger.
//!
//! [`SourceDraw`] is the provider's wire shape; [`DrawRecord`] is what the
//! ledger stores and serves. The two are connected by the explicit
//! [`SourceDraw::normalize`] step.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Lowest and highest number a ball can carry.
pub const MIN_BALL: u8 = 1;
pub const MAX_BALL: u8 = 45;

/// Date format used by the provider's `drwNoDate` field and by the SQLite layout.
pub const DRAW_DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored draw. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRecord {
    pub id: u32,
    pub draw_date: NaiveDate,
    pub winning_numbers: [u8; 6],
    pub bonus_number: u8,
    pub first_tier_prize_amount: u64,
    pub first_tier_winner_count: u32,
    pub total_sales_amount: u64,
    pub source_status: String,
}

/// Raw per-round payload returned by the provider's data endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceDraw {
    #[serde(rename = "drwNo")]
    pub id: u32,
    #[serde(rename = "drwNoDate")]
    pub draw_date: String,
    #[serde(rename = "drwtNo1")]
    pub n1: u8,
    #[serde(rename = "drwtNo2")]
    pub n2: u8,
    #[serde(rename = "drwtNo3")]
    pub n3: u8,
    #[serde(rename = "drwtNo4")]
    pub n4: u8,
    #[serde(rename = "drwtNo5")]
    pub n5: u8,
    #[serde(rename = "drwtNo6")]
    pub n6: u8,
    #[serde(rename = "bnusNo")]
    pub bonus: u8,
    #[serde(rename = "firstWinamnt")]
    pub first_prize_amount: u64,
    #[serde(rename = "firstPrzwnerCo")]
    pub first_prize_winners: u32,
    #[serde(rename = "totSellamnt")]
    pub total_sales: u64,
    #[serde(rename = "returnValue")]
    pub return_value: String,
}

impl SourceDraw {
    /// Converts the wire payload into a [`DrawRecord`].
    ///
    /// The draw date must be exactly `YYYY-MM-DD`; anything else is an
    /// [`LedgerError::InvalidDrawDate`]. Ball numbers outside 1..=45 are an
    /// [`LedgerError::InvalidDraw`].
    pub fn normalize(self) -> LedgerResult<DrawRecord> {
        let draw_date = NaiveDate::parse_from_str(self.draw_date.trim(), DRAW_DATE_FORMAT)
            .map_err(|_| LedgerError::InvalidDrawDate {
                id: self.id,
                raw: self.draw_date.clone(),
            })?;

        let winning_numbers = [self.n1, self.n2, self.n3, self.n4, self.n5, self.n6];
        for n in winning_numbers.iter().chain(std::iter::once(&self.bonus)) {
            if !(MIN_BALL..=MAX_BALL).contains(n) {
                return Err(LedgerError::InvalidDraw {
                    id: self.id,
                    reason: format!("ball {} outside {}..={}", n, MIN_BALL, MAX_BALL),
                });
            }
        }
        if self.id == 0 {
            return Err(LedgerError::InvalidDraw {
                id: 0,
                reason: "round number must be positive".to_string(),
            });
        }

        Ok(DrawRecord {
            id: self.id,
            draw_date,
            winning_numbers,
            bonus_number: self.bonus,
            first_tier_prize_amount: self.first_prize_amount,
            first_tier_winner_count: self.first_prize_winners,
            total_sales_amount: self.total_sales,
            source_status: self.return_value,
        })
    }
}

/// An inclusive, validated range of rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundRange {
    pub start: u32,
    pub end: u32,
}

impl RoundRange {
    /// Builds a range, rejecting `start == 0` and `start > end`.
    pub fn new(start: u32, end: u32) -> LedgerResult<Self> {
        if start == 0 || start > end {
            return Err(LedgerError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of rounds covered, inclusive of both ends.
    pub fn span(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Summary of one backfill run. Returned or logged, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub success_count: usize,
    pub failure_count: usize,
    /// Failed and deferred rounds, ascending.
    pub unresolved_ids: Vec<u32>,
    /// How many of `unresolved_ids` were never attempted because of a fetch cap.
    pub deferred_count: usize,
}

impl BackfillReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved_ids.is_empty()
    }
}
