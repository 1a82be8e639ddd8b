//! Prize tier evaluation for a ticket against a draw.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{DrawRecord, MAX_BALL, MIN_BALL};

/// Six distinct numbers chosen by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    numbers: BTreeSet<u8>,
}

impl Ticket {
    /// Validates that `numbers` holds exactly six distinct values in 1..=45.
    pub fn new(numbers: &[u8]) -> LedgerResult<Self> {
        if let Some(n) = numbers.iter().find(|n| !(MIN_BALL..=MAX_BALL).contains(*n)) {
            return Err(LedgerError::InvalidTicket(format!(
                "{} is outside {}..={}",
                n, MIN_BALL, MAX_BALL
            )));
        }
        let set: BTreeSet<u8> = numbers.iter().copied().collect();
        if numbers.len() != 6 || set.len() != 6 {
            return Err(LedgerError::InvalidTicket(format!(
                "expected 6 distinct numbers, got {:?}",
                numbers
            )));
        }
        Ok(Self { numbers: set })
    }

    /// Parses a comma-separated list such as `"1,7,13,22,38,45"`.
    pub fn parse(raw: &str) -> LedgerResult<Self> {
        let numbers = raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u8>()
                    .map_err(|_| LedgerError::InvalidTicket(format!("'{}' is not a number", part.trim())))
            })
            .collect::<LedgerResult<Vec<u8>>>()?;
        Self::new(&numbers)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.numbers.iter().copied()
    }
}

/// Outcome of checking one ticket against one draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinResult {
    pub draw_id: u32,
    /// 1 (best) through 5; 0 means no prize.
    pub tier: u8,
    pub matched_numbers: Vec<u8>,
    pub matched_bonus: bool,
}

/// Ranks `ticket` against `draw`.
///
/// Precedence: 6 matches → 1, 5 + bonus → 2, 5 → 3, 4 → 4, 3 → 5, else 0.
/// Only the six winning numbers count as matches; the bonus is checked on its own.
pub fn evaluate(ticket: &Ticket, draw: &DrawRecord) -> WinResult {
    let matched_numbers: Vec<u8> = ticket
        .numbers()
        .filter(|n| draw.winning_numbers.contains(n))
        .collect();
    let matched_bonus = ticket.numbers.contains(&draw.bonus_number);

    let tier = match (matched_numbers.len(), matched_bonus) {
        (6, _) => 1,
        (5, true) => 2,
        (5, false) => 3,
        (4, _) => 4,
        (3, _) => 5,
        _ => 0,
    };

    WinResult {
        draw_id: draw.id,
        tier,
        matched_numbers,
        matched_bonus,
    }
}
