//! Scriptable test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Duration;
use tokio::time::Instant;

use draw_ledger_core::models::{DrawRecord, SourceDraw, DRAW_DATE_FORMAT};
use draw_ledger_core::round::first_draw_date;
use draw_ledger_core::source::DrawSource;
use draw_ledger_core::store::RecordStore;

/// A [`DrawSource`] whose failures are scripted per round.
#[derive(Default)]
pub struct ScriptedSource {
    latest: Option<u32>,
    always_fail: HashSet<u32>,
    bad_date: HashSet<u32>,
    flaky: Mutex<HashMap<u32, u32>>,
    calls: Mutex<Vec<u32>>,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(mut self, latest: u32) -> Self {
        self.latest = Some(latest);
        self
    }

    /// Every fetch of `id` fails.
    pub fn failing(mut self, id: u32) -> Self {
        self.always_fail.insert(id);
        self
    }

    /// The first `failures` fetches of `id` fail, later ones succeed.
    pub fn flaky(self, id: u32, failures: u32) -> Self {
        self.flaky.lock().unwrap().insert(id, failures);
        self
    }

    /// Fetches of `id` succeed but carry an unparseable date.
    pub fn bad_date(mut self, id: u32) -> Self {
        self.bad_date.insert(id);
        self
    }

    /// Rounds requested so far, in call order.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    /// When each fetch started, on tokio's clock.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl DrawSource for ScriptedSource {
    async fn fetch_draw(&self, id: u32) -> Result<SourceDraw> {
        self.calls.lock().unwrap().push(id);
        self.call_times.lock().unwrap().push(Instant::now());
        if self.always_fail.contains(&id) {
            bail!("scripted failure for round {}", id);
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    bail!("scripted failure for round {}", id);
                }
            }
        }
        let mut draw = source_draw(id);
        if self.bad_date.contains(&id) {
            draw.draw_date = "not-a-date".to_string();
        }
        Ok(draw)
    }

    async fn probe_latest(&self) -> Result<u32> {
        self.latest.ok_or_else(|| anyhow!("scripted probe outage"))
    }
}

/// Deterministic payload for `id`, drawn on the round's calendar Saturday.
pub fn source_draw(id: u32) -> SourceDraw {
    let date = first_draw_date() + Duration::weeks(i64::from(id.saturating_sub(1)));
    let base = (id % 39) as u8;
    SourceDraw {
        id,
        draw_date: date.format(DRAW_DATE_FORMAT).to_string(),
        n1: base + 1,
        n2: base + 2,
        n3: base + 3,
        n4: base + 4,
        n5: base + 5,
        n6: base + 6,
        bonus: base + 7,
        first_prize_amount: 2_000_000_000,
        first_prize_winners: 10,
        total_sales: 100_000_000_000,
        return_value: "success".to_string(),
    }
}

/// Normalized form of [`source_draw`].
pub fn record(id: u32) -> DrawRecord {
    source_draw(id)
        .normalize()
        .expect("scripted payloads are valid")
}

/// A [`RecordStore`] whose every operation fails.
pub struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn find_in_range(&self, _start: u32, _end: u32) -> Result<Vec<DrawRecord>> {
        bail!("disk on fire")
    }

    async fn find_max_id(&self) -> Result<Option<u32>> {
        bail!("disk on fire")
    }

    async fn upsert_if_absent(&self, _record: &DrawRecord) -> Result<bool> {
        bail!("disk on fire")
    }
}
