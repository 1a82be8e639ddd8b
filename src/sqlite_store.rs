//! SQLite-backed [`RecordStore`] implementation.
//!
//! Each record occupies one row of the `draws` table, keyed by round.
//! Inserts use `ON CONFLICT(id) DO NOTHING`, so concurrent backfills racing
//! on the same round see a benign `false` rather than a constraint error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use draw_ledger_core::models::{DrawRecord, DRAW_DATE_FORMAT};
use draw_ledger_core::store::RecordStore;

/// SQLite implementation of the [`RecordStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const SELECT_COLUMNS: &str = "id, draw_date, n1, n2, n3, n4, n5, n6, bonus, \
     first_prize_amount, first_prize_winners, total_sales, source_status";

fn ball(row: &SqliteRow, column: &str) -> Result<u8> {
    let value: i64 = row.try_get(column)?;
    u8::try_from(value).with_context(|| format!("column {} out of range: {}", column, value))
}

fn row_to_record(row: &SqliteRow) -> Result<DrawRecord> {
    let id: i64 = row.try_get("id")?;
    let draw_date: String = row.try_get("draw_date")?;
    let first_prize_amount: i64 = row.try_get("first_prize_amount")?;
    let first_prize_winners: i64 = row.try_get("first_prize_winners")?;
    let total_sales: i64 = row.try_get("total_sales")?;

    Ok(DrawRecord {
        id: u32::try_from(id).with_context(|| format!("round out of range: {}", id))?,
        draw_date: NaiveDate::parse_from_str(&draw_date, DRAW_DATE_FORMAT)
            .with_context(|| format!("round {}: corrupt draw_date '{}'", id, draw_date))?,
        winning_numbers: [
            ball(row, "n1")?,
            ball(row, "n2")?,
            ball(row, "n3")?,
            ball(row, "n4")?,
            ball(row, "n5")?,
            ball(row, "n6")?,
        ],
        bonus_number: ball(row, "bonus")?,
        first_tier_prize_amount: u64::try_from(first_prize_amount)?,
        first_tier_winner_count: u32::try_from(first_prize_winners)?,
        total_sales_amount: u64::try_from(total_sales)?,
        source_status: row.try_get("source_status")?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_in_range(&self, start: u32, end: u32) -> Result<Vec<DrawRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM draws WHERE id >= ? AND id <= ? ORDER BY id ASC",
            SELECT_COLUMNS
        ))
        .bind(i64::from(start))
        .bind(i64::from(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn find_max_id(&self) -> Result<Option<u32>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM draws")
            .fetch_one(&self.pool)
            .await?;
        max.map(u32::try_from).transpose().map_err(Into::into)
    }

    async fn upsert_if_absent(&self, record: &DrawRecord) -> Result<bool> {
        let [n1, n2, n3, n4, n5, n6] = record.winning_numbers;
        let result = sqlx::query(
            r#"
            INSERT INTO draws (id, draw_date, n1, n2, n3, n4, n5, n6, bonus,
                               first_prize_amount, first_prize_winners, total_sales,
                               source_status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(i64::from(record.id))
        .bind(record.draw_date.format(DRAW_DATE_FORMAT).to_string())
        .bind(i64::from(n1))
        .bind(i64::from(n2))
        .bind(i64::from(n3))
        .bind(i64::from(n4))
        .bind(i64::from(n5))
        .bind(i64::from(n6))
        .bind(i64::from(record.bonus_number))
        .bind(i64::try_from(record.first_tier_prize_amount)?)
        .bind(i64::from(record.first_tier_winner_count))
        .bind(i64::try_from(record.total_sales_amount)?)
        .bind(&record.source_status)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
