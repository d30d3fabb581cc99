use crate::time::kr_market;
use anyhow::{ensure, Context};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const INSERT_BATCH: usize = 500;

/// One calendar row of the `date` dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRow {
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: i32,
    pub month: i32,
    pub week: i32,
    pub day: i32,
    pub is_holiday: bool,
}

impl DateRow {
    /// `holidays` are market holidays; weekends are always holidays.
    pub fn new(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> Self {
        Self {
            date,
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as i32,
            month: date.month() as i32,
            week: date.iso_week().week() as i32,
            day: date.day() as i32,
            is_holiday: matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
                || holidays.contains(&date),
        }
    }
}

pub fn calendar(start: NaiveDate, end: NaiveDate) -> Vec<DateRow> {
    let holidays = kr_market::holidays_between(start.year(), end.year());
    let mut out = Vec::new();
    let mut d = start;
    while d <= end {
        out.push(DateRow::new(d, &holidays));
        d += Duration::days(1);
    }
    out
}

/// Inserts every calendar day in `start..=end`; days already present are left alone.
pub async fn prepare_date_table(pool: &sqlx::PgPool, start: NaiveDate, end: NaiveDate) -> anyhow::Result<u64> {
    ensure!(start <= end, "start {start} is after end {end}");
    let rows = calendar(start, end);

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut inserted: u64 = 0;
    for chunk in rows.chunks(INSERT_BATCH) {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO date (date, year, quarter, month, week, day, is_holiday) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.date)
                .push_bind(row.year)
                .push_bind(row.quarter)
                .push_bind(row.month)
                .push_bind(row.week)
                .push_bind(row.day)
                .push_bind(row.is_holiday);
        });
        qb.push(" ON CONFLICT (date) DO NOTHING");
        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert date failed")?;
        inserted += res.rows_affected();
    }
    tx.commit().await.context("commit transaction failed")?;

    tracing::info!(%start, %end, days = rows.len(), inserted, "date table prepared");
    Ok(inserted)
}

pub async fn date_ids(pool: &sqlx::PgPool, dates: &[NaiveDate]) -> anyhow::Result<HashMap<NaiveDate, Uuid>> {
    if dates.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(NaiveDate, Uuid)> = sqlx::query_as("SELECT date, date_id FROM date WHERE date = ANY($1)")
        .persistent(false)
        .bind(dates.to_vec())
        .fetch_all(pool)
        .await
        .context("select date ids failed")?;

    let map: HashMap<NaiveDate, Uuid> = rows.into_iter().collect();
    if map.len() < dates.len() {
        tracing::warn!(requested = dates.len(), found = map.len(), "some dates have no date_id");
    }
    Ok(map)
}
