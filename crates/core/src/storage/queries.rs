//! Read-side queries backing the HTTP API.

use super::accounts::RAW_ACCOUNTS;
use crate::domain::strategy::Strategy;
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// A ticker picked on a date, with the raw market values stored for that date.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PickedTicker {
    pub ticker: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeriesPoint {
    pub raw: BTreeMap<String, f64>,
    pub processed: BTreeMap<String, f64>,
}

fn raw_names() -> Vec<String> {
    RAW_ACCOUNTS.iter().map(|s| s.to_string()).collect()
}

fn pick_names() -> Vec<String> {
    Strategy::ALL.iter().map(|s| s.pick_column().to_string()).collect()
}

pub async fn giant_picks(
    pool: &sqlx::PgPool,
    date: NaiveDate,
    strategy: Strategy,
) -> anyhow::Result<Vec<PickedTicker>> {
    let rows: Vec<(String, Option<String>, Option<f64>)> = sqlx::query_as(
        "SELECT apd.ticker, raw.acc_name, raw.acc_raw_data \
         FROM account_processed_data apd \
         JOIN date d ON apd.date_id = d.date_id \
         JOIN account_list al ON apd.acc_id = al.acc_id \
         LEFT JOIN ( \
           SELECT ard.ticker, ard.date_id, al2.acc_name, ard.acc_raw_data \
           FROM account_raw_data ard \
           JOIN account_list al2 ON ard.acc_id = al2.acc_id \
           WHERE al2.acc_name = ANY($3) \
         ) raw ON raw.ticker = apd.ticker AND raw.date_id = apd.date_id \
         WHERE d.date = $1 AND al.acc_name = $2 AND apd.acc_processed_data = 1 \
         ORDER BY apd.ticker, raw.acc_name",
    )
    .persistent(false)
    .bind(date)
    .bind(strategy.pick_column())
    .bind(raw_names())
    .fetch_all(pool)
    .await
    .with_context(|| format!("select {} picks for {date} failed", strategy.key()))?;

    let mut out: Vec<PickedTicker> = Vec::new();
    for (ticker, acc_name, value) in rows {
        if out.last().map(|p| p.ticker != ticker).unwrap_or(true) {
            out.push(PickedTicker {
                ticker,
                values: BTreeMap::new(),
            });
        }
        if let (Some(name), Some(value), Some(entry)) = (acc_name, value, out.last_mut()) {
            entry.values.insert(name, value);
        }
    }
    Ok(out)
}

pub async fn ticker_series(
    pool: &sqlx::PgPool,
    ticker: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<BTreeMap<NaiveDate, SeriesPoint>> {
    let raw: Vec<(NaiveDate, String, Option<f64>)> = sqlx::query_as(
        "SELECT d.date, al.acc_name, ard.acc_raw_data \
         FROM account_raw_data ard \
         JOIN account_list al ON ard.acc_id = al.acc_id \
         JOIN date d ON ard.date_id = d.date_id \
         WHERE ard.ticker = $1 AND d.date BETWEEN $2 AND $3 AND al.acc_name = ANY($4) \
         ORDER BY d.date, al.acc_name",
    )
    .persistent(false)
    .bind(ticker)
    .bind(from)
    .bind(to)
    .bind(raw_names())
    .fetch_all(pool)
    .await
    .with_context(|| format!("select raw series for {ticker} failed"))?;

    let processed: Vec<(NaiveDate, String, Option<f64>)> = sqlx::query_as(
        "SELECT d.date, al.acc_name, apd.acc_processed_data \
         FROM account_processed_data apd \
         JOIN account_list al ON apd.acc_id = al.acc_id \
         JOIN date d ON apd.date_id = d.date_id \
         WHERE apd.ticker = $1 AND d.date BETWEEN $2 AND $3 AND al.acc_name = ANY($4) \
         ORDER BY d.date, al.acc_name",
    )
    .persistent(false)
    .bind(ticker)
    .bind(from)
    .bind(to)
    .bind(pick_names())
    .fetch_all(pool)
    .await
    .with_context(|| format!("select processed series for {ticker} failed"))?;

    Ok(group_series(raw, processed))
}

fn group_series(
    raw: Vec<(NaiveDate, String, Option<f64>)>,
    processed: Vec<(NaiveDate, String, Option<f64>)>,
) -> BTreeMap<NaiveDate, SeriesPoint> {
    let mut out: BTreeMap<NaiveDate, SeriesPoint> = BTreeMap::new();
    for (date, name, value) in raw {
        let point = out.entry(date).or_default();
        if let Some(v) = value {
            point.raw.insert(name, v);
        }
    }
    for (date, name, value) in processed {
        let point = out.entry(date).or_default();
        if let Some(v) = value {
            point.processed.insert(name, v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_groups_by_date_and_drops_nulls() {
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let out = group_series(
            vec![(d1, "close".into(), Some(10.0)), (d1, "open".into(), None)],
            vec![(d2, "Graham_Pick".into(), Some(1.0))],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[&d1].raw.len(), 1);
        assert!(out[&d1].processed.is_empty());
        assert_eq!(out[&d2].processed["Graham_Pick"], 1.0);
    }
}
