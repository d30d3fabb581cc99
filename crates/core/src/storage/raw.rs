use super::{accounts, dates};
use crate::domain::history::PriceHistory;
use crate::domain::ticker;
use anyhow::Context;
use chrono::NaiveDate;

const DEFAULT_BATCH: usize = 500;

/// (date, account name, value) triples for the raw accounts; undefined values are left out.
pub fn raw_rows(history: &PriceHistory) -> Vec<(NaiveDate, &'static str, f64)> {
    let pct = history.percent_changes();
    let mut out = Vec::with_capacity(history.len() * accounts::RAW_ACCOUNTS.len());
    for (bar, &change) in history.bars().iter().zip(&pct) {
        let values = [bar.open, bar.high, bar.low, bar.close, bar.volume, change];
        for (name, value) in accounts::RAW_ACCOUNTS.iter().zip(values) {
            if value.is_finite() {
                out.push((bar.date, *name, value));
            }
        }
    }
    out
}

/// Upserts OHLCV and percent change for one ticker in a single transaction.
pub async fn upload_price_history(
    pool: &sqlx::PgPool,
    ticker_name: &str,
    history: &PriceHistory,
) -> anyhow::Result<u64> {
    let code = ticker::db_code(ticker_name);
    let rows = raw_rows(history);
    if rows.is_empty() {
        return Ok(0);
    }

    let date_ids = dates::date_ids(pool, &history.dates()).await?;
    let acc_ids = accounts::account_ids(pool, &accounts::RAW_ACCOUNTS).await?;

    let resolved: Vec<_> = rows
        .iter()
        .filter_map(|(date, name, value)| {
            Some((*date_ids.get(date)?, *acc_ids.get(*name)?, *value))
        })
        .collect();
    let dropped = rows.len() - resolved.len();
    if dropped > 0 {
        tracing::warn!(ticker = %code, dropped, "rows without a date_id or acc_id were not uploaded");
    }

    let chunk_size: usize = std::env::var("RAW_UPLOAD_BATCH")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_BATCH);
    anyhow::ensure!(chunk_size >= 1, "RAW_UPLOAD_BATCH must be >= 1");

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut affected: u64 = 0;
    for (batch_idx, chunk) in resolved.chunks(chunk_size).enumerate() {
        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO account_raw_data (ticker, date_id, acc_id, acc_raw_data) ",
        );
        qb.push_values(chunk, |mut b, (date_id, acc_id, value)| {
            b.push_bind(code)
                .push_bind(*date_id)
                .push_bind(*acc_id)
                .push_bind(*value);
        });
        qb.push(
            " ON CONFLICT (ticker, date_id, acc_id) DO UPDATE \
               SET acc_raw_data = EXCLUDED.acc_raw_data",
        );

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch upsert account_raw_data failed")?;
        affected += res.rows_affected();

        tracing::debug!(
            ticker = %code,
            batch_idx,
            batch_size = chunk.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "account_raw_data batch upsert"
        );
    }
    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::DailyBar;

    #[test]
    fn first_bar_has_no_percent_change() {
        let bar = |day: u32, close: f64| DailyBar {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close,
            volume: 5.0,
            dividends: 0.0,
        };
        let h = PriceHistory::from_bars(vec![bar(2, 100.0), bar(3, 110.0)]);
        let rows = raw_rows(&h);
        assert_eq!(rows.len(), 11);
        let last = rows.last().unwrap();
        assert_eq!(last.1, "percent_change");
        assert!((last.2 - 10.0).abs() < 1e-9);
    }
}
