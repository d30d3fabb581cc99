use super::{accounts, dates, lock};
use crate::domain::pick::TodaysPick;
use crate::domain::ticker;
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;

const PICK_VALUE: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub inserted: u64,
    pub already_present: u64,
    pub skipped: u64,
}

/// Writes each pick as `acc_processed_data = 1.0` under its `*_Pick` account.
///
/// Rows are inserted one by one so a failing row only loses itself. Rows whose date or account
/// is unknown are skipped, as are dates another uploader currently holds the lock for.
pub async fn upload_todays_picks(pool: &sqlx::PgPool, picks: &[TodaysPick]) -> anyhow::Result<UploadReport> {
    let mut report = UploadReport::default();
    if picks.is_empty() {
        return Ok(report);
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&TodaysPick>> = BTreeMap::new();
    for p in picks {
        by_date.entry(p.date).or_default().push(p);
    }

    let all_dates: Vec<NaiveDate> = by_date.keys().copied().collect();
    let date_ids = dates::date_ids(pool, &all_dates).await?;
    let acc_names: Vec<&str> = crate::domain::strategy::Strategy::ALL
        .iter()
        .map(|s| s.pick_column())
        .collect();
    let acc_ids = accounts::account_ids(pool, &acc_names).await?;

    let mut conn = pool.acquire().await.context("acquire connection failed")?;
    for (date, rows) in by_date {
        let Some(&date_id) = date_ids.get(&date) else {
            tracing::warn!(%date, rows = rows.len(), "no date_id; run prepare-dates first");
            report.skipped += rows.len() as u64;
            continue;
        };
        if !lock::try_acquire_pick_date_lock(&mut conn, date).await? {
            tracing::warn!(%date, "another upload holds this date; skipping");
            report.skipped += rows.len() as u64;
            continue;
        }

        for pick in rows {
            let acc_name = pick.giant.pick_column();
            let Some(&acc_id) = acc_ids.get(acc_name) else {
                report.skipped += 1;
                continue;
            };
            let code = ticker::db_code(&pick.ticker);
            let res = sqlx::query(
                "INSERT INTO account_processed_data (ticker, date_id, acc_id, acc_processed_data) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (ticker, date_id, acc_id) DO NOTHING",
            )
            .persistent(false)
            .bind(code)
            .bind(date_id)
            .bind(acc_id)
            .bind(PICK_VALUE)
            .execute(&mut *conn)
            .await;

            match res {
                Ok(r) if r.rows_affected() > 0 => report.inserted += 1,
                Ok(_) => report.already_present += 1,
                Err(err) => {
                    tracing::warn!(%date, ticker = %code, acc_name, error = %err, "pick insert failed; skipping");
                    report.skipped += 1;
                }
            }
        }

        lock::release_pick_date_lock(&mut conn, date).await?;
    }

    tracing::info!(
        inserted = report.inserted,
        already_present = report.already_present,
        skipped = report.skipped,
        "todays picks uploaded"
    );
    Ok(report)
}
