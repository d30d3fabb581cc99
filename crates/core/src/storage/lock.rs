use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use sqlx::PgConnection;

// Advisory locks belong to the Postgres session, so callers hold one connection for the
// lock, the guarded writes and the unlock.
const LOCK_NAMESPACE: i64 = 0x5641_4C55_5049; // "VALUPI"

fn lock_key_for_date(date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ (date.num_days_from_ce() as i64)
}

pub async fn try_acquire_pick_date_lock(conn: &mut PgConnection, date: NaiveDate) -> anyhow::Result<bool> {
    let key = lock_key_for_date(date);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_pick_date_lock(conn: &mut PgConnection, date: NaiveDate) -> anyhow::Result<()> {
    let key = lock_key_for_date(date);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differ_per_date() {
        let a = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_ne!(lock_key_for_date(a), lock_key_for_date(b));
        assert_eq!(lock_key_for_date(a), lock_key_for_date(a));
    }
}
