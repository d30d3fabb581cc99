use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use std::collections::HashSet;

const KST_OFFSET_SECS: i32 = 9 * 3600;

// Before this time (KST) the current session's bars are not final, so the pick date is the
// previous business day. KRX closes at 15:30 KST.
const CLOSE_CUTOFF_HOUR_KST: u32 = 16;
const CLOSE_CUTOFF_MINUTE_KST: u32 = 0;

// Solar-calendar public holidays plus the KRX year-end closing day.
// Lunar holidays (Seollal, Chuseok) and substitute days move every year; add them via
// KR_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
const FIXED_HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),
    (3, 1),
    (5, 5),
    (6, 6),
    (8, 15),
    (10, 3),
    (10, 9),
    (12, 25),
];

/// Resolves the market date a pipeline run should target.
///
/// An explicit `YYYY-MM-DD` argument wins. Otherwise the latest KRX business day whose session
/// has closed, as seen from `now_utc` in KST.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?} (expected YYYY-MM-DD)"));
    }

    let kst = chrono::FixedOffset::east_opt(KST_OFFSET_SECS).context("invalid KST offset")?;
    let now_kst = now_utc.with_timezone(&kst);

    let cutoff_reached =
        (now_kst.hour(), now_kst.minute()) >= (CLOSE_CUTOFF_HOUR_KST, CLOSE_CUTOFF_MINUTE_KST);
    let mut date = now_kst.date_naive();
    if !cutoff_reached {
        date = date - Duration::days(1);
    }

    let holidays = holidays_between(date.year() - 1, date.year());
    while !is_business_day_in(date, &holidays) {
        date = date - Duration::days(1);
    }

    Ok(date)
}

pub fn is_holiday(date: NaiveDate) -> bool {
    holidays_between(date.year(), date.year()).contains(&date)
}

pub fn is_business_day(date: NaiveDate) -> bool {
    is_business_day_in(date, &holidays_between(date.year(), date.year()))
}

/// Holiday set covering `[first_year, last_year]`, for callers that test many dates.
pub fn holidays_between(first_year: i32, last_year: i32) -> HashSet<NaiveDate> {
    let mut out = HashSet::new();
    for y in first_year..=last_year {
        insert_fixed_holidays(&mut out, y);
    }
    out.extend(env_holidays());
    out
}

fn is_business_day_in(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    !is_weekend(date) && !holidays.contains(&date)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn insert_fixed_holidays(out: &mut HashSet<NaiveDate>, year: i32) {
    for (m, d) in FIXED_HOLIDAYS {
        if let Some(date) = NaiveDate::from_ymd_opt(year, m, d) {
            out.insert(date);
        }
    }
    if let Some(date) = NaiveDate::from_ymd_opt(year, 12, 31) {
        out.insert(date);
    }
}

fn env_holidays() -> Vec<NaiveDate> {
    let Ok(s) = std::env::var("KR_MARKET_HOLIDAYS") else {
        return Vec::new();
    };
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok())
        .collect()
}
