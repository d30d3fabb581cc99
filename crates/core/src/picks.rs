//! Today's picks: the (date, strategy, ticker) triples flattened out of per-ticker screens.

use crate::domain::pick::{StrategyPicks, TodaysPick};
use crate::domain::strategy::Strategy;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Picks on `date`, ordered by strategy then ticker. Tickers without a row on `date` are skipped.
pub fn collect_todays_picks(all: &[StrategyPicks], date: NaiveDate) -> Vec<TodaysPick> {
    let mut out = Vec::new();
    for strategy in Strategy::ALL {
        let mut tickers: Vec<&str> = all
            .iter()
            .filter(|p| p.row_of(date).is_some_and(|row| p.is_pick(strategy, row)))
            .map(|p| p.ticker.as_str())
            .collect();
        tickers.sort_unstable();
        tickers.dedup();
        out.extend(tickers.into_iter().map(|ticker| TodaysPick {
            date,
            giant: strategy,
            ticker: ticker.to_string(),
        }));
    }
    out
}

/// Every pick on every screened date, sorted by (date, strategy, ticker).
pub fn collect_all_days(all: &[StrategyPicks]) -> Vec<TodaysPick> {
    let mut out = BTreeSet::new();
    for p in all {
        for (strategy, flags) in &p.picks {
            for (&date, _) in p.dates.iter().zip(flags).filter(|(_, f)| **f) {
                out.insert(TodaysPick {
                    date,
                    giant: *strategy,
                    ticker: p.ticker.clone(),
                });
            }
        }
    }
    out.into_iter().collect()
}

/// Union of the stored history and new rows, deduplicated on all three fields and sorted.
pub fn merge_history(existing: Vec<TodaysPick>, new: Vec<TodaysPick>) -> Vec<TodaysPick> {
    let merged: BTreeSet<TodaysPick> = existing.into_iter().chain(new).collect();
    merged.into_iter().collect()
}

/// Latest screened date across all tickers.
pub fn latest_date(all: &[StrategyPicks]) -> Option<NaiveDate> {
    all.iter().filter_map(|p| p.dates.last().copied()).max()
}
