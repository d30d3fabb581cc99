//! Batch stages over the frame store. Per-ticker work fans out on a rayon pool; a failing
//! ticker is logged and recorded, and the stage carries on.

use crate::domain::indicator::IndicatorTable;
use crate::domain::pick::{StrategyPicks, TodaysPick};
use crate::frame::{codec, Category, FrameStore};
use crate::indicators::calculate_indicators;
use crate::loader::{load_ticker, TickerFailure};
use crate::{picks, rank, screen};
use anyhow::Context;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<TickerFailure>,
}

impl StageReport {
    fn from_outcomes(stage: &'static str, outcomes: Vec<(String, anyhow::Result<()>)>) -> Self {
        let mut report = StageReport {
            total: outcomes.len(),
            ..Default::default()
        };
        for (ticker, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    let failure = TickerFailure::new(stage, &ticker, &err);
                    tracing::warn!(stage, %ticker, error = %failure.detail, "ticker failed");
                    report.failures.push(failure);
                }
            }
        }
        tracing::info!(
            stage,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "stage finished"
        );
        report
    }

    fn merge(&mut self, other: StageReport) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
    }
}

pub fn thread_pool(workers: Option<usize>) -> anyhow::Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = workers {
        builder = builder.num_threads(n);
    }
    builder.build().context("failed to build worker pool")
}

/// Calculates and writes `indicators/{t}_indicator.feather` for every ticker.
pub fn run_indicators(pool: &rayon::ThreadPool, store: &FrameStore, tickers: &[String]) -> StageReport {
    let outcomes = pool.install(|| {
        tickers
            .par_iter()
            .map(|ticker| (ticker.clone(), indicators_for(store, ticker)))
            .collect()
    });
    StageReport::from_outcomes("indicators", outcomes)
}

fn indicators_for(store: &FrameStore, ticker: &str) -> anyhow::Result<()> {
    let data = load_ticker(store, ticker)?;
    let table = calculate_indicators(&data)?;
    let mut df = codec::indicators_to_frame(&table)?;
    store.write(Category::Indicators, ticker, &mut df)
}

fn load_indicator_tables(
    pool: &rayon::ThreadPool,
    store: &FrameStore,
) -> anyhow::Result<(BTreeMap<String, IndicatorTable>, StageReport)> {
    let tickers = store.list_tickers(Category::Indicators)?;
    let loaded: Vec<(String, anyhow::Result<IndicatorTable>)> = pool.install(|| {
        tickers
            .par_iter()
            .map(|t| {
                let table = store
                    .read(Category::Indicators, t)
                    .and_then(|df| codec::indicators_from_frame(&df));
                (t.clone(), table)
            })
            .collect()
    });

    let mut tables = BTreeMap::new();
    let mut outcomes = Vec::with_capacity(loaded.len());
    for (ticker, table) in loaded {
        match table {
            Ok(table) => {
                tables.insert(ticker.clone(), table);
                outcomes.push((ticker, Ok(())));
            }
            Err(err) => outcomes.push((ticker, Err(err))),
        }
    }
    Ok((tables, StageReport::from_outcomes("load indicators", outcomes)))
}

/// Ranks relative strength across every indicator file and writes the files back.
pub fn run_rank(pool: &rayon::ThreadPool, store: &FrameStore) -> anyhow::Result<StageReport> {
    let (mut tables, mut report) = load_indicator_tables(pool, store)?;
    rank::rank_relative_strength(&mut tables)?;

    let outcomes = pool.install(|| {
        tables
            .par_iter()
            .map(|(ticker, table)| {
                let outcome = codec::indicators_to_frame(table)
                    .and_then(|mut df| store.write(Category::Indicators, ticker, &mut df));
                (ticker.clone(), outcome)
            })
            .collect()
    });
    report.merge(StageReport::from_outcomes("rank", outcomes));
    Ok(report)
}

/// Screens the ranked universe and writes `giants_pick/{t}_giants_picks.feather`.
pub fn run_screen(pool: &rayon::ThreadPool, store: &FrameStore) -> anyhow::Result<StageReport> {
    let (tables, mut report) = load_indicator_tables(pool, store)?;
    let outcomes = pool.install(|| {
        let screened = screen::screen_universe(&tables);
        screened
            .par_iter()
            .map(|p| {
                let outcome = codec::picks_to_frame(p)
                    .and_then(|mut df| store.write(Category::GiantsPick, &p.ticker, &mut df));
                (p.ticker.clone(), outcome)
            })
            .collect()
    });
    report.merge(StageReport::from_outcomes("screen", outcomes));
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickScope {
    /// One date; `None` means the latest screened date.
    Day(Option<NaiveDate>),
    AllDates,
}

#[derive(Debug, Clone, Default)]
pub struct PicksOutcome {
    pub report: StageReport,
    pub date: Option<NaiveDate>,
    pub new_picks: Vec<TodaysPick>,
    pub history_len: usize,
}

/// Collects picks from the giants_pick files and merges them into the todays_picks history.
pub fn run_picks(
    pool: &rayon::ThreadPool,
    store: &FrameStore,
    scope: PickScope,
    dry_run: bool,
) -> anyhow::Result<PicksOutcome> {
    let tickers = store.list_tickers(Category::GiantsPick)?;
    let loaded: Vec<(String, anyhow::Result<StrategyPicks>)> = pool.install(|| {
        tickers
            .par_iter()
            .map(|t| {
                let p = store
                    .read(Category::GiantsPick, t)
                    .and_then(|df| codec::picks_from_frame(&df, t));
                (t.clone(), p)
            })
            .collect()
    });

    let mut screened = Vec::with_capacity(loaded.len());
    let mut outcomes = Vec::with_capacity(loaded.len());
    for (ticker, p) in loaded {
        match p {
            Ok(p) => {
                screened.push(p);
                outcomes.push((ticker, Ok(())));
            }
            Err(err) => outcomes.push((ticker, Err(err))),
        }
    }
    let report = StageReport::from_outcomes("picks", outcomes);

    let (date, new_picks) = match scope {
        PickScope::AllDates => (None, picks::collect_all_days(&screened)),
        PickScope::Day(date) => {
            let Some(date) = date.or_else(|| picks::latest_date(&screened)) else {
                tracing::warn!("no screened dates; nothing to collect");
                return Ok(PicksOutcome {
                    report,
                    ..Default::default()
                });
            };
            (Some(date), picks::collect_todays_picks(&screened, date))
        }
    };

    let path = store.todays_picks_path();
    let existing = if path.is_file() {
        codec::todays_picks_from_frame(&crate::frame::read_feather(&path)?)?
    } else {
        Vec::new()
    };
    let merged = picks::merge_history(existing, new_picks.clone());
    let history_len = merged.len();

    if dry_run {
        tracing::info!(new = new_picks.len(), history = history_len, "dry run; todays_picks not written");
    } else {
        let mut df = codec::todays_picks_to_frame(&merged)?;
        crate::frame::write_feather(&path, &mut df)?;
        tracing::info!(new = new_picks.len(), history = history_len, path = %path.display(), "todays_picks written");
    }

    Ok(PicksOutcome {
        report,
        date,
        new_picks,
        history_len,
    })
}

/// Stored pick history, for the uploader.
pub fn read_todays_picks(store: &FrameStore) -> anyhow::Result<Vec<TodaysPick>> {
    let path = store.todays_picks_path();
    let df = crate::frame::read_feather(&path)?;
    codec::todays_picks_from_frame(&df)
}
