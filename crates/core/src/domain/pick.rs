use super::strategy::Strategy;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Screening result for one ticker over its indicator dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyPicks {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub picks: BTreeMap<Strategy, Vec<bool>>,
    pub scores: BTreeMap<Strategy, Vec<f64>>,
}

impl StrategyPicks {
    pub fn is_pick(&self, strategy: Strategy, row: usize) -> bool {
        self.picks
            .get(&strategy)
            .and_then(|v| v.get(row).copied())
            .unwrap_or(false)
    }

    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

/// A ticker selected by a strategy on a given date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TodaysPick {
    pub date: NaiveDate,
    pub giant: Strategy,
    pub ticker: String,
}
