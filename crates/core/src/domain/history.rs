use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub dividends: f64,
}

/// Daily OHLCV series for one ticker, ascending by date with unique dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    bars: Vec<DailyBar>,
}

impl PriceHistory {
    /// Sorts by date and keeps the last bar seen for a duplicated date.
    pub fn from_bars(bars: Vec<DailyBar>) -> Self {
        Self {
            bars: sort_dedup_keep_last(bars),
        }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn dividends(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.dividends).collect()
    }

    /// Appends newer bars. A bar for an already stored date replaces the stored one.
    pub fn merge(&mut self, newer: Vec<DailyBar>) -> usize {
        let before = self.bars.len();
        let mut all = std::mem::take(&mut self.bars);
        all.extend(newer);
        self.bars = sort_dedup_keep_last(all);
        self.bars.len().saturating_sub(before)
    }

    /// Close-to-close change in percent, NaN for the first bar.
    pub fn percent_changes(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.bars.len());
        for (i, bar) in self.bars.iter().enumerate() {
            let pct = match i.checked_sub(1).map(|p| self.bars[p].close) {
                Some(prev) if prev > 0.0 => (bar.close / prev - 1.0) * 100.0,
                _ => f64::NAN,
            };
            out.push(pct);
        }
        out
    }
}

fn sort_dedup_keep_last(mut bars: Vec<DailyBar>) -> Vec<DailyBar> {
    // Stable sort keeps arrival order within a date, so the last one is the newest.
    bars.sort_by_key(|b| b.date);
    let mut out: Vec<DailyBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}
