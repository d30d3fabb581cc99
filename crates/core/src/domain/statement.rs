//! Financial statement tables and the as-of join used to align them with daily prices.

use super::history::PriceHistory;
use anyhow::ensure;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Line item names, most common spelling first. Providers are not consistent about
/// `Capital Expenditure` vs `Capital Expenditures` and similar.
pub mod items {
    pub const NET_INCOME: &[&str] = &["Net Income", "Net Income Common Stockholders"];
    pub const TOTAL_REVENUE: &[&str] = &["Total Revenue", "Operating Revenue"];
    pub const OPERATING_INCOME: &[&str] = &["Operating Income"];
    pub const EBIT: &[&str] = &["EBIT"];
    pub const INTEREST_EXPENSE: &[&str] = &["Interest Expense", "Interest Expense Non Operating"];
    pub const INTEREST_INCOME: &[&str] = &["Interest Income"];
    pub const NET_INTEREST_INCOME: &[&str] = &["Net Interest Income"];

    pub const SHARES: &[&str] = &["Ordinary Shares Number", "Share Issued"];
    pub const CURRENT_ASSETS: &[&str] = &["Total Current Assets", "Current Assets"];
    pub const CURRENT_LIABILITIES: &[&str] = &["Total Current Liabilities", "Current Liabilities"];
    pub const TOTAL_LIABILITIES: &[&str] = &[
        "Total Liabilities Net Minority Interest",
        "Total Liabilities",
    ];
    pub const TOTAL_ASSETS: &[&str] = &["Total Assets"];
    pub const EQUITY: &[&str] = &["Common Stock Equity", "Stockholders Equity"];
    pub const TOTAL_DEBT: &[&str] = &["Total Debt"];
    pub const INVENTORY: &[&str] = &["Inventory"];

    pub const OPERATING_CASH_FLOW: &[&str] = &["Operating Cash Flow"];
    pub const CAPEX: &[&str] = &["Capital Expenditures", "Capital Expenditure"];
}

/// Period-end dates by named line items. Missing values are NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementTable {
    periods: Vec<NaiveDate>,
    items: BTreeMap<String, Vec<f64>>,
}

impl StatementTable {
    /// Builds a table sorted by period end; a duplicated period keeps its last row.
    pub fn new(periods: Vec<NaiveDate>, items: BTreeMap<String, Vec<f64>>) -> anyhow::Result<Self> {
        for (name, values) in &items {
            ensure!(
                values.len() == periods.len(),
                "line item {name:?} has {} values for {} periods",
                values.len(),
                periods.len()
            );
        }

        let mut order: Vec<usize> = (0..periods.len()).collect();
        order.sort_by_key(|&i| (periods[i], i));
        let mut keep: Vec<usize> = Vec::with_capacity(order.len());
        for i in order {
            match keep.last_mut() {
                Some(last) if periods[*last] == periods[i] => *last = i,
                _ => keep.push(i),
            }
        }

        let sorted_periods = keep.iter().map(|&i| periods[i]).collect();
        let sorted_items = items
            .into_iter()
            .map(|(name, values)| (name, keep.iter().map(|&i| values[i]).collect()))
            .collect();

        Ok(Self {
            periods: sorted_periods,
            items: sorted_items,
        })
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn item(&self, name: &str) -> Option<&[f64]> {
        self.items.get(name).map(Vec::as_slice)
    }

    /// First line item present under any of `names`.
    pub fn item_any(&self, names: &[&str]) -> Option<&[f64]> {
        names.iter().find_map(|n| self.item(n))
    }

    /// Value of a line item at a period index, NaN if the item or index is missing.
    pub fn value(&self, names: &[&str], idx: usize) -> f64 {
        self.item_any(names)
            .and_then(|v| v.get(idx).copied())
            .unwrap_or(f64::NAN)
    }

    /// Sum of the `n` periods ending at `end` (inclusive). NaN unless all `n` are present.
    pub fn trailing_sum(&self, names: &[&str], end: usize, n: usize) -> f64 {
        let Some(values) = self.item_any(names) else {
            return f64::NAN;
        };
        if n == 0 || end + 1 < n || end >= values.len() {
            return f64::NAN;
        }
        values[end + 1 - n..=end].iter().sum()
    }

    /// For each target date, the index of the last period ending on or before it.
    ///
    /// Dates before the first period map to `None`; values are never pulled back in time.
    /// `dates` must be ascending.
    pub fn asof_indices(&self, dates: &[NaiveDate]) -> Vec<Option<usize>> {
        let mut out = Vec::with_capacity(dates.len());
        let mut cursor: Option<usize> = None;
        let mut next = 0usize;
        for &date in dates {
            while next < self.periods.len() && self.periods[next] <= date {
                cursor = Some(next);
                next += 1;
            }
            out.push(cursor);
        }
        out
    }
}

/// Everything the indicator calculator needs for one ticker.
#[derive(Debug, Clone, Default)]
pub struct TickerData {
    pub ticker: String,
    pub history: PriceHistory,
    pub financials: StatementTable,
    pub quarterly_financials: StatementTable,
    pub balance_sheet: StatementTable,
    pub quarterly_balance_sheet: StatementTable,
    pub cash_flow: StatementTable,
    pub quarterly_cash_flow: StatementTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table() -> StatementTable {
        let mut cols = BTreeMap::new();
        cols.insert("Net Income".to_string(), vec![30.0, 10.0, 20.0, 40.0]);
        StatementTable::new(
            vec![d("2024-09-30"), d("2024-03-31"), d("2024-06-30"), d("2024-12-31")],
            cols,
        )
        .unwrap()
    }

    #[test]
    fn sorts_periods_with_values() {
        let t = table();
        assert_eq!(t.periods()[0], d("2024-03-31"));
        assert_eq!(t.item("Net Income").unwrap(), &[10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn duplicate_period_keeps_last_row() {
        let mut cols = BTreeMap::new();
        cols.insert("EBIT".to_string(), vec![1.0, 2.0]);
        let t = StatementTable::new(vec![d("2024-03-31"), d("2024-03-31")], cols).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.value(items::EBIT, 0), 2.0);
    }

    #[test]
    fn rejects_ragged_items() {
        let mut cols = BTreeMap::new();
        cols.insert("EBIT".to_string(), vec![1.0]);
        assert!(StatementTable::new(vec![d("2024-03-31"), d("2024-06-30")], cols).is_err());
    }

    #[test]
    fn asof_carries_forward_and_never_back_fills() {
        let t = table();
        let dates = [d("2024-01-02"), d("2024-03-31"), d("2024-05-15"), d("2025-02-01")];
        assert_eq!(t.asof_indices(&dates), vec![None, Some(0), Some(0), Some(3)]);
    }

    #[test]
    fn trailing_sum_requires_full_window() {
        let t = table();
        assert_eq!(t.trailing_sum(items::NET_INCOME, 3, 4), 100.0);
        assert!(t.trailing_sum(items::NET_INCOME, 2, 4).is_nan());
        assert!(t.trailing_sum(items::TOTAL_REVENUE, 3, 4).is_nan());
    }

    #[test]
    fn alias_lookup_falls_through() {
        let mut cols = BTreeMap::new();
        cols.insert("Capital Expenditure".to_string(), vec![-5.0]);
        let t = StatementTable::new(vec![d("2024-03-31")], cols).unwrap();
        assert_eq!(t.value(items::CAPEX, 0), -5.0);
    }
}
