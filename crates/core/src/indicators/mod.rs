//! Per-ticker indicator calculation: one row per trading date.

pub mod fundamentals;
pub mod rolling;
pub mod technicals;

use crate::domain::indicator::{cols, IndicatorTable};
use crate::domain::statement::TickerData;
use anyhow::ensure;

/// Relative-strength columns are created empty here and filled by the cross-sectional ranker.
pub const RS_COLUMNS: [&str; 3] = [cols::RS_RANK_EXCL_1W, cols::RS_RANK_EXCL_1M, cols::RS_RANK_6M];

pub fn calculate_indicators(data: &TickerData) -> anyhow::Result<IndicatorTable> {
    ensure!(!data.history.is_empty(), "no price history for {}", data.ticker);

    let mut table = IndicatorTable::new(data.history.dates());
    let closes = data.history.closes();
    table.set_numeric(cols::CLOSE, closes.clone())?;
    table.set_numeric(cols::VOLUME, data.history.volumes())?;

    technicals::fill(&mut table, &data.history)?;
    fundamentals::fill(&mut table, data, &closes)?;

    for name in RS_COLUMNS {
        table.set_numeric(name, vec![f64::NAN; table.len()])?;
    }

    tracing::debug!(
        ticker = %data.ticker,
        rows = table.len(),
        "indicators calculated"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::{DailyBar, PriceHistory};
    use crate::domain::statement::StatementTable;
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table(periods: &[&str], items: &[(&str, Vec<f64>)]) -> StatementTable {
        let mut m = BTreeMap::new();
        for (name, values) in items {
            m.insert(name.to_string(), values.clone());
        }
        StatementTable::new(periods.iter().map(|p| d(p)).collect(), m).unwrap()
    }

    fn sample() -> TickerData {
        let start = d("2023-01-02");
        let bars = (0..500)
            .map(|i| DailyBar {
                date: start + Duration::days(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + (i % 7) as f64,
                volume: 1000.0,
                dividends: 0.0,
            })
            .collect();

        let quarters = [
            "2022-03-31", "2022-06-30", "2022-09-30", "2022-12-31",
            "2023-03-31", "2023-06-30", "2023-09-30", "2023-12-31",
            "2024-03-31", "2024-06-30",
        ];
        let qf = table(
            &quarters,
            &[
                ("Net Income", (1..=10).map(|i| i as f64 * 10.0).collect()),
                ("Total Revenue", (1..=10).map(|i| i as f64 * 100.0).collect()),
                ("Operating Income", vec![20.0; 10]),
                ("EBIT", vec![30.0; 10]),
                ("Interest Expense", vec![-3.0; 10]),
            ],
        );
        let qb = table(
            &quarters,
            &[
                ("Ordinary Shares Number", vec![10.0; 10]),
                ("Total Current Assets", vec![500.0; 10]),
                ("Total Current Liabilities", vec![250.0; 10]),
                ("Total Liabilities Net Minority Interest", vec![400.0; 10]),
                ("Total Assets", vec![1000.0; 10]),
                ("Common Stock Equity", (1..=10).map(|i| 500.0 + i as f64).collect()),
                ("Total Debt", vec![100.0; 10]),
            ],
        );
        let qc = table(
            &quarters,
            &[
                ("Operating Cash Flow", vec![50.0; 10]),
                ("Capital Expenditure", vec![-10.0; 10]),
            ],
        );
        let years = ["2020-12-31", "2021-12-31", "2022-12-31", "2023-12-31"];
        let af = table(
            &years,
            &[
                ("Net Income", vec![100.0, 110.0, 121.0, 133.1]),
                ("Total Revenue", vec![1000.0, 1100.0, 1210.0, 1331.0]),
            ],
        );
        let ab = table(&years, &[("Ordinary Shares Number", vec![10.0; 4])]);
        let ac = table(
            &years,
            &[
                ("Operating Cash Flow", vec![100.0, 120.0, 144.0, 172.8]),
                ("Capital Expenditure", vec![0.0; 4]),
            ],
        );

        TickerData {
            ticker: "005930.KS".to_string(),
            history: PriceHistory::from_bars(bars),
            financials: af,
            quarterly_financials: qf,
            balance_sheet: ab,
            quarterly_balance_sheet: qb,
            cash_flow: ac,
            quarterly_cash_flow: qc,
        }
    }

    #[test]
    fn rows_match_price_dates() {
        let data = sample();
        let t = calculate_indicators(&data).unwrap();
        assert_eq!(t.dates(), data.history.dates().as_slice());
        for name in RS_COLUMNS {
            assert!(t.numeric(name).unwrap().iter().all(|v| v.is_nan()));
        }
    }

    #[test]
    fn statement_ratios_are_constant_between_period_ends() {
        let data = sample();
        let t = calculate_indicators(&data).unwrap();
        let mut ends: Vec<NaiveDate> = data
            .quarterly_financials
            .periods()
            .iter()
            .chain(data.financials.periods())
            .chain(data.cash_flow.periods())
            .copied()
            .collect();
        ends.sort();

        let pure = [
            cols::DEBT_RATIO,
            cols::CURRENT_RATIO,
            cols::QUICK_RATIO,
            cols::ICR,
            cols::ROE,
            cols::DEBT_TO_EQUITY,
            cols::REVENUE_YOY,
            cols::EPS_YOY,
            cols::EPS_CAGR,
            cols::SALES_CAGR,
            cols::FCF_CAGR,
        ];
        let dates = t.dates();
        for r in 1..t.len() {
            let crossed = ends.iter().any(|e| dates[r - 1] < *e && *e <= dates[r]);
            if crossed {
                continue;
            }
            for name in pure {
                let (a, b) = (t.value(name, r - 1), t.value(name, r));
                assert!(a == b || (a.is_nan() && b.is_nan()), "{name} changed at {}", dates[r]);
            }
        }
    }

    #[test]
    fn ratios_use_trailing_four_quarters() {
        let data = sample();
        let t = calculate_indicators(&data).unwrap();
        let r = t.row_of(d("2023-05-15")).unwrap();

        // as of 2023-03-31 (index 4): TTM net income = 20+30+40+50, previous window is incomplete
        assert!((t.value(cols::ROE, r) - 140.0 / 505.0 * 100.0).abs() < 1e-9);
        assert!(t.value(cols::EPS_YOY, r).is_nan());
        assert_eq!(t.value(cols::DEBT_RATIO, r), 40.0);
        assert_eq!(t.value(cols::CURRENT_RATIO, r), 2.0);
        assert_eq!(t.value(cols::ICR, r), 10.0);
        assert_eq!(t.value(cols::MARKET_CAP, r), t.value(cols::CLOSE, r) * 10.0);

        // EPS_CAGR as of fiscal 2022: three points growing 10% a year
        assert!((t.value(cols::EPS_CAGR, r) - 10.0).abs() < 1e-9);
        assert!((t.value(cols::FCF_CAGR, r) - 20.0).abs() < 1e-9);
        assert!(t.is(cols::PROFIT_CONSISTENCY, r));

        // as of 2024-03-31 (index 8): both windows are full
        let late = t.row_of(d("2024-04-15")).unwrap();
        let ni_ttm = 60.0 + 70.0 + 80.0 + 90.0;
        let ni_prev = 20.0 + 30.0 + 40.0 + 50.0;
        assert!((t.value(cols::EPS_YOY, late) - (ni_ttm / ni_prev - 1.0) * 100.0).abs() < 1e-9);
        assert!((t.value(cols::EPS_Q_YOY, late) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn dates_before_first_statement_are_undefined() {
        let mut data = sample();
        let mut m = BTreeMap::new();
        m.insert("Total Assets".to_string(), vec![10.0]);
        data.quarterly_balance_sheet = StatementTable::new(vec![d("2023-06-30")], m).unwrap();
        let t = calculate_indicators(&data).unwrap();
        assert!(t.value(cols::ROE, 0).is_nan());
        assert!(t.value(cols::DEBT_RATIO, 0).is_nan());
    }
}
