//! Boolean rule sets per strategy. Every comparison against NaN is false, so a missing
//! indicator never passes a threshold.

use crate::domain::indicator::{cols, IndicatorTable};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone)]
pub enum Rule {
    AtLeast(&'static str, f64),
    AtMost(&'static str, f64),
    Below(&'static str, f64),
    Flag(&'static str),
    /// `left >= factor * right`
    AtLeastTimes(&'static str, f64, &'static str),
    AnyOf(Vec<Rule>),
}

impl Rule {
    pub fn holds(&self, table: &IndicatorTable, row: usize) -> bool {
        match self {
            Rule::AtLeast(col, v) => table.value(col, row) >= *v,
            Rule::AtMost(col, v) => table.value(col, row) <= *v,
            Rule::Below(col, v) => table.value(col, row) < *v,
            Rule::Flag(col) => table.is(col, row),
            Rule::AtLeastTimes(left, factor, right) => {
                table.value(left, row) >= factor * table.value(right, row)
            }
            Rule::AnyOf(rules) => rules.iter().any(|r| r.holds(table, row)),
        }
    }
}

pub fn rules(strategy: Strategy) -> Vec<Rule> {
    use Rule::*;
    match strategy {
        Strategy::Graham => vec![
            AtLeast(cols::AVG_VOLUME_252, 200_000.0),
            AtLeast(cols::MARKET_CAP, 1e11),
            AnyOf(vec![
                AtLeast(cols::NCAV_TO_MARKET_CAP, 1.0),
                AtMost(cols::PB_RATIO, 1.2),
            ]),
            AtMost(cols::PE_RATIO, 10.0),
            AtLeast(cols::DIVIDEND_YIELD, 2.5),
            AtLeast(cols::ICR, 5.0),
            // Debt_Ratio is a percentage
            AtMost(cols::DEBT_RATIO, 50.0),
            AtLeast(cols::CURRENT_RATIO, 2.0),
            AtLeast(cols::QUICK_RATIO, 1.0),
            Flag(cols::PROFIT_CONSISTENCY),
            AtLeast(cols::EPS_CAGR, 5.0),
        ],
        Strategy::Fisher => vec![
            AtLeast(cols::AVG_VOLUME_252, 300_000.0),
            AtLeast(cols::MARKET_CAP, 1e11),
            Below(cols::PSR, 1.0),
            AtLeast(cols::FCF_YIELD, 5.0),
            AtMost(cols::PE_RATIO, 20.0),
            AtLeast(cols::SALES_CAGR, 12.0),
            AtLeast(cols::FCF_CAGR, 10.0),
            AtLeast(cols::ROE, 15.0),
            AtMost(cols::DEBT_TO_EQUITY, 100.0),
            AtLeast(cols::RS_RANK_EXCL_1M, 0.7),
            AtLeast(cols::RS_RANK_6M, 0.6),
        ],
        Strategy::Lynch => vec![
            AtLeast(cols::AVG_VOLUME_50, 500_000.0),
            AtLeast(cols::MARKET_CAP, 5e11),
            AtLeast(cols::REVENUE_YOY, 15.0),
            AtLeast(cols::EPS_YOY, 15.0),
            AtLeast(cols::EPS_CAGR, 12.0),
            Below(cols::PEG_RATIO, 1.0),
            AtMost(cols::PE_RATIO, 25.0),
            AtMost(cols::PB_RATIO, 3.0),
            AtMost(cols::DEBT_TO_EQUITY, 100.0),
            AtLeast(cols::ICR, 3.0),
            AtLeast(cols::ROE, 12.0),
            AtLeast(cols::OPERATING_MARGIN, 10.0),
            AtLeast(cols::RS_RANK_6M, 0.7),
            Flag(cols::NEAR_52W_HIGH),
        ],
        Strategy::Livermore => vec![
            AtLeast(cols::AVG_VOLUME_20, 200_000.0),
            AtLeast(cols::MARKET_CAP, 5e10),
            Flag(cols::ENTRY_SIGNAL),
        ],
        Strategy::Minervini => vec![
            AtLeast(cols::AVG_VOLUME_252, 100_000.0),
            AtLeast(cols::MARKET_CAP, 3e10),
            AtLeast(cols::REVENUE_YOY, 25.0),
            AtLeast(cols::EPS_YOY, 25.0),
            AtLeast(cols::NET_PROFIT_MARGIN, 15.0),
            AtLeast(cols::ROE, 20.0),
            AtMost(cols::DEBT_RATIO, 50.0),
            Flag(cols::ABOVE_50MA),
            Flag(cols::MA50_UPTREND_30D),
            Flag(cols::MA_ALIGNMENT),
            Flag(cols::NEAR_52W_HIGH),
            Flag(cols::ABOVE_52W_LOW),
            AtLeast(cols::RS_RANK_EXCL_1W, 0.7),
            AtMost(cols::VOLATILITY_35D, 15.0),
            Flag(cols::BASE_HIGH),
            Flag(cols::BASE_3_6M),
            Flag(cols::TR_2DOWN),
            Flag(cols::CORRECTION_8_35),
            Flag(cols::VCP),
        ],
        Strategy::ONeil => vec![
            AtLeast(cols::AVG_VOLUME_50, 200_000.0),
            AtLeast(cols::MARKET_CAP, 1e11),
            AtLeast(cols::EPS_Q_YOY, 25.0),
            AtLeast(cols::EPS_YOY, 20.0),
            AtLeast(cols::EPS_CAGR, 15.0),
            Flag(cols::NEAR_52W_HIGH),
            AtLeastTimes(cols::VOLUME, 1.5, cols::AVG_VOLUME_50),
            AtLeast(cols::RS_RANK_6M, 0.8),
            Flag(cols::ABOVE_200MA),
            Flag(cols::MA50_UPTREND_20D),
        ],
    }
}

/// Pick flags for every row of one ticker.
pub fn evaluate(strategy: Strategy, table: &IndicatorTable) -> Vec<bool> {
    let rules = rules(strategy);
    (0..table.len())
        .map(|row| rules.iter().all(|r| r.holds(table, row)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn one_row(numeric: &[(&str, f64)], flags: &[&str]) -> IndicatorTable {
        let mut t = IndicatorTable::new(vec![NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()]);
        for (name, v) in numeric {
            t.set_numeric(name, vec![*v]).unwrap();
        }
        for name in flags {
            t.set_flag(name, vec![true]).unwrap();
        }
        t
    }

    #[test]
    fn livermore_needs_liquidity_size_and_breakout() {
        let ok = one_row(
            &[(cols::AVG_VOLUME_20, 250_000.0), (cols::MARKET_CAP, 6e10)],
            &[cols::ENTRY_SIGNAL],
        );
        assert_eq!(evaluate(Strategy::Livermore, &ok), vec![true]);

        let small = one_row(
            &[(cols::AVG_VOLUME_20, 250_000.0), (cols::MARKET_CAP, 4e10)],
            &[cols::ENTRY_SIGNAL],
        );
        assert_eq!(evaluate(Strategy::Livermore, &small), vec![false]);
    }

    #[test]
    fn missing_values_never_pass() {
        let t = one_row(&[(cols::AVG_VOLUME_20, f64::NAN), (cols::MARKET_CAP, 6e10)], &[cols::ENTRY_SIGNAL]);
        assert_eq!(evaluate(Strategy::Livermore, &t), vec![false]);
        assert!(!Rule::AtMost(cols::PE_RATIO, 10.0).holds(&t, 0));
    }

    #[test]
    fn graham_safety_margin_is_either_or() {
        let rule = &rules(Strategy::Graham)[2];
        assert!(rule.holds(&one_row(&[(cols::PB_RATIO, 1.0)], &[]), 0));
        assert!(rule.holds(&one_row(&[(cols::NCAV_TO_MARKET_CAP, 1.5)], &[]), 0));
        assert!(!rule.holds(&one_row(&[(cols::PB_RATIO, 2.0), (cols::NCAV_TO_MARKET_CAP, 0.2)], &[]), 0));
    }

    /// One threshold: `Min`/`Max` are inclusive, `Under` is strict, `Set` is a flag.
    #[derive(Clone, Copy)]
    enum Edge {
        Min(&'static str, f64),
        Max(&'static str, f64),
        Under(&'static str, f64),
        Set(&'static str),
    }

    fn nudge(v: f64) -> f64 {
        v.abs().max(1.0) * 1e-9
    }

    /// A row sitting on every edge; `broken` pushes that one edge just past its threshold.
    fn edge_row(edges: &[Edge], broken: Option<usize>) -> IndicatorTable {
        let mut t = IndicatorTable::new(vec![NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()]);
        for (i, edge) in edges.iter().enumerate() {
            let off = broken == Some(i);
            let set = match *edge {
                Edge::Min(col, v) => t.set_numeric(col, vec![if off { v - nudge(v) } else { v }]),
                Edge::Max(col, v) => t.set_numeric(col, vec![if off { v + nudge(v) } else { v }]),
                Edge::Under(col, v) => t.set_numeric(col, vec![if off { v } else { v - nudge(v) }]),
                Edge::Set(col) => t.set_flag(col, vec![!off]),
            };
            set.unwrap();
        }
        t
    }

    fn check_edges(strategy: Strategy, edges: &[Edge]) {
        assert_eq!(evaluate(strategy, &edge_row(edges, None)), vec![true], "{strategy} on its edges");
        for (i, edge) in edges.iter().enumerate() {
            let col = match *edge {
                Edge::Min(c, _) | Edge::Max(c, _) | Edge::Under(c, _) | Edge::Set(c) => c,
            };
            assert_eq!(
                evaluate(strategy, &edge_row(edges, Some(i))),
                vec![false],
                "{strategy} should fail past {col}"
            );
        }
    }

    #[test]
    fn graham_thresholds() {
        use Edge::*;
        // NCAV is missing, so the safety margin rests on PB alone
        check_edges(
            Strategy::Graham,
            &[
                Min(cols::AVG_VOLUME_252, 200_000.0),
                Min(cols::MARKET_CAP, 1e11),
                Max(cols::PB_RATIO, 1.2),
                Max(cols::PE_RATIO, 10.0),
                Min(cols::DIVIDEND_YIELD, 2.5),
                Min(cols::ICR, 5.0),
                Max(cols::DEBT_RATIO, 50.0),
                Min(cols::CURRENT_RATIO, 2.0),
                Min(cols::QUICK_RATIO, 1.0),
                Set(cols::PROFIT_CONSISTENCY),
                Min(cols::EPS_CAGR, 5.0),
            ],
        );
    }

    #[test]
    fn fisher_thresholds() {
        use Edge::*;
        check_edges(
            Strategy::Fisher,
            &[
                Min(cols::AVG_VOLUME_252, 300_000.0),
                Min(cols::MARKET_CAP, 1e11),
                Under(cols::PSR, 1.0),
                Min(cols::FCF_YIELD, 5.0),
                Max(cols::PE_RATIO, 20.0),
                Min(cols::SALES_CAGR, 12.0),
                Min(cols::FCF_CAGR, 10.0),
                Min(cols::ROE, 15.0),
                Max(cols::DEBT_TO_EQUITY, 100.0),
                Min(cols::RS_RANK_EXCL_1M, 0.7),
                Min(cols::RS_RANK_6M, 0.6),
            ],
        );
    }

    #[test]
    fn lynch_thresholds() {
        use Edge::*;
        check_edges(
            Strategy::Lynch,
            &[
                Min(cols::AVG_VOLUME_50, 500_000.0),
                Min(cols::MARKET_CAP, 5e11),
                Min(cols::REVENUE_YOY, 15.0),
                Min(cols::EPS_YOY, 15.0),
                Min(cols::EPS_CAGR, 12.0),
                Under(cols::PEG_RATIO, 1.0),
                Max(cols::PE_RATIO, 25.0),
                Max(cols::PB_RATIO, 3.0),
                Max(cols::DEBT_TO_EQUITY, 100.0),
                Min(cols::ICR, 3.0),
                Min(cols::ROE, 12.0),
                Min(cols::OPERATING_MARGIN, 10.0),
                Min(cols::RS_RANK_6M, 0.7),
                Set(cols::NEAR_52W_HIGH),
            ],
        );
    }

    #[test]
    fn livermore_thresholds() {
        use Edge::*;
        check_edges(
            Strategy::Livermore,
            &[
                Min(cols::AVG_VOLUME_20, 200_000.0),
                Min(cols::MARKET_CAP, 5e10),
                Set(cols::ENTRY_SIGNAL),
            ],
        );
    }

    #[test]
    fn minervini_thresholds() {
        use Edge::*;
        check_edges(
            Strategy::Minervini,
            &[
                Min(cols::AVG_VOLUME_252, 100_000.0),
                Min(cols::MARKET_CAP, 3e10),
                Min(cols::REVENUE_YOY, 25.0),
                Min(cols::EPS_YOY, 25.0),
                Min(cols::NET_PROFIT_MARGIN, 15.0),
                Min(cols::ROE, 20.0),
                Max(cols::DEBT_RATIO, 50.0),
                Set(cols::ABOVE_50MA),
                Set(cols::MA50_UPTREND_30D),
                Set(cols::MA_ALIGNMENT),
                Set(cols::NEAR_52W_HIGH),
                Set(cols::ABOVE_52W_LOW),
                Min(cols::RS_RANK_EXCL_1W, 0.7),
                Max(cols::VOLATILITY_35D, 15.0),
                Set(cols::BASE_HIGH),
                Set(cols::BASE_3_6M),
                Set(cols::TR_2DOWN),
                Set(cols::CORRECTION_8_35),
                Set(cols::VCP),
            ],
        );
    }

    #[test]
    fn oneil_thresholds() {
        use Edge::*;
        // volume sits exactly on 1.5x the 50-day average
        check_edges(
            Strategy::ONeil,
            &[
                Min(cols::AVG_VOLUME_50, 200_000.0),
                Min(cols::MARKET_CAP, 1e11),
                Min(cols::EPS_Q_YOY, 25.0),
                Min(cols::EPS_YOY, 20.0),
                Min(cols::EPS_CAGR, 15.0),
                Set(cols::NEAR_52W_HIGH),
                Min(cols::VOLUME, 300_000.0),
                Min(cols::RS_RANK_6M, 0.8),
                Set(cols::ABOVE_200MA),
                Set(cols::MA50_UPTREND_20D),
            ],
        );
    }

    #[test]
    fn oneil_volume_surge_compares_columns() {
        let rule = Rule::AtLeastTimes(cols::VOLUME, 1.5, cols::AVG_VOLUME_50);
        assert!(rule.holds(&one_row(&[(cols::VOLUME, 150.0), (cols::AVG_VOLUME_50, 100.0)], &[]), 0));
        assert!(!rule.holds(&one_row(&[(cols::VOLUME, 149.0), (cols::AVG_VOLUME_50, 100.0)], &[]), 0));
    }
}
