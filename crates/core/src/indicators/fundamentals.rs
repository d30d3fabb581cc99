//! Statement-derived ratios, aligned to trading dates through as-of indices.
//!
//! Every pure statement ratio here is a function of as-of period indices only, so it stays
//! constant between two consecutive statement period ends.

use super::rolling::{pct_change, ratio};
use crate::domain::indicator::cols;
use crate::domain::indicator::IndicatorTable;
use crate::domain::statement::{items, StatementTable, TickerData};

const EPS_CAGR_YEARS: usize = 5;
const SALES_CAGR_YEARS: usize = 5;
const FCF_CAGR_YEARS: usize = 3;
const PROFIT_CONSISTENCY_YEARS: usize = 5;
const PROFIT_CONSISTENCY_MIN_YEARS: usize = 3;

/// Compound annual growth over the last `years` intervals ending at `end`, shortened to what
/// is available. NaN unless both endpoints are positive and at least one interval exists.
pub fn cagr(series: &[f64], end: usize, years: usize) -> f64 {
    if end >= series.len() {
        return f64::NAN;
    }
    let start = end.saturating_sub(years);
    let n = end - start;
    let (first, last) = (series[start], series[end]);
    if n == 0 || !first.is_finite() || !last.is_finite() || first <= 0.0 || last <= 0.0 {
        return f64::NAN;
    }
    ((last / first).powf(1.0 / n as f64) - 1.0) * 100.0
}

/// Free cash flow per period: operating cash flow minus the absolute capital expenditure.
fn free_cash_flow(table: &StatementTable) -> Vec<f64> {
    (0..table.len())
        .map(|i| {
            let ocf = table.value(items::OPERATING_CASH_FLOW, i);
            let capex = table.value(items::CAPEX, i);
            let capex = if capex.is_nan() { 0.0 } else { capex.abs() };
            ocf - capex
        })
        .collect()
}

fn ttm(table: &StatementTable, names: &[&str], idx: Option<usize>) -> f64 {
    idx.map_or(f64::NAN, |i| table.trailing_sum(names, i, 4))
}

fn prev_ttm(table: &StatementTable, names: &[&str], idx: Option<usize>) -> f64 {
    match idx {
        Some(i) if i >= 4 => table.trailing_sum(names, i - 4, 4),
        _ => f64::NAN,
    }
}

fn at(table: &StatementTable, names: &[&str], idx: Option<usize>) -> f64 {
    idx.map_or(f64::NAN, |i| table.value(names, i))
}

/// Shares outstanding per trading date: the quarterly balance sheet, then the annual one.
fn shares_asof(data: &TickerData, dates: &[chrono::NaiveDate]) -> Vec<f64> {
    let q = data.quarterly_balance_sheet.asof_indices(dates);
    let a = data.balance_sheet.asof_indices(dates);
    q.iter()
        .zip(&a)
        .map(|(&qi, &ai)| {
            let v = at(&data.quarterly_balance_sheet, items::SHARES, qi);
            if v.is_finite() {
                v
            } else {
                at(&data.balance_sheet, items::SHARES, ai)
            }
        })
        .collect()
}

pub fn fill(table: &mut IndicatorTable, data: &TickerData, closes: &[f64]) -> anyhow::Result<()> {
    let dates = table.dates().to_vec();
    let n = dates.len();

    let qf = &data.quarterly_financials;
    let qb = &data.quarterly_balance_sheet;
    let qc = &data.quarterly_cash_flow;
    let af = &data.financials;
    let ac = &data.cash_flow;

    let qf_idx = qf.asof_indices(&dates);
    let qb_idx = qb.asof_indices(&dates);
    let qc_idx = qc.asof_indices(&dates);
    let af_idx = af.asof_indices(&dates);
    let ac_idx = ac.asof_indices(&dates);

    let shares = shares_asof(data, &dates);
    let market_cap: Vec<f64> = closes
        .iter()
        .zip(&shares)
        .map(|(&c, &s)| if c.is_finite() && s > 0.0 { c * s } else { f64::NAN })
        .collect();

    // Annual EPS uses the shares reported as of each fiscal year end.
    let annual_shares = shares_asof(data, af.periods());
    let annual_eps: Vec<f64> = (0..af.len())
        .map(|i| ratio(af.value(items::NET_INCOME, i), annual_shares[i]))
        .collect();
    let annual_revenue: Vec<f64> = (0..af.len())
        .map(|i| af.value(items::TOTAL_REVENUE, i))
        .collect();
    let annual_net_income: Vec<f64> = (0..af.len())
        .map(|i| af.value(items::NET_INCOME, i))
        .collect();
    let annual_fcf = free_cash_flow(ac);
    let quarterly_fcf = free_cash_flow(qc);

    let mut c = Columns::new(n);
    for r in 0..n {
        let mc = market_cap[r];
        let (fi, bi, ci) = (qf_idx[r], qb_idx[r], qc_idx[r]);

        let ni_ttm = ttm(qf, items::NET_INCOME, fi);
        let ni_prev = prev_ttm(qf, items::NET_INCOME, fi);
        let rev_ttm = ttm(qf, items::TOTAL_REVENUE, fi);
        let rev_prev = prev_ttm(qf, items::TOTAL_REVENUE, fi);
        let op_ttm = ttm(qf, items::OPERATING_INCOME, fi);
        let ebit_ttm = ttm(qf, items::EBIT, fi);
        let int_ttm = ttm(qf, items::INTEREST_EXPENSE, fi);

        let current_assets = at(qb, items::CURRENT_ASSETS, bi);
        let current_liabilities = at(qb, items::CURRENT_LIABILITIES, bi);
        let total_liabilities = at(qb, items::TOTAL_LIABILITIES, bi);
        let total_assets = at(qb, items::TOTAL_ASSETS, bi);
        let equity = at(qb, items::EQUITY, bi);
        let total_debt = at(qb, items::TOTAL_DEBT, bi);
        let inventory = at(qb, items::INVENTORY, bi);
        let inventory = if inventory.is_nan() { 0.0 } else { inventory };

        let fcf_ttm = match ci {
            Some(i) if i >= 3 => quarterly_fcf[i - 3..=i].iter().sum(),
            _ => f64::NAN,
        };

        let pe = ratio(mc, ni_ttm);
        let eps_yoy = pct_change(ni_prev, ni_ttm);
        let eps_q_yoy = match fi {
            Some(i) if i >= 4 => pct_change(qf.value(items::NET_INCOME, i - 4), qf.value(items::NET_INCOME, i)),
            _ => f64::NAN,
        };

        c.market_cap[r] = mc;
        c.ncav[r] = ratio(current_assets - total_liabilities, mc);
        c.pb[r] = ratio(mc, equity);
        c.pe[r] = pe;
        c.peg[r] = ratio(pe, eps_yoy);
        c.icr[r] = if int_ttm.is_finite() && int_ttm != 0.0 {
            ebit_ttm / int_ttm.abs()
        } else {
            f64::NAN
        };
        c.debt_ratio[r] = ratio(total_liabilities, total_assets) * 100.0;
        c.current_ratio[r] = ratio(current_assets, current_liabilities);
        c.quick_ratio[r] = ratio(current_assets - inventory, current_liabilities);
        c.psr[r] = ratio(mc, rev_ttm);
        c.fcf_yield[r] = ratio(fcf_ttm, mc) * 100.0;
        c.roe[r] = ratio(ni_ttm, equity) * 100.0;
        c.debt_to_equity[r] = ratio(total_debt, equity) * 100.0;
        c.operating_margin[r] = ratio(op_ttm, rev_ttm) * 100.0;
        c.net_margin[r] = ratio(ni_ttm, rev_ttm) * 100.0;
        c.revenue_yoy[r] = pct_change(rev_prev, rev_ttm);
        c.eps_yoy[r] = eps_yoy;
        c.eps_q_yoy[r] = eps_q_yoy;

        if let Some(i) = af_idx[r] {
            c.eps_cagr[r] = cagr(&annual_eps, i, EPS_CAGR_YEARS);
            c.sales_cagr[r] = cagr(&annual_revenue, i, SALES_CAGR_YEARS);
            let start = (i + 1).saturating_sub(PROFIT_CONSISTENCY_YEARS);
            let window = &annual_net_income[start..=i];
            c.profit_consistency[r] =
                window.len() >= PROFIT_CONSISTENCY_MIN_YEARS && window.iter().all(|&v| v > 0.0);
        }
        if let Some(i) = ac_idx[r] {
            c.fcf_cagr[r] = cagr(&annual_fcf, i, FCF_CAGR_YEARS);
        }
    }

    c.write(table)
}

struct Columns {
    market_cap: Vec<f64>,
    ncav: Vec<f64>,
    pb: Vec<f64>,
    pe: Vec<f64>,
    peg: Vec<f64>,
    icr: Vec<f64>,
    debt_ratio: Vec<f64>,
    current_ratio: Vec<f64>,
    quick_ratio: Vec<f64>,
    eps_cagr: Vec<f64>,
    psr: Vec<f64>,
    fcf_yield: Vec<f64>,
    sales_cagr: Vec<f64>,
    fcf_cagr: Vec<f64>,
    roe: Vec<f64>,
    debt_to_equity: Vec<f64>,
    operating_margin: Vec<f64>,
    net_margin: Vec<f64>,
    revenue_yoy: Vec<f64>,
    eps_yoy: Vec<f64>,
    eps_q_yoy: Vec<f64>,
    profit_consistency: Vec<bool>,
}

impl Columns {
    fn new(n: usize) -> Self {
        let nan = vec![f64::NAN; n];
        Self {
            market_cap: nan.clone(),
            ncav: nan.clone(),
            pb: nan.clone(),
            pe: nan.clone(),
            peg: nan.clone(),
            icr: nan.clone(),
            debt_ratio: nan.clone(),
            current_ratio: nan.clone(),
            quick_ratio: nan.clone(),
            eps_cagr: nan.clone(),
            psr: nan.clone(),
            fcf_yield: nan.clone(),
            sales_cagr: nan.clone(),
            fcf_cagr: nan.clone(),
            roe: nan.clone(),
            debt_to_equity: nan.clone(),
            operating_margin: nan.clone(),
            net_margin: nan.clone(),
            revenue_yoy: nan.clone(),
            eps_yoy: nan.clone(),
            eps_q_yoy: nan,
            profit_consistency: vec![false; n],
        }
    }

    fn write(self, t: &mut IndicatorTable) -> anyhow::Result<()> {
        t.set_numeric(cols::MARKET_CAP, self.market_cap)?;
        t.set_numeric(cols::NCAV_TO_MARKET_CAP, self.ncav)?;
        t.set_numeric(cols::PB_RATIO, self.pb)?;
        t.set_numeric(cols::PE_RATIO, self.pe)?;
        t.set_numeric(cols::PEG_RATIO, self.peg)?;
        t.set_numeric(cols::ICR, self.icr)?;
        t.set_numeric(cols::DEBT_RATIO, self.debt_ratio)?;
        t.set_numeric(cols::CURRENT_RATIO, self.current_ratio)?;
        t.set_numeric(cols::QUICK_RATIO, self.quick_ratio)?;
        t.set_numeric(cols::EPS_CAGR, self.eps_cagr)?;
        t.set_numeric(cols::PSR, self.psr)?;
        t.set_numeric(cols::FCF_YIELD, self.fcf_yield)?;
        t.set_numeric(cols::SALES_CAGR, self.sales_cagr)?;
        t.set_numeric(cols::FCF_CAGR, self.fcf_cagr)?;
        t.set_numeric(cols::ROE, self.roe)?;
        t.set_numeric(cols::DEBT_TO_EQUITY, self.debt_to_equity)?;
        t.set_numeric(cols::OPERATING_MARGIN, self.operating_margin)?;
        t.set_numeric(cols::NET_PROFIT_MARGIN, self.net_margin)?;
        t.set_numeric(cols::REVENUE_YOY, self.revenue_yoy)?;
        t.set_numeric(cols::EPS_YOY, self.eps_yoy)?;
        t.set_numeric(cols::EPS_Q_YOY, self.eps_q_yoy)?;
        t.set_flag(cols::PROFIT_CONSISTENCY, self.profit_consistency)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cagr_uses_available_years_and_positive_endpoints() {
        let s = [100.0, 110.0, 121.0];
        assert!((cagr(&s, 2, 5) - 10.0).abs() < 1e-9);
        assert!((cagr(&s, 2, 1) - 10.0).abs() < 1e-9);
        assert!(cagr(&s, 0, 5).is_nan());
        assert!(cagr(&[-1.0, 5.0], 1, 5).is_nan());
        assert!(cagr(&s, 3, 5).is_nan());
    }

    #[test]
    fn free_cash_flow_ignores_capex_sign() {
        let mut m = std::collections::BTreeMap::new();
        m.insert("Operating Cash Flow".to_string(), vec![10.0, 10.0]);
        m.insert("Capital Expenditure".to_string(), vec![-4.0, 4.0]);
        let d0 = chrono::NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let d1 = chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let t = StatementTable::new(vec![d0, d1], m).unwrap();
        assert_eq!(free_cash_flow(&t), vec![6.0, 6.0]);
    }
}
