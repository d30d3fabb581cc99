//! Price and volume indicators. Windows count trading days (bars), not calendar days.

use super::rolling::{self, pct_change};
use crate::domain::history::PriceHistory;
use crate::domain::indicator::{cols, IndicatorTable};

const YEAR: usize = 252;
const HALF_YEAR: usize = 126;
const QUARTER: usize = 63;
const MONTH: usize = 21;
const WEEK: usize = 5;

const NEAR_HIGH_FACTOR: f64 = 0.95;
const ABOVE_LOW_FACTOR: f64 = 1.3;
const VOLATILITY_WINDOW: usize = 35;
const BASE_HIGH_RECENT: usize = 10;
const TR_LOOKBACK: usize = 20;
const TR_MIN_DECREASES: usize = 2;
const CORRECTION_MIN: f64 = 8.0;
const CORRECTION_MAX: f64 = 35.0;
const VOLUME_DRY_UP_WINDOW: usize = 10;
const VOLUME_DRY_UP_FACTOR: f64 = 0.5;
const BREAKOUT_LOOKBACK: usize = 20;
const BREAKOUT_VOLUME_FACTOR: f64 = 1.5;

pub fn fill(table: &mut IndicatorTable, history: &PriceHistory) -> anyhow::Result<()> {
    let close = history.closes();
    let high = history.highs();
    let low = history.lows();
    let volume = history.volumes();
    let dividends = history.dividends();
    let n = close.len();

    let avg_vol_20 = rolling::mean(&volume, 20);
    let avg_vol_50 = rolling::mean(&volume, 50);
    let avg_vol_252 = rolling::mean(&volume, YEAR);

    let ma_50 = rolling::mean(&close, 50);
    let ma_150 = rolling::mean(&close, 150);
    let ma_200 = rolling::mean(&close, 200);

    let close_1w = rolling::lagged(&close, WEEK);
    let close_1m = rolling::lagged(&close, MONTH);
    let close_6m = rolling::lagged(&close, HALF_YEAR);
    let close_12m = rolling::lagged(&close, YEAR);

    let dividend_sum = rolling::sum(&dividends, YEAR);
    let high_252 = rolling::max(&high, YEAR);
    let low_252 = rolling::min(&low, YEAR);
    let high_35 = rolling::max(&high, VOLATILITY_WINDOW);
    let low_35 = rolling::min(&low, VOLATILITY_WINDOW);
    let high_recent = rolling::max(&high, BASE_HIGH_RECENT);
    let high_base = rolling::max(&high, HALF_YEAR);
    let vol_recent = rolling::mean(&volume, VOLUME_DRY_UP_WINDOW);
    let ma_50_20 = rolling::lagged(&ma_50, 20);
    let ma_50_30 = rolling::lagged(&ma_50, 30);
    let prior_high_20 = rolling::lagged(&rolling::max(&high, BREAKOUT_LOOKBACK), 1);

    let mut numeric: Vec<(&str, Vec<f64>)> = vec![
        (cols::AVG_VOLUME_20, avg_vol_20),
        (cols::AVG_VOLUME_50, avg_vol_50.clone()),
        (cols::AVG_VOLUME_252, avg_vol_252),
    ];

    let mut dividend_yield = vec![f64::NAN; n];
    let mut ret_12m = vec![f64::NAN; n];
    let mut ret_12m_excl_1w = vec![f64::NAN; n];
    let mut ret_12m_excl_1m = vec![f64::NAN; n];
    let mut ret_6m = vec![f64::NAN; n];
    let mut volatility = vec![f64::NAN; n];

    let mut above_50 = vec![false; n];
    let mut above_200 = vec![false; n];
    let mut up_20 = vec![false; n];
    let mut up_30 = vec![false; n];
    let mut aligned = vec![false; n];
    let mut near_high = vec![false; n];
    let mut above_low = vec![false; n];
    let mut base_high = vec![false; n];
    let mut entry = vec![false; n];

    for i in 0..n {
        let c = close[i];
        dividend_yield[i] = rolling::ratio(dividend_sum[i], c) * 100.0;
        ret_12m[i] = pct_change(close_12m[i], c);
        ret_12m_excl_1w[i] = pct_change(close_12m[i], close_1w[i]);
        ret_12m_excl_1m[i] = pct_change(close_12m[i], close_1m[i]);
        ret_6m[i] = pct_change(close_6m[i], c);
        volatility[i] = pct_change(low_35[i], high_35[i]);

        above_50[i] = c > ma_50[i];
        above_200[i] = c > ma_200[i];
        up_20[i] = ma_50[i] > ma_50_20[i];
        up_30[i] = ma_50[i] > ma_50_30[i];
        aligned[i] = ma_50[i] > ma_150[i] && ma_150[i] > ma_200[i];
        near_high[i] = c >= high_252[i] * NEAR_HIGH_FACTOR;
        above_low[i] = c > low_252[i] * ABOVE_LOW_FACTOR;
        base_high[i] = high_recent[i].is_finite() && high_recent[i] == high_base[i];
        entry[i] = c > prior_high_20[i] && volume[i] >= BREAKOUT_VOLUME_FACTOR * avg_vol_50[i];
    }

    let base = base_patterns(&high, &low, &volume, &vol_recent);

    numeric.extend([
        (cols::DIVIDEND_YIELD, dividend_yield),
        (cols::RETURN_12M, ret_12m),
        (cols::RETURN_12M_EXCL_1W, ret_12m_excl_1w),
        (cols::RETURN_12M_EXCL_1M, ret_12m_excl_1m),
        (cols::RETURN_6M, ret_6m),
        (cols::MA_50, ma_50),
        (cols::MA_150, ma_150),
        (cols::MA_200, ma_200),
        (cols::VOLATILITY_35D, volatility),
    ]);
    for (name, values) in numeric {
        table.set_numeric(name, values)?;
    }

    let flags = [
        (cols::ABOVE_50MA, above_50),
        (cols::ABOVE_200MA, above_200),
        (cols::MA50_UPTREND_20D, up_20),
        (cols::MA50_UPTREND_30D, up_30),
        (cols::MA_ALIGNMENT, aligned),
        (cols::NEAR_52W_HIGH, near_high),
        (cols::ABOVE_52W_LOW, above_low),
        (cols::BASE_HIGH, base_high),
        (cols::BASE_3_6M, base.full),
        (cols::TR_2DOWN, base.tr_2down),
        (cols::CORRECTION_8_35, base.correction),
        (cols::VCP, base.vcp),
        (cols::ENTRY_SIGNAL, entry),
    ];
    for (name, values) in flags {
        table.set_flag(name, values)?;
    }
    Ok(())
}

struct BasePatterns {
    full: Vec<bool>,
    tr_2down: Vec<bool>,
    correction: Vec<bool>,
    vcp: Vec<bool>,
}

/// Volatility-contraction checks over the base window, bars `(i - 126, i - 63]`.
fn base_patterns(high: &[f64], low: &[f64], volume: &[f64], vol_recent: &[f64]) -> BasePatterns {
    let n = high.len();
    let mut out = BasePatterns {
        full: vec![false; n],
        tr_2down: vec![false; n],
        correction: vec![false; n],
        vcp: vec![false; n],
    };

    for i in HALF_YEAR..n {
        let (start, end) = (i + 1 - HALF_YEAR, i + 1 - QUARTER);
        let (h, l, v) = (&high[start..end], &low[start..end], &volume[start..end]);
        if h.iter().chain(l).chain(v).any(|x| !x.is_finite()) {
            continue;
        }
        out.full[i] = true;

        let tr: Vec<f64> = h.iter().zip(l).map(|(h, l)| h - l).collect();
        let tail = &tr[tr.len().saturating_sub(TR_LOOKBACK)..];
        let decreases = tail.windows(2).filter(|w| w[1] < w[0]).count();
        out.tr_2down[i] = decreases >= TR_MIN_DECREASES;

        let max_high = h.iter().copied().fold(f64::MIN, f64::max);
        let min_low = l.iter().copied().fold(f64::MAX, f64::min);
        let depth = if max_high > 0.0 {
            (max_high - min_low) / max_high * 100.0
        } else {
            f64::NAN
        };
        out.correction[i] = (CORRECTION_MIN..=CORRECTION_MAX).contains(&depth);

        let max_volume = v.iter().copied().fold(f64::MIN, f64::max);
        let dried_up = vol_recent[i] <= max_volume * VOLUME_DRY_UP_FACTOR;
        out.vcp[i] = out.full[i] && out.tr_2down[i] && out.correction[i] && dried_up;
    }
    out
}
