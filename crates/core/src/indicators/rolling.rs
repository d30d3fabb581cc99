//! Trailing-window helpers over daily series. Output index `i` covers bars `i + 1 - window..=i`;
//! a window that is not yet full, or that contains NaN, yields NaN.

pub fn mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().all(|v| v.is_finite()) {
            out[i] = slice.iter().sum::<f64>() / window as f64;
        }
    }
    out
}

pub fn sum(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().all(|v| v.is_finite()) {
            out[i] = slice.iter().sum();
        }
    }
    out
}

pub fn max(values: &[f64], window: usize) -> Vec<f64> {
    extreme(values, window, f64::max)
}

pub fn min(values: &[f64], window: usize) -> Vec<f64> {
    extreme(values, window, f64::min)
}

fn extreme(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().all(|v| v.is_finite()) {
            out[i] = slice.iter().copied().fold(slice[0], pick);
        }
    }
    out
}

/// `values[i - lag]`, NaN for the first `lag` rows.
pub fn lagged(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= lag { values[i - lag] } else { f64::NAN })
        .collect()
}

/// Percent change from `from` to `to`, NaN unless `from` is positive and both are finite.
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from.is_finite() && to.is_finite() && from > 0.0 {
        (to / from - 1.0) * 100.0
    } else {
        f64::NAN
    }
}

/// `num / den`, NaN unless the denominator is positive.
pub fn ratio(num: f64, den: f64) -> f64 {
    if num.is_finite() && den.is_finite() && den > 0.0 {
        num / den
    } else {
        f64::NAN
    }
}
