//! Cross-sectional relative strength: per date, the percentile rank of a trailing return
//! across every ticker that has one.

use crate::domain::indicator::{cols, IndicatorTable};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// (source return column, rank column written back)
pub const RS_SOURCES: [(&str, &str); 3] = [
    (cols::RETURN_12M_EXCL_1W, cols::RS_RANK_EXCL_1W),
    (cols::RETURN_12M_EXCL_1M, cols::RS_RANK_EXCL_1M),
    (cols::RETURN_6M, cols::RS_RANK_6M),
];

/// Ascending percentile rank with average ties: the largest value gets 1.0, every finite
/// value lands in `(0, 1]`. Non-finite inputs stay NaN and are not counted.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let n = order.len() as f64;
    let mut out = vec![f64::NAN; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let avg = (i + j + 2) as f64 / 2.0;
        for &k in &order[i..=j] {
            out[k] = avg / n;
        }
        i = j + 1;
    }
    out
}

/// Fills the RS rank columns of every table in place. Each table keeps its own dates; the
/// cross-section for a date is every ticker with a finite return on that date.
pub fn rank_relative_strength(tables: &mut BTreeMap<String, IndicatorTable>) -> anyhow::Result<()> {
    for (source, target) in RS_SOURCES {
        // date -> [(ticker, row, value)]
        let mut sections: BTreeMap<NaiveDate, Vec<(&str, usize, f64)>> = BTreeMap::new();
        for (ticker, table) in tables.iter() {
            let Some(values) = table.numeric(source) else {
                tracing::warn!(%ticker, column = source, "return column missing; ticker not ranked");
                continue;
            };
            for (row, (&date, &v)) in table.dates().iter().zip(values).enumerate() {
                if v.is_finite() {
                    sections.entry(date).or_default().push((ticker.as_str(), row, v));
                }
            }
        }

        let mut ranks: BTreeMap<String, Vec<f64>> = tables
            .iter()
            .map(|(t, table)| (t.clone(), vec![f64::NAN; table.len()]))
            .collect();
        for members in sections.values() {
            let values: Vec<f64> = members.iter().map(|m| m.2).collect();
            for (&(ticker, row, _), pct) in members.iter().zip(percentile_rank(&values)) {
                if let Some(col) = ranks.get_mut(ticker) {
                    col[row] = pct;
                }
            }
        }

        let dates = sections.len();
        for (ticker, values) in ranks {
            if let Some(table) = tables.get_mut(&ticker) {
                table.set_numeric(target, values)?;
            }
        }
        tracing::debug!(column = target, dates, "relative strength ranked");
    }
    Ok(())
}
