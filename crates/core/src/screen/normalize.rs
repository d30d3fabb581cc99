use crate::domain::indicator::IndicatorTable;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Per-date min-max bounds of one metric across the whole universe.
#[derive(Debug, Clone)]
pub struct CrossSectionNormalizer {
    metric: String,
    reverse: bool,
    bounds: BTreeMap<NaiveDate, (f64, f64)>,
}

impl CrossSectionNormalizer {
    pub fn build(tables: &BTreeMap<String, IndicatorTable>, metric: &str, reverse: bool) -> Self {
        let mut bounds: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
        for table in tables.values() {
            let Some(values) = table.numeric(metric) else {
                continue;
            };
            for (&date, &v) in table.dates().iter().zip(values) {
                if !v.is_finite() {
                    continue;
                }
                bounds
                    .entry(date)
                    .and_modify(|(lo, hi)| {
                        *lo = lo.min(v);
                        *hi = hi.max(v);
                    })
                    .or_insert((v, v));
            }
        }
        Self {
            metric: metric.to_string(),
            reverse,
            bounds,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Score in `[0, 1]`. A date where nobody has a value scores 0; a flat cross-section scores
    /// 1 for everyone who has one; a missing value scores 0.
    pub fn normalize(&self, date: NaiveDate, value: f64) -> f64 {
        let Some(&(lo, hi)) = self.bounds.get(&date) else {
            return 0.0;
        };
        if !value.is_finite() {
            return 0.0;
        }
        if lo == hi {
            return 1.0;
        }
        let x = (value - lo) / (hi - lo);
        if self.reverse {
            1.0 - x
        } else {
            x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::cols;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    fn tables() -> BTreeMap<String, IndicatorTable> {
        let mut out = BTreeMap::new();
        for (ticker, pe) in [("A", [10.0, 5.0]), ("B", [20.0, 5.0]), ("C", [30.0, f64::NAN])] {
            let mut t = IndicatorTable::new(vec![d(1), d(2)]);
            t.set_numeric(cols::PE_RATIO, pe.to_vec()).unwrap();
            out.insert(ticker.to_string(), t);
        }
        out
    }

    #[test]
    fn min_max_per_date() {
        let n = CrossSectionNormalizer::build(&tables(), cols::PE_RATIO, false);
        assert_eq!(n.normalize(d(1), 10.0), 0.0);
        assert_eq!(n.normalize(d(1), 20.0), 0.5);
        assert_eq!(n.normalize(d(1), 30.0), 1.0);
        // flat cross-section
        assert_eq!(n.normalize(d(2), 5.0), 1.0);
        assert_eq!(n.normalize(d(2), f64::NAN), 0.0);
        // nobody reported on this date
        assert_eq!(n.normalize(d(3), 5.0), 0.0);
    }

    #[test]
    fn reverse_prefers_low_values() {
        let n = CrossSectionNormalizer::build(&tables(), cols::PE_RATIO, true);
        assert_eq!(n.normalize(d(1), 10.0), 1.0);
        assert_eq!(n.normalize(d(1), 30.0), 0.0);
    }
}
