use anyhow::ensure;
use chrono::NaiveDate;

/// Indicator column names. They double as `account_list.acc_name` values in Postgres.
pub mod cols {
    pub const CLOSE: &str = "Close";
    pub const VOLUME: &str = "Volume";
    pub const AVG_VOLUME_20: &str = "Avg_Daily_Volume_20";
    pub const AVG_VOLUME_50: &str = "Avg_Daily_Volume_50";
    pub const AVG_VOLUME_252: &str = "Avg_Daily_Volume_252";
    pub const MARKET_CAP: &str = "Market_Cap";

    pub const NCAV_TO_MARKET_CAP: &str = "NCAV_to_MarketCap";
    pub const PB_RATIO: &str = "PB_Ratio";
    pub const PE_RATIO: &str = "PE_Ratio";
    pub const PEG_RATIO: &str = "PEG_Ratio";
    pub const DIVIDEND_YIELD: &str = "Dividend_Yield";
    pub const ICR: &str = "ICR";
    pub const DEBT_RATIO: &str = "Debt_Ratio";
    pub const CURRENT_RATIO: &str = "Current_Ratio";
    pub const QUICK_RATIO: &str = "Quick_Ratio";
    pub const EPS_CAGR: &str = "EPS_CAGR";

    pub const PSR: &str = "PSR";
    pub const FCF_YIELD: &str = "FCF_Yield";
    pub const SALES_CAGR: &str = "Sales_CAGR";
    pub const FCF_CAGR: &str = "FCF_CAGR";
    pub const ROE: &str = "ROE";
    pub const DEBT_TO_EQUITY: &str = "Debt_to_Equity";
    pub const OPERATING_MARGIN: &str = "Operating_Margin";
    pub const NET_PROFIT_MARGIN: &str = "Net_Profit_Margin";
    pub const REVENUE_YOY: &str = "Revenue_YoY";
    pub const EPS_YOY: &str = "EPS_YoY";
    pub const EPS_Q_YOY: &str = "EPS_Q_YoY";

    pub const RETURN_12M: &str = "12M_Return";
    pub const RETURN_12M_EXCL_1W: &str = "12M_Return_excl_1W";
    pub const RETURN_12M_EXCL_1M: &str = "12M_Return_excl_1M";
    pub const RETURN_6M: &str = "6M_Return";
    pub const MA_50: &str = "MA_50";
    pub const MA_150: &str = "MA_150";
    pub const MA_200: &str = "MA_200";
    pub const VOLATILITY_35D: &str = "35D_Volatility";

    pub const RS_RANK_EXCL_1W: &str = "RS_Rank_excl_1W";
    pub const RS_RANK_EXCL_1M: &str = "RS_Rank_excl_1M";
    pub const RS_RANK_6M: &str = "RS_Rank_6M";

    pub const PROFIT_CONSISTENCY: &str = "Profit_Consistency";
    pub const ABOVE_50MA: &str = "Above_50MA";
    pub const ABOVE_200MA: &str = "Above_200_MA";
    pub const MA50_UPTREND_20D: &str = "50MA_Uptrend_20d";
    pub const MA50_UPTREND_30D: &str = "50MA_Uptrend_30d";
    pub const MA_ALIGNMENT: &str = "MA_Alignment";
    pub const NEAR_52W_HIGH: &str = "Near_52W_High";
    pub const ABOVE_52W_LOW: &str = "Above_52W_Low";
    pub const BASE_HIGH: &str = "Base_High";
    pub const BASE_3_6M: &str = "Base_3_6M";
    pub const TR_2DOWN: &str = "TR_2down";
    pub const CORRECTION_8_35: &str = "Correction_8_35";
    pub const VCP: &str = "VCP";
    pub const ENTRY_SIGNAL: &str = "Entry_Signal";
}

/// One row per trading date for a single ticker: numeric indicators (NaN when undefined) and
/// boolean flags. Column order is insertion order, which keeps written files stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorTable {
    dates: Vec<NaiveDate>,
    numeric: Vec<(String, Vec<f64>)>,
    flags: Vec<(String, Vec<bool>)>,
}

impl IndicatorTable {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            numeric: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn set_numeric(&mut self, name: &str, values: Vec<f64>) -> anyhow::Result<()> {
        ensure!(
            values.len() == self.dates.len(),
            "column {name:?} has {} rows, table has {}",
            values.len(),
            self.dates.len()
        );
        match self.numeric.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.numeric.push((name.to_string(), values)),
        }
        Ok(())
    }

    pub fn set_flag(&mut self, name: &str, values: Vec<bool>) -> anyhow::Result<()> {
        ensure!(
            values.len() == self.dates.len(),
            "column {name:?} has {} rows, table has {}",
            values.len(),
            self.dates.len()
        );
        match self.flags.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.flags.push((name.to_string(), values)),
        }
        Ok(())
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.numeric
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn flag(&self, name: &str) -> Option<&[bool]> {
        self.flags
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.numeric.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn flag_columns(&self) -> impl Iterator<Item = (&str, &[bool])> {
        self.flags.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Numeric value at a row, NaN when the column is absent.
    pub fn value(&self, name: &str, row: usize) -> f64 {
        self.numeric(name)
            .and_then(|v| v.get(row).copied())
            .unwrap_or(f64::NAN)
    }

    /// Flag at a row, false when the column is absent.
    pub fn is(&self, name: &str, row: usize) -> bool {
        self.flag(name)
            .and_then(|v| v.get(row).copied())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates() -> Vec<NaiveDate> {
        vec![
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
        ]
    }

    #[test]
    fn setting_a_column_twice_replaces_it_in_place() {
        let mut t = IndicatorTable::new(dates());
        t.set_numeric(cols::CLOSE, vec![1.0, 2.0]).unwrap();
        t.set_numeric(cols::ROE, vec![f64::NAN, 3.0]).unwrap();
        t.set_numeric(cols::CLOSE, vec![5.0, 6.0]).unwrap();

        let names: Vec<&str> = t.numeric_columns().map(|(n, _)| n).collect();
        assert_eq!(names, vec![cols::CLOSE, cols::ROE]);
        assert_eq!(t.value(cols::CLOSE, 1), 6.0);
    }

    #[test]
    fn rejects_misaligned_columns() {
        let mut t = IndicatorTable::new(dates());
        assert!(t.set_flag(cols::VCP, vec![true]).is_err());
    }

    #[test]
    fn missing_columns_read_as_nan_and_false() {
        let t = IndicatorTable::new(dates());
        assert!(t.value(cols::PE_RATIO, 0).is_nan());
        assert!(!t.is(cols::VCP, 0));
        assert_eq!(t.row_of(dates()[1]), Some(1));
    }
}
