//! Conversions between polars frames and domain types.

use crate::domain::history::{DailyBar, PriceHistory};
use crate::domain::indicator::IndicatorTable;
use crate::domain::pick::{StrategyPicks, TodaysPick};
use crate::domain::statement::StatementTable;
use crate::domain::strategy::Strategy;
use anyhow::{bail, ensure, Context};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

const DATE: &str = "Date";
const QUARTER_END: &str = "QuarterEnd";
const TICKER: &str = "Ticker";
const GIANT: &str = "Giant";

// Days from 0001-01-01 (CE) to 1970-01-01, the polars Date epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn history_from_frame(df: &DataFrame) -> anyhow::Result<PriceHistory> {
    let dates = date_column(df, &[DATE])?;
    let open = f64_column(df, "Open")?;
    let high = f64_column(df, "High")?;
    let low = f64_column(df, "Low")?;
    let close = f64_column(df, "Close")?;
    let volume = f64_column(df, "Volume")?;
    let dividends = if has_column(df, "Dividends") {
        f64_column(df, "Dividends")?
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v })
            .collect()
    } else {
        vec![0.0; dates.len()]
    };

    let bars = (0..dates.len())
        .map(|i| DailyBar {
            date: dates[i],
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
            dividends: dividends[i],
        })
        .collect();
    Ok(PriceHistory::from_bars(bars))
}

pub fn history_to_frame(history: &PriceHistory) -> anyhow::Result<DataFrame> {
    let columns = vec![
        date_series(DATE, &history.dates())?,
        Series::new("Open".into(), history.opens()),
        Series::new("High".into(), history.highs()),
        Series::new("Low".into(), history.lows()),
        Series::new("Close".into(), history.closes()),
        Series::new("Volume".into(), history.volumes()),
        Series::new("Dividends".into(), history.dividends()),
    ];
    frame(columns)
}

/// Statement frames are indexed by `Date` (annual) or `QuarterEnd` (quarterly); every other
/// column is a line item.
pub fn statement_from_frame(df: &DataFrame) -> anyhow::Result<StatementTable> {
    let date_name = if has_column(df, DATE) {
        DATE
    } else if has_column(df, QUARTER_END) {
        QUARTER_END
    } else {
        bail!("statement frame has neither a 'Date' nor a 'QuarterEnd' column");
    };
    let periods = date_column(df, &[date_name])?;

    let mut items = BTreeMap::new();
    for name in column_names(df) {
        if name == date_name || name == "index" {
            continue;
        }
        let col = df.column(&name)?;
        if matches!(col.dtype(), DataType::String) {
            continue;
        }
        items.insert(name.clone(), f64_column(df, &name)?);
    }

    StatementTable::new(periods, items)
}

pub fn statement_to_frame(table: &StatementTable) -> anyhow::Result<DataFrame> {
    let mut columns = vec![date_series(DATE, table.periods())?];
    for name in table.item_names() {
        let values = table.item(name).unwrap_or_default().to_vec();
        columns.push(Series::new(name.into(), values));
    }
    frame(columns)
}

pub fn indicators_from_frame(df: &DataFrame) -> anyhow::Result<IndicatorTable> {
    let dates = date_column(df, &[DATE])?;
    let mut table = IndicatorTable::new(dates);
    for name in column_names(df) {
        if name == DATE {
            continue;
        }
        match df.column(&name)?.dtype() {
            DataType::Boolean => table.set_flag(&name, bool_column(df, &name)?)?,
            DataType::String => continue,
            _ => table.set_numeric(&name, f64_column(df, &name)?)?,
        }
    }
    Ok(table)
}

pub fn indicators_to_frame(table: &IndicatorTable) -> anyhow::Result<DataFrame> {
    let mut columns = vec![date_series(DATE, table.dates())?];
    for (name, values) in table.numeric_columns() {
        columns.push(Series::new(name.into(), values.to_vec()));
    }
    for (name, values) in table.flag_columns() {
        columns.push(Series::new(name.into(), values.to_vec()));
    }
    frame(columns)
}

pub fn picks_from_frame(df: &DataFrame, ticker: &str) -> anyhow::Result<StrategyPicks> {
    let dates = date_column(df, &[DATE])?;
    let mut out = StrategyPicks {
        ticker: ticker.to_string(),
        dates,
        ..Default::default()
    };
    for strategy in Strategy::ALL {
        if has_column(df, strategy.pick_column()) {
            out.picks
                .insert(strategy, bool_column(df, strategy.pick_column())?);
        }
        if let Some(score) = strategy.score_column() {
            if has_column(df, score) {
                out.scores.insert(strategy, f64_column(df, score)?);
            }
        }
    }
    Ok(out)
}

pub fn picks_to_frame(picks: &StrategyPicks) -> anyhow::Result<DataFrame> {
    let n = picks.dates.len();
    let mut columns = vec![
        date_series(DATE, &picks.dates)?,
        Series::new(TICKER.into(), vec![picks.ticker.clone(); n]),
    ];
    for strategy in Strategy::ALL {
        let flags = picks
            .picks
            .get(&strategy)
            .cloned()
            .unwrap_or_else(|| vec![false; n]);
        ensure!(flags.len() == n, "{} has {} rows, expected {n}", strategy.pick_column(), flags.len());
        columns.push(Series::new(strategy.pick_column().into(), flags));

        if let Some(score_col) = strategy.score_column() {
            let scores = picks
                .scores
                .get(&strategy)
                .cloned()
                .unwrap_or_else(|| vec![0.0; n]);
            ensure!(scores.len() == n, "{score_col} has {} rows, expected {n}", scores.len());
            columns.push(Series::new(score_col.into(), scores));
        }
    }
    frame(columns)
}

pub fn todays_picks_from_frame(df: &DataFrame) -> anyhow::Result<Vec<TodaysPick>> {
    let dates = date_column(df, &[DATE])?;
    let giants = string_column(df, GIANT)?;
    let tickers = string_column(df, TICKER)?;

    let mut out = Vec::with_capacity(dates.len());
    for ((date, giant), ticker) in dates.into_iter().zip(giants).zip(tickers) {
        let (Some(giant), Some(ticker)) = (giant, ticker) else {
            continue;
        };
        let giant = giant
            .parse::<Strategy>()
            .with_context(|| format!("todays_picks row for {ticker} on {date}"))?;
        out.push(TodaysPick { date, giant, ticker });
    }
    Ok(out)
}

pub fn todays_picks_to_frame(picks: &[TodaysPick]) -> anyhow::Result<DataFrame> {
    let dates: Vec<NaiveDate> = picks.iter().map(|p| p.date).collect();
    let giants: Vec<&str> = picks.iter().map(|p| p.giant.giant_name()).collect();
    let tickers: Vec<&str> = picks.iter().map(|p| p.ticker.as_str()).collect();
    frame(vec![
        date_series(DATE, &dates)?,
        Series::new(GIANT.into(), giants),
        Series::new(TICKER.into(), tickers),
    ])
}

fn frame(columns: Vec<Series>) -> anyhow::Result<DataFrame> {
    DataFrame::new(columns.into_iter().map(Into::into).collect()).context("assemble frame failed")
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

/// Numeric column as f64; nulls and unparsable values become NaN.
pub fn f64_column(df: &DataFrame, name: &str) -> anyhow::Result<Vec<f64>> {
    let col = df
        .column(name)
        .with_context(|| format!("missing column {name:?}"))?
        .cast(&DataType::Float64)
        .with_context(|| format!("column {name:?} is not numeric"))?;
    let ca = col.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Boolean column; nulls become false. Numeric 0/1 columns are accepted too.
pub fn bool_column(df: &DataFrame, name: &str) -> anyhow::Result<Vec<bool>> {
    let col = df
        .column(name)
        .with_context(|| format!("missing column {name:?}"))?
        .cast(&DataType::Boolean)
        .with_context(|| format!("column {name:?} is not boolean"))?;
    let ca = col.bool()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(false)).collect())
}

pub fn string_column(df: &DataFrame, name: &str) -> anyhow::Result<Vec<Option<String>>> {
    let col = df
        .column(name)
        .with_context(|| format!("missing column {name:?}"))?
        .cast(&DataType::String)?;
    let ca = col.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Accepts polars `Date`, `Datetime` or `YYYY-MM-DD...` strings.
///
/// `Datetime` values are truncated to their UTC calendar day, time zone or not. Price files are
/// written with naive (UTC) timestamps, so a zone-aware KST midnight lands on the previous day.
pub fn date_column(df: &DataFrame, names: &[&str]) -> anyhow::Result<Vec<NaiveDate>> {
    let name = names
        .iter()
        .copied()
        .find(|n| has_column(df, n))
        .with_context(|| format!("missing date column (tried {names:?})"))?;
    let col = df.column(name)?;

    let mut out = Vec::with_capacity(col.len());
    if matches!(col.dtype(), DataType::String) {
        for (i, v) in col.str()?.into_iter().enumerate() {
            let raw = v.with_context(|| format!("null {name} at row {i}"))?;
            let head = raw.get(..10).unwrap_or(raw);
            let date = NaiveDate::parse_from_str(head, "%Y-%m-%d")
                .with_context(|| format!("invalid {name} {raw:?} at row {i}"))?;
            out.push(date);
        }
        return Ok(out);
    }

    let days = col
        .cast(&DataType::Date)
        .with_context(|| format!("column {name:?} is not a date"))?
        .cast(&DataType::Int32)?;
    for (i, v) in days.i32()?.into_iter().enumerate() {
        let v = v.with_context(|| format!("null {name} at row {i}"))?;
        let date = NaiveDate::from_num_days_from_ce_opt(v + UNIX_EPOCH_DAYS_FROM_CE)
            .with_context(|| format!("{name} out of range at row {i}"))?;
        out.push(date);
    }
    Ok(out)
}

fn date_series(name: &str, dates: &[NaiveDate]) -> anyhow::Result<Series> {
    let days: Vec<i32> = dates
        .iter()
        .map(|d| chrono::Datelike::num_days_from_ce(d) - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    Series::new(name.into(), days)
        .cast(&DataType::Date)
        .context("build date column failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::cols;
    use crate::frame::{read_feather, write_feather};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn history_survives_a_feather_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_data").join("X_data.feather");
        let history = PriceHistory::from_bars(vec![
            DailyBar {
                date: d("2025-01-02"),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 100.0,
                dividends: 0.0,
            },
            DailyBar {
                date: d("2025-01-03"),
                open: 1.5,
                high: 2.5,
                low: 1.0,
                close: 2.0,
                volume: 200.0,
                dividends: 0.1,
            },
        ]);

        let mut df = history_to_frame(&history).unwrap();
        write_feather(&path, &mut df).unwrap();
        let back = history_from_frame(&read_feather(&path).unwrap()).unwrap();
        assert_eq!(back, history);
    }

    #[test]
    fn history_without_dividends_defaults_to_zero() {
        let df = DataFrame::new(
            vec![
                Series::new("Date".into(), vec!["2025-01-03", "2025-01-02"]),
                Series::new("Open".into(), vec![1.0, 1.0]),
                Series::new("High".into(), vec![1.0, 1.0]),
                Series::new("Low".into(), vec![1.0, 1.0]),
                Series::new("Close".into(), vec![2.0, 1.0]),
                Series::new("Volume".into(), vec![10i64, 20]),
            ]
            .into_iter()
            .map(Into::into)
            .collect(),
        )
        .unwrap();

        let h = history_from_frame(&df).unwrap();
        assert_eq!(h.dates(), vec![d("2025-01-02"), d("2025-01-03")]);
        assert_eq!(h.dividends(), vec![0.0, 0.0]);
        assert_eq!(h.volumes(), vec![20.0, 10.0]);
    }

    #[test]
    fn datetime_columns_keep_the_utc_day() {
        // 2025-01-01 15:00 UTC is 2025-01-02 00:00 KST
        let ns = 1_735_743_600_000_000_000i64;
        let stamps = Series::new("Date".into(), vec![ns, ns + 9 * 3_600_000_000_000])
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))
            .unwrap();
        let df = DataFrame::new(vec![stamps.into()]).unwrap();

        assert_eq!(
            date_column(&df, &["Date"]).unwrap(),
            vec![d("2025-01-01"), d("2025-01-02")]
        );
    }

    #[test]
    fn quarterly_statements_use_quarter_end_and_skip_text() {
        let df = DataFrame::new(
            vec![
                Series::new("QuarterEnd".into(), vec!["2024-06-30", "2024-03-31"]),
                Series::new("Net Income".into(), vec![Some(2.0), None]),
                Series::new("Currency".into(), vec!["KRW", "KRW"]),
            ]
            .into_iter()
            .map(Into::into)
            .collect(),
        )
        .unwrap();

        let t = statement_from_frame(&df).unwrap();
        assert_eq!(t.periods(), &[d("2024-03-31"), d("2024-06-30")]);
        let ni = t.item("Net Income").unwrap();
        assert!(ni[0].is_nan());
        assert_eq!(ni[1], 2.0);
        assert!(t.item("Currency").is_none());
    }

    #[test]
    fn indicator_columns_keep_kind_and_order() {
        let mut table = IndicatorTable::new(vec![d("2025-01-02"), d("2025-01-03")]);
        table.set_numeric(cols::CLOSE, vec![1.0, f64::NAN]).unwrap();
        table.set_flag(cols::VCP, vec![false, true]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("i.feather");
        let mut df = indicators_to_frame(&table).unwrap();
        write_feather(&path, &mut df).unwrap();
        let back = indicators_from_frame(&read_feather(&path).unwrap()).unwrap();

        assert_eq!(back.flag(cols::VCP).unwrap(), &[false, true]);
        assert_eq!(back.value(cols::CLOSE, 0), 1.0);
        assert!(back.value(cols::CLOSE, 1).is_nan());
    }

    #[test]
    fn todays_picks_use_display_names() {
        let picks = vec![TodaysPick {
            date: d("2025-06-04"),
            giant: Strategy::ONeil,
            ticker: "035420.KS".to_string(),
        }];
        let df = todays_picks_to_frame(&picks).unwrap();
        assert_eq!(string_column(&df, "Giant").unwrap()[0].as_deref(), Some("William Oneil"));
        assert_eq!(todays_picks_from_frame(&df).unwrap(), picks);
    }
}
