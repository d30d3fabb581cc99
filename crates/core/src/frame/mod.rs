//! Columnar (Feather / Arrow IPC) files under the data root, one file per ticker and category.
//!
//! ```text
//! {root}/stock_data/{ticker}_data.feather
//! {root}/quarterly_balance_sheet/{ticker}_quarterly_balance_sheet.feather
//! {root}/indicators/{ticker}_indicator.feather
//! {root}/giants_pick/{ticker}_giants_picks.feather
//! {root}/todays_picks/todays_picks.feather
//! {root}/ticker_list/tickers.csv
//! ```

pub mod codec;

use crate::domain::ticker;
use anyhow::Context;
use polars::prelude::*;
use std::path::{Path, PathBuf};

const FEATHER_EXT: &str = ".feather";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    StockData,
    Financials,
    QuarterlyFinancials,
    BalanceSheet,
    QuarterlyBalanceSheet,
    CashFlow,
    QuarterlyCashFlow,
    Indicators,
    GiantsPick,
}

impl Category {
    pub const STATEMENTS: [Category; 6] = [
        Category::Financials,
        Category::QuarterlyFinancials,
        Category::BalanceSheet,
        Category::QuarterlyBalanceSheet,
        Category::CashFlow,
        Category::QuarterlyCashFlow,
    ];

    pub fn folder(self) -> &'static str {
        match self {
            Category::StockData => "stock_data",
            Category::Financials => "financials",
            Category::QuarterlyFinancials => "quarterly_financials",
            Category::BalanceSheet => "balance_sheet",
            Category::QuarterlyBalanceSheet => "quarterly_balance_sheet",
            Category::CashFlow => "cash_flow",
            Category::QuarterlyCashFlow => "quarterly_cash_flow",
            Category::Indicators => "indicators",
            Category::GiantsPick => "giants_pick",
        }
    }

    /// File-name suffix after `{ticker}_`.
    pub fn suffix(self) -> &'static str {
        match self {
            Category::StockData => "data",
            Category::Indicators => "indicator",
            Category::GiantsPick => "giants_picks",
            other => other.folder(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, category: Category, ticker: &str) -> PathBuf {
        self.root.join(category.folder()).join(format!(
            "{}_{}{FEATHER_EXT}",
            ticker.trim(),
            category.suffix()
        ))
    }

    pub fn todays_picks_path(&self) -> PathBuf {
        self.root.join("todays_picks").join("todays_picks.feather")
    }

    pub fn ticker_list_path(&self) -> PathBuf {
        self.root.join("ticker_list").join("tickers.csv")
    }

    pub fn exists(&self, category: Category, ticker: &str) -> bool {
        self.path(category, ticker).is_file()
    }

    pub fn read(&self, category: Category, ticker: &str) -> anyhow::Result<DataFrame> {
        ticker::validate(ticker)?;
        read_feather(&self.path(category, ticker))
    }

    pub fn write(&self, category: Category, ticker: &str, df: &mut DataFrame) -> anyhow::Result<()> {
        ticker::validate(ticker)?;
        write_feather(&self.path(category, ticker), df)
    }

    /// Tickers that have a file in `category`, sorted.
    pub fn list_tickers(&self, category: Category) -> anyhow::Result<Vec<String>> {
        let dir = self.root.join(category.folder());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let tail = format!("_{}{FEATHER_EXT}", category.suffix());
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir).with_context(|| format!("read_dir {} failed", dir.display()))? {
            let entry = entry.with_context(|| format!("read_dir {} failed", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(t) = name.strip_suffix(tail.as_str()) {
                if !t.is_empty() {
                    out.push(t.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Universe to process: the `Ticker` column of `ticker_list/tickers.csv` when present,
    /// otherwise every ticker with a price file.
    pub fn load_ticker_list(&self) -> anyhow::Result<Vec<String>> {
        let path = self.ticker_list_path();
        if !path.is_file() {
            tracing::info!(path = %path.display(), "ticker list not found; scanning stock_data");
            return self.list_tickers(Category::StockData);
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.clone()))
            .with_context(|| format!("open {} failed", path.display()))?
            .finish()
            .with_context(|| format!("parse {} failed", path.display()))?;

        let tickers = codec::string_column(&df, "Ticker")
            .with_context(|| format!("missing 'Ticker' column in {}", path.display()))?;

        let mut out: Vec<String> = Vec::with_capacity(tickers.len());
        for t in tickers.into_iter().flatten() {
            let t = t.trim().to_string();
            if !t.is_empty() && !out.contains(&t) {
                out.push(t);
            }
        }
        Ok(out)
    }
}

pub fn read_feather(path: &Path) -> anyhow::Result<DataFrame> {
    let file = std::fs::File::open(path).with_context(|| format!("open {} failed", path.display()))?;
    IpcReader::new(file)
        .finish()
        .with_context(|| format!("read feather {} failed", path.display()))
}

/// Writes via a temp file and rename so readers never see a half-written file.
pub fn write_feather(path: &Path, df: &mut DataFrame) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {} failed", dir.display()))?;
    }

    let tmp = path.with_extension("feather.tmp");
    {
        let mut file =
            std::fs::File::create(&tmp).with_context(|| format!("create {} failed", tmp.display()))?;
        IpcWriter::new(&mut file)
            .finish(df)
            .with_context(|| format!("write feather {} failed", tmp.display()))?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {} failed", tmp.display(), path.display()))?;
    Ok(())
}
