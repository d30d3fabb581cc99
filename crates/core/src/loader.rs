//! Loads everything one ticker needs from the frame store.

use crate::domain::statement::{StatementTable, TickerData};
use crate::frame::{codec, Category, FrameStore};
use anyhow::{ensure, Context};
use std::fmt;

/// A per-ticker failure inside a pipeline stage. The stage logs it and moves on.
#[derive(Debug, Clone)]
pub struct TickerFailure {
    pub stage: &'static str,
    pub ticker: String,
    pub detail: String,
}

impl TickerFailure {
    pub fn new(stage: &'static str, ticker: &str, err: &anyhow::Error) -> Self {
        Self {
            stage,
            ticker: ticker.to_string(),
            detail: format!("{err:#}"),
        }
    }
}

impl fmt::Display for TickerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.stage, self.ticker, self.detail)
    }
}

impl std::error::Error for TickerFailure {}

pub fn load_ticker(store: &FrameStore, ticker: &str) -> anyhow::Result<TickerData> {
    let history = codec::history_from_frame(&store.read(Category::StockData, ticker)?)
        .with_context(|| format!("decode price history for {ticker}"))?;
    ensure!(!history.is_empty(), "price history for {ticker} is empty");

    let statement = |category: Category| -> anyhow::Result<StatementTable> {
        let df = store.read(category, ticker)?;
        codec::statement_from_frame(&df)
            .with_context(|| format!("decode {} for {ticker}", category.folder()))
    };

    Ok(TickerData {
        ticker: ticker.to_string(),
        history,
        financials: statement(Category::Financials)?,
        quarterly_financials: statement(Category::QuarterlyFinancials)?,
        balance_sheet: statement(Category::BalanceSheet)?,
        quarterly_balance_sheet: statement(Category::QuarterlyBalanceSheet)?,
        cash_flow: statement(Category::CashFlow)?,
        quarterly_cash_flow: statement(Category::QuarterlyCashFlow)?,
    })
}
