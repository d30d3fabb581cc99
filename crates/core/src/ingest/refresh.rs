use super::provider::PriceProvider;
use crate::domain::history::PriceHistory;
use crate::frame::{codec, Category, FrameStore};
use anyhow::Context;
use chrono::{Duration, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub fetched: usize,
    pub added: usize,
    pub total: usize,
}

/// Brings `stock_data/{ticker}` up to `end`, resuming the day after the last stored bar
/// (or from `start` for a new ticker). Re-fetched dates overwrite stored ones.
pub async fn refresh_ticker(
    store: &FrameStore,
    provider: &dyn PriceProvider,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<RefreshOutcome> {
    let mut history = if store.exists(Category::StockData, ticker) {
        codec::history_from_frame(&store.read(Category::StockData, ticker)?)
            .with_context(|| format!("decode stored prices for {ticker}"))?
    } else {
        PriceHistory::default()
    };

    let from = match history.last_date() {
        Some(last) => (last + Duration::days(1)).max(start),
        None => start,
    };
    if from > end {
        tracing::debug!(%ticker, %from, %end, "prices already current");
        return Ok(RefreshOutcome {
            fetched: 0,
            added: 0,
            total: history.len(),
        });
    }

    let bars = provider
        .fetch_daily_bars(ticker, from, end)
        .await
        .with_context(|| format!("{} fetch for {ticker}", provider.provider_name()))?;
    let fetched = bars.len();
    if fetched == 0 {
        return Ok(RefreshOutcome {
            fetched,
            added: 0,
            total: history.len(),
        });
    }

    let added = history.merge(bars);
    let mut df = codec::history_to_frame(&history)?;
    store.write(Category::StockData, ticker, &mut df)?;
    tracing::info!(%ticker, fetched, added, total = history.len(), "prices refreshed");

    Ok(RefreshOutcome {
        fetched,
        added,
        total: history.len(),
    })
}
