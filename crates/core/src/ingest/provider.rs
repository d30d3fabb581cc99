use crate::domain::history::DailyBar;
use crate::ingest::types::DailyBarsResponse;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/daily_bars";
const DEFAULT_RETRIES: u32 = 3;

#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Bars for `ticker` with `start <= date <= end`, in any order.
    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonPriceProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonPriceProvider {
    pub fn from_settings(settings: &crate::config::Settings) -> Result<Self> {
        let base_url = settings.require_price_provider_base_url()?.to_string();
        let api_key = settings.price_provider_api_key.clone();

        let timeout_secs = std::env::var("PRICE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("PRICE_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let path = std::env::var("PRICE_PROVIDER_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build price provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailyBarsResponse> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[
                ("ticker", ticker.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ])
            .send()
            .await
            .context("price provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read price provider response")?;
        if !status.is_success() {
            anyhow::bail!("price provider HTTP {status}: {text}");
        }

        serde_json::from_str::<DailyBarsResponse>(&text)
            .with_context(|| format!("price provider response for {ticker} is not a bar list"))
    }
}

#[async_trait::async_trait]
impl PriceProvider for HttpJsonPriceProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(ticker, start, end).await {
                Ok(resp) => {
                    validate(&resp, ticker, start, end)?;
                    return Ok(resp.bars);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(%ticker, attempt, ?backoff, error = %err, "price fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn validate(resp: &DailyBarsResponse, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
    anyhow::ensure!(
        resp.ticker == ticker,
        "price provider ticker mismatch: expected {ticker}, got {}",
        resp.ticker
    );
    for bar in &resp.bars {
        anyhow::ensure!(
            bar.date >= start && bar.date <= end,
            "bar {} for {ticker} is outside {start}..={end}",
            bar.date
        );
        anyhow::ensure!(
            [bar.open, bar.high, bar.low, bar.close, bar.volume]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0),
            "bar {} for {ticker} has a negative or non-finite value",
            bar.date
        );
        anyhow::ensure!(bar.high >= bar.low, "bar {} for {ticker} has high < low", bar.date);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_bars_and_defaults_dividends() {
        let v = json!({
            "ticker": "005930.KS",
            "bars": [
                {"date": "2025-01-02", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0}
            ]
        });
        let parsed: DailyBarsResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.bars[0].dividends, 0.0);
        assert!(validate(&parsed, "005930.KS", d("2025-01-01"), d("2025-01-31")).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_wrong_ticker() {
        let v = json!({
            "ticker": "005930.KS",
            "bars": [
                {"date": "2025-02-02", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0}
            ]
        });
        let parsed: DailyBarsResponse = serde_json::from_value(v).unwrap();
        assert!(validate(&parsed, "005930.KS", d("2025-01-01"), d("2025-01-31")).is_err());
        assert!(validate(&parsed, "000660.KS", d("2025-01-01"), d("2025-12-31")).is_err());
    }

    #[test]
    fn url_joins_base_and_path() {
        let p = HttpJsonPriceProvider {
            http: reqwest::Client::new(),
            base_url: "https://prices.example/".to_string(),
            api_key: None,
            path: "v1/daily_bars".to_string(),
            retries: 1,
        };
        assert_eq!(p.url(), "https://prices.example/v1/daily_bars");
    }
}
