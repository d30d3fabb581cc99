//! Ticker symbols.
//!
//! Files are keyed by the exchange-suffixed symbol (`005930.KS`), while Postgres rows use the
//! bare six-digit KRX code (`005930`).

use anyhow::ensure;

pub fn validate(ticker: &str) -> anyhow::Result<&str> {
    let t = ticker.trim();
    ensure!(!t.is_empty(), "ticker must be non-empty");
    ensure!(
        !t.contains(['/', '\\']) && t != "." && t != "..",
        "ticker must not contain path separators (got {t:?})"
    );
    Ok(t)
}

/// Database key for a ticker: the symbol with any exchange suffix removed.
pub fn db_code(ticker: &str) -> &str {
    let t = ticker.trim();
    match t.split_once('.') {
        Some((code, _)) if !code.is_empty() => code,
        _ => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exchange_suffix() {
        assert_eq!(db_code("005930.KS"), "005930");
        assert_eq!(db_code("035420.KQ"), "035420");
        assert_eq!(db_code("005930"), "005930");
        assert_eq!(db_code(" 000660.KS "), "000660");
    }

    #[test]
    fn rejects_path_like_tickers() {
        assert!(validate("").is_err());
        assert!(validate("../etc").is_err());
        assert!(validate("a/b").is_err());
        assert_eq!(validate(" 005930.KS ").unwrap(), "005930.KS");
    }
}
