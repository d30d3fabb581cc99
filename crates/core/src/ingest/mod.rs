//! Daily price refresh from an external OHLCV provider.

pub mod provider;
pub mod refresh;
pub mod types;

pub use provider::{HttpJsonPriceProvider, PriceProvider};
pub use refresh::refresh_ticker;
