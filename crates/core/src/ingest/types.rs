use crate::domain::history::DailyBar;
use serde::{Deserialize, Serialize};

/// Provider response for `GET {base}{path}?ticker=..&start=..&end=..`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBarsResponse {
    pub ticker: String,
    #[serde(default)]
    pub bars: Vec<DailyBar>,
}
