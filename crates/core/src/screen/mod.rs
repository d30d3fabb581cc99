//! Strategy screening over the ranked universe: pick flags per strategy plus weighted,
//! cross-sectionally normalised scores for Graham, Fisher and Lynch.

pub mod normalize;
pub mod rules;

pub use normalize::CrossSectionNormalizer;

use crate::domain::indicator::{cols, IndicatorTable};
use crate::domain::pick::StrategyPicks;
use crate::domain::strategy::Strategy;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// (metric, weight, lower is better)
pub fn score_weights(strategy: Strategy) -> &'static [(&'static str, f64, bool)] {
    match strategy {
        Strategy::Graham => &[
            (cols::NCAV_TO_MARKET_CAP, 0.25, false),
            (cols::PE_RATIO, 0.20, true),
            (cols::DIVIDEND_YIELD, 0.10, false),
            (cols::ICR, 0.10, false),
            (cols::DEBT_RATIO, 0.10, true),
            (cols::CURRENT_RATIO, 0.05, false),
            (cols::EPS_CAGR, 0.20, false),
        ],
        Strategy::Fisher => &[
            (cols::PSR, 0.20, true),
            (cols::FCF_YIELD, 0.15, false),
            (cols::SALES_CAGR, 0.15, false),
            (cols::ROE, 0.15, false),
            (cols::RETURN_12M_EXCL_1M, 0.20, false),
            (cols::RETURN_6M, 0.15, false),
        ],
        Strategy::Lynch => &[
            (cols::REVENUE_YOY, 0.20, false),
            (cols::EPS_CAGR, 0.20, false),
            (cols::PEG_RATIO, 0.15, true),
            (cols::PE_RATIO, 0.10, true),
            (cols::ROE, 0.15, false),
            (cols::RETURN_6M, 0.20, false),
        ],
        Strategy::Livermore | Strategy::Minervini | Strategy::ONeil => &[],
    }
}

/// Normalizers for every scored metric, built once per universe.
pub struct Scorer {
    by_strategy: BTreeMap<Strategy, Vec<(CrossSectionNormalizer, f64)>>,
}

impl Scorer {
    pub fn build(tables: &BTreeMap<String, IndicatorTable>) -> Self {
        let mut by_strategy = BTreeMap::new();
        for strategy in Strategy::ALL {
            let weights = score_weights(strategy);
            if weights.is_empty() {
                continue;
            }
            let parts = weights
                .iter()
                .map(|&(metric, weight, reverse)| {
                    (CrossSectionNormalizer::build(tables, metric, reverse), weight)
                })
                .collect();
            by_strategy.insert(strategy, parts);
        }
        Self { by_strategy }
    }

    pub fn scores(&self, strategy: Strategy, table: &IndicatorTable) -> Option<Vec<f64>> {
        let parts = self.by_strategy.get(&strategy)?;
        let scores = table
            .dates()
            .iter()
            .enumerate()
            .map(|(row, &date)| {
                parts
                    .iter()
                    .map(|(n, w)| n.normalize(date, table.value(n.metric(), row)) * w)
                    .sum::<f64>()
            })
            .collect();
        Some(scores)
    }
}

pub fn screen_ticker(scorer: &Scorer, ticker: &str, table: &IndicatorTable) -> StrategyPicks {
    let mut out = StrategyPicks {
        ticker: ticker.to_string(),
        dates: table.dates().to_vec(),
        ..Default::default()
    };
    for strategy in Strategy::ALL {
        out.picks.insert(strategy, rules::evaluate(strategy, table));
        if let Some(scores) = scorer.scores(strategy, table) {
            out.scores.insert(strategy, scores);
        }
    }
    out
}

/// Screens every ticker; output is ordered by ticker.
pub fn screen_universe(tables: &BTreeMap<String, IndicatorTable>) -> Vec<StrategyPicks> {
    let scorer = Scorer::build(tables);
    let out: Vec<StrategyPicks> = tables
        .par_iter()
        .map(|(ticker, table)| screen_ticker(&scorer, ticker, table))
        .collect();

    let picks: usize = out
        .iter()
        .flat_map(|p| p.picks.values())
        .map(|flags| flags.iter().filter(|&&f| f).count())
        .sum();
    tracing::info!(tickers = out.len(), pick_rows = picks, "universe screened");
    out
}
