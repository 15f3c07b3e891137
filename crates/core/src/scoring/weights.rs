use serde::{Deserialize, Serialize};

use crate::domain::stats::ProductStats;

/// Weights of the normalized rates in the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for normalized order rate (default: 0.43)
    pub order: f64,
    /// Weight for normalized favourite rate (default: 0.43)
    pub favourite: f64,
    /// Weight for normalized novelty rate (default: 0.14)
    pub novelty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

impl ScoringWeights {
    /// Missing normalized rates count as zero.
    pub fn composite(&self, stats: &ProductStats) -> f64 {
        self.order * stats.normalized_order_rate.unwrap_or(0.0)
            + self.favourite * stats.normalized_favourite_rate.unwrap_or(0.0)
            + self.novelty * stats.normalized_novelty_rate.unwrap_or(0.0)
    }
}
