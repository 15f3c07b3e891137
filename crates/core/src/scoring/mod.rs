//! Product ranking score
//!
//! Each catalog product gets three raw rates (units ordered, favourite marks,
//! days since creation). Every rate is min-max normalized over the whole
//! catalog and the normalized rates are folded into one weighted score.

mod normalize;
mod novelty;
mod settings;
mod weights;

pub use normalize::{fallback_divisor, Divisor, DivisorSource, Normalization, PopulationBounds, RateBounds};
pub use novelty::{invert_novelty, novelty_cutoff, novelty_days};
pub use settings::{BatchSize, Namespace, ScoringSettings};
pub use weights::ScoringWeights;

use serde::{Deserialize, Serialize};

/// Novelty assigned to anything older than the novelty window, in days.
pub const NOVELTY_WINDOW_DAYS: f64 = 60.0;

/// Products created within this many calendar months get a real novelty rate.
pub const NOVELTY_WINDOW_MONTHS: u32 = 2;

/// Default scoring weights: popularity and engagement dominate, recency breaks ties.
pub const DEFAULT_WEIGHTS: ScoringWeights =
    ScoringWeights { order: 0.43, favourite: 0.43, novelty: 0.14 };

/// Published ids per score update statement.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Upper bound keeps one statement's bind list under SQLite's variable limit.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Raw signal merged into the stats table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSignal {
    Order,
    Favourite,
    Novelty,
}

impl RateSignal {
    pub const ALL: [RateSignal; 3] = [Self::Order, Self::Favourite, Self::Novelty];

    /// Raw rate column in the stats table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Order => "order_rate",
            Self::Favourite => "favourite_rate",
            Self::Novelty => "novelty_rate",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Favourite => "favourite",
            Self::Novelty => "novelty",
        }
    }
}
