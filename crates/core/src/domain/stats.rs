use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::scoring::NOVELTY_WINDOW_DAYS;

/// Per-product scoring signals. Rebuilt from scratch on every scoring run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub product_id: ProductId,
    pub order_rate: f64,
    pub normalized_order_rate: Option<f64>,
    pub favourite_rate: f64,
    pub normalized_favourite_rate: Option<f64>,
    pub novelty_rate: f64,
    pub normalized_novelty_rate: Option<f64>,
}

impl ProductStats {
    /// Row written for every catalog product before any signal is merged.
    /// A product with no signal looks unordered, unfavourited and fully stale.
    pub fn seeded(product_id: ProductId) -> Self {
        Self {
            product_id,
            order_rate: 0.0,
            normalized_order_rate: Some(0.0),
            favourite_rate: 0.0,
            normalized_favourite_rate: Some(0.0),
            novelty_rate: NOVELTY_WINDOW_DAYS,
            normalized_novelty_rate: Some(0.0),
        }
    }
}
