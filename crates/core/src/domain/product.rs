use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub published: bool,
    pub date_created: DateTime<Utc>,
    /// Written only by the scoring job; `None` until a run reaches this product.
    pub score: Option<f64>,
}

impl Product {
    pub fn new(
        id: ProductId,
        title: impl Into<String>,
        published: bool,
        date_created: DateTime<Utc>,
    ) -> Self {
        Self { id, title: title.into(), published, date_created, score: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FavouriteMark {
    pub user_id: i64,
    pub product_id: ProductId,
}
