use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use prodscore_core::domain::product::{FavouriteMark, OrderLine, Product, ProductId};
use prodscore_core::domain::run::{ScoringRun, ScoringRunId};
use prodscore_core::domain::stats::ProductStats;
use prodscore_core::scoring::{Normalization, PopulationBounds, RateSignal, ScoringWeights};

pub mod catalog;
pub mod memory;
pub mod scoring;
pub mod scoring_run;

pub use catalog::SqlCatalogRepository;
pub use memory::{InMemoryCatalog, InMemoryScoringRunRepository};
pub use scoring::SqlScoringStore;
pub use scoring_run::SqlScoringRunRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Writes and reads the upstream catalog signals.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn save_product(&self, product: Product) -> Result<(), RepositoryError>;

    async fn record_order_line(&self, line: OrderLine) -> Result<(), RepositoryError>;

    /// Marking the same product twice for one user is a no-op.
    async fn record_favourite(&self, mark: FavouriteMark) -> Result<(), RepositoryError>;

    /// Published products ordered by score, best first; unscored products last.
    async fn ranked_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError>;
}

/// Stats table and score column, as seen by one scoring run.
#[async_trait]
pub trait ScoringStore: Send + Sync {
    async fn reset_stats(&self) -> Result<u64, RepositoryError>;

    /// One default row per catalog product; returns the number of rows written.
    async fn seed_stats(&self) -> Result<u64, RepositoryError>;

    /// Aggregates one raw signal per product and upserts it into the stats rows.
    async fn merge_rate(
        &self,
        signal: RateSignal,
        as_of: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    async fn stats_bounds(&self) -> Result<PopulationBounds, RepositoryError>;

    async fn normalize_stats(&self, normalization: &Normalization) -> Result<u64, RepositoryError>;

    /// Ascending ids of every published product.
    async fn published_product_ids(&self) -> Result<Vec<ProductId>, RepositoryError>;

    /// Writes composite scores for the given ids; ids without a stats row are skipped.
    async fn apply_scores(
        &self,
        product_ids: &[ProductId],
        weights: &ScoringWeights,
    ) -> Result<u64, RepositoryError>;

    async fn find_stats(&self, product_id: ProductId)
        -> Result<Option<ProductStats>, RepositoryError>;
}

#[async_trait]
pub trait ScoringRunRepository: Send + Sync {
    /// Inserts the run or replaces the stored copy with the same id.
    async fn save_run(&self, run: &ScoringRun) -> Result<(), RepositoryError>;

    async fn find_run(&self, id: &ScoringRunId) -> Result<Option<ScoringRun>, RepositoryError>;

    /// Most recent runs first.
    async fn recent_runs(&self, limit: u32) -> Result<Vec<ScoringRun>, RepositoryError>;
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamps are stored in SQLite's native text form so date functions can read them.
pub(crate) fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{decode_timestamp, encode_timestamp, RepositoryError};

    #[test]
    fn timestamps_use_sqlite_text_form() {
        let value = Utc.with_ymd_and_hms(2026, 10, 19, 7, 5, 3).unwrap();

        assert_eq!(encode_timestamp(&value), "2026-10-19 07:05:03");
        assert_eq!(decode_timestamp("2026-10-19 07:05:03").expect("decode"), value);
    }

    #[test]
    fn rfc3339_timestamps_are_accepted_on_read() {
        let decoded = decode_timestamp("2026-10-19T07:05:03+00:00").expect("decode rfc3339");
        assert_eq!(decoded, Utc.with_ymd_and_hms(2026, 10, 19, 7, 5, 3).unwrap());
    }

    #[test]
    fn garbage_timestamp_is_a_decode_error() {
        assert!(matches!(decode_timestamp("yesterday"), Err(RepositoryError::Decode(_))));
    }
}
