use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use prodscore_core::domain::product::ProductId;
use prodscore_core::domain::stats::ProductStats;
use prodscore_core::scoring::{
    novelty_cutoff, Namespace, Normalization, PopulationBounds, RateBounds, RateSignal,
    ScoringWeights, NOVELTY_WINDOW_DAYS,
};

use super::{encode_timestamp, RepositoryError, ScoringStore};
use crate::DbPool;

/// Stats table and score column in one SQLite schema.
///
/// Every value reaches SQLite as a bound parameter. The only text spliced into
/// statements is the validated namespace and fixed column names.
pub struct SqlScoringStore {
    pool: DbPool,
    namespace: Namespace,
}

impl SqlScoringStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_namespace(pool, Namespace::default())
    }

    pub fn with_namespace(pool: DbPool, namespace: Namespace) -> Self {
        Self { pool, namespace }
    }

    fn table(&self, name: &str) -> String {
        self.namespace.qualify(name)
    }

    /// Per-product `(product_id, rate)` rows for one signal. May read the
    /// `params(as_of, cutoff)` CTE declared by `merge_rate`.
    fn rate_source(&self, signal: RateSignal) -> String {
        let product = self.table("product");
        match signal {
            RateSignal::Order => format!(
                "SELECT ol.product_id AS product_id, CAST(SUM(ol.quantity) AS REAL) AS rate
                 FROM {} ol
                 INNER JOIN {product} p ON p.id = ol.product_id
                 GROUP BY ol.product_id",
                self.table("order_line")
            ),
            RateSignal::Favourite => format!(
                "SELECT f.product_id AS product_id, CAST(COUNT(f.product_id) AS REAL) AS rate
                 FROM {} f
                 INNER JOIN {product} p ON p.id = f.product_id
                 GROUP BY f.product_id",
                self.table("user_product_favourite")
            ),
            RateSignal::Novelty => format!(
                "SELECT p.id AS product_id,
                        julianday(date(params.as_of)) - julianday(date(p.date_created)) AS rate
                 FROM {product} p, params
                 WHERE julianday(p.date_created) >= julianday(params.cutoff)"
            ),
        }
    }
}

fn stats_from_row(row: &SqliteRow) -> Result<ProductStats, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let product_id: i64 = row.try_get("product_id").map_err(decode)?;

    Ok(ProductStats {
        product_id: ProductId(product_id),
        order_rate: row.try_get("order_rate").map_err(decode)?,
        normalized_order_rate: row.try_get("normalized_order_rate").map_err(decode)?,
        favourite_rate: row.try_get("favourite_rate").map_err(decode)?,
        normalized_favourite_rate: row.try_get("normalized_favourite_rate").map_err(decode)?,
        novelty_rate: row.try_get("novelty_rate").map_err(decode)?,
        normalized_novelty_rate: row.try_get("normalized_novelty_rate").map_err(decode)?,
    })
}

fn bounds_from_row(row: &SqliteRow) -> Result<PopulationBounds, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let bounds = |min: &str, max: &str| -> Result<RateBounds, RepositoryError> {
        Ok(RateBounds {
            min: row.try_get(min).map_err(decode)?,
            max: row.try_get(max).map_err(decode)?,
        })
    };

    Ok(PopulationBounds {
        order: bounds("min_order_rate", "max_order_rate")?,
        favourite: bounds("min_favourite_rate", "max_favourite_rate")?,
        novelty: bounds("min_novelty_rate", "max_novelty_rate")?,
    })
}

#[async_trait::async_trait]
impl ScoringStore for SqlScoringStore {
    async fn reset_stats(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!("DELETE FROM {}", self.table("product_stats")))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn seed_stats(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (
                product_id, order_rate, normalized_order_rate, favourite_rate,
                normalized_favourite_rate, novelty_rate, normalized_novelty_rate
             )
             SELECT id, 0.0, 0.0, 0.0, 0.0, ?, 0.0 FROM {}",
            self.table("product_stats"),
            self.table("product")
        ))
        .bind(NOVELTY_WINDOW_DAYS)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn merge_rate(
        &self,
        signal: RateSignal,
        as_of: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let column = signal.column();
        // `WHERE true` lets SQLite parse the upsert clause after a SELECT source.
        // The cutoff clamps to month end in Rust; SQLite's '-N months' modifier rolls over.
        let statement = format!(
            "WITH params AS (SELECT ? AS as_of, ? AS cutoff)
             INSERT INTO {stats} (product_id, {column})
             SELECT product_id, rate FROM ({source}) WHERE true
             ON CONFLICT(product_id) DO UPDATE SET {column} = excluded.{column}",
            stats = self.table("product_stats"),
            source = self.rate_source(signal),
        );

        let result = sqlx::query(&statement)
            .bind(encode_timestamp(&as_of))
            .bind(encode_timestamp(&novelty_cutoff(as_of)))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stats_bounds(&self) -> Result<PopulationBounds, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT
                COALESCE(MIN(order_rate), 0.0) AS min_order_rate,
                COALESCE(MAX(order_rate), 1.0) AS max_order_rate,
                COALESCE(MIN(favourite_rate), 0.0) AS min_favourite_rate,
                COALESCE(MAX(favourite_rate), 1.0) AS max_favourite_rate,
                COALESCE(MIN(novelty_rate), 0.0) AS min_novelty_rate,
                COALESCE(MAX(novelty_rate), 1.0) AS max_novelty_rate
             FROM {}",
            self.table("product_stats")
        ))
        .fetch_one(&self.pool)
        .await?;

        bounds_from_row(&row)
    }

    async fn normalize_stats(&self, normalization: &Normalization) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET
                normalized_order_rate = (order_rate - ?) / ?,
                normalized_favourite_rate = (favourite_rate - ?) / ?,
                normalized_novelty_rate = ((? - novelty_rate) - (? - ?)) / ?",
            self.table("product_stats")
        ))
        .bind(normalization.min_order_rate)
        .bind(normalization.order_divisor.value)
        .bind(normalization.min_favourite_rate)
        .bind(normalization.favourite_divisor.value)
        .bind(NOVELTY_WINDOW_DAYS)
        .bind(NOVELTY_WINDOW_DAYS)
        .bind(normalization.max_novelty_rate)
        .bind(normalization.novelty_divisor.value)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn published_product_ids(&self) -> Result<Vec<ProductId>, RepositoryError> {
        let ids: Vec<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE published = 1 ORDER BY id",
            self.table("product")
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(ProductId).collect())
    }

    async fn apply_scores(
        &self,
        product_ids: &[ProductId],
        weights: &ScoringWeights,
    ) -> Result<u64, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(0);
        }

        let stats = self.table("product_stats");
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("UPDATE {} SET score = (SELECT ", self.table("product")));
        query_builder.push_bind(weights.order);
        query_builder.push(" * COALESCE(ps.normalized_order_rate, 0.0) + ");
        query_builder.push_bind(weights.favourite);
        query_builder.push(" * COALESCE(ps.normalized_favourite_rate, 0.0) + ");
        query_builder.push_bind(weights.novelty);
        query_builder.push(format!(
            " * COALESCE(ps.normalized_novelty_rate, 0.0)
             FROM {stats} ps WHERE ps.product_id = product.id)
             WHERE EXISTS (SELECT 1 FROM {stats} ps WHERE ps.product_id = product.id)
               AND id IN ("
        ));
        let mut separated = query_builder.separated(", ");
        for product_id in product_ids {
            separated.push_bind(product_id.0);
        }
        query_builder.push(")");

        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find_stats(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductStats>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT product_id, order_rate, normalized_order_rate, favourite_rate,
                    normalized_favourite_rate, novelty_rate, normalized_novelty_rate
             FROM {}
             WHERE product_id = ?",
            self.table("product_stats")
        ))
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(stats_from_row).transpose()
    }
}
