use sqlx::{sqlite::SqliteRow, Row};

use prodscore_core::domain::product::{FavouriteMark, OrderLine, Product, ProductId};
use prodscore_core::scoring::Namespace;

use super::{decode_timestamp, encode_timestamp, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
    namespace: Namespace,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self::with_namespace(pool, Namespace::default())
    }

    pub fn with_namespace(pool: DbPool, namespace: Namespace) -> Self {
        Self { pool, namespace }
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let published: bool =
        row.try_get("published").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_created: String =
        row.try_get("date_created").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let score: Option<f64> =
        row.try_get("score").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(id),
        title,
        published,
        date_created: decode_timestamp(&date_created)?,
        score,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT id, title, published, date_created, score FROM {} WHERE id = ?",
            self.namespace.qualify("product")
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn save_product(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, title, published, date_created, score)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                published = excluded.published,
                date_created = excluded.date_created,
                score = excluded.score",
            self.namespace.qualify("product")
        ))
        .bind(product.id.0)
        .bind(&product.title)
        .bind(product.published)
        .bind(encode_timestamp(&product.date_created))
        .bind(product.score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_order_line(&self, line: OrderLine) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {} (product_id, quantity) VALUES (?, ?)",
            self.namespace.qualify("order_line")
        ))
        .bind(line.product_id.0)
        .bind(i64::from(line.quantity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_favourite(&self, mark: FavouriteMark) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {} (user_id, product_id) VALUES (?, ?)
             ON CONFLICT(user_id, product_id) DO NOTHING",
            self.namespace.qualify("user_product_favourite")
        ))
        .bind(mark.user_id)
        .bind(mark.product_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ranked_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT id, title, published, date_created, score
             FROM {}
             WHERE published = 1
             ORDER BY score IS NULL, score DESC, id ASC
             LIMIT ?",
            self.namespace.qualify("product")
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect::<Result<Vec<_>, _>>()
    }
}
