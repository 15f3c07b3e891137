use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Versions bundled in the binary that the database has not applied yet.
pub async fn pending_versions(pool: &DbPool) -> Result<Vec<i64>, sqlx::Error> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    let applied: Vec<i64> = if tracked == 0 {
        Vec::new()
    } else {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
    };

    Ok(MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .filter(|version| !applied.contains(version))
        .collect())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{pending_versions, run_pending};
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "product",
        "order_line",
        "user_product_favourite",
        "product_stats",
        "scoring_run",
        "idx_product_published",
        "idx_product_date_created",
        "idx_order_line_product_id",
        "idx_user_product_favourite_product_id",
        "idx_scoring_run_started_at",
    ];

    async fn schema_object_count(pool: &sqlx::SqlitePool, name: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_catalog_and_stats_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            assert_eq!(schema_object_count(&pool, name).await, 1, "missing schema object {name}");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent_across_reruns() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .expect("count applied migrations");
        assert_eq!(applied as usize, MIGRATOR.iter().count());
    }

    #[tokio::test]
    async fn pending_versions_drain_after_run() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        assert_eq!(pending_versions(&pool).await.expect("pending before").len(), 2);
        run_pending(&pool).await.expect("run migrations");
        assert!(pending_versions(&pool).await.expect("pending after").is_empty());
    }

    #[tokio::test]
    async fn stats_rows_follow_product_deletion() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query("INSERT INTO product (id, published, date_created) VALUES (1, 1, '2026-10-01 00:00:00')")
            .execute(&pool)
            .await
            .expect("insert product");
        sqlx::query("INSERT INTO product_stats (product_id) VALUES (1)")
            .execute(&pool)
            .await
            .expect("insert stats");
        sqlx::query("DELETE FROM product WHERE id = 1").execute(&pool).await.expect("delete");

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_stats")
            .fetch_one(&pool)
            .await
            .expect("count stats");
        assert_eq!(remaining, 0);
    }
}
