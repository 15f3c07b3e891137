use chrono::{DateTime, Duration, Utc};

use crate::connection::DbPool;
use crate::repositories::{encode_timestamp, RepositoryError};

/// Small grocery catalog used by `prodscore seed` and the integration tests.
const DEMO_PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        id: 1,
        title: "Masala Chai 250g",
        published: true,
        age_days: 3,
        order_quantities: &[3, 2, 5],
        favourites: 4,
    },
    DemoProduct {
        id: 2,
        title: "Basmati Rice 5kg",
        published: true,
        age_days: 120,
        order_quantities: &[10, 6],
        favourites: 1,
    },
    DemoProduct {
        id: 3,
        title: "Mango Pickle",
        published: true,
        age_days: 20,
        order_quantities: &[1],
        favourites: 6,
    },
    DemoProduct {
        id: 4,
        title: "Rooh Afza 800ml",
        published: true,
        age_days: 45,
        order_quantities: &[],
        favourites: 0,
    },
    DemoProduct {
        id: 5,
        title: "Seasonal Hamper",
        published: false,
        age_days: 1,
        order_quantities: &[2],
        favourites: 2,
    },
    DemoProduct {
        id: 6,
        title: "Desi Ghee 1kg",
        published: true,
        age_days: 300,
        order_quantities: &[4],
        favourites: 2,
    },
];

#[derive(Debug)]
struct DemoProduct {
    id: i64,
    title: &'static str,
    published: bool,
    age_days: i64,
    order_quantities: &'static [u32],
    favourites: i64,
}

impl DemoProduct {
    fn total_quantity(&self) -> i64 {
        self.order_quantities.iter().map(|quantity| i64::from(*quantity)).sum()
    }
}

pub struct DemoCatalog;

impl DemoCatalog {
    pub fn product_ids() -> Vec<i64> {
        DEMO_PRODUCTS.iter().map(|product| product.id).collect()
    }

    /// Loads the demo catalog relative to `as_of`. Reloading replaces the demo
    /// rows instead of duplicating their order lines.
    pub async fn load(
        pool: &DbPool,
        as_of: DateTime<Utc>,
    ) -> Result<DemoSeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let mut order_lines = 0;
        let mut favourites = 0;

        for product in DEMO_PRODUCTS {
            sqlx::query("DELETE FROM order_line WHERE product_id = ?")
                .bind(product.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM user_product_favourite WHERE product_id = ?")
                .bind(product.id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO product (id, title, published, date_created)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    published = excluded.published,
                    date_created = excluded.date_created",
            )
            .bind(product.id)
            .bind(product.title)
            .bind(product.published)
            .bind(encode_timestamp(&(as_of - Duration::days(product.age_days))))
            .execute(&mut *tx)
            .await?;

            for quantity in product.order_quantities {
                sqlx::query("INSERT INTO order_line (product_id, quantity) VALUES (?, ?)")
                    .bind(product.id)
                    .bind(i64::from(*quantity))
                    .execute(&mut *tx)
                    .await?;
                order_lines += 1;
            }

            for user_id in 1..=product.favourites {
                sqlx::query("INSERT INTO user_product_favourite (user_id, product_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(product.id)
                    .execute(&mut *tx)
                    .await?;
                favourites += 1;
            }
        }

        tx.commit().await?;

        Ok(DemoSeedResult { products: DEMO_PRODUCTS.len() as u64, order_lines, favourites })
    }

    /// Checks that every demo product is present with its expected signal totals.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for product in DEMO_PRODUCTS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM product WHERE id = ?1 AND title = ?2 AND published = ?3)",
            )
            .bind(product.id)
            .bind(product.title)
            .bind(product.published)
            .fetch_one(pool)
            .await?;
            checks.push((product.title, "product", present == 1));

            let quantity: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(quantity), 0) FROM order_line WHERE product_id = ?1",
            )
            .bind(product.id)
            .fetch_one(pool)
            .await?;
            checks.push((product.title, "order_quantity", quantity == product.total_quantity()));

            let favourites: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM user_product_favourite WHERE product_id = ?1")
                    .bind(product.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((product.title, "favourites", favourites == product.favourites));
        }

        let all_present = checks.iter().all(|(_, _, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSeedResult {
    pub products: u64,
    pub order_lines: u64,
    pub favourites: u64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, &'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{DemoCatalog, DEMO_PRODUCTS};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn demo_catalog_has_unique_ids_and_an_unpublished_product() {
        let mut ids = DemoCatalog::product_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), DEMO_PRODUCTS.len());
        assert!(DEMO_PRODUCTS.iter().any(|product| !product.published));
    }

    #[tokio::test]
    async fn demo_catalog_loads_idempotently() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let as_of = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

        let first = DemoCatalog::load(&pool, as_of).await.expect("first load");
        let second = DemoCatalog::load(&pool, as_of).await.expect("second load");
        assert_eq!(first, second);
        assert_eq!(first.products, 6);
        assert_eq!(first.order_lines, 8);
        assert_eq!(first.favourites, 15);

        let verification = DemoCatalog::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);

        let order_lines: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM order_line")
            .fetch_one(&pool)
            .await
            .expect("count order lines");
        assert_eq!(order_lines, 8);
    }

    #[tokio::test]
    async fn verify_reports_missing_catalog() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let verification = DemoCatalog::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().any(|(title, _, ok)| *title == "Rooh Afza 800ml" && *ok));
    }
}
