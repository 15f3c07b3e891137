use chrono::{DateTime, Duration, TimeZone, Utc};

use prodscore_core::domain::product::{FavouriteMark, OrderLine, Product, ProductId};
use prodscore_core::domain::run::ScoringRunStatus;
use prodscore_core::scoring::{
    novelty_cutoff, BatchSize, DivisorSource, Namespace, RateSignal, ScoringSettings,
    ScoringWeights,
};
use prodscore_db::repositories::{
    CatalogRepository, InMemoryCatalog, InMemoryScoringRunRepository, ScoringRunRepository,
    ScoringStore, SqlCatalogRepository, SqlScoringRunRepository, SqlScoringStore,
};
use prodscore_db::{connect_with_settings, migrations, DbPool, DemoCatalog, ScoringJob};

const TOLERANCE: f64 = 1e-9;

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

async fn setup() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

fn settings(batch_size: usize) -> ScoringSettings {
    ScoringSettings {
        batch_size: BatchSize::new(batch_size).expect("valid batch size"),
        ..ScoringSettings::default()
    }
}

async fn add_product(
    catalog: &dyn CatalogRepository,
    id: i64,
    published: bool,
    age_days: i64,
    orders: &[u32],
    favourites: i64,
) {
    catalog
        .save_product(Product::new(
            ProductId(id),
            format!("Product {id}"),
            published,
            as_of() - Duration::days(age_days),
        ))
        .await
        .expect("save product");
    for quantity in orders {
        catalog
            .record_order_line(OrderLine { product_id: ProductId(id), quantity: *quantity })
            .await
            .expect("record order line");
    }
    for user_id in 1..=favourites {
        catalog
            .record_favourite(FavouriteMark { user_id, product_id: ProductId(id) })
            .await
            .expect("record favourite");
    }
}

async fn scores(pool: &DbPool) -> Vec<(i64, Option<f64>)> {
    sqlx::query_as("SELECT id, score FROM product ORDER BY id")
        .fetch_all(pool)
        .await
        .expect("read scores")
}

async fn run_job(pool: &DbPool, batch_size: usize) -> prodscore_db::ScoringReport {
    let store = SqlScoringStore::new(pool.clone());
    let runs = SqlScoringRunRepository::new(pool.clone());
    ScoringJob::new(&store, &runs, settings(batch_size)).run_at(as_of()).await.expect("run job")
}

#[tokio::test]
async fn popular_and_favoured_products_score_by_weighted_sum() {
    let pool = setup().await;
    let catalog = SqlCatalogRepository::new(pool.clone());
    add_product(&catalog, 1, true, 0, &[10], 0).await;
    add_product(&catalog, 2, true, 70, &[], 5).await;

    let report = run_job(&pool, 1000).await;
    assert_eq!(report.bounds.order.max, 10.0);
    assert_eq!(report.bounds.favourite.max, 5.0);
    assert_eq!((report.bounds.novelty.min, report.bounds.novelty.max), (0.0, 60.0));

    let store = SqlScoringStore::new(pool.clone());
    let fresh = store.find_stats(ProductId(1)).await.expect("find").expect("row");
    let stale = store.find_stats(ProductId(2)).await.expect("find").expect("row");
    assert_eq!(fresh.normalized_order_rate, Some(1.0));
    assert_eq!(stale.normalized_order_rate, Some(0.0));
    assert_eq!(fresh.normalized_favourite_rate, Some(0.0));
    assert_eq!(stale.normalized_favourite_rate, Some(1.0));
    assert_eq!(stale.novelty_rate, 60.0);
    assert_eq!(fresh.normalized_novelty_rate, Some(1.0));
    assert_eq!(stale.normalized_novelty_rate, Some(0.0));

    let scores = scores(&pool).await;
    let fresh_score = scores[0].1.expect("fresh scored");
    let stale_score = scores[1].1.expect("stale scored");
    assert!((fresh_score - 0.57).abs() < TOLERANCE, "fresh score {fresh_score}");
    assert!((stale_score - 0.43).abs() < TOLERANCE, "stale score {stale_score}");
}

#[tokio::test]
async fn every_catalog_product_gets_exactly_one_stats_row() {
    let pool = setup().await;
    DemoCatalog::load(&pool, as_of()).await.expect("load demo catalog");

    let report = run_job(&pool, 1000).await;
    assert_eq!(report.products_seeded, 6);

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM product p
         WHERE (SELECT COUNT(1) FROM product_stats ps WHERE ps.product_id = p.id) != 1",
    )
    .fetch_one(&pool)
    .await
    .expect("count products without one stats row");
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn rerunning_without_changes_keeps_scores() {
    let pool = setup().await;
    DemoCatalog::load(&pool, as_of()).await.expect("load demo catalog");

    let first_report = run_job(&pool, 1000).await;
    let first = scores(&pool).await;
    let second_report = run_job(&pool, 1000).await;
    let second = scores(&pool).await;

    assert_eq!(first, second);
    assert_eq!(second_report.stale_rows_cleared, first_report.products_seeded);
    assert_ne!(first_report.run_id, second_report.run_id);
}

#[tokio::test]
async fn batch_size_does_not_change_results() {
    let pool = setup().await;
    DemoCatalog::load(&pool, as_of()).await.expect("load demo catalog");

    let single = run_job(&pool, 1).await;
    let by_one = scores(&pool).await;
    let pairs = run_job(&pool, 2).await;
    let by_two = scores(&pool).await;
    let whole = run_job(&pool, 1000).await;
    let at_once = scores(&pool).await;

    assert_eq!(by_one, by_two);
    assert_eq!(by_two, at_once);
    assert_eq!((single.batches, pairs.batches, whole.batches), (5, 3, 1));
    assert_eq!(single.products_scored, 5);
    assert_eq!(whole.products_scored, 5);
}

#[tokio::test]
async fn unpublished_products_are_never_scored() {
    let pool = setup().await;
    DemoCatalog::load(&pool, as_of()).await.expect("load demo catalog");
    run_job(&pool, 2).await;

    let hamper = SqlCatalogRepository::new(pool.clone())
        .find_product(ProductId(5))
        .await
        .expect("find")
        .expect("present");
    assert!(!hamper.published);
    assert_eq!(hamper.score, None);

    let stats = SqlScoringStore::new(pool).find_stats(ProductId(5)).await.expect("find");
    assert!(stats.is_some(), "unpublished products still get stats");
}

#[tokio::test]
async fn scores_match_weighted_normalized_rates() {
    let pool = setup().await;
    DemoCatalog::load(&pool, as_of()).await.expect("load demo catalog");
    run_job(&pool, 1000).await;

    let weights = ScoringWeights::default();
    let store = SqlScoringStore::new(pool.clone());
    for (id, score) in scores(&pool).await {
        let Some(score) = score else { continue };
        let stats = store.find_stats(ProductId(id)).await.expect("find").expect("row");
        let expected = weights.order * stats.normalized_order_rate.unwrap_or(0.0)
            + weights.favourite * stats.normalized_favourite_rate.unwrap_or(0.0)
            + weights.novelty * stats.normalized_novelty_rate.unwrap_or(0.0);
        assert!((score - expected).abs() < TOLERANCE, "product {id}: {score} != {expected}");

        let order = stats.normalized_order_rate.expect("normalized order");
        let favourite = stats.normalized_favourite_rate.expect("normalized favourite");
        assert!((0.0..=1.0).contains(&order), "order rate of {id} out of range: {order}");
        assert!((0.0..=1.0).contains(&favourite), "favourite rate of {id} out of range");
    }
}

#[tokio::test]
async fn fresher_products_rank_higher_on_novelty() {
    let pool = setup().await;
    let catalog = SqlCatalogRepository::new(pool.clone());
    add_product(&catalog, 1, true, 0, &[1], 1).await;
    add_product(&catalog, 2, true, 50, &[1], 1).await;
    add_product(&catalog, 3, true, 90, &[1], 1).await;
    run_job(&pool, 1000).await;

    let store = SqlScoringStore::new(pool.clone());
    let today = store.find_stats(ProductId(1)).await.expect("find").expect("row");
    let older = store.find_stats(ProductId(2)).await.expect("find").expect("row");
    let stale = store.find_stats(ProductId(3)).await.expect("find").expect("row");
    assert!(today.normalized_novelty_rate > older.normalized_novelty_rate);
    assert_eq!(stale.novelty_rate, 60.0);

    let ranked = catalog.ranked_products(3).await.expect("rank");
    let ids: Vec<i64> = ranked.iter().map(|product| product.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn empty_catalog_runs_cleanly() {
    let pool = setup().await;

    let report = run_job(&pool, 1000).await;
    assert_eq!(report.products_seeded, 0);
    assert_eq!(report.products_scored, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(report.normalization.order_divisor.value, 1.0);
}

#[tokio::test]
async fn uniform_population_falls_back_without_dividing_by_zero() {
    let pool = setup().await;
    let catalog = SqlCatalogRepository::new(pool.clone());
    for id in 1..=3 {
        add_product(&catalog, id, true, 90, &[4], 2).await;
    }

    let report = run_job(&pool, 1000).await;
    assert_eq!(report.normalization.order_divisor.source, DivisorSource::Max);
    assert_eq!(report.normalization.favourite_divisor.source, DivisorSource::Max);
    assert_eq!(report.normalization.novelty_divisor.source, DivisorSource::Max);

    for (id, score) in scores(&pool).await {
        assert_eq!(score, Some(0.0), "uniform product {id}");
    }
}

#[tokio::test]
async fn successful_run_is_recorded() {
    let pool = setup().await;
    DemoCatalog::load(&pool, as_of()).await.expect("load demo catalog");
    let report = run_job(&pool, 2).await;

    let runs = SqlScoringRunRepository::new(pool);
    let stored = runs.find_run(&report.run_id).await.expect("find run").expect("recorded");
    assert_eq!(stored.status, ScoringRunStatus::Succeeded);
    assert_eq!(stored.products_seeded, 6);
    assert_eq!(stored.products_scored, 5);
    assert_eq!(stored.batches, 3);
    assert_eq!(stored.as_of, as_of());
    assert!(stored.finished_at.is_some());
}

#[tokio::test]
async fn failing_stage_is_recorded_as_failed_run() {
    let pool = setup().await;
    let store = SqlScoringStore::with_namespace(
        pool.clone(),
        Namespace::new("archive").expect("valid identifier"),
    );
    let runs = SqlScoringRunRepository::new(pool);

    let error = ScoringJob::new(&store, &runs, settings(10))
        .run_at(as_of())
        .await
        .expect_err("unknown schema must fail");
    assert!(error.to_string().contains("scoring stage `reset` failed"), "{error}");

    let recent = runs.recent_runs(1).await.expect("recent runs");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].status, ScoringRunStatus::Failed);
    assert!(recent[0].error.as_deref().is_some_and(|message| message.contains("reset")));
}

#[tokio::test]
async fn sqlite_and_in_memory_stores_agree() {
    let pool = setup().await;
    let sql_catalog = SqlCatalogRepository::new(pool.clone());
    let memory = InMemoryCatalog::default();
    let fixtures: [(i64, bool, i64, &[u32], i64); 5] = [
        (1, true, 3, &[3, 2, 5], 4),
        (2, true, 120, &[10, 6], 1),
        (3, true, 20, &[1], 6),
        (4, false, 1, &[2], 2),
        (5, true, 45, &[], 0),
    ];
    for (id, published, age, orders, favourites) in fixtures {
        add_product(&sql_catalog, id, published, age, orders, favourites).await;
        add_product(&memory, id, published, age, orders, favourites).await;
    }

    let sql_report = run_job(&pool, 2).await;
    let memory_runs = InMemoryScoringRunRepository::default();
    let memory_report = ScoringJob::new(&memory, &memory_runs, settings(2))
        .run_at(as_of())
        .await
        .expect("in-memory run");

    assert_eq!(sql_report.bounds, memory_report.bounds);
    assert_eq!(sql_report.products_scored, memory_report.products_scored);
    for id in 1..=5 {
        let expected = sql_catalog.find_product(ProductId(id)).await.expect("sql").expect("row");
        let actual = memory.find_product(ProductId(id)).await.expect("memory").expect("row");
        match (expected.score, actual.score) {
            (Some(left), Some(right)) => assert!((left - right).abs() < TOLERANCE, "product {id}"),
            (left, right) => assert_eq!(left, right, "product {id}"),
        }
    }
}

#[tokio::test]
async fn novelty_window_clamps_to_month_end_in_both_stores() {
    let at = |y, m, d, h, min, s| Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap();
    let cases = [
        (
            at(2026, 4, 30, 12, 0, 0),
            at(2026, 2, 28, 12, 0, 0),
            [
                (at(2026, 2, 28, 13, 0, 0), 61.0),
                (at(2026, 2, 28, 11, 0, 0), 60.0),
                (at(2026, 3, 2, 9, 0, 0), 59.0),
            ],
        ),
        (
            at(2026, 10, 31, 12, 0, 0),
            at(2026, 8, 31, 12, 0, 0),
            [
                (at(2026, 8, 31, 12, 0, 0), 61.0),
                (at(2026, 8, 31, 11, 59, 59), 60.0),
                (at(2026, 9, 2, 0, 0, 0), 59.0),
            ],
        ),
    ];

    for (as_of, cutoff, products) in cases {
        assert_eq!(novelty_cutoff(as_of), cutoff);

        let pool = setup().await;
        let sql_catalog = SqlCatalogRepository::new(pool.clone());
        let memory = InMemoryCatalog::default();
        for (index, (created, _)) in products.iter().enumerate() {
            let product = Product::new(ProductId(index as i64 + 1), "Edge", true, *created);
            sql_catalog.save_product(product.clone()).await.expect("save sql product");
            memory.save_product(product).await.expect("save memory product");
        }

        let sql_store = SqlScoringStore::new(pool);
        for store in [&sql_store as &dyn ScoringStore, &memory] {
            store.seed_stats().await.expect("seed");
            store.merge_rate(RateSignal::Novelty, as_of).await.expect("novelty");
        }

        for (index, (created, expected)) in products.iter().enumerate() {
            let id = ProductId(index as i64 + 1);
            let sql = sql_store.find_stats(id).await.expect("sql").expect("sql row");
            let mem = memory.find_stats(id).await.expect("memory").expect("memory row");
            assert_eq!(sql.novelty_rate, *expected, "sqlite novelty for {created} at {as_of}");
            assert_eq!(mem.novelty_rate, *expected, "in-memory novelty for {created} at {as_of}");
        }
    }
}
