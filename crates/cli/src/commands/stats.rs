use prodscore_core::config::ConfigOverrides;
use prodscore_core::domain::product::ProductId;
use prodscore_core::scoring::Namespace;
use prodscore_db::repositories::{
    CatalogRepository, RepositoryError, ScoringStore, SqlCatalogRepository, SqlScoringStore,
};
use serde_json::json;

use crate::commands::{build_runtime, load_config, open_database, CommandFailure, CommandResult};

/// Raw and normalized rates of one product plus its current score.
pub fn run(product_id: i64) -> CommandResult {
    let config = match load_config("stats", ConfigOverrides::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let namespace = match Namespace::new(config.scoring.namespace.trim()) {
        Ok(namespace) => namespace,
        Err(error) => {
            return CommandResult::failure("stats", "config_validation", error.to_string(), 2)
        }
    };
    let runtime = match build_runtime("stats") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let catalog = SqlCatalogRepository::with_namespace(pool.clone(), namespace.clone());
        let store = SqlScoringStore::with_namespace(pool.clone(), namespace);
        let id = ProductId(product_id);

        let lookup: Result<_, CommandFailure> = async {
            let product = catalog.find_product(id).await?;
            let stats = store.find_stats(id).await?;
            Ok::<_, RepositoryError>((product, stats))
        }
        .await
        .map_err(|error| ("persistence", error.to_string(), 5u8));

        pool.close().await;
        lookup
    });

    match result {
        Ok((None, _)) => CommandResult::failure(
            "stats",
            "not_found",
            format!("product {product_id} does not exist"),
            1,
        ),
        Ok((Some(product), stats)) => {
            let message = match (&stats, product.score) {
                (None, _) => format!("product {product_id} has no stats yet; run `prodscore score`"),
                (Some(_), Some(score)) => format!("product {product_id} scores {score:.4}"),
                (Some(_), None) => format!("product {product_id} is not scored"),
            };
            CommandResult::success_with_details(
                "stats",
                message,
                Some(json!({ "product": product, "stats": stats })),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("stats", error_class, message, exit_code)
        }
    }
}
