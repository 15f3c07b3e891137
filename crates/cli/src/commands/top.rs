use prodscore_core::config::ConfigOverrides;
use prodscore_core::scoring::Namespace;
use prodscore_db::repositories::{CatalogRepository, SqlCatalogRepository};
use serde_json::json;

use crate::commands::{build_runtime, load_config, open_database, CommandFailure, CommandResult};

pub fn run(limit: u32) -> CommandResult {
    let config = match load_config("top", ConfigOverrides::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let namespace = match Namespace::new(config.scoring.namespace.trim()) {
        Ok(namespace) => namespace,
        Err(error) => {
            return CommandResult::failure("top", "config_validation", error.to_string(), 2)
        }
    };
    let runtime = match build_runtime("top") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let catalog = SqlCatalogRepository::with_namespace(pool.clone(), namespace);
        let ranked: Result<_, CommandFailure> = catalog
            .ranked_products(limit)
            .await
            .map_err(|error| ("persistence", error.to_string(), 5u8));
        pool.close().await;
        ranked
    });

    match result {
        Ok(products) => {
            let ranked = products
                .iter()
                .enumerate()
                .map(|(index, product)| {
                    json!({
                        "rank": index + 1,
                        "id": product.id,
                        "title": product.title,
                        "score": product.score,
                    })
                })
                .collect::<Vec<_>>();
            CommandResult::success_with_details(
                "top",
                format!("{} published products by score", ranked.len()),
                Some(json!(ranked)),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("top", error_class, message, exit_code)
        }
    }
}
