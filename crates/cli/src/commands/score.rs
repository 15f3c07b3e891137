use prodscore_core::config::ConfigOverrides;
use prodscore_core::errors::ApplicationError;
use prodscore_db::repositories::{SqlScoringRunRepository, SqlScoringStore};
use prodscore_db::{ScoringJob, ScoringReport};
use serde_json::{json, Value};

use crate::commands::{build_runtime, load_config, open_database, CommandFailure, CommandResult};

#[derive(Debug, Default, Clone)]
pub struct ScoreArgs {
    pub batch_size: Option<usize>,
    pub namespace: Option<String>,
}

pub fn run(args: ScoreArgs) -> CommandResult {
    let overrides = ConfigOverrides {
        batch_size: args.batch_size,
        namespace: args.namespace,
        ..ConfigOverrides::default()
    };
    let config = match load_config("score", overrides) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let settings = match config.scoring.settings() {
        Ok(settings) => settings,
        Err(error) => {
            return CommandResult::failure("score", "config_validation", error.to_string(), 2)
        }
    };
    let runtime = match build_runtime("score") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let store = SqlScoringStore::with_namespace(pool.clone(), settings.namespace.clone());
        let runs = SqlScoringRunRepository::new(pool.clone());

        let job = ScoringJob::new(&store, &runs, settings);
        let outcome: Result<ScoringReport, CommandFailure> = job.run().await.map_err(|error| {
            let error = ApplicationError::from(error);
            (error.error_class(), error.to_string(), error.exit_code())
        });

        pool.close().await;
        outcome
    });

    match result {
        Ok(report) => CommandResult::success_with_details(
            "score",
            format!(
                "scored {} of {} published products in {} batches",
                report.products_scored, report.published_products, report.batches
            ),
            Some(report_details(&report)),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("score", error_class, message, exit_code)
        }
    }
}

fn report_details(report: &ScoringReport) -> Value {
    let fallbacks = report
        .normalization
        .fallbacks()
        .into_iter()
        .map(|(signal, divisor)| {
            json!({ "signal": signal, "divisor": divisor.value, "source": divisor.source })
        })
        .collect::<Vec<_>>();

    json!({
        "run_id": report.run_id.0,
        "as_of": report.as_of.to_rfc3339(),
        "stale_rows_cleared": report.stale_rows_cleared,
        "products_seeded": report.products_seeded,
        "rows_merged": {
            "order": report.order_rows_merged,
            "favourite": report.favourite_rows_merged,
            "novelty": report.novelty_rows_merged,
        },
        "bounds": report.bounds,
        "divisor_fallbacks": fallbacks,
        "published_products": report.published_products,
        "products_scored": report.products_scored,
        "batches": report.batches,
        "elapsed_ms": report.elapsed_ms as u64,
    })
}
