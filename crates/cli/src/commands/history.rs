use prodscore_core::config::ConfigOverrides;
use prodscore_db::repositories::{ScoringRunRepository, SqlScoringRunRepository};
use serde_json::json;

use crate::commands::{build_runtime, load_config, open_database, CommandFailure, CommandResult};

pub fn run(limit: u32) -> CommandResult {
    let config = match load_config("history", ConfigOverrides::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("history") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let runs: Result<_, CommandFailure> = SqlScoringRunRepository::new(pool.clone())
            .recent_runs(limit)
            .await
            .map_err(|error| ("persistence", error.to_string(), 5u8));
        pool.close().await;
        runs
    });

    match result {
        Ok(runs) => {
            let message = match runs.first() {
                Some(latest) => format!(
                    "{} recent scoring runs; latest {} is {}",
                    runs.len(),
                    latest.id.0,
                    latest.status.as_str()
                ),
                None => "no scoring runs recorded".to_string(),
            };
            CommandResult::success_with_details("history", message, Some(json!(runs)))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("history", error_class, message, exit_code)
        }
    }
}
