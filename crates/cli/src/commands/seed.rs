use chrono::Utc;
use prodscore_core::config::ConfigOverrides;
use prodscore_db::{DemoCatalog, DemoSeedResult};

use crate::commands::{build_runtime, load_config, open_database, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed", ConfigOverrides::default()) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = DemoCatalog::load(&pool, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome = if verification.all_present {
            Ok(seeded)
        } else {
            let failed = verification
                .checks
                .iter()
                .filter(|(_, _, passed)| !passed)
                .map(|(title, check, _)| format!("{title}:{check}"))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(seeded: &DemoSeedResult) -> String {
    format!(
        "demo catalog loaded: {} products, {} order lines, {} favourites",
        seeded.products, seeded.order_lines, seeded.favourites
    )
}

fn verification_message(failed: &[String]) -> String {
    if failed.is_empty() {
        "demo catalog failed to load".to_string()
    } else {
        format!("demo catalog verification failed for checks: {}", failed.join(", "))
    }
}
