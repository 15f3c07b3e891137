pub mod commands;

use clap::{Parser, Subcommand};
use prodscore_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use std::process::ExitCode;
use tracing::Level;

use commands::score::ScoreArgs;

#[derive(Debug, Parser)]
#[command(
    name = "prodscore",
    about = "Product scoring operator CLI",
    long_about = "Recompute catalog product ranking scores and inspect stats, run history, config, and readiness.",
    after_help = "Examples:\n  prodscore migrate\n  prodscore score --batch-size 500\n  prodscore top --limit 5\n  prodscore doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo grocery catalog (idempotent)")]
    Seed,
    #[command(about = "Recompute stats and scores for every published product")]
    Score {
        #[arg(long, help = "Published product ids per score update statement")]
        batch_size: Option<usize>,
        #[arg(long, help = "Schema holding the catalog and stats tables")]
        namespace: Option<String>,
    },
    #[command(about = "Show raw and normalized rates for one product")]
    Stats {
        #[arg(help = "Product id")]
        product_id: i64,
    },
    #[command(about = "List the best scored published products")]
    Top {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    #[command(about = "List recent scoring runs, newest first")]
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, scoring settings, DB connectivity, and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

/// Logs go to stderr so stdout stays a single JSON payload per command.
fn init_logging() {
    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    if let Err(error) = install_subscriber(&config.logging) {
        eprintln!("prodscore: logging disabled, subscriber init failed: {error}");
    }
}

fn install_subscriber(
    logging: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Score { batch_size, namespace } => {
            commands::score::run(ScoreArgs { batch_size, namespace })
        }
        Command::Stats { product_id } => commands::stats::run(product_id),
        Command::Top { limit } => commands::top::run(limit),
        Command::History { limit } => commands::history::run(limit),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
