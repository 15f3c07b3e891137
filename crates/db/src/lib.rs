pub mod connection;
pub mod fixtures;
pub mod job;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoCatalog, DemoSeedResult, VerificationResult};
pub use job::{ScoringJob, ScoringJobError, ScoringReport, ScoringStage};
