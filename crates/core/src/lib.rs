pub mod config;
pub mod domain;
pub mod errors;
pub mod scoring;

pub use domain::product::{FavouriteMark, OrderLine, Product, ProductId};
pub use domain::run::{ScoringRun, ScoringRunId, ScoringRunStatus};
pub use domain::stats::ProductStats;
pub use errors::{ApplicationError, DomainError};
pub use scoring::{
    BatchSize, Namespace, Normalization, PopulationBounds, RateBounds, RateSignal,
    ScoringSettings, ScoringWeights,
};
