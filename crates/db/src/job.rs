//! Product scoring job
//!
//! Rebuilds the stats table from the current catalog signals and rewrites the
//! score of every published product. The pipeline is strictly linear:
//! reset, seed, three rate merges, bounds, normalize, then one score update
//! per batch of published ids. A run never depends on the previous one, so an
//! interrupted run is repaired by running again.
//!
//! Runs must not overlap on the same store; the caller's scheduler owns that.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use prodscore_core::domain::run::{ScoringRun, ScoringRunId};
use prodscore_core::errors::ApplicationError;
use prodscore_core::scoring::{Normalization, PopulationBounds, RateSignal, ScoringSettings};

use crate::repositories::{RepositoryError, ScoringRunRepository, ScoringStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringStage {
    Reset,
    Seed,
    Aggregate(RateSignal),
    Bounds,
    Normalize,
    CollectPublished,
    ScoreBatch(usize),
}

impl fmt::Display for ScoringStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => f.write_str("reset"),
            Self::Seed => f.write_str("seed"),
            Self::Aggregate(signal) => write!(f, "aggregate:{}", signal.as_str()),
            Self::Bounds => f.write_str("bounds"),
            Self::Normalize => f.write_str("normalize"),
            Self::CollectPublished => f.write_str("collect_published"),
            Self::ScoreBatch(index) => write!(f, "score_batch:{index}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoringJobError {
    #[error("scoring stage `{stage}` failed: {source}")]
    Stage {
        stage: ScoringStage,
        #[source]
        source: RepositoryError,
    },
    #[error("could not record scoring run history: {0}")]
    History(#[source] RepositoryError),
}

impl From<ScoringJobError> for ApplicationError {
    fn from(value: ScoringJobError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

fn at(stage: ScoringStage) -> impl FnOnce(RepositoryError) -> ScoringJobError {
    move |source| ScoringJobError::Stage { stage, source }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoringReport {
    pub run_id: ScoringRunId,
    pub as_of: DateTime<Utc>,
    pub stale_rows_cleared: u64,
    pub products_seeded: u64,
    pub order_rows_merged: u64,
    pub favourite_rows_merged: u64,
    pub novelty_rows_merged: u64,
    pub bounds: PopulationBounds,
    pub normalization: Normalization,
    pub published_products: u64,
    pub products_scored: u64,
    pub batches: u64,
    pub elapsed_ms: u128,
}

pub struct ScoringJob<'a> {
    store: &'a dyn ScoringStore,
    runs: &'a dyn ScoringRunRepository,
    settings: ScoringSettings,
}

impl<'a> ScoringJob<'a> {
    pub fn new(
        store: &'a dyn ScoringStore,
        runs: &'a dyn ScoringRunRepository,
        settings: ScoringSettings,
    ) -> Self {
        Self { store, runs, settings }
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    pub async fn run(&self) -> Result<ScoringReport, ScoringJobError> {
        self.run_at(Utc::now()).await
    }

    /// Scores the catalog as if today were `as_of`. Novelty is measured from this date.
    pub async fn run_at(&self, as_of: DateTime<Utc>) -> Result<ScoringReport, ScoringJobError> {
        let mut run = ScoringRun::start(as_of);
        self.runs.save_run(&run).await.map_err(ScoringJobError::History)?;
        info!(
            event_name = "scoring.run.started",
            correlation_id = %run.id.0,
            as_of = %as_of,
            batch_size = self.settings.batch_size.get(),
            namespace = %self.settings.namespace,
            "product scoring run started"
        );

        match self.execute(&run.id, as_of).await {
            Ok(report) => {
                run.succeed(report.products_seeded, report.products_scored, report.batches);
                self.runs.save_run(&run).await.map_err(ScoringJobError::History)?;
                info!(
                    event_name = "scoring.run.completed",
                    correlation_id = %run.id.0,
                    products_seeded = report.products_seeded,
                    products_scored = report.products_scored,
                    batches = report.batches,
                    elapsed_ms = report.elapsed_ms as u64,
                    "product scoring run completed"
                );
                Ok(report)
            }
            Err(failure) => {
                run.fail(failure.to_string());
                if let Err(history_error) = self.runs.save_run(&run).await {
                    warn!(
                        event_name = "scoring.run.history_write_failed",
                        correlation_id = %run.id.0,
                        error = %history_error,
                        "failed run could not be recorded"
                    );
                }
                error!(
                    event_name = "scoring.run.failed",
                    correlation_id = %run.id.0,
                    error = %failure,
                    "product scoring run failed"
                );
                Err(failure)
            }
        }
    }

    async fn execute(
        &self,
        run_id: &ScoringRunId,
        as_of: DateTime<Utc>,
    ) -> Result<ScoringReport, ScoringJobError> {
        let started = Instant::now();

        let stale_rows_cleared = self.store.reset_stats().await.map_err(at(ScoringStage::Reset))?;
        let products_seeded = self.store.seed_stats().await.map_err(at(ScoringStage::Seed))?;
        debug!(
            event_name = "scoring.stats.seeded",
            correlation_id = %run_id.0,
            stale_rows_cleared,
            products_seeded,
            "stats table rebuilt with default rows"
        );

        let mut merged = [0u64; 3];
        for (slot, signal) in merged.iter_mut().zip(RateSignal::ALL) {
            *slot = self
                .store
                .merge_rate(signal, as_of)
                .await
                .map_err(at(ScoringStage::Aggregate(signal)))?;
            debug!(
                event_name = "scoring.stats.rate_merged",
                correlation_id = %run_id.0,
                signal = signal.as_str(),
                rows = *slot,
                "raw rate merged into stats"
            );
        }
        let [order_rows_merged, favourite_rows_merged, novelty_rows_merged] = merged;

        let bounds = self.store.stats_bounds().await.map_err(at(ScoringStage::Bounds))?;
        let normalization = Normalization::from_bounds(&bounds);
        for (signal, divisor) in normalization.fallbacks() {
            warn!(
                event_name = "scoring.normalize.divisor_fallback",
                correlation_id = %run_id.0,
                signal = signal.as_str(),
                divisor = divisor.value,
                source = ?divisor.source,
                "rate range collapsed; normalizing with fallback divisor"
            );
        }
        self.store.normalize_stats(&normalization).await.map_err(at(ScoringStage::Normalize))?;

        let published =
            self.store.published_product_ids().await.map_err(at(ScoringStage::CollectPublished))?;
        let mut products_scored = 0;
        let mut batches = 0;
        for (index, chunk) in published.chunks(self.settings.batch_size.get()).enumerate() {
            let updated = self
                .store
                .apply_scores(chunk, &self.settings.weights)
                .await
                .map_err(at(ScoringStage::ScoreBatch(index)))?;
            products_scored += updated;
            batches += 1;
            debug!(
                event_name = "scoring.score.batch_applied",
                correlation_id = %run_id.0,
                batch = index,
                requested = chunk.len(),
                updated,
                "score batch applied"
            );
        }

        Ok(ScoringReport {
            run_id: run_id.clone(),
            as_of,
            stale_rows_cleared,
            products_seeded,
            order_rows_merged,
            favourite_rows_merged,
            novelty_rows_merged,
            bounds,
            normalization,
            published_products: published.len() as u64,
            products_scored,
            batches,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use prodscore_core::errors::ApplicationError;
    use prodscore_core::scoring::RateSignal;

    use super::{ScoringJobError, ScoringStage};
    use crate::repositories::RepositoryError;

    #[test]
    fn stages_render_as_stable_labels() {
        assert_eq!(ScoringStage::Reset.to_string(), "reset");
        assert_eq!(ScoringStage::Aggregate(RateSignal::Novelty).to_string(), "aggregate:novelty");
        assert_eq!(ScoringStage::ScoreBatch(3).to_string(), "score_batch:3");
    }

    #[test]
    fn stage_failure_maps_to_persistence_error() {
        let failure = ScoringJobError::Stage {
            stage: ScoringStage::Normalize,
            source: RepositoryError::Decode("bad row".to_string()),
        };
        let application = ApplicationError::from(failure);

        assert_eq!(application.error_class(), "persistence");
        assert!(application.to_string().contains("scoring stage `normalize` failed"));
    }
}
