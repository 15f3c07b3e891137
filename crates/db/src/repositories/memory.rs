use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use prodscore_core::domain::product::{FavouriteMark, OrderLine, Product, ProductId};
use prodscore_core::domain::run::{ScoringRun, ScoringRunId};
use prodscore_core::domain::stats::ProductStats;
use prodscore_core::scoring::{
    novelty_days, Normalization, PopulationBounds, RateSignal, ScoringWeights,
};

use super::{CatalogRepository, RepositoryError, ScoringRunRepository, ScoringStore};

#[derive(Default)]
struct CatalogState {
    products: BTreeMap<ProductId, Product>,
    order_lines: Vec<OrderLine>,
    favourites: HashSet<FavouriteMark>,
    stats: BTreeMap<ProductId, ProductStats>,
}

impl CatalogState {
    fn raw_rates(&self, signal: RateSignal, as_of: DateTime<Utc>) -> HashMap<ProductId, f64> {
        let mut rates = HashMap::new();
        match signal {
            RateSignal::Order => {
                for line in &self.order_lines {
                    if self.products.contains_key(&line.product_id) {
                        *rates.entry(line.product_id).or_insert(0.0) += f64::from(line.quantity);
                    }
                }
            }
            RateSignal::Favourite => {
                for mark in &self.favourites {
                    if self.products.contains_key(&mark.product_id) {
                        *rates.entry(mark.product_id).or_insert(0.0) += 1.0;
                    }
                }
            }
            RateSignal::Novelty => {
                for product in self.products.values() {
                    if let Some(days) = novelty_days(as_of, product.date_created) {
                        rates.insert(product.id, days);
                    }
                }
            }
        }
        rates
    }
}

/// Catalog and scoring store held in process memory. Same contract as the
/// SQLite repositories, used by tests and dry runs.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn save_product(&self, product: Product) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn record_order_line(&self, line: OrderLine) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&line.product_id) {
            return Err(RepositoryError::Decode(format!(
                "order line references unknown product {}",
                line.product_id
            )));
        }
        state.order_lines.push(line);
        Ok(())
    }

    async fn record_favourite(&self, mark: FavouriteMark) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&mark.product_id) {
            return Err(RepositoryError::Decode(format!(
                "favourite references unknown product {}",
                mark.product_id
            )));
        }
        state.favourites.insert(mark);
        Ok(())
    }

    async fn ranked_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        let mut ranked: Vec<Product> =
            state.products.values().filter(|product| product.published).cloned().collect();
        ranked.sort_by(|a, b| match (a.score, b.score) {
            (Some(left), Some(right)) => right.total_cmp(&left).then(a.id.cmp(&b.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}

#[async_trait::async_trait]
impl ScoringStore for InMemoryCatalog {
    async fn reset_stats(&self) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let removed = state.stats.len() as u64;
        state.stats.clear();
        Ok(removed)
    }

    async fn seed_stats(&self) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let ids: Vec<ProductId> = state.products.keys().copied().collect();
        for id in &ids {
            state.stats.insert(*id, ProductStats::seeded(*id));
        }
        Ok(ids.len() as u64)
    }

    async fn merge_rate(
        &self,
        signal: RateSignal,
        as_of: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let rates = state.raw_rates(signal, as_of);
        for (product_id, rate) in &rates {
            let stats =
                state.stats.entry(*product_id).or_insert_with(|| ProductStats::seeded(*product_id));
            match signal {
                RateSignal::Order => stats.order_rate = *rate,
                RateSignal::Favourite => stats.favourite_rate = *rate,
                RateSignal::Novelty => stats.novelty_rate = *rate,
            }
        }
        Ok(rates.len() as u64)
    }

    async fn stats_bounds(&self) -> Result<PopulationBounds, RepositoryError> {
        let state = self.state.read().await;
        Ok(PopulationBounds::observe(state.stats.values()))
    }

    async fn normalize_stats(&self, normalization: &Normalization) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        for stats in state.stats.values_mut() {
            normalization.apply(stats);
        }
        Ok(state.stats.len() as u64)
    }

    async fn published_product_ids(&self) -> Result<Vec<ProductId>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|product| product.published)
            .map(|product| product.id)
            .collect())
    }

    async fn apply_scores(
        &self,
        product_ids: &[ProductId],
        weights: &ScoringWeights,
    ) -> Result<u64, RepositoryError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut updated = 0;
        for product_id in product_ids {
            let (Some(stats), Some(product)) =
                (state.stats.get(product_id), state.products.get_mut(product_id))
            else {
                continue;
            };
            product.score = Some(weights.composite(stats));
            updated += 1;
        }
        Ok(updated)
    }

    async fn find_stats(
        &self,
        product_id: ProductId,
    ) -> Result<Option<ProductStats>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.stats.get(&product_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryScoringRunRepository {
    runs: RwLock<Vec<ScoringRun>>,
}

#[async_trait::async_trait]
impl ScoringRunRepository for InMemoryScoringRunRepository {
    async fn save_run(&self, run: &ScoringRun) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        match runs.iter_mut().find(|stored| stored.id == run.id) {
            Some(stored) => *stored = run.clone(),
            None => runs.push(run.clone()),
        }
        Ok(())
    }

    async fn find_run(&self, id: &ScoringRunId) -> Result<Option<ScoringRun>, RepositoryError> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|run| &run.id == id).cloned())
    }

    async fn recent_runs(&self, limit: u32) -> Result<Vec<ScoringRun>, RepositoryError> {
        let runs = self.runs.read().await;
        Ok(runs.iter().rev().take(limit as usize).cloned().collect())
    }
}
