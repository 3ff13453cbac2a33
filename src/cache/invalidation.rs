//! Invalidation coordinator.
//!
//! Every mutating service calls [`InvalidationCoordinator::invalidate`] after
//! its write has succeeded. Invalidation never fails the caller: the worst a
//! missed purge can do is serve a stale entry until its TTL runs out.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};

use super::config::CacheConfig;
use super::planner::{InvalidationPlan, Mutation};
use super::store::CacheStore;

pub struct InvalidationCoordinator {
    config: CacheConfig,
    store: Arc<CacheStore>,
}

impl InvalidationCoordinator {
    pub fn new(config: CacheConfig, store: Arc<CacheStore>) -> Self {
        Self { config, store }
    }

    pub fn invalidate(&self, mutation: &Mutation) {
        if !self.config.enabled {
            debug!(mutation = mutation.kind(), "Cache invalidation skipped: cache disabled");
            return;
        }

        let plan = InvalidationPlan::for_mutation(mutation);
        let removed = self.execute(&plan);
        counter!("penmark_cache_invalidated_total", "mutation" => mutation.kind())
            .increment(removed as u64);

        info!(
            mutation = mutation.kind(),
            plan = %plan,
            removed,
            "Cache invalidated"
        );
    }

    fn execute(&self, plan: &InvalidationPlan) -> usize {
        let by_namespace: usize = plan
            .namespaces
            .iter()
            .map(|namespace| self.store.delete_namespace(namespace))
            .sum();
        by_namespace + self.store.delete_many(&plan.keys)
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }
}
