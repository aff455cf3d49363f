use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{GatewayError, GatewayResult};
use crate::model::{Id, Table};
use crate::store::traits::Store;

/// One step of a cascade delete, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStep {
    ResolvePhases,
    ResolveTiers,
    DeleteFeatures,
    DeleteTiers,
    DeletePhases,
    DeleteTarget,
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CascadeStep::ResolvePhases => "resolve phases",
            CascadeStep::ResolveTiers => "resolve tiers",
            CascadeStep::DeleteFeatures => "delete features",
            CascadeStep::DeleteTiers => "delete tiers",
            CascadeStep::DeletePhases => "delete phases",
            CascadeStep::DeleteTarget => "delete target",
        };
        f.write_str(name)
    }
}

/// Rows removed so far by a cascade. On failure this is the partial outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub features: u64,
    pub tiers: u64,
    pub phases: u64,
    /// Whether the target row itself was removed
    pub target: bool,
}

#[derive(Error, Debug)]
#[error("cascade delete stopped at {step}: {source}")]
pub struct CascadeError {
    pub step: CascadeStep,
    pub completed: CascadeReport,
    #[source]
    pub source: GatewayError,
}

impl CascadeError {
    pub fn is_permission_denied(&self) -> bool {
        self.source.is_permission_denied()
    }
}

pub type CascadeResult = Result<CascadeReport, CascadeError>;

/// Ordered, non-transactional delete of a catalog subtree.
///
/// Children go strictly before parents. The first failing step stops the
/// saga; rows already removed stay removed.
pub struct CascadeDeleter<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for CascadeDeleter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Tracks progress through the saga so every failure carries its step and
/// what was already done.
struct Saga<'a> {
    table: Table,
    id: &'a Id,
    report: CascadeReport,
}

impl<'a> Saga<'a> {
    fn new(table: Table, id: &'a Id) -> Self {
        log::debug!("Cascade delete of {} {} started", table, id);
        Self {
            table,
            id,
            report: CascadeReport::default(),
        }
    }

    fn fail(&self, step: CascadeStep, source: GatewayError) -> CascadeError {
        if source.is_permission_denied() {
            log::warn!(
                "Cascade delete of {} {} denied at {} after {:?}",
                self.table,
                self.id,
                step,
                self.report
            );
        } else {
            log::warn!(
                "Cascade delete of {} {} failed at {}: {}",
                self.table,
                self.id,
                step,
                source
            );
        }
        CascadeError {
            step,
            completed: self.report,
            source,
        }
    }

    fn check<T>(&self, step: CascadeStep, result: GatewayResult<T>) -> Result<T, CascadeError> {
        result.map_err(|e| self.fail(step, e))
    }

    /// A batch that resolved ids but removed nothing was hidden by policy
    fn check_batch(
        &self,
        step: CascadeStep,
        table: Table,
        ids: &[Id],
        result: GatewayResult<u64>,
    ) -> Result<u64, CascadeError> {
        let count = self.check(step, result)?;
        if count == 0 && !ids.is_empty() {
            return Err(self.fail(
                step,
                GatewayError::permission_denied(table, format!("{} ids", ids.len())),
            ));
        }
        log::debug!("Cascade step {} removed {} {} rows", step, count, table);
        Ok(count)
    }

    fn finish(mut self, result: GatewayResult<u64>) -> CascadeResult {
        let count = self.check(CascadeStep::DeleteTarget, result)?;
        if count == 0 {
            return Err(self.fail(
                CascadeStep::DeleteTarget,
                GatewayError::permission_denied(self.table, self.id.clone()),
            ));
        }
        self.report.target = true;
        log::info!(
            "Deleted {} {} ({} phases, {} tiers, {} features)",
            self.table,
            self.id,
            self.report.phases,
            self.report.tiers,
            self.report.features
        );
        Ok(self.report)
    }
}

impl<S: Store> CascadeDeleter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Features and tiers below `phase_ids`, removed bottom-up
    async fn delete_below_phases(
        &self,
        saga: &mut Saga<'_>,
        phase_ids: &[Id],
    ) -> Result<(), CascadeError> {
        let tier_ids = saga.check(
            CascadeStep::ResolveTiers,
            self.store.tier_ids_in_phases(phase_ids).await,
        )?;
        self.delete_tier_subtree(saga, &tier_ids).await
    }

    async fn delete_tier_subtree(
        &self,
        saga: &mut Saga<'_>,
        tier_ids: &[Id],
    ) -> Result<(), CascadeError> {
        // Tiers may legitimately have no features, so a zero count here is accepted
        saga.report.features = saga.check(
            CascadeStep::DeleteFeatures,
            self.store.delete_features_for_tiers(tier_ids).await,
        )?;
        saga.report.tiers = saga.check_batch(
            CascadeStep::DeleteTiers,
            Table::PricingTiers,
            tier_ids,
            self.store.delete_tiers(tier_ids).await,
        )?;
        Ok(())
    }

    pub async fn delete_category(&self, id: &Id) -> CascadeResult {
        let mut saga = Saga::new(Table::ServiceCategories, id);
        let phase_ids = saga.check(
            CascadeStep::ResolvePhases,
            self.store
                .phase_ids_in_categories(std::slice::from_ref(id))
                .await,
        )?;
        self.delete_below_phases(&mut saga, &phase_ids).await?;
        saga.report.phases = saga.check_batch(
            CascadeStep::DeletePhases,
            Table::Phases,
            &phase_ids,
            self.store.delete_phases(&phase_ids).await,
        )?;
        let result = self.store.delete_category(id).await;
        saga.finish(result)
    }

    pub async fn delete_phase(&self, id: &Id) -> CascadeResult {
        let mut saga = Saga::new(Table::Phases, id);
        let target = std::slice::from_ref(id);
        self.delete_below_phases(&mut saga, target).await?;
        let result = self.store.delete_phases(target).await;
        saga.finish(result)
    }

    pub async fn delete_tier(&self, id: &Id) -> CascadeResult {
        let mut saga = Saga::new(Table::PricingTiers, id);
        let target = std::slice::from_ref(id);
        saga.report.features = saga.check(
            CascadeStep::DeleteFeatures,
            self.store.delete_features_for_tiers(target).await,
        )?;
        let result = self.store.delete_tiers(target).await;
        saga.finish(result)
    }

    pub async fn delete_feature(&self, id: &Id) -> CascadeResult {
        let saga = Saga::new(Table::Features, id);
        let result = self.store.delete_features(std::slice::from_ref(id)).await;
        saga.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCategory, NewFeature, NewPhase, NewTier};
    use crate::store::memory::RowCounts;
    use crate::store::traits::{CategoryStore, FeatureStore, PhaseStore, TierStore};
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    /// One extra category is seeded so the tests can check it survives
    async fn seed_tree(store: &MemoryStore, phases: usize, tiers: usize, features: usize) -> Id {
        let mut target = None;
        for name in ["Target", "Bystander"] {
            let category = store
                .insert_category(NewCategory {
                    name: name.to_string(),
                    icon: "Box".to_string(),
                    sort_order: 1,
                })
                .await
                .unwrap();
            for p in 0..phases {
                let phase = store
                    .insert_phase(NewPhase {
                        category_id: category.id.clone(),
                        title: format!("Phase {}", p),
                        description: String::new(),
                        objective: String::new(),
                        sort_order: p as i32,
                    })
                    .await
                    .unwrap();
                for t in 0..tiers {
                    let tier = store
                        .insert_tier(NewTier {
                            phase_id: phase.id.clone(),
                            tier_type: format!("T{}", t),
                            price: Decimal::from(100 * t as i64),
                            unit_name: "Projet".to_string(),
                            is_variable_quantity: false,
                            min_quantity: 1,
                        })
                        .await
                        .unwrap();
                    for f in 0..features {
                        store
                            .insert_feature(NewFeature {
                                tier_id: tier.id.clone(),
                                feature_text: format!("Feature {}", f),
                                display_order: f as i32,
                            })
                            .await
                            .unwrap();
                    }
                }
            }
            target.get_or_insert(category.id);
        }
        target.unwrap()
    }

    fn tree_counts(phases: usize, tiers: usize, features: usize) -> RowCounts {
        RowCounts {
            categories: 1,
            phases,
            tiers: phases * tiers,
            features: phases * tiers * features,
        }
    }

    #[tokio::test]
    async fn test_category_cascade_removes_whole_subtree() {
        for (n, m, k) in [(0, 0, 0), (1, 1, 0), (2, 3, 4), (3, 1, 2)] {
            let store = Arc::new(MemoryStore::new());
            let id = seed_tree(&store, n, m, k).await;
            let report = CascadeDeleter::new(Arc::clone(&store))
                .delete_category(&id)
                .await
                .unwrap();

            assert_eq!(
                report,
                CascadeReport {
                    features: (n * m * k) as u64,
                    tiers: (n * m) as u64,
                    phases: n as u64,
                    target: true,
                }
            );
            assert_eq!(store.row_counts().await, tree_counts(n, m, k));
        }
    }

    #[tokio::test]
    async fn test_denied_target_reports_completed_children() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_tree(&store, 2, 2, 2).await;
        store.deny_writes(Table::ServiceCategories);

        let err = CascadeDeleter::new(Arc::clone(&store))
            .delete_category(&id)
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(err.step, CascadeStep::DeleteTarget);
        assert_eq!(err.completed.phases, 2);
        assert!(!err.completed.target);

        let counts = store.row_counts().await;
        assert_eq!(counts.categories, 2);
        assert_eq!(counts.phases, 2);
    }

    #[tokio::test]
    async fn test_denied_child_level_stops_saga() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_tree(&store, 2, 2, 1).await;
        store.deny_writes(Table::Phases);

        let err = CascadeDeleter::new(Arc::clone(&store))
            .delete_category(&id)
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(err.step, CascadeStep::DeletePhases);
        assert_eq!(
            err.completed,
            CascadeReport {
                features: 4,
                tiers: 4,
                phases: 0,
                target: false,
            }
        );
        // Parent rows are untouched once a child level is refused
        let counts = store.row_counts().await;
        assert_eq!(counts.categories, 2);
        assert_eq!(counts.phases, 4);
        assert_eq!(counts.tiers, 4);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_permission_denied() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_tree(&store, 1, 2, 3).await;
        store.fail_deletes(Table::PricingTiers);

        let err = CascadeDeleter::new(Arc::clone(&store))
            .delete_category(&id)
            .await
            .unwrap_err();
        assert!(!err.is_permission_denied());
        assert!(matches!(err.source, GatewayError::Transport(_)));
        assert_eq!(err.step, CascadeStep::DeleteTiers);
        assert_eq!(err.completed.features, 6);
        assert_eq!(store.row_counts().await.tiers, 4);
    }

    #[tokio::test]
    async fn test_feature_failure_leaves_parents_untouched() {
        let store = Arc::new(MemoryStore::new());
        let id = seed_tree(&store, 2, 2, 2).await;
        let before = store.row_counts().await;
        store.fail_deletes(Table::Features);

        let err = CascadeDeleter::new(Arc::clone(&store))
            .delete_category(&id)
            .await
            .unwrap_err();
        assert!(!err.is_permission_denied());
        assert_eq!(err.step, CascadeStep::DeleteFeatures);
        assert_eq!(err.completed, CascadeReport::default());
        assert_eq!(store.row_counts().await, before);
    }

    #[tokio::test]
    async fn test_phase_and_tier_cascades() {
        let store = Arc::new(MemoryStore::new());
        seed_tree(&store, 1, 2, 2).await;
        let deleter = CascadeDeleter::new(Arc::clone(&store));

        let tiers = store.list_tiers(None).await.unwrap();
        let report = deleter.delete_tier(&tiers[0].id).await.unwrap();
        assert_eq!(report.features, 2);
        assert!(report.target);

        // The phase keeps one tier with two features
        let phase_id = tiers[0].phase_id.clone();
        let report = deleter.delete_phase(&phase_id).await.unwrap();
        assert_eq!(report.tiers, 1);
        assert_eq!(report.features, 2);
        assert!(store.list_phases(None).await.unwrap().iter().all(|p| p.id != phase_id));
    }

    #[tokio::test]
    async fn test_zero_count_delete_is_permission_denied() {
        let store = Arc::new(MemoryStore::new());
        let deleter = CascadeDeleter::new(Arc::clone(&store));

        let err = deleter.delete_feature(&"missing".to_string()).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(err.step, CascadeStep::DeleteTarget);

        seed_tree(&store, 1, 1, 1).await;
        let feature = store.list_features().await.unwrap().remove(0);
        store.deny_writes(Table::Features);
        let err = deleter.delete_feature(&feature.id).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(store.row_counts().await.features, 2);
    }
}
