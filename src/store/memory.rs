use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::error::{GatewayError, GatewayResult};
use crate::model::{
    generate_id, CategoryUpdate, Feature, Id, NewCategory, NewFeature, NewPhase, NewTier, Phase,
    PhaseUpdate, PricingTier, ServiceCategory, Table, TierUpdate,
};
use crate::store::traits::{CategoryStore, FeatureStore, PhaseStore, TierStore};

#[derive(Debug, Default)]
struct Tables {
    categories: Vec<ServiceCategory>,
    phases: Vec<Phase>,
    tiers: Vec<PricingTier>,
    features: Vec<Feature>,
}

/// Row-level-security and failure simulation for the in-memory store
#[derive(Debug, Default)]
struct Policy {
    /// Writes on these tables silently match zero rows
    deny_writes: HashSet<Table>,
    /// Deletes on these tables fail with a transport error
    fail_deletes: HashSet<Table>,
    /// Reads on these tables fail with a transport error
    fail_reads: HashSet<Table>,
}

/// Row counts per table, in hierarchy order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub categories: usize,
    pub phases: usize,
    pub tiers: usize,
    pub features: usize,
}

/// In-process stand-in for the hosted store. Rows keep insertion order, which
/// is the tie-breaker for every ordered listing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    policy: Mutex<Policy>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a row-level-security policy that hides every row of `table` from writes
    pub fn deny_writes(&self, table: Table) {
        self.policy.lock().deny_writes.insert(table);
    }

    pub fn fail_deletes(&self, table: Table) {
        self.policy.lock().fail_deletes.insert(table);
    }

    pub fn fail_reads(&self, table: Table) {
        self.policy.lock().fail_reads.insert(table);
    }

    pub fn clear_policies(&self) {
        *self.policy.lock() = Policy::default();
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            categories: tables.categories.len(),
            phases: tables.phases.len(),
            tiers: tables.tiers.len(),
            features: tables.features.len(),
        }
    }

    fn check_read(&self, table: Table) -> GatewayResult<()> {
        if self.policy.lock().fail_reads.contains(&table) {
            return Err(GatewayError::Transport(format!(
                "simulated read failure on {}",
                table
            )));
        }
        Ok(())
    }

    fn check_delete(&self, table: Table) -> GatewayResult<()> {
        if self.policy.lock().fail_deletes.contains(&table) {
            return Err(GatewayError::Transport(format!(
                "simulated delete failure on {}",
                table
            )));
        }
        Ok(())
    }

    fn writes_denied(&self, table: Table) -> bool {
        self.policy.lock().deny_writes.contains(&table)
    }
}

/// Remove matching rows unless writes are denied, returning the affected count
fn remove_where<T>(rows: &mut Vec<T>, denied: bool, matches: impl Fn(&T) -> bool) -> u64 {
    if denied {
        return 0;
    }
    let before = rows.len();
    rows.retain(|row| !matches(row));
    (before - rows.len()) as u64
}

fn ids_set(ids: &[Id]) -> HashSet<&str> {
    ids.iter().map(|id| id.as_str()).collect()
}

#[async_trait::async_trait]
impl CategoryStore for MemoryStore {
    async fn list_categories(&self) -> GatewayResult<Vec<ServiceCategory>> {
        self.check_read(Table::ServiceCategories)?;
        let tables = self.tables.read().await;
        let mut categories = tables.categories.clone();
        categories.sort_by_key(|c| c.sort_order);
        Ok(categories)
    }

    async fn insert_category(&self, category: NewCategory) -> GatewayResult<ServiceCategory> {
        let row = ServiceCategory {
            id: generate_id(),
            name: category.name,
            icon: category.icon,
            sort_order: category.sort_order,
        };
        self.tables.write().await.categories.push(row.clone());
        Ok(row)
    }

    async fn update_category(&self, id: &Id, update: CategoryUpdate) -> GatewayResult<u64> {
        if self.writes_denied(Table::ServiceCategories) {
            return Ok(0);
        }
        let mut tables = self.tables.write().await;
        let mut affected = 0;
        for category in tables.categories.iter_mut().filter(|c| &c.id == id) {
            update.apply(category);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_category(&self, id: &Id) -> GatewayResult<u64> {
        self.check_delete(Table::ServiceCategories)?;
        let denied = self.writes_denied(Table::ServiceCategories);
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.categories, denied, |c| &c.id == id))
    }
}

#[async_trait::async_trait]
impl PhaseStore for MemoryStore {
    async fn list_phases(&self, category_id: Option<&Id>) -> GatewayResult<Vec<Phase>> {
        self.check_read(Table::Phases)?;
        let tables = self.tables.read().await;
        let mut phases: Vec<Phase> = tables
            .phases
            .iter()
            .filter(|p| category_id.map_or(true, |id| &p.category_id == id))
            .cloned()
            .collect();
        phases.sort_by_key(|p| p.sort_order);
        Ok(phases)
    }

    async fn phase_ids_in_categories(&self, category_ids: &[Id]) -> GatewayResult<Vec<Id>> {
        self.check_read(Table::Phases)?;
        let wanted = ids_set(category_ids);
        let tables = self.tables.read().await;
        Ok(tables
            .phases
            .iter()
            .filter(|p| wanted.contains(p.category_id.as_str()))
            .map(|p| p.id.clone())
            .collect())
    }

    async fn insert_phase(&self, phase: NewPhase) -> GatewayResult<Phase> {
        let mut tables = self.tables.write().await;
        if !tables.categories.iter().any(|c| c.id == phase.category_id) {
            return Err(GatewayError::not_found(
                Table::ServiceCategories,
                &phase.category_id,
            ));
        }
        let row = Phase {
            id: generate_id(),
            category_id: phase.category_id,
            title: phase.title,
            description: phase.description,
            objective: phase.objective,
            sort_order: phase.sort_order,
        };
        tables.phases.push(row.clone());
        Ok(row)
    }

    async fn update_phase(&self, id: &Id, update: PhaseUpdate) -> GatewayResult<u64> {
        if self.writes_denied(Table::Phases) {
            return Ok(0);
        }
        let mut tables = self.tables.write().await;
        let mut affected = 0;
        for phase in tables.phases.iter_mut().filter(|p| &p.id == id) {
            update.apply(phase);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_phases(&self, ids: &[Id]) -> GatewayResult<u64> {
        self.check_delete(Table::Phases)?;
        let denied = self.writes_denied(Table::Phases);
        let wanted = ids_set(ids);
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.phases, denied, |p| {
            wanted.contains(p.id.as_str())
        }))
    }
}

#[async_trait::async_trait]
impl TierStore for MemoryStore {
    async fn list_tiers(&self, phase_id: Option<&Id>) -> GatewayResult<Vec<PricingTier>> {
        self.check_read(Table::PricingTiers)?;
        let tables = self.tables.read().await;
        let mut tiers: Vec<PricingTier> = tables
            .tiers
            .iter()
            .filter(|t| phase_id.map_or(true, |id| &t.phase_id == id))
            .cloned()
            .collect();
        tiers.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(tiers)
    }

    async fn tier_ids_in_phases(&self, phase_ids: &[Id]) -> GatewayResult<Vec<Id>> {
        self.check_read(Table::PricingTiers)?;
        let wanted = ids_set(phase_ids);
        let tables = self.tables.read().await;
        Ok(tables
            .tiers
            .iter()
            .filter(|t| wanted.contains(t.phase_id.as_str()))
            .map(|t| t.id.clone())
            .collect())
    }

    async fn insert_tier(&self, tier: NewTier) -> GatewayResult<PricingTier> {
        let mut tables = self.tables.write().await;
        if !tables.phases.iter().any(|p| p.id == tier.phase_id) {
            return Err(GatewayError::not_found(Table::Phases, &tier.phase_id));
        }
        let row = PricingTier {
            id: generate_id(),
            phase_id: tier.phase_id,
            tier_type: tier.tier_type,
            price: tier.price,
            unit_name: tier.unit_name,
            is_variable_quantity: tier.is_variable_quantity,
            min_quantity: tier.min_quantity,
        };
        tables.tiers.push(row.clone());
        Ok(row)
    }

    async fn update_tier(&self, id: &Id, update: TierUpdate) -> GatewayResult<u64> {
        if self.writes_denied(Table::PricingTiers) {
            return Ok(0);
        }
        let mut tables = self.tables.write().await;
        let mut affected = 0;
        for tier in tables.tiers.iter_mut().filter(|t| &t.id == id) {
            update.apply(tier);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_tiers(&self, ids: &[Id]) -> GatewayResult<u64> {
        self.check_delete(Table::PricingTiers)?;
        let denied = self.writes_denied(Table::PricingTiers);
        let wanted = ids_set(ids);
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.tiers, denied, |t| {
            wanted.contains(t.id.as_str())
        }))
    }
}

#[async_trait::async_trait]
impl FeatureStore for MemoryStore {
    async fn list_features(&self) -> GatewayResult<Vec<Feature>> {
        self.check_read(Table::Features)?;
        let tables = self.tables.read().await;
        let mut features = tables.features.clone();
        features.sort_by_key(|f| f.display_order);
        Ok(features)
    }

    async fn insert_feature(&self, feature: NewFeature) -> GatewayResult<Feature> {
        let mut tables = self.tables.write().await;
        if !tables.tiers.iter().any(|t| t.id == feature.tier_id) {
            return Err(GatewayError::not_found(Table::PricingTiers, &feature.tier_id));
        }
        let row = Feature {
            id: generate_id(),
            tier_id: feature.tier_id,
            feature_text: feature.feature_text,
            display_order: feature.display_order,
        };
        tables.features.push(row.clone());
        Ok(row)
    }

    async fn delete_features(&self, ids: &[Id]) -> GatewayResult<u64> {
        self.check_delete(Table::Features)?;
        let denied = self.writes_denied(Table::Features);
        let wanted = ids_set(ids);
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.features, denied, |f| {
            wanted.contains(f.id.as_str())
        }))
    }

    async fn delete_features_for_tiers(&self, tier_ids: &[Id]) -> GatewayResult<u64> {
        self.check_delete(Table::Features)?;
        let denied = self.writes_denied(Table::Features);
        let wanted = ids_set(tier_ids);
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.features, denied, |f| {
            wanted.contains(f.tier_id.as_str())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    async fn phases(store: &MemoryStore, count: usize) -> Vec<Id> {
        let category = store
            .insert_category(NewCategory {
                name: "Web".to_string(),
                icon: "Box".to_string(),
                sort_order: 1,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let phase = store
                .insert_phase(NewPhase {
                    category_id: category.id.clone(),
                    title: format!("Phase {}", i),
                    description: String::new(),
                    objective: String::new(),
                    sort_order: i as i32,
                })
                .await
                .unwrap();
            ids.push(phase.id);
        }
        ids
    }

    fn new_tier(phase_id: &Id, label: &str, price: i64) -> NewTier {
        NewTier {
            phase_id: phase_id.clone(),
            tier_type: label.to_string(),
            price: Decimal::from(price),
            unit_name: "Projet".to_string(),
            is_variable_quantity: false,
            min_quantity: 1,
        }
    }

    #[tokio::test]
    async fn test_listing_orders_with_stable_ties() {
        let store = MemoryStore::new();
        for (name, order) in [("b", 2), ("a1", 1), ("a2", 1)] {
            store
                .insert_category(NewCategory {
                    name: name.to_string(),
                    icon: "Box".to_string(),
                    sort_order: order,
                })
                .await
                .unwrap();
        }
        let names: Vec<String> = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a1", "a2", "b"]);
    }

    #[tokio::test]
    async fn test_tiers_filtered_by_phase_and_ordered_by_price() {
        let store = MemoryStore::new();
        let ids = phases(&store, 2).await;
        let (p1, p2) = (ids[0].clone(), ids[1].clone());
        store.insert_tier(new_tier(&p1, "PRO", 900)).await.unwrap();
        store.insert_tier(new_tier(&p2, "PRO", 10)).await.unwrap();
        store.insert_tier(new_tier(&p1, "STARTER", 100)).await.unwrap();

        let tiers = store.list_tiers(Some(&p1)).await.unwrap();
        let labels: Vec<&str> = tiers.iter().map(|t| t.tier_type.as_str()).collect();
        assert_eq!(labels, vec!["STARTER", "PRO"]);
    }

    #[tokio::test]
    async fn test_denied_writes_match_zero_rows() {
        let store = MemoryStore::new();
        let phase_id = phases(&store, 1).await.remove(0);
        let tier = store
            .insert_tier(new_tier(&phase_id, "PRO", 10))
            .await
            .unwrap();
        store.deny_writes(Table::PricingTiers);

        assert_eq!(store.delete_tiers(&[tier.id.clone()]).await.unwrap(), 0);
        assert_eq!(
            store
                .update_tier(&tier.id, TierUpdate::default())
                .await
                .unwrap(),
            0
        );
        assert_eq!(store.row_counts().await.tiers, 1);
    }

    #[tokio::test]
    async fn test_insert_under_missing_parent_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .insert_tier(new_tier(&"gone".to_string(), "PRO", 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NotFound { table: Table::Phases, ref id } if id == "gone"
        ));
        let err = store
            .insert_feature(NewFeature {
                tier_id: "gone".to_string(),
                feature_text: "Orphan".to_string(),
                display_order: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(store.row_counts().await, RowCounts::default());
    }

    #[tokio::test]
    async fn test_failed_reads_surface_transport_errors() {
        let store = MemoryStore::new();
        store.fail_reads(Table::Features);
        assert!(matches!(
            store.list_features().await,
            Err(GatewayError::Transport(_))
        ));
        store.clear_policies();
        assert!(store.list_features().await.unwrap().is_empty());
    }
}
