use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::model::{Feature, Id, Phase, PricingTier, ServiceCategory, Table};
use crate::store::traits::Store;

/// In-memory snapshot of the category → phase → tier → feature hierarchy.
///
/// The snapshot keeps every record set in its display order: categories and
/// phases by sort order, tiers by price, features by display order. Ties keep
/// the order reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<ServiceCategory>,
    pub phases: Vec<Phase>,
    pub tiers: Vec<PricingTier>,
    pub features: Vec<Feature>,
}

impl Catalog {
    pub fn new(
        mut categories: Vec<ServiceCategory>,
        mut phases: Vec<Phase>,
        mut tiers: Vec<PricingTier>,
        mut features: Vec<Feature>,
    ) -> Self {
        categories.sort_by_key(|c| c.sort_order);
        phases.sort_by_key(|p| p.sort_order);
        tiers.sort_by(|a, b| a.price.cmp(&b.price));
        features.sort_by_key(|f| f.display_order);
        Self {
            categories,
            phases,
            tiers,
            features,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &[ServiceCategory] {
        &self.categories
    }

    /// The category the estimator opens on
    pub fn first_category(&self) -> Option<&ServiceCategory> {
        self.categories.first()
    }

    pub fn category(&self, id: &str) -> Option<&ServiceCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    pub fn tier(&self, id: &str) -> Option<&PricingTier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    pub fn phases_for<'a>(&'a self, category_id: &'a str) -> impl Iterator<Item = &'a Phase> + 'a {
        self.phases
            .iter()
            .filter(move |p| p.category_id == category_id)
    }

    pub fn tiers_for<'a>(&'a self, phase_id: &'a str) -> impl Iterator<Item = &'a PricingTier> + 'a {
        self.tiers.iter().filter(move |t| t.phase_id == phase_id)
    }

    pub fn features_for<'a>(&'a self, tier_id: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features.iter().filter(move |f| f.tier_id == tier_id)
    }

    /// Drop a tier and its features from the snapshot
    pub fn forget_tier(&mut self, tier_id: &str) {
        self.tiers.retain(|t| t.id != tier_id);
        self.features.retain(|f| f.tier_id != tier_id);
    }
}

/// Features filtered down to one tier. Use on the unscoped feature list
/// returned by [`CatalogReader::load_tiers_and_features`].
pub fn features_of_tier<'a>(features: &'a [Feature], tier_id: &'a str) -> Vec<&'a Feature> {
    features.iter().filter(|f| f.tier_id == tier_id).collect()
}

/// Read side of the catalog. Read failures are logged and degraded to empty
/// results: callers see "nothing loaded yet" and "load failed" the same way.
pub struct CatalogReader<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for CatalogReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn or_empty<T>(table: Table, result: GatewayResult<Vec<T>>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("Failed to load {}: {}", table, e);
            Vec::new()
        }
    }
}

impl<S: Store> CatalogReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn load_categories(&self) -> Vec<ServiceCategory> {
        let mut categories = or_empty(
            Table::ServiceCategories,
            self.store.list_categories().await,
        );
        categories.sort_by_key(|c| c.sort_order);
        categories
    }

    pub async fn load_phases(&self, category_id: &Id) -> Vec<Phase> {
        let mut phases = or_empty(Table::Phases, self.store.list_phases(Some(category_id)).await);
        phases.retain(|p| &p.category_id == category_id);
        phases.sort_by_key(|p| p.sort_order);
        phases
    }

    /// Tiers of one phase plus the features of *every* tier.
    ///
    /// Features are fetched in one unscoped request instead of one request
    /// per tier; filter them by tier id before display.
    pub async fn load_tiers_and_features(&self, phase_id: &Id) -> (Vec<PricingTier>, Vec<Feature>) {
        let (tiers, features) = tokio::join!(
            self.store.list_tiers(Some(phase_id)),
            self.store.list_features()
        );
        let mut tiers = or_empty(Table::PricingTiers, tiers);
        tiers.retain(|t| &t.phase_id == phase_id);
        tiers.sort_by(|a, b| a.price.cmp(&b.price));
        let mut features = or_empty(Table::Features, features);
        features.sort_by_key(|f| f.display_order);
        (tiers, features)
    }

    /// Whole catalog in four concurrent reads
    pub async fn load_catalog(&self) -> Catalog {
        let (categories, phases, tiers, features) = tokio::join!(
            self.store.list_categories(),
            self.store.list_phases(None),
            self.store.list_tiers(None),
            self.store.list_features()
        );
        Catalog::new(
            or_empty(Table::ServiceCategories, categories),
            or_empty(Table::Phases, phases),
            or_empty(Table::PricingTiers, tiers),
            or_empty(Table::Features, features),
        )
    }
}
