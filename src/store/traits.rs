use crate::error::GatewayResult;
use crate::model::{
    CategoryUpdate, Feature, Id, NewCategory, NewFeature, NewPhase, NewTier, Phase, PhaseUpdate,
    PricingTier, ServiceCategory, TierUpdate,
};

// Every delete and update returns the affected-row count reported by the
// store. Interpreting a zero count is left to the caller.

#[async_trait::async_trait]
pub trait CategoryStore: Send + Sync {
    /// All categories ordered by sort order
    async fn list_categories(&self) -> GatewayResult<Vec<ServiceCategory>>;
    async fn insert_category(&self, category: NewCategory) -> GatewayResult<ServiceCategory>;
    async fn update_category(&self, id: &Id, update: CategoryUpdate) -> GatewayResult<u64>;
    async fn delete_category(&self, id: &Id) -> GatewayResult<u64>;
}

#[async_trait::async_trait]
pub trait PhaseStore: Send + Sync {
    /// Phases ordered by sort order, optionally restricted to one category
    async fn list_phases(&self, category_id: Option<&Id>) -> GatewayResult<Vec<Phase>>;
    /// Ids of every phase belonging to any of the given categories
    async fn phase_ids_in_categories(&self, category_ids: &[Id]) -> GatewayResult<Vec<Id>>;
    async fn insert_phase(&self, phase: NewPhase) -> GatewayResult<Phase>;
    async fn update_phase(&self, id: &Id, update: PhaseUpdate) -> GatewayResult<u64>;
    async fn delete_phases(&self, ids: &[Id]) -> GatewayResult<u64>;
}

#[async_trait::async_trait]
pub trait TierStore: Send + Sync {
    /// Tiers ordered by price, optionally restricted to one phase
    async fn list_tiers(&self, phase_id: Option<&Id>) -> GatewayResult<Vec<PricingTier>>;
    async fn tier_ids_in_phases(&self, phase_ids: &[Id]) -> GatewayResult<Vec<Id>>;
    async fn insert_tier(&self, tier: NewTier) -> GatewayResult<PricingTier>;
    async fn update_tier(&self, id: &Id, update: TierUpdate) -> GatewayResult<u64>;
    async fn delete_tiers(&self, ids: &[Id]) -> GatewayResult<u64>;
}

#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    /// Every feature of every tier, ordered by display order
    async fn list_features(&self) -> GatewayResult<Vec<Feature>>;
    async fn insert_feature(&self, feature: NewFeature) -> GatewayResult<Feature>;
    async fn delete_features(&self, ids: &[Id]) -> GatewayResult<u64>;
    /// Batched delete of all features owned by the given tiers
    async fn delete_features_for_tiers(&self, tier_ids: &[Id]) -> GatewayResult<u64>;
}

pub trait Store: CategoryStore + PhaseStore + TierStore + FeatureStore + Send + Sync {}

impl<T: CategoryStore + PhaseStore + TierStore + FeatureStore + Send + Sync> Store for T {}
