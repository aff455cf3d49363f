use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

use crate::error::GatewayError;
use crate::logic::cascade::{CascadeDeleter, CascadeError, CascadeReport};
use crate::model::{
    is_blank, CategoryUpdate, Feature, IconId, Id, NewCategory, NewFeature, NewPhase, NewTierForm,
    Phase, PhaseUpdate, PricingTier, ServiceCategory, Table, TierUpdate,
};
use crate::store::traits::Store;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("{0}")]
    Validation(String),

    #[error("phase {phase_id} already has a {label} tier")]
    DuplicateTierLabel { phase_id: Id, label: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Cascade(#[from] CascadeError),
}

pub type EditorResult<T> = Result<T, EditorError>;

fn require_text(field: &str, value: &str) -> EditorResult<()> {
    if is_blank(value) {
        return Err(EditorError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Upper bound on a tier price
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn require_valid_price(price: Decimal) -> EditorResult<()> {
    if price < Decimal::ZERO {
        return Err(EditorError::Validation(format!(
            "price must not be negative (got {})",
            price
        )));
    }
    if price > MAX_PRICE {
        return Err(EditorError::Validation(format!(
            "price must not exceed {} (got {})",
            MAX_PRICE, price
        )));
    }
    Ok(())
}

/// Icon stored for a category. No name, or a blank one, gives the default
/// icon; any other name resolves against the known set.
fn category_icon(name: Option<&str>) -> IconId {
    match name {
        Some(name) if !is_blank(name) => IconId::resolve(name),
        _ => IconId::DEFAULT,
    }
}

/// Zero matched rows on an update means the policy hid the row
fn require_affected(table: Table, id: &Id, count: u64) -> EditorResult<()> {
    if count == 0 {
        log::warn!("Update of {} {} matched no rows", table, id);
        return Err(GatewayError::permission_denied(table, id.clone()).into());
    }
    Ok(())
}

/// Admin-side writes to the catalog.
///
/// Nothing is cached here: callers re-read the catalog after each write.
pub struct CatalogEditor<S: Store> {
    store: Arc<S>,
    cascade: CascadeDeleter<S>,
}

impl<S: Store> Clone for CatalogEditor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cascade: self.cascade.clone(),
        }
    }
}

impl<S: Store> CatalogEditor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            cascade: CascadeDeleter::new(Arc::clone(&store)),
            store,
        }
    }

    /// New categories go last
    pub async fn create_category(&self, name: &str, icon: Option<&str>) -> EditorResult<ServiceCategory> {
        require_text("name", name)?;
        let icon = category_icon(icon);
        let count = self.store.list_categories().await?.len();

        let category = self
            .store
            .insert_category(NewCategory {
                name: name.trim().to_string(),
                icon: icon.name().to_string(),
                sort_order: count as i32 + 1,
            })
            .await?;
        log::info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    pub async fn update_category(&self, id: &Id, mut update: CategoryUpdate) -> EditorResult<()> {
        if let Some(name) = &update.name {
            require_text("name", name)?;
        }
        if let Some(icon) = update.icon.take() {
            update.icon = Some(category_icon(Some(&icon)).name().to_string());
        }
        let count = self.store.update_category(id, update).await?;
        require_affected(Table::ServiceCategories, id, count)?;
        log::info!("Updated category {}", id);
        Ok(())
    }

    pub async fn create_phase(&self, category_id: &Id, title: &str, description: &str) -> EditorResult<Phase> {
        require_text("title", title)?;
        let count = self.store.list_phases(Some(category_id)).await?.len();

        let phase = self
            .store
            .insert_phase(NewPhase {
                category_id: category_id.clone(),
                title: title.trim().to_string(),
                description: description.to_string(),
                objective: String::new(),
                sort_order: count as i32 + 1,
            })
            .await?;
        log::info!("Created phase {} in category {}", phase.id, category_id);
        Ok(phase)
    }

    pub async fn update_phase(&self, id: &Id, update: PhaseUpdate) -> EditorResult<()> {
        if let Some(title) = &update.title {
            require_text("title", title)?;
        }
        let count = self.store.update_phase(id, update).await?;
        require_affected(Table::Phases, id, count)?;
        log::info!("Updated phase {}", id);
        Ok(())
    }

    /// Tier labels are unique per phase. This is only enforced here, not by the store.
    pub async fn create_tier(&self, phase_id: &Id, form: NewTierForm) -> EditorResult<PricingTier> {
        require_valid_price(form.price)?;
        require_text("unit name", &form.unit_name)?;
        let label = form.tier_type.as_str();
        let existing = self.store.list_tiers(Some(phase_id)).await?;
        if existing
            .iter()
            .any(|t| &t.phase_id == phase_id && t.tier_type == label)
        {
            return Err(EditorError::DuplicateTierLabel {
                phase_id: phase_id.clone(),
                label: label.to_string(),
            });
        }

        let tier = self
            .store
            .insert_tier(form.into_new_tier(phase_id.clone()))
            .await?;
        log::info!("Created {} tier {} in phase {}", tier.tier_type, tier.id, phase_id);
        Ok(tier)
    }

    pub async fn update_tier(&self, id: &Id, update: TierUpdate) -> EditorResult<()> {
        if let Some(price) = update.price {
            require_valid_price(price)?;
        }
        if update.min_quantity.is_some_and(|m| m < 0) {
            return Err(EditorError::Validation(
                "minimum quantity must not be negative".to_string(),
            ));
        }
        if let Some(tier_type) = &update.tier_type {
            require_text("tier type", tier_type)?;
        }
        let count = self.store.update_tier(id, update).await?;
        require_affected(Table::PricingTiers, id, count)?;
        log::info!("Updated tier {}", id);
        Ok(())
    }

    /// New features are appended after the tier's existing ones
    pub async fn create_feature(&self, tier_id: &Id, text: &str) -> EditorResult<Feature> {
        require_text("feature text", text)?;
        let count = self
            .store
            .list_features()
            .await?
            .iter()
            .filter(|f| &f.tier_id == tier_id)
            .count();

        let feature = self
            .store
            .insert_feature(NewFeature {
                tier_id: tier_id.clone(),
                feature_text: text.trim().to_string(),
                display_order: count as i32,
            })
            .await?;
        log::info!("Added feature {} to tier {}", feature.id, tier_id);
        Ok(feature)
    }

    pub async fn delete_category(&self, id: &Id) -> EditorResult<CascadeReport> {
        Ok(self.cascade.delete_category(id).await?)
    }

    pub async fn delete_phase(&self, id: &Id) -> EditorResult<CascadeReport> {
        Ok(self.cascade.delete_phase(id).await?)
    }

    pub async fn delete_tier(&self, id: &Id) -> EditorResult<CascadeReport> {
        Ok(self.cascade.delete_tier(id).await?)
    }

    pub async fn delete_feature(&self, id: &Id) -> EditorResult<CascadeReport> {
        Ok(self.cascade.delete_feature(id).await?)
    }
}
