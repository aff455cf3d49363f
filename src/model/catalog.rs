use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Top-level grouping of offered services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCategory {
    pub id: Id,
    pub name: String,
    pub icon: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: Id,
    pub category_id: Id,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objective: String,
    pub sort_order: i32,
}

/// One priced option within a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub id: Id,
    pub phase_id: Id,
    pub tier_type: String,
    pub price: Decimal,
    pub unit_name: String,
    #[serde(default)]
    pub is_variable_quantity: bool,
    #[serde(default = "default_min_quantity")]
    pub min_quantity: i32,
}

fn default_min_quantity() -> i32 {
    1
}

impl PricingTier {
    /// Quantity a fresh selection of this tier starts at. Unset or non-positive
    /// minimums start at one.
    pub fn initial_quantity(&self) -> u32 {
        if self.min_quantity > 0 {
            self.min_quantity as u32
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: Id,
    pub tier_id: Id,
    pub feature_text: String,
    #[serde(default)]
    pub display_order: i32,
}

// Insert payloads. Ids are assigned by the store.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPhase {
    pub category_id: Id,
    pub title: String,
    pub description: String,
    pub objective: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTier {
    pub phase_id: Id,
    pub tier_type: String,
    pub price: Decimal,
    pub unit_name: String,
    pub is_variable_quantity: bool,
    pub min_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeature {
    pub tier_id: Id,
    pub feature_text: String,
    pub display_order: i32,
}

// Partial updates. Absent fields are left untouched by the store.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_variable_quantity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<i32>,
}

impl CategoryUpdate {
    pub fn apply(&self, category: &mut ServiceCategory) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(icon) = &self.icon {
            category.icon = icon.clone();
        }
        if let Some(sort_order) = self.sort_order {
            category.sort_order = sort_order;
        }
    }
}

impl PhaseUpdate {
    pub fn apply(&self, phase: &mut Phase) {
        if let Some(title) = &self.title {
            phase.title = title.clone();
        }
        if let Some(description) = &self.description {
            phase.description = description.clone();
        }
        if let Some(objective) = &self.objective {
            phase.objective = objective.clone();
        }
        if let Some(sort_order) = self.sort_order {
            phase.sort_order = sort_order;
        }
    }
}

impl TierUpdate {
    pub fn apply(&self, tier: &mut PricingTier) {
        if let Some(tier_type) = &self.tier_type {
            tier.tier_type = tier_type.clone();
        }
        if let Some(price) = self.price {
            tier.price = price;
        }
        if let Some(unit_name) = &self.unit_name {
            tier.unit_name = unit_name.clone();
        }
        if let Some(variable) = self.is_variable_quantity {
            tier.is_variable_quantity = variable;
        }
        if let Some(min_quantity) = self.min_quantity {
            tier.min_quantity = min_quantity;
        }
    }
}

/// Labels offered by the admin "new tier" form. Once stored the label is free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierLabel {
    Starter,
    StandardPlus,
    Pro,
    Entreprise,
}

impl TierLabel {
    pub const ALL: [TierLabel; 4] = [
        TierLabel::Starter,
        TierLabel::StandardPlus,
        TierLabel::Pro,
        TierLabel::Entreprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierLabel::Starter => "STARTER",
            TierLabel::StandardPlus => "STANDARD_PLUS",
            TierLabel::Pro => "PRO",
            TierLabel::Entreprise => "ENTREPRISE",
        }
    }
}

impl Default for TierLabel {
    fn default() -> Self {
        TierLabel::Starter
    }
}

/// Admin form for a new pricing tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTierForm {
    #[serde(default)]
    pub tier_type: TierLabel,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_unit_name")]
    pub unit_name: String,
}

fn default_unit_name() -> String {
    "Projet".to_string()
}

impl Default for NewTierForm {
    fn default() -> Self {
        Self {
            tier_type: TierLabel::default(),
            price: Decimal::ZERO,
            unit_name: default_unit_name(),
        }
    }
}

impl NewTierForm {
    /// New tiers always start as fixed-quantity with a minimum of one
    pub fn into_new_tier(self, phase_id: Id) -> NewTier {
        NewTier {
            phase_id,
            tier_type: self.tier_type.as_str().to_string(),
            price: self.price,
            unit_name: self.unit_name,
            is_variable_quantity: false,
            min_quantity: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(min_quantity: i32) -> PricingTier {
        PricingTier {
            id: "t1".to_string(),
            phase_id: "p1".to_string(),
            tier_type: "PRO".to_string(),
            price: Decimal::from(2000),
            unit_name: "Mois".to_string(),
            is_variable_quantity: true,
            min_quantity,
        }
    }

    #[test]
    fn test_initial_quantity_uses_minimum() {
        assert_eq!(tier(3).initial_quantity(), 3);
        assert_eq!(tier(0).initial_quantity(), 1);
        assert_eq!(tier(-4).initial_quantity(), 1);
    }

    #[test]
    fn test_tier_deserializes_store_row() {
        let json = r#"{"id":"t1","phase_id":"p1","tier_type":"PRO","price":2000,"unit_name":"Mois","is_variable_quantity":true,"min_quantity":3}"#;
        let parsed: PricingTier = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, tier(3));
    }

    #[test]
    fn test_update_payload_skips_absent_fields() {
        let update = TierUpdate {
            price: Some(Decimal::from(100)),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object.contains_key("price"));
    }

    #[test]
    fn test_update_apply_touches_only_given_fields() {
        let mut t = tier(3);
        TierUpdate {
            unit_name: Some("Heure".to_string()),
            ..Default::default()
        }
        .apply(&mut t);
        assert_eq!(t.unit_name, "Heure");
        assert_eq!(t.price, Decimal::from(2000));
    }

    #[test]
    fn test_tier_form_defaults() {
        let form: NewTierForm = serde_json::from_str("{}").unwrap();
        assert_eq!(form, NewTierForm::default());
        let new_tier = form.into_new_tier("p1".to_string());
        assert_eq!(new_tier.tier_type, "STARTER");
        assert_eq!(new_tier.unit_name, "Projet");
        assert!(!new_tier.is_variable_quantity);
        assert_eq!(new_tier.min_quantity, 1);
    }

    #[test]
    fn test_tier_label_wire_names() {
        let labels: Vec<&str> = TierLabel::ALL.iter().map(|l| l.as_str()).collect();
        assert_eq!(labels, vec!["STARTER", "STANDARD_PLUS", "PRO", "ENTREPRISE"]);
        let parsed: TierLabel = serde_json::from_str("\"STANDARD_PLUS\"").unwrap();
        assert_eq!(parsed, TierLabel::StandardPlus);
    }
}
