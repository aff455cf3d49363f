use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Whether `id` can match a uuid primary key
pub fn is_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Ids that can match a uuid key. Anything else matches no row.
pub fn uuid_ids(ids: &[Id]) -> Vec<Id> {
    ids.iter().filter(|id| is_uuid(id)).cloned().collect()
}

/// The four tables of the hosted store, named as the store knows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    ServiceCategories,
    Phases,
    PricingTiers,
    Features,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::ServiceCategories => "service_categories",
            Table::Phases => "phases",
            Table::PricingTiers => "pricing_tiers",
            Table::Features => "features",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true when a free-text form value is empty or whitespace only
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_match_store() {
        assert_eq!(Table::ServiceCategories.as_str(), "service_categories");
        assert_eq!(Table::Phases.to_string(), "phases");
        assert_eq!(Table::PricingTiers.as_str(), "pricing_tiers");
        assert_eq!(Table::Features.as_str(), "features");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_uuid_ids_drops_malformed() {
        let valid = generate_id();
        let ids = vec![valid.clone(), "not-a-uuid".to_string(), String::new()];
        assert_eq!(uuid_ids(&ids), vec![valid.clone()]);
        assert!(is_uuid(&valid));
        assert!(!is_uuid("p1"));
    }
}
