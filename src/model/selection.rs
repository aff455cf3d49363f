use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::Id;

/// A visitor's choice of tier (and quantity) for one phase.
///
/// Selections are ephemeral and hold only a soft reference to the tier: the
/// tier may disappear from the catalog while the selection is still held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub tier_id: Id,
    pub quantity: u32,
}

impl Selection {
    pub fn new(tier_id: Id, quantity: u32) -> Self {
        Self {
            tier_id,
            quantity: quantity.max(1),
        }
    }
}

/// One priced line of an estimate, joined with catalog data for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub phase_id: Id,
    pub phase_title: Option<String>,
    pub tier_id: Id,
    pub tier_type: Option<String>,
    pub unit_name: Option<String>,
    pub quantity: u32,
    pub is_variable_quantity: bool,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// The selected tier no longer exists in the catalog
    pub missing_tier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateSummary {
    pub lines: Vec<LineItem>,
    pub total: Decimal,
}

impl EstimateSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
