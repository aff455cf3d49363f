use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::logic::catalog::Catalog;
use crate::model::{EstimateSummary, Id, LineItem, PricingTier, Selection};

/// A visitor's selections, at most one per phase, keyed by phase id.
///
/// All cost figures are derived on demand from the selections and the tier
/// catalog; nothing is cached between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    selections: BTreeMap<Id, Selection>,
}

/// Largest quantity a selection can hold
pub const MAX_QUANTITY: u32 = 1_000_000;

/// Cost of one selection. Unresolved tiers cost nothing.
pub fn line_total(selection: &Selection, tier: Option<&PricingTier>) -> Decimal {
    match tier {
        Some(tier) if tier.is_variable_quantity => tier
            .price
            .checked_mul(Decimal::from(selection.quantity))
            .unwrap_or_else(|| saturated(tier.price)),
        Some(tier) => tier.price,
        None => Decimal::ZERO,
    }
}

/// Sum that pins to the representable range instead of overflowing
fn saturating_sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .unwrap_or_else(|| saturated(amount))
    })
}

fn saturated(direction: Decimal) -> Decimal {
    if direction.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    }
}

/// Coerce a raw quantity form value. Anything that is not an integer becomes 1.
pub fn parse_quantity(input: &str) -> i64 {
    input.trim().parse::<i64>().unwrap_or(1)
}

impl Estimate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn selection(&self, phase_id: &str) -> Option<&Selection> {
        self.selections.get(phase_id)
    }

    pub fn selections(&self) -> impl Iterator<Item = (&Id, &Selection)> {
        self.selections.iter()
    }

    /// Select `tier_id` for `phase_id`, or clear the phase if that exact tier
    /// is already selected. A new selection starts at the tier's minimum quantity.
    pub fn select_tier(&mut self, catalog: &Catalog, phase_id: &str, tier_id: &str) {
        if self
            .selections
            .get(phase_id)
            .is_some_and(|s| s.tier_id == tier_id)
        {
            self.selections.remove(phase_id);
            return;
        }
        let quantity = catalog
            .tier(tier_id)
            .map(PricingTier::initial_quantity)
            .unwrap_or(1)
            .min(MAX_QUANTITY);
        self.selections.insert(
            phase_id.to_string(),
            Selection::new(tier_id.to_string(), quantity),
        );
    }

    /// Set the quantity of the phase's selection, kept within 1..=[`MAX_QUANTITY`].
    /// Does nothing when the phase has no selection.
    pub fn set_quantity(&mut self, phase_id: &str, quantity: i64) {
        if let Some(selection) = self.selections.get_mut(phase_id) {
            selection.quantity = quantity.clamp(1, MAX_QUANTITY as i64) as u32;
        }
    }

    pub fn set_quantity_input(&mut self, phase_id: &str, input: &str) {
        self.set_quantity(phase_id, parse_quantity(input));
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    /// Drop selections whose tier no longer exists. Returns the number dropped.
    pub fn prune_missing(&mut self, catalog: &Catalog) -> usize {
        let before = self.selections.len();
        self.selections
            .retain(|_, selection| catalog.tier(&selection.tier_id).is_some());
        before - self.selections.len()
    }

    pub fn grand_total(&self, catalog: &Catalog) -> Decimal {
        saturating_sum(
            self.selections
                .values()
                .map(|selection| line_total(selection, catalog.tier(&selection.tier_id))),
        )
    }

    pub fn summary(&self, catalog: &Catalog) -> EstimateSummary {
        let lines: Vec<LineItem> = self
            .selections
            .iter()
            .map(|(phase_id, selection)| {
                let tier = catalog.tier(&selection.tier_id);
                LineItem {
                    phase_id: phase_id.clone(),
                    phase_title: catalog.phase(phase_id).map(|p| p.title.clone()),
                    tier_id: selection.tier_id.clone(),
                    tier_type: tier.map(|t| t.tier_type.clone()),
                    unit_name: tier.map(|t| t.unit_name.clone()),
                    quantity: selection.quantity,
                    is_variable_quantity: tier.map_or(false, |t| t.is_variable_quantity),
                    unit_price: tier.map_or(Decimal::ZERO, |t| t.price),
                    line_total: line_total(selection, tier),
                    missing_tier: tier.is_none(),
                }
            })
            .collect();
        let total = saturating_sum(lines.iter().map(|l| l.line_total));
        EstimateSummary { lines, total }
    }
}
