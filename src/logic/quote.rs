use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::logic::catalog::Catalog;
use crate::logic::estimate::Estimate;
use crate::model::EstimateSummary;

/// Presentation parameters of an exported quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteStyle {
    pub title: String,
    pub agency_name: String,
    pub currency: String,
    pub font_size: f32,
    pub margin: f32,
}

impl Default for QuoteStyle {
    fn default() -> Self {
        Self {
            title: "Project Estimate".to_string(),
            agency_name: "ProEstimate".to_string(),
            currency: "DZD".to_string(),
            font_size: 10.0,
            margin: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRow {
    pub description: String,
    /// Tier label first, then the tier's feature texts
    pub details: Vec<String>,
    pub quantity: String,
    pub total: String,
}

/// Static snapshot of an estimate, ready for export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteDocument {
    pub style: QuoteStyle,
    pub issued_on: NaiveDate,
    pub rows: Vec<QuoteRow>,
    pub total_amount: Decimal,
    pub total: String,
}

/// `56000` → `DZD 56,000`; fractional amounts keep up to two decimals
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    let rounded = amount.round_dp(2).normalize();
    let text = rounded.abs().to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
        None => (text, None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(&fraction);
    }
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{} {}{}", currency, sign, grouped)
}

impl QuoteDocument {
    /// Snapshot the estimate. Returns `None` when nothing is selected: an empty
    /// quote is never produced.
    pub fn build(estimate: &Estimate, catalog: &Catalog, style: &QuoteStyle) -> Option<Self> {
        Self::from_summary(&estimate.summary(catalog), catalog, style, Utc::now().date_naive())
    }

    pub fn from_summary(
        summary: &EstimateSummary,
        catalog: &Catalog,
        style: &QuoteStyle,
        issued_on: NaiveDate,
    ) -> Option<Self> {
        if summary.is_empty() {
            return None;
        }

        let rows = summary
            .lines
            .iter()
            .map(|line| {
                let mut details = Vec::new();
                match &line.tier_type {
                    Some(label) => {
                        details.push(label.clone());
                        details.extend(
                            catalog
                                .features_for(&line.tier_id)
                                .map(|f| f.feature_text.clone()),
                        );
                    }
                    None => details.push("(no longer offered)".to_string()),
                }
                let quantity = match &line.unit_name {
                    Some(unit) if line.is_variable_quantity => format!("{} {}", line.quantity, unit),
                    Some(unit) => format!("1 {}", unit),
                    None => line.quantity.to_string(),
                };
                QuoteRow {
                    description: line
                        .phase_title
                        .clone()
                        .unwrap_or_else(|| "Untitled phase".to_string()),
                    details,
                    quantity,
                    total: format_amount(line.line_total, &style.currency),
                }
            })
            .collect();

        Some(Self {
            style: style.clone(),
            issued_on,
            rows,
            total_amount: summary.total,
            total: format_amount(summary.total, &style.currency),
        })
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{} - {}\n{}\n\n",
            self.style.agency_name, self.style.title, self.issued_on
        );
        for row in &self.rows {
            out.push_str(&format!(
                "{} | {} | {} | {}\n",
                row.description,
                row.details.join(", "),
                row.quantity,
                row.total
            ));
        }
        out.push_str(&format!("\nTotal: {}\n", self.total));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feature, Phase, PricingTier};

    fn catalog() -> Catalog {
        let phase = |id: &str, title: &str| Phase {
            id: id.to_string(),
            category_id: "web".to_string(),
            title: title.to_string(),
            description: String::new(),
            objective: String::new(),
            sort_order: 0,
        };
        Catalog::new(
            vec![],
            vec![phase("design", "Design"), phase("hosting", "Hosting")],
            vec![
                PricingTier {
                    id: "standard".to_string(),
                    phase_id: "design".to_string(),
                    tier_type: "STANDARD_PLUS".to_string(),
                    price: Decimal::from(50000),
                    unit_name: "Projet".to_string(),
                    is_variable_quantity: false,
                    min_quantity: 1,
                },
                PricingTier {
                    id: "pro".to_string(),
                    phase_id: "hosting".to_string(),
                    tier_type: "PRO".to_string(),
                    price: Decimal::from(2000),
                    unit_name: "Mois".to_string(),
                    is_variable_quantity: true,
                    min_quantity: 3,
                },
            ],
            vec![Feature {
                id: "f1".to_string(),
                tier_id: "standard".to_string(),
                feature_text: "Brand guide".to_string(),
                display_order: 0,
            }],
        )
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(56000), "DZD"), "DZD 56,000");
        assert_eq!(format_amount(Decimal::from(999), "DZD"), "DZD 999");
        assert_eq!(format_amount(Decimal::new(12345678, 2), "EUR"), "EUR 123,456.78");
        assert_eq!(format_amount(Decimal::ZERO, "DZD"), "DZD 0");
    }

    #[test]
    fn test_empty_estimate_builds_nothing() {
        let doc = QuoteDocument::build(&Estimate::new(), &catalog(), &QuoteStyle::default());
        assert!(doc.is_none());
    }

    #[test]
    fn test_rows_and_total() {
        let catalog = catalog();
        let mut estimate = Estimate::new();
        estimate.select_tier(&catalog, "design", "standard");
        estimate.select_tier(&catalog, "hosting", "pro");

        let doc = QuoteDocument::build(&estimate, &catalog, &QuoteStyle::default()).unwrap();
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.rows[0].description, "Design");
        assert_eq!(doc.rows[0].details, vec!["STANDARD_PLUS", "Brand guide"]);
        assert_eq!(doc.rows[0].quantity, "1 Projet");
        assert_eq!(doc.rows[1].quantity, "3 Mois");
        assert_eq!(doc.rows[1].total, "DZD 6,000");
        assert_eq!(doc.total, "DZD 56,000");

        let text = doc.render_text();
        assert!(text.contains("Hosting | PRO | 3 Mois | DZD 6,000"));
        assert!(text.ends_with("Total: DZD 56,000\n"));
    }

    #[test]
    fn test_missing_tier_row() {
        let mut catalog = catalog();
        let mut estimate = Estimate::new();
        estimate.select_tier(&catalog, "hosting", "pro");
        catalog.forget_tier("pro");

        let doc = QuoteDocument::build(&estimate, &catalog, &QuoteStyle::default()).unwrap();
        assert_eq!(doc.rows[0].details, vec!["(no longer offered)"]);
        assert_eq!(doc.total_amount, Decimal::ZERO);
    }
}
