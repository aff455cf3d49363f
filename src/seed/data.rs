use crate::model::{NewCategory, NewFeature, NewPhase, NewTier};
use crate::store::traits::Store;
use anyhow::{Context, Result};
use rust_decimal::Decimal;

struct TierSeed {
    label: &'static str,
    price: i64,
    unit: &'static str,
    variable: bool,
    min_quantity: i32,
    features: &'static [&'static str],
}

struct PhaseSeed {
    title: &'static str,
    description: &'static str,
    objective: &'static str,
    tiers: &'static [TierSeed],
}

struct CategorySeed {
    name: &'static str,
    icon: &'static str,
    phases: &'static [PhaseSeed],
}

const fn fixed(label: &'static str, price: i64, features: &'static [&'static str]) -> TierSeed {
    TierSeed {
        label,
        price,
        unit: "Projet",
        variable: false,
        min_quantity: 1,
        features,
    }
}

const fn monthly(
    label: &'static str,
    price: i64,
    min_quantity: i32,
    features: &'static [&'static str],
) -> TierSeed {
    TierSeed {
        label,
        price,
        unit: "Mois",
        variable: true,
        min_quantity,
        features,
    }
}

/// Demonstration agency catalog
const CATALOG: &[CategorySeed] = &[
    CategorySeed {
        name: "Web Development",
        icon: "Code",
        phases: &[
            PhaseSeed {
                title: "Design",
                description: "Visual identity and page layouts for the site.",
                objective: "Agree on a look before any code is written.",
                tiers: &[
                    fixed("STARTER", 25000, &["Single page mockup", "One revision"]),
                    fixed(
                        "STANDARD_PLUS",
                        50000,
                        &["Up to five page mockups", "Mobile layouts", "Three revisions"],
                    ),
                    fixed(
                        "PRO",
                        90000,
                        &["Full design system", "Interactive prototype", "Unlimited revisions"],
                    ),
                ],
            },
            PhaseSeed {
                title: "Development",
                description: "Implementation of the approved design.",
                objective: "",
                tiers: &[
                    fixed("STARTER", 60000, &["Static pages", "Contact form"]),
                    fixed("PRO", 150000, &["CMS integration", "Multilingual content", "Analytics"]),
                ],
            },
            PhaseSeed {
                title: "Hosting",
                description: "Managed hosting and maintenance, billed monthly.",
                objective: "Keep the site fast and online.",
                tiers: &[
                    monthly("STARTER", 1000, 1, &["Shared hosting", "Weekly backups"]),
                    monthly("PRO", 2000, 3, &["Dedicated resources", "Daily backups", "Uptime monitoring"]),
                ],
            },
        ],
    },
    CategorySeed {
        name: "Marketing",
        icon: "Megaphone",
        phases: &[
            PhaseSeed {
                title: "SEO",
                description: "Search engine optimisation of existing content.",
                objective: "",
                tiers: &[
                    fixed("STARTER", 15000, &["Technical audit"]),
                    monthly("PRO", 8000, 6, &["Monthly keyword report", "Content recommendations"]),
                ],
            },
            PhaseSeed {
                title: "Social Media",
                description: "Content calendar and community management.",
                objective: "",
                tiers: &[monthly(
                    "STANDARD_PLUS",
                    12000,
                    1,
                    &["Three posts per week", "Two networks"],
                )],
            },
        ],
    },
];

/// Load the demonstration catalog. Does nothing if the store already holds categories.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let existing = store
        .list_categories()
        .await
        .context("Failed to read existing categories")?;
    if !existing.is_empty() {
        log::info!("Catalog already has {} categories, skipping seed", existing.len());
        return Ok(());
    }

    for (index, category_seed) in CATALOG.iter().enumerate() {
        let category = store
            .insert_category(NewCategory {
                name: category_seed.name.to_string(),
                icon: category_seed.icon.to_string(),
                sort_order: index as i32 + 1,
            })
            .await
            .with_context(|| format!("Failed to seed category {}", category_seed.name))?;

        for (phase_index, phase_seed) in category_seed.phases.iter().enumerate() {
            let phase = store
                .insert_phase(NewPhase {
                    category_id: category.id.clone(),
                    title: phase_seed.title.to_string(),
                    description: phase_seed.description.to_string(),
                    objective: phase_seed.objective.to_string(),
                    sort_order: phase_index as i32 + 1,
                })
                .await
                .with_context(|| format!("Failed to seed phase {}", phase_seed.title))?;

            for tier_seed in phase_seed.tiers {
                let tier = store
                    .insert_tier(NewTier {
                        phase_id: phase.id.clone(),
                        tier_type: tier_seed.label.to_string(),
                        price: Decimal::from(tier_seed.price),
                        unit_name: tier_seed.unit.to_string(),
                        is_variable_quantity: tier_seed.variable,
                        min_quantity: tier_seed.min_quantity,
                    })
                    .await
                    .with_context(|| {
                        format!("Failed to seed {} tier of {}", tier_seed.label, phase_seed.title)
                    })?;

                for (order, text) in tier_seed.features.iter().enumerate() {
                    store
                        .insert_feature(NewFeature {
                            tier_id: tier.id.clone(),
                            feature_text: text.to_string(),
                            display_order: order as i32,
                        })
                        .await
                        .context("Failed to seed feature")?;
                }
            }
        }
        log::info!("Seeded category {}", category_seed.name);
    }

    Ok(())
}
