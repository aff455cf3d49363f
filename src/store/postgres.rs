use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, Executor, PgPool, Row};

use crate::error::{GatewayError, GatewayResult};
use crate::model::{
    is_uuid, uuid_ids, CategoryUpdate, Feature, Id, NewCategory, NewFeature, NewPhase, NewTier,
    Phase, PhaseUpdate, PricingTier, ServiceCategory, Table, TierUpdate,
};
use crate::store::traits::{CategoryStore, FeatureStore, PhaseStore, TierStore};

const CATALOG_SCHEMA: &str = include_str!("../../migrations/0001_catalog.sql");

/// Direct SQL access to the catalog tables of the hosted database
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the catalog tables if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        self.pool
            .execute(CATALOG_SCHEMA)
            .await
            .context("Failed to apply catalog schema")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn category_from_row(row: &PgRow) -> GatewayResult<ServiceCategory> {
    Ok(ServiceCategory {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        icon: row.try_get("icon")?,
        sort_order: row.try_get("sort_order")?,
    })
}

fn phase_from_row(row: &PgRow) -> GatewayResult<Phase> {
    Ok(Phase {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        objective: row.try_get("objective")?,
        sort_order: row.try_get("sort_order")?,
    })
}

fn tier_from_row(row: &PgRow) -> GatewayResult<PricingTier> {
    Ok(PricingTier {
        id: row.try_get("id")?,
        phase_id: row.try_get("phase_id")?,
        tier_type: row.try_get("tier_type")?,
        price: row.try_get("price")?,
        unit_name: row.try_get("unit_name")?,
        is_variable_quantity: row.try_get("is_variable_quantity")?,
        min_quantity: row.try_get("min_quantity")?,
    })
}

fn feature_from_row(row: &PgRow) -> GatewayResult<Feature> {
    Ok(Feature {
        id: row.try_get("id")?,
        tier_id: row.try_get("tier_id")?,
        feature_text: row.try_get("feature_text")?,
        display_order: row.try_get("display_order")?,
    })
}

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// A malformed parent id names no row
fn require_parent(table: Table, id: &Id) -> GatewayResult<()> {
    if is_uuid(id) {
        Ok(())
    } else {
        Err(GatewayError::not_found(table, id))
    }
}

/// Foreign-key violations on insert mean the parent row is gone
fn insert_error(err: sqlx::Error, parent: Table, parent_id: &Id) -> GatewayError {
    let violates_parent = err
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
    if violates_parent {
        GatewayError::not_found(parent, parent_id)
    } else {
        GatewayError::from(err)
    }
}

const CATEGORY_COLUMNS: &str = "id::text AS id, name, icon, sort_order";
const PHASE_COLUMNS: &str =
    "id::text AS id, category_id::text AS category_id, title, description, objective, sort_order";
const TIER_COLUMNS: &str = "id::text AS id, phase_id::text AS phase_id, tier_type, price, unit_name, is_variable_quantity, min_quantity";
const FEATURE_COLUMNS: &str =
    "id::text AS id, tier_id::text AS tier_id, feature_text, display_order";

#[async_trait::async_trait]
impl CategoryStore for PostgresStore {
    async fn list_categories(&self) -> GatewayResult<Vec<ServiceCategory>> {
        let sql = format!(
            "SELECT {} FROM service_categories ORDER BY sort_order, created_at",
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(category_from_row).collect()
    }

    async fn insert_category(&self, category: NewCategory) -> GatewayResult<ServiceCategory> {
        let sql = format!(
            "INSERT INTO service_categories (name, icon, sort_order) VALUES ($1, $2, $3) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&category.name)
            .bind(&category.icon)
            .bind(category.sort_order)
            .fetch_one(&self.pool)
            .await?;
        category_from_row(&row)
    }

    async fn update_category(&self, id: &Id, update: CategoryUpdate) -> GatewayResult<u64> {
        if !is_uuid(id) {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE service_categories SET
                name = COALESCE($2, name),
                icon = COALESCE($3, icon),
                sort_order = COALESCE($4, sort_order)
            WHERE id = $1::uuid
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.icon)
        .bind(update.sort_order)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_category(&self, id: &Id) -> GatewayResult<u64> {
        if !is_uuid(id) {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM service_categories WHERE id = $1::uuid")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl PhaseStore for PostgresStore {
    async fn list_phases(&self, category_id: Option<&Id>) -> GatewayResult<Vec<Phase>> {
        if category_id.is_some_and(|id| !is_uuid(id)) {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM phases WHERE ($1::text IS NULL OR category_id = $1::uuid) ORDER BY sort_order, created_at",
            PHASE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(phase_from_row).collect()
    }

    async fn phase_ids_in_categories(&self, category_ids: &[Id]) -> GatewayResult<Vec<Id>> {
        let category_ids = uuid_ids(category_ids);
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT id::text AS id FROM phases WHERE category_id = ANY($1::text[]::uuid[])")
            .bind(&category_ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(GatewayError::from))
            .collect()
    }

    async fn insert_phase(&self, phase: NewPhase) -> GatewayResult<Phase> {
        let sql = format!(
            "INSERT INTO phases (category_id, title, description, objective, sort_order) VALUES ($1::uuid, $2, $3, $4, $5) RETURNING {}",
            PHASE_COLUMNS
        );
        require_parent(Table::ServiceCategories, &phase.category_id)?;
        let row = sqlx::query(&sql)
            .bind(&phase.category_id)
            .bind(&phase.title)
            .bind(&phase.description)
            .bind(&phase.objective)
            .bind(phase.sort_order)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| insert_error(e, Table::ServiceCategories, &phase.category_id))?;
        phase_from_row(&row)
    }

    async fn update_phase(&self, id: &Id, update: PhaseUpdate) -> GatewayResult<u64> {
        if !is_uuid(id) {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE phases SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                objective = COALESCE($4, objective),
                sort_order = COALESCE($5, sort_order)
            WHERE id = $1::uuid
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.description)
        .bind(update.objective)
        .bind(update.sort_order)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_phases(&self, ids: &[Id]) -> GatewayResult<u64> {
        let ids = uuid_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM phases WHERE id = ANY($1::text[]::uuid[])")
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl TierStore for PostgresStore {
    async fn list_tiers(&self, phase_id: Option<&Id>) -> GatewayResult<Vec<PricingTier>> {
        if phase_id.is_some_and(|id| !is_uuid(id)) {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM pricing_tiers WHERE ($1::text IS NULL OR phase_id = $1::uuid) ORDER BY price, created_at",
            TIER_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(phase_id).fetch_all(&self.pool).await?;
        rows.iter().map(tier_from_row).collect()
    }

    async fn tier_ids_in_phases(&self, phase_ids: &[Id]) -> GatewayResult<Vec<Id>> {
        let phase_ids = uuid_ids(phase_ids);
        if phase_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id::text AS id FROM pricing_tiers WHERE phase_id = ANY($1::text[]::uuid[])",
        )
        .bind(&phase_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(GatewayError::from))
            .collect()
    }

    async fn insert_tier(&self, tier: NewTier) -> GatewayResult<PricingTier> {
        let sql = format!(
            "INSERT INTO pricing_tiers (phase_id, tier_type, price, unit_name, is_variable_quantity, min_quantity) VALUES ($1::uuid, $2, $3, $4, $5, $6) RETURNING {}",
            TIER_COLUMNS
        );
        require_parent(Table::Phases, &tier.phase_id)?;
        let row = sqlx::query(&sql)
            .bind(&tier.phase_id)
            .bind(&tier.tier_type)
            .bind(tier.price)
            .bind(&tier.unit_name)
            .bind(tier.is_variable_quantity)
            .bind(tier.min_quantity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| insert_error(e, Table::Phases, &tier.phase_id))?;
        tier_from_row(&row)
    }

    async fn update_tier(&self, id: &Id, update: TierUpdate) -> GatewayResult<u64> {
        if !is_uuid(id) {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE pricing_tiers SET
                tier_type = COALESCE($2, tier_type),
                price = COALESCE($3, price),
                unit_name = COALESCE($4, unit_name),
                is_variable_quantity = COALESCE($5, is_variable_quantity),
                min_quantity = COALESCE($6, min_quantity)
            WHERE id = $1::uuid
            "#,
        )
        .bind(id)
        .bind(update.tier_type)
        .bind(update.price)
        .bind(update.unit_name)
        .bind(update.is_variable_quantity)
        .bind(update.min_quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_tiers(&self, ids: &[Id]) -> GatewayResult<u64> {
        let ids = uuid_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM pricing_tiers WHERE id = ANY($1::text[]::uuid[])")
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl FeatureStore for PostgresStore {
    async fn list_features(&self) -> GatewayResult<Vec<Feature>> {
        let sql = format!(
            "SELECT {} FROM features ORDER BY display_order, created_at",
            FEATURE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(feature_from_row).collect()
    }

    async fn insert_feature(&self, feature: NewFeature) -> GatewayResult<Feature> {
        let sql = format!(
            "INSERT INTO features (tier_id, feature_text, display_order) VALUES ($1::uuid, $2, $3) RETURNING {}",
            FEATURE_COLUMNS
        );
        require_parent(Table::PricingTiers, &feature.tier_id)?;
        let row = sqlx::query(&sql)
            .bind(&feature.tier_id)
            .bind(&feature.feature_text)
            .bind(feature.display_order)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| insert_error(e, Table::PricingTiers, &feature.tier_id))?;
        feature_from_row(&row)
    }

    async fn delete_features(&self, ids: &[Id]) -> GatewayResult<u64> {
        let ids = uuid_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM features WHERE id = ANY($1::text[]::uuid[])")
            .bind(&ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_features_for_tiers(&self, tier_ids: &[Id]) -> GatewayResult<u64> {
        let tier_ids = uuid_ids(tier_ids);
        if tier_ids.is_empty() {
            return Ok(0);
        }
        let result =
            sqlx::query("DELETE FROM features WHERE tier_id = ANY($1::text[]::uuid[])")
                .bind(&tier_ids)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
