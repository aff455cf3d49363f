use itertools::Itertools;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};
use crate::model::{
    is_uuid, uuid_ids, CategoryUpdate, Feature, Id, NewCategory, NewFeature, NewPhase, NewTier, Phase, PhaseUpdate,
    PricingTier, ServiceCategory, Table, TierUpdate,
};
use crate::store::auth::SessionContext;
use crate::store::traits::{CategoryStore, FeatureStore, PhaseStore, TierStore};

/// Gateway to the hosted store's PostgREST-style HTTP surface.
///
/// Requests carry the project api key and, when an admin is signed in, the
/// session's access token so that row-level security sees the admin.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    rest_url: String,
    api_key: String,
    sessions: Option<SessionContext>,
}

#[derive(Debug, serde::Deserialize)]
struct IdRow {
    id: Id,
}

impl RestStore {
    /// `project_url` is the hosted project root, e.g. `https://xyz.supabase.co`
    pub fn new(project_url: &str, api_key: &str) -> GatewayResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            sessions: None,
        })
    }

    /// Attach the session context whose access token authorizes writes
    pub fn with_sessions(mut self, sessions: SessionContext) -> Self {
        self.sessions = Some(sessions);
        self
    }

    fn request(&self, method: reqwest::Method, table: Table) -> RequestBuilder {
        let bearer = self
            .sessions
            .as_ref()
            .and_then(|s| s.access_token())
            .unwrap_or_else(|| self.api_key.clone());
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        params: &[(&str, String)],
    ) -> GatewayResult<Vec<T>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&[("select", "*")])
            .query(params)
            .send()
            .await?;
        let response = ensure_success(table, response).await?;
        decode(table, response).await
    }

    async fn select_ids(&self, table: Table, params: &[(&str, String)]) -> GatewayResult<Vec<Id>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&[("select", "id")])
            .query(params)
            .send()
            .await?;
        let response = ensure_success(table, response).await?;
        let rows: Vec<IdRow> = decode(table, response).await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(&self, table: Table, body: &B) -> GatewayResult<T> {
        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&[body])
            .send()
            .await?;
        let response = ensure_success(table, response).await?;
        let mut rows: Vec<T> = decode(table, response).await?;
        if rows.is_empty() {
            // Inserted but not visible to us: the policy hides the new row
            return Err(GatewayError::permission_denied(table, "insert"));
        }
        Ok(rows.swap_remove(0))
    }

    /// Insert a row under `parent_id`. A missing parent is reported as not found.
    async fn insert_child<B: Serialize, T: DeserializeOwned>(
        &self,
        table: Table,
        body: &B,
        parent: Table,
        parent_id: &Id,
    ) -> GatewayResult<T> {
        if !is_uuid(parent_id) {
            return Err(GatewayError::not_found(parent, parent_id));
        }
        self.insert(table, body)
            .await
            .map_err(|e| missing_parent(e, parent, parent_id))
    }

    async fn update<B: Serialize>(&self, table: Table, id: &Id, body: &B) -> GatewayResult<u64> {
        if !is_uuid(id) {
            return Ok(0);
        }
        let response = self
            .request(reqwest::Method::PATCH, table)
            .header("Prefer", "return=minimal,count=exact")
            .query(&[("id", eq(id))])
            .json(body)
            .send()
            .await?;
        let response = ensure_success(table, response).await?;
        affected_count(table, response).await
    }

    async fn delete(&self, table: Table, params: &[(&str, String)]) -> GatewayResult<u64> {
        let response = self
            .request(reqwest::Method::DELETE, table)
            .header("Prefer", "return=minimal,count=exact")
            .query(params)
            .send()
            .await?;
        let response = ensure_success(table, response).await?;
        affected_count(table, response).await
    }
}

/// Postgres foreign-key violation, relayed by the store with status 409
fn missing_parent(err: GatewayError, parent: Table, parent_id: &Id) -> GatewayError {
    match err {
        GatewayError::Rejected {
            status: 409,
            ref message,
            ..
        } if message.contains("23503") => GatewayError::not_found(parent, parent_id),
        other => other,
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// `in.("a","b")` filter; values are quoted so ids may contain reserved characters
fn in_list(values: &[Id]) -> String {
    format!(
        "in.({})",
        values
            .iter()
            .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
            .join(",")
    )
}

async fn ensure_success(table: Table, response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(GatewayError::Rejected {
        table,
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(table: Table, response: Response) -> GatewayResult<Vec<T>> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| GatewayError::Decode {
        table,
        message: e.to_string(),
    })
}

/// Affected-row count from a `Content-Range: 0-4/5` or `*/0` header
pub fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

async fn affected_count(table: Table, response: Response) -> GatewayResult<u64> {
    let header_value = response
        .headers()
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    match header_value.as_deref().and_then(parse_content_range) {
        Some(count) => Ok(count),
        None => Err(GatewayError::Decode {
            table,
            message: format!(
                "missing affected-row count (content-range: {:?})",
                header_value
            ),
        }),
    }
}

#[async_trait::async_trait]
impl CategoryStore for RestStore {
    async fn list_categories(&self) -> GatewayResult<Vec<ServiceCategory>> {
        self.select(
            Table::ServiceCategories,
            &[("order", "sort_order.asc".to_string())],
        )
        .await
    }

    async fn insert_category(&self, category: NewCategory) -> GatewayResult<ServiceCategory> {
        self.insert(Table::ServiceCategories, &category).await
    }

    async fn update_category(&self, id: &Id, update: CategoryUpdate) -> GatewayResult<u64> {
        self.update(Table::ServiceCategories, id, &update).await
    }

    async fn delete_category(&self, id: &Id) -> GatewayResult<u64> {
        if !is_uuid(id) {
            return Ok(0);
        }
        self.delete(Table::ServiceCategories, &[("id", eq(id))]).await
    }
}

#[async_trait::async_trait]
impl PhaseStore for RestStore {
    async fn list_phases(&self, category_id: Option<&Id>) -> GatewayResult<Vec<Phase>> {
        let mut params = vec![("order", "sort_order.asc".to_string())];
        if let Some(category_id) = category_id {
            if !is_uuid(category_id) {
                return Ok(Vec::new());
            }
            params.push(("category_id", eq(category_id)));
        }
        self.select(Table::Phases, &params).await
    }

    async fn phase_ids_in_categories(&self, category_ids: &[Id]) -> GatewayResult<Vec<Id>> {
        let category_ids = uuid_ids(category_ids);
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select_ids(Table::Phases, &[("category_id", in_list(&category_ids))])
            .await
    }

    async fn insert_phase(&self, phase: NewPhase) -> GatewayResult<Phase> {
        self.insert_child(Table::Phases, &phase, Table::ServiceCategories, &phase.category_id)
            .await
    }

    async fn update_phase(&self, id: &Id, update: PhaseUpdate) -> GatewayResult<u64> {
        self.update(Table::Phases, id, &update).await
    }

    async fn delete_phases(&self, ids: &[Id]) -> GatewayResult<u64> {
        let ids = uuid_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete(Table::Phases, &[("id", in_list(&ids))]).await
    }
}

#[async_trait::async_trait]
impl TierStore for RestStore {
    async fn list_tiers(&self, phase_id: Option<&Id>) -> GatewayResult<Vec<PricingTier>> {
        let mut params = vec![("order", "price.asc".to_string())];
        if let Some(phase_id) = phase_id {
            if !is_uuid(phase_id) {
                return Ok(Vec::new());
            }
            params.push(("phase_id", eq(phase_id)));
        }
        self.select(Table::PricingTiers, &params).await
    }

    async fn tier_ids_in_phases(&self, phase_ids: &[Id]) -> GatewayResult<Vec<Id>> {
        let phase_ids = uuid_ids(phase_ids);
        if phase_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select_ids(Table::PricingTiers, &[("phase_id", in_list(&phase_ids))])
            .await
    }

    async fn insert_tier(&self, tier: NewTier) -> GatewayResult<PricingTier> {
        self.insert_child(Table::PricingTiers, &tier, Table::Phases, &tier.phase_id)
            .await
    }

    async fn update_tier(&self, id: &Id, update: TierUpdate) -> GatewayResult<u64> {
        self.update(Table::PricingTiers, id, &update).await
    }

    async fn delete_tiers(&self, ids: &[Id]) -> GatewayResult<u64> {
        let ids = uuid_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete(Table::PricingTiers, &[("id", in_list(&ids))])
            .await
    }
}

#[async_trait::async_trait]
impl FeatureStore for RestStore {
    async fn list_features(&self) -> GatewayResult<Vec<Feature>> {
        self.select(
            Table::Features,
            &[("order", "display_order.asc".to_string())],
        )
        .await
    }

    async fn insert_feature(&self, feature: NewFeature) -> GatewayResult<Feature> {
        self.insert_child(Table::Features, &feature, Table::PricingTiers, &feature.tier_id)
            .await
    }

    async fn delete_features(&self, ids: &[Id]) -> GatewayResult<u64> {
        let ids = uuid_ids(ids);
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete(Table::Features, &[("id", in_list(&ids))]).await
    }

    async fn delete_features_for_tiers(&self, tier_ids: &[Id]) -> GatewayResult<u64> {
        let tier_ids = uuid_ids(tier_ids);
        if tier_ids.is_empty() {
            return Ok(0);
        }
        self.delete(Table::Features, &[("tier_id", in_list(&tier_ids))])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-4/5"), Some(5));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("*/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_in_list_quotes_values() {
        let ids = vec!["a1".to_string(), "b,2".to_string()];
        assert_eq!(in_list(&ids), r#"in.("a1","b,2")"#);
    }

    #[test]
    fn test_foreign_key_rejection_is_missing_parent() {
        let rejected = GatewayError::Rejected {
            table: Table::PricingTiers,
            status: 409,
            message: r#"{"code":"23503","message":"insert or update violates foreign key constraint"}"#
                .to_string(),
        };
        let err = missing_parent(rejected, Table::Phases, &"p1".to_string());
        assert!(matches!(err, GatewayError::NotFound { table: Table::Phases, ref id } if id == "p1"));

        let conflict = GatewayError::Rejected {
            table: Table::PricingTiers,
            status: 409,
            message: r#"{"code":"23505"}"#.to_string(),
        };
        let err = missing_parent(conflict, Table::Phases, &"p1".to_string());
        assert!(matches!(err, GatewayError::Rejected { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_malformed_ids_never_reach_the_store() {
        // Unroutable host: any request would fail with a transport error
        let store = RestStore::new("http://127.0.0.1:9", "anon").unwrap();
        assert_eq!(store.delete_category(&"not-a-uuid".to_string()).await.unwrap(), 0);
        assert_eq!(store.delete_tiers(&["x".to_string()]).await.unwrap(), 0);
        assert!(store.list_tiers(Some(&"x".to_string())).await.unwrap().is_empty());
        let err = store
            .insert_feature(NewFeature {
                tier_id: "x".to_string(),
                feature_text: "Orphan".to_string(),
                display_order: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_rest_url_strips_trailing_slash() {
        let store = RestStore::new("https://example.supabase.co/", "anon").unwrap();
        assert_eq!(store.rest_url, "https://example.supabase.co/rest/v1");
    }
}
