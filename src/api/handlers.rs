use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::session_extractor::{bearer_token, AdminSession};
use crate::logic::{
    features_of_tier, parse_quantity, render_pdf, Catalog, CatalogEditor, CatalogReader, Estimate,
    QuoteDocument, QuoteStyle,
};
use crate::model::{
    AdminUser, EstimateSummary, Feature, IconId, Id, Phase, PricingTier, Selection, ServiceCategory,
    Session,
};
use crate::store::{AuthProvider, EstimateCache, SessionContext, Store};

/// Everything a request handler may touch. Built once at startup.
pub struct AppState<S: Store> {
    pub store: Arc<S>,
    pub reader: CatalogReader<S>,
    pub editor: CatalogEditor<S>,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: SessionContext,
    pub estimates: EstimateCache,
    pub quote_style: QuoteStyle,
}

impl<S: Store> AppState<S> {
    pub fn new(
        store: Arc<S>,
        auth: Arc<dyn AuthProvider>,
        estimates: EstimateCache,
        quote_style: QuoteStyle,
    ) -> Self {
        Self {
            reader: CatalogReader::new(Arc::clone(&store)),
            editor: CatalogEditor::new(Arc::clone(&store)),
            sessions: auth.subscribe(),
            store,
            auth,
            estimates,
            quote_style,
        }
    }
}

pub type SharedState<S> = Arc<AppState<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

// ---------------------------------------------------------------------------
// Public catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: ServiceCategory,
    /// Stored icon name resolved against the known icon set
    pub icon_id: IconId,
    /// Text stand-in for clients without the icon font
    pub glyph: &'static str,
}

impl From<ServiceCategory> for CategoryView {
    fn from(category: ServiceCategory) -> Self {
        let icon_id = IconId::resolve(&category.icon);
        Self {
            glyph: icon_id.glyph(),
            icon_id,
            category,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TierView {
    #[serde(flatten)]
    pub tier: PricingTier,
    pub features: Vec<Feature>,
}

pub async fn get_catalog<S: Store + 'static>(
    State(state): State<SharedState<S>>,
) -> Json<Catalog> {
    Json(state.reader.load_catalog().await)
}

pub async fn list_categories<S: Store + 'static>(
    State(state): State<SharedState<S>>,
) -> Json<ListResponse<CategoryView>> {
    let categories = state.reader.load_categories().await;
    Json(
        categories
            .into_iter()
            .map(CategoryView::from)
            .collect::<Vec<_>>()
            .into(),
    )
}

pub async fn list_phases<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(category_id): Path<Id>,
) -> Json<ListResponse<Phase>> {
    Json(state.reader.load_phases(&category_id).await.into())
}

pub async fn list_tiers<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(phase_id): Path<Id>,
) -> Json<ListResponse<TierView>> {
    let (tiers, features) = state.reader.load_tiers_and_features(&phase_id).await;
    let views: Vec<TierView> = tiers
        .into_iter()
        .map(|tier| TierView {
            features: features_of_tier(&features, &tier.id)
                .into_iter()
                .cloned()
                .collect(),
            tier,
        })
        .collect();
    Json(views.into())
}

// ---------------------------------------------------------------------------
// Estimates
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub id: Id,
    pub selections: Vec<SelectionView>,
    pub summary: EstimateSummary,
}

#[derive(Debug, Serialize)]
pub struct SelectionView {
    pub phase_id: Id,
    #[serde(flatten)]
    pub selection: Selection,
}

impl EstimateResponse {
    fn new(id: Id, estimate: &Estimate, catalog: &Catalog) -> Self {
        Self {
            id,
            selections: estimate
                .selections()
                .map(|(phase_id, selection)| SelectionView {
                    phase_id: phase_id.clone(),
                    selection: selection.clone(),
                })
                .collect(),
            summary: estimate.summary(catalog),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectTierRequest {
    pub phase_id: Id,
    pub tier_id: Id,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub phase_id: Id,
    /// Number or raw form text
    pub quantity: serde_json::Value,
}

/// Form input that is not an integer becomes 1
fn quantity_from_value(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(1),
        serde_json::Value::String(s) => parse_quantity(s),
        _ => 1,
    }
}

fn estimate_not_found(id: &Id) -> ApiError {
    ApiError::NotFound(format!("estimate {} not found or expired", id))
}

pub async fn create_estimate<S: Store + 'static>(
    State(state): State<SharedState<S>>,
) -> (StatusCode, Json<EstimateResponse>) {
    let id = state.estimates.create().await;
    log::debug!("Created estimate {}", id);
    let response = EstimateResponse::new(id, &Estimate::new(), &Catalog::default());
    (StatusCode::CREATED, Json(response))
}

pub async fn get_estimate<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<Json<EstimateResponse>> {
    let estimate = state
        .estimates
        .get(&id)
        .await
        .ok_or_else(|| estimate_not_found(&id))?;
    let catalog = state.reader.load_catalog().await;
    Ok(Json(EstimateResponse::new(id, &estimate, &catalog)))
}

pub async fn select_tier<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
    Json(request): Json<SelectTierRequest>,
) -> ApiResult<Json<EstimateResponse>> {
    let catalog = state.reader.load_catalog().await;
    match catalog.tier(&request.tier_id) {
        Some(tier) if tier.phase_id == request.phase_id => {}
        Some(_) => {
            return Err(ApiError::BadRequest(format!(
                "tier {} does not belong to phase {}",
                request.tier_id, request.phase_id
            )))
        }
        None => return Err(ApiError::NotFound(format!("tier {}", request.tier_id))),
    }

    let estimate = state
        .estimates
        .update(&id, |estimate| {
            estimate.select_tier(&catalog, &request.phase_id, &request.tier_id);
            estimate.clone()
        })
        .await
        .ok_or_else(|| estimate_not_found(&id))?;
    Ok(Json(EstimateResponse::new(id, &estimate, &catalog)))
}

pub async fn set_quantity<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
    Json(request): Json<QuantityRequest>,
) -> ApiResult<Json<EstimateResponse>> {
    let quantity = quantity_from_value(&request.quantity);
    let estimate = state
        .estimates
        .update(&id, |estimate| {
            estimate.set_quantity(&request.phase_id, quantity);
            estimate.clone()
        })
        .await
        .ok_or_else(|| estimate_not_found(&id))?;
    let catalog = state.reader.load_catalog().await;
    Ok(Json(EstimateResponse::new(id, &estimate, &catalog)))
}

async fn build_quote<S: Store + 'static>(
    state: &AppState<S>,
    id: &Id,
) -> ApiResult<Option<QuoteDocument>> {
    let estimate = state
        .estimates
        .get(id)
        .await
        .ok_or_else(|| estimate_not_found(id))?;
    let catalog = state.reader.load_catalog().await;
    Ok(QuoteDocument::build(&estimate, &catalog, &state.quote_style))
}

/// PDF export. An estimate without selections has nothing to export: 204.
pub async fn get_quote_pdf<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<Response> {
    let Some(quote) = build_quote(&state, &id).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let bytes = tokio::task::spawn_blocking(move || render_pdf(&quote))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
    log::info!("Exported quote for estimate {} ({} bytes)", id, bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"estimate-{}.pdf\"", id),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn get_quote_text<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
) -> ApiResult<Response> {
    match build_quote(&state, &id).await? {
        Some(quote) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            quote.render_text(),
        )
            .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AdminUser>,
}

impl SessionResponse {
    fn with_token(session: Session) -> Self {
        Self {
            authenticated: true,
            access_token: Some(session.access_token),
            expires_at: session.expires_at,
            user: Some(session.user),
        }
    }

    fn signed_out() -> Self {
        Self {
            authenticated: false,
            access_token: None,
            expires_at: None,
            user: None,
        }
    }
}

/// A caller already holding the active session's token gets that session
/// back. Everyone else goes through the credential check.
pub async fn login<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let held = bearer_token(&headers).and_then(|token| {
        state
            .sessions
            .current()
            .filter(|session| session.accepts_token(&token))
    });
    let session = match held {
        Some(session) => session,
        None => state.auth.sign_in(&request.email, &request.password).await?,
    };
    Ok(Json(SessionResponse::with_token(session)))
}

pub async fn logout<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    AdminSession(session): AdminSession,
) -> ApiResult<StatusCode> {
    state.auth.sign_out().await?;
    log::info!("Admin {} logged out", session.user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Session status without the token
pub async fn get_session<S: Store + 'static>(
    State(state): State<SharedState<S>>,
) -> Json<SessionResponse> {
    match state.sessions.current() {
        Some(session) => Json(SessionResponse {
            authenticated: true,
            access_token: None,
            expires_at: session.expires_at,
            user: Some(session.user),
        }),
        None => Json(SessionResponse::signed_out()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quantity_from_value() {
        assert_eq!(quantity_from_value(&json!(4)), 4);
        assert_eq!(quantity_from_value(&json!("12")), 12);
        assert_eq!(quantity_from_value(&json!("twelve")), 1);
        assert_eq!(quantity_from_value(&json!(2.7)), 2);
        assert_eq!(quantity_from_value(&json!(null)), 1);
    }

    #[test]
    fn test_category_view_resolves_icon() {
        let view = CategoryView::from(ServiceCategory {
            id: "c1".to_string(),
            name: "Web".to_string(),
            icon: "unknown-icon".to_string(),
            sort_order: 1,
        });
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["icon"], "unknown-icon");
        assert_eq!(value["icon_id"], "Layers");
        assert_eq!(value["glyph"], "[=]");
        assert_eq!(value["name"], "Web");
    }
}
