use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::handlers::SharedState;
use crate::api::session_extractor::AdminSession;
use crate::logic::CascadeReport;
use crate::model::{
    CategoryUpdate, Feature, Id, NewTierForm, Phase, PhaseUpdate, PricingTier, ServiceCategory,
    TierUpdate,
};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct NewCategoryRequest {
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewPhaseRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct NewFeatureRequest {
    pub feature_text: String,
}

pub async fn create_category<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    AdminSession(session): AdminSession,
    Json(request): Json<NewCategoryRequest>,
) -> ApiResult<(StatusCode, Json<ServiceCategory>)> {
    log::debug!("Admin {} creating category {}", session.user.id, request.name);
    let category = state
        .editor
        .create_category(&request.name, request.icon.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
    Json(update): Json<CategoryUpdate>,
) -> ApiResult<StatusCode> {
    state.editor.update_category(&id, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_category<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
) -> ApiResult<Json<CascadeReport>> {
    Ok(Json(state.editor.delete_category(&id).await?))
}

pub async fn create_phase<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(category_id): Path<Id>,
    Json(request): Json<NewPhaseRequest>,
) -> ApiResult<(StatusCode, Json<Phase>)> {
    let phase = state
        .editor
        .create_phase(&category_id, &request.title, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(phase)))
}

pub async fn update_phase<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
    Json(update): Json<PhaseUpdate>,
) -> ApiResult<StatusCode> {
    state.editor.update_phase(&id, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_phase<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
) -> ApiResult<Json<CascadeReport>> {
    Ok(Json(state.editor.delete_phase(&id).await?))
}

pub async fn create_tier<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(phase_id): Path<Id>,
    Json(form): Json<NewTierForm>,
) -> ApiResult<(StatusCode, Json<PricingTier>)> {
    let tier = state.editor.create_tier(&phase_id, form).await?;
    Ok((StatusCode::CREATED, Json(tier)))
}

pub async fn update_tier<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
    Json(update): Json<TierUpdate>,
) -> ApiResult<StatusCode> {
    state.editor.update_tier(&id, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_tier<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
) -> ApiResult<Json<CascadeReport>> {
    Ok(Json(state.editor.delete_tier(&id).await?))
}

pub async fn create_feature<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(tier_id): Path<Id>,
    Json(request): Json<NewFeatureRequest>,
) -> ApiResult<(StatusCode, Json<Feature>)> {
    let feature = state
        .editor
        .create_feature(&tier_id, &request.feature_text)
        .await?;
    Ok((StatusCode::CREATED, Json(feature)))
}

pub async fn delete_feature<S: Store + 'static>(
    State(state): State<SharedState<S>>,
    _admin: AdminSession,
    Path(id): Path<Id>,
) -> ApiResult<Json<CascadeReport>> {
    Ok(Json(state.editor.delete_feature(&id).await?))
}
