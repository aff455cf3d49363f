use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

use crate::api::handlers::SharedState;
use crate::api::{admin_handlers, handlers};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<SharedState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Public catalog
        .route("/catalog", get(handlers::get_catalog::<S>))
        .route("/categories", get(handlers::list_categories::<S>))
        .route("/categories/:id/phases", get(handlers::list_phases::<S>))
        .route("/phases/:id/tiers", get(handlers::list_tiers::<S>))
        // Estimator
        .route("/estimates", post(handlers::create_estimate::<S>))
        .route("/estimates/:id", get(handlers::get_estimate::<S>))
        .route("/estimates/:id/select", post(handlers::select_tier::<S>))
        .route("/estimates/:id/quantity", post(handlers::set_quantity::<S>))
        .route("/estimates/:id/quote", get(handlers::get_quote_pdf::<S>))
        .route("/estimates/:id/quote.txt", get(handlers::get_quote_text::<S>))
        // Session
        .route("/auth/login", post(handlers::login::<S>))
        .route("/auth/logout", post(handlers::logout::<S>))
        .route("/auth/session", get(handlers::get_session::<S>))
        // Admin console
        .route("/admin/categories", post(admin_handlers::create_category::<S>))
        .route(
            "/admin/categories/:id",
            patch(admin_handlers::update_category::<S>).delete(admin_handlers::delete_category::<S>),
        )
        .route(
            "/admin/categories/:id/phases",
            post(admin_handlers::create_phase::<S>),
        )
        .route(
            "/admin/phases/:id",
            patch(admin_handlers::update_phase::<S>).delete(admin_handlers::delete_phase::<S>),
        )
        .route("/admin/phases/:id/tiers", post(admin_handlers::create_tier::<S>))
        .route(
            "/admin/tiers/:id",
            patch(admin_handlers::update_tier::<S>).delete(admin_handlers::delete_tier::<S>),
        )
        .route(
            "/admin/tiers/:id/features",
            post(admin_handlers::create_feature::<S>),
        )
        .route("/admin/features/:id", delete(admin_handlers::delete_feature::<S>))
}

/// Router with state attached, plus the static bundle when one is configured
pub fn build_app<S: Store + 'static>(state: SharedState<S>, static_dir: Option<&Path>) -> Router {
    let router = create_router::<S>().with_state(state);
    match static_dir {
        Some(dir) => with_static_files(router, dir),
        None => router,
    }
}

/// Serve the front-end bundle for every path the API does not claim.
/// Unknown paths fall through to `index.html` so client-side routes resolve.
pub fn with_static_files(router: Router, static_dir: &Path) -> Router {
    let index = static_dir.join("index.html");
    router.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index)))
}
