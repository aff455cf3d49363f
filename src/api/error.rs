use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::{AuthError, GatewayError};
use crate::logic::admin::EditorError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Editor(EditorError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Editor(EditorError::DuplicateTierLabel { .. }) => StatusCode::CONFLICT,
            ApiError::Editor(EditorError::Gateway(e)) => gateway_status(e),
            ApiError::Editor(EditorError::Cascade(e)) => gateway_status(&e.source),
            ApiError::Gateway(e) => gateway_status(e),
            ApiError::Auth(AuthError::Provider(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Auth(_) | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Editor(EditorError::Validation(_)) => "validation",
            ApiError::Editor(EditorError::DuplicateTierLabel { .. }) => "duplicate_tier_label",
            ApiError::Editor(EditorError::Gateway(e)) => e.kind(),
            ApiError::Editor(EditorError::Cascade(e)) => e.source.kind(),
            ApiError::Gateway(e) => e.kind(),
            ApiError::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Auth(AuthError::Provider(_)) => "auth_provider",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        // Partial cascade outcome, so the caller knows what is already gone
        if let ApiError::Editor(EditorError::Cascade(e)) = &self {
            body["step"] = json!(e.step);
            body["completed"] = json!(e.completed);
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cascade::{CascadeError, CascadeReport, CascadeStep};
    use crate::model::Table;

    #[test]
    fn test_status_mapping() {
        let denied = GatewayError::permission_denied(Table::Phases, "p1");
        assert_eq!(ApiError::from(denied).status(), StatusCode::FORBIDDEN);

        let transport = GatewayError::Transport("connection reset".to_string());
        assert_eq!(ApiError::from(transport).status(), StatusCode::BAD_GATEWAY);

        let duplicate = EditorError::DuplicateTierLabel {
            phase_id: "p1".to_string(),
            label: "PRO".to_string(),
        };
        assert_eq!(ApiError::from(duplicate).status(), StatusCode::CONFLICT);

        let invalid = ApiError::from(AuthError::InvalidCredentials);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.kind(), "invalid_credentials");

        let missing = ApiError::from(GatewayError::not_found(Table::Phases, "p9"));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.kind(), "not_found");
    }

    #[test]
    fn test_cascade_error_keeps_source_status() {
        let err = ApiError::from(EditorError::Cascade(CascadeError {
            step: CascadeStep::DeleteTarget,
            completed: CascadeReport {
                features: 2,
                ..CascadeReport::default()
            },
            source: GatewayError::permission_denied(Table::ServiceCategories, "c1"),
        }));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.kind(), "permission_denied");
    }
}
