use thiserror::Error;

use crate::model::{Id, Table};

/// Failures talking to the persistence gateway.
///
/// `PermissionDenied` is kept apart from transport and store rejections: a
/// row-level-security policy makes a write match zero rows without any error
/// being reported by the store.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("store rejected request on {table} ({status}): {message}")]
    Rejected {
        table: Table,
        status: u16,
        message: String,
    },

    #[error("could not decode {table} response: {message}")]
    Decode { table: Table, message: String },

    #[error("permission denied: {table} matched no rows for {target}")]
    PermissionDenied { table: Table, target: String },

    /// A write referenced a parent row that does not exist
    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: Id },
}

impl GatewayError {
    pub fn permission_denied(table: Table, target: impl Into<String>) -> Self {
        GatewayError::PermissionDenied {
            table,
            target: target.into(),
        }
    }

    pub fn not_found(table: Table, id: &str) -> Self {
        GatewayError::NotFound {
            table,
            id: id.to_string(),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GatewayError::PermissionDenied { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport",
            GatewayError::Rejected { .. } => "store",
            GatewayError::Decode { .. } => "decode",
            GatewayError::PermissionDenied { .. } => "permission_denied",
            GatewayError::NotFound { .. } => "not_found",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("auth provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Provider(err.to_string())
    }
}
