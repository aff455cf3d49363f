use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Authenticated admin as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Id,
    pub email: Option<String>,
}

impl AdminUser {
    pub fn new(id: Id, email: Option<String>) -> Self {
        Self { id, email }
    }

    /// Identity used for writes performed by the process itself (seeding)
    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            email: Some("system@pro-estimate.internal".to_string()),
        }
    }
}

/// An authenticated session. Gates access to the admin console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AdminUser,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Token comparison for request guards
    pub fn accepts_token(&self, token: &str) -> bool {
        !self.is_expired() && self.access_token == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: Option<DateTime<Utc>>) -> Session {
        Session {
            access_token: "token-1".to_string(),
            refresh_token: None,
            expires_at,
            user: AdminUser::new("u1".to_string(), Some("admin@example.com".to_string())),
        }
    }

    #[test]
    fn test_session_without_expiry_never_expires() {
        assert!(!session(None).is_expired());
        assert!(session(None).accepts_token("token-1"));
    }

    #[test]
    fn test_expired_session_rejects_token() {
        let s = session(Some(Utc::now() - Duration::seconds(5)));
        assert!(s.is_expired());
        assert!(!s.accepts_token("token-1"));
    }

    #[test]
    fn test_wrong_token_is_rejected() {
        let s = session(Some(Utc::now() + Duration::hours(1)));
        assert!(!s.accepts_token("token-2"));
    }
}
