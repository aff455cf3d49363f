use chrono::{Duration, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;

use crate::error::AuthError;
use crate::model::{generate_id, AdminUser, Session};

/// Session/auth provider consumed by the application
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
    /// Current unexpired session, if any
    fn current_session(&self) -> Option<Session>;
    /// Subscription to session changes
    fn subscribe(&self) -> SessionContext;
}

/// Read side of the session change stream, handed explicitly to whoever needs
/// to gate on authentication.
#[derive(Debug, Clone)]
pub struct SessionContext {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionContext {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone().filter(|s| !s.is_expired())
    }

    pub fn access_token(&self) -> Option<String> {
        self.current().map(|s| s.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Wait for the next session change. Returns `false` once the provider is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Write side of the session change stream
#[derive(Debug)]
struct SessionHub {
    tx: watch::Sender<Option<Session>>,
}

impl SessionHub {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    fn publish(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    fn current(&self) -> Option<Session> {
        self.tx.borrow().clone().filter(|s| !s.is_expired())
    }

    fn subscribe(&self) -> SessionContext {
        SessionContext {
            rx: self.tx.subscribe(),
        }
    }
}

/// Hosted auth (GoTrue-compatible) over HTTP
#[derive(Debug)]
pub struct HostedAuth {
    client: Client,
    auth_url: String,
    api_key: String,
    hub: SessionHub,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
            (None, Some(secs)) => Some(Utc::now() + Duration::seconds(secs)),
            (None, None) => None,
        };
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: AdminUser::new(self.user.id, self.user.email),
        }
    }
}

impl HostedAuth {
    pub fn new(project_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            auth_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            hub: SessionHub::new(),
        })
    }
}

#[async_trait::async_trait]
impl AuthProvider for HostedAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            log::warn!("Sign-in rejected for {}", email);
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        let session = token.into_session();
        log::info!("Admin {} signed in", session.user.id);
        self.hub.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.hub.current() else {
            self.hub.publish(None);
            return Ok(());
        };
        let result = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;
        // The local session ends whether or not the provider acknowledged it
        self.hub.publish(None);
        let response = result?;
        if !response.status().is_success() {
            log::warn!("Sign-out returned {}", response.status());
        }
        log::info!("Admin {} signed out", session.user.id);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    fn subscribe(&self) -> SessionContext {
        self.hub.subscribe()
    }
}

/// Locally configured single-admin credentials, for development and tests
#[derive(Debug)]
pub struct StaticAuth {
    email: String,
    password: String,
    session_ttl: Duration,
    hub: SessionHub,
}

impl StaticAuth {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            session_ttl: Duration::hours(1),
            hub: SessionHub::new(),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

#[async_trait::async_trait]
impl AuthProvider for StaticAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if !email.eq_ignore_ascii_case(&self.email) || password != self.password {
            log::warn!("Sign-in rejected for {}", email);
            return Err(AuthError::InvalidCredentials);
        }
        let session = Session {
            access_token: generate_id(),
            refresh_token: None,
            expires_at: Some(Utc::now() + self.session_ttl),
            user: AdminUser::new(format!("static:{}", self.email), Some(self.email.clone())),
        };
        self.hub.publish(Some(session.clone()));
        log::info!("Admin {} signed in", session.user.id);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.hub.publish(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    fn subscribe(&self) -> SessionContext {
        self.hub.subscribe()
    }
}
