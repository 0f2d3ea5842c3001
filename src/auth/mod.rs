//! Admin console authentication.
//!
//! Credentials are checked by an injected [`AuthProvider`]; the admin API then works
//! with opaque session tokens handed out by [`SessionRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::config::AdminUser;
use crate::errors::AppError;

/// Admin console roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hod,
    Coordinator,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hod => "hod",
            Role::Coordinator => "coordinator",
            Role::Editor => "editor",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "hod" => Some(Role::Hod),
            "coordinator" => Some(Role::Coordinator),
            "editor" => Some(Role::Editor),
            _ => None,
        }
    }
}

/// An authenticated admin console user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Something that can turn credentials into a principal.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AppError>;
}

/// Credential table held in memory, loaded from configuration.
pub struct StaticAuthProvider {
    accounts: HashMap<String, (String, Principal)>,
}

impl StaticAuthProvider {
    pub fn new(users: &[AdminUser]) -> Self {
        let accounts = users
            .iter()
            .enumerate()
            .map(|(index, user)| {
                let principal = Principal {
                    id: (index + 1).to_string(),
                    email: user.email.clone(),
                    role: user.role,
                    name: user.name.clone(),
                };
                (user.email.clone(), (user.password.clone(), principal))
            })
            .collect();
        Self { accounts }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn verify(&self, credentials: &Credentials) -> Result<Principal, AppError> {
        match self.accounts.get(&credentials.email) {
            Some((password, principal)) if constant_time_compare(&credentials.password, password) => {
                Ok(principal.clone())
            }
            _ => Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            )),
        }
    }
}

/// Issued on successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: Principal,
}

/// How long a session stays valid after login.
pub const SESSION_TTL_HOURS: i64 = 12;

struct LiveSession {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

/// Live admin sessions keyed by token. Expired entries are dropped on the next
/// login or lookup.
pub struct SessionRegistry {
    provider: Arc<dyn AuthProvider>,
    ttl: Duration,
    sessions: RwLock<HashMap<String, LiveSession>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self::with_ttl(provider, Duration::hours(SESSION_TTL_HOURS))
    }

    pub fn with_ttl(provider: Arc<dyn AuthProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Verify credentials and open a session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AppError> {
        let user = self.provider.verify(credentials).await.inspect_err(|_| {
            tracing::warn!(email = %credentials.email, "Rejected admin login");
        })?;
        let token = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token.clone(),
            LiveSession {
                principal: user.clone(),
                expires_at: now + self.ttl,
            },
        );
        drop(sessions);
        tracing::info!(email = %user.email, role = user.role.as_str(), "Admin logged in");
        Ok(Session { token, user })
    }

    pub async fn resolve(&self, token: &str) -> Option<Principal> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if session.expires_at > now => {
                    return Some(session.principal.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(token)
            .is_some_and(|session| session.expires_at <= now)
        {
            sessions.remove(token);
            tracing::debug!("Dropped expired admin session");
        }
        None
    }

    /// Number of sessions held, expired or not.
    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Close a session. Returns whether the token was known.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Session authentication layer; stores the resolved [`Principal`] in request extensions.
pub async fn session_auth_layer(
    sessions: Arc<SessionRegistry>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return AppError::Unauthorized("Missing session token".to_string()).into_response();
    };

    match sessions.resolve(&token).await {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        None => AppError::Unauthorized("Invalid or expired session".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
