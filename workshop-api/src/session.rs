/// Request identity
///
/// [`Session`] is the caller's current profile, loaded by `jwt_auth_layer`
/// after the token verifies and stored in the request extensions. [`Actor`] is the identity recorded in the audit
/// trail: the session when present, otherwise the caller-supplied actor
/// headers, otherwise `system`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use workshop_shared::auth::{identity::ActingIdentity, jwt::Claims, permissions};
use workshop_shared::models::user::User;

use crate::error::ApiError;

/// Headers naming the acting user, checked in order
pub const ACTOR_NAME_HEADERS: [&str; 5] = [
    "x-actor",
    "x-actor-usuario",
    "x-user",
    "x-usuario",
    "x-username",
];

/// Header carrying the acting user's numeric id
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Authenticated caller: the stored account behind a verified token
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Profile comes from `user`; only the expiry is taken from the token
    pub fn for_user(user: &User, claims: &Claims) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            permissions: user.permission_list(),
            expires_at: Utc.timestamp_opt(claims.exp, 0).single(),
        }
    }

    pub fn is_allowed(&self, permission: &str) -> bool {
        permissions::grants(&self.role, &self.permissions, permission)
    }

    /// Fails with 403 unless the session holds `permission`
    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        self.require_any(&[permission])
    }

    /// Fails with 403 unless the session holds at least one of `required`
    pub fn require_any(&self, required: &[&str]) -> Result<(), ApiError> {
        if required.iter().any(|p| self.is_allowed(p)) {
            return Ok(());
        }

        tracing::warn!(
            user_id = self.user_id,
            required = %required.join(" | "),
            "permission denied"
        );
        Err(ApiError::Forbidden(format!(
            "missing permission: {}",
            required.join(" or ")
        )))
    }

    pub fn identity(&self) -> ActingIdentity {
        ActingIdentity::named(self.username.clone())
            .with_id(self.user_id)
            .with_role(self.role.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Missing session".to_string()))
    }
}

/// Identity recorded as the actor of audited operations
#[derive(Debug, Clone)]
pub struct Actor(pub ActingIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>();
        Ok(Actor(resolve_actor(session, &parts.headers)))
    }
}

/// Resolves the acting identity for a request
///
/// The session wins. Without one, the first non-empty actor name header is
/// used, then a numeric `X-Actor-Id`, then `system`.
pub fn resolve_actor(session: Option<&Session>, headers: &HeaderMap) -> ActingIdentity {
    if let Some(session) = session {
        return session.identity();
    }

    let username = ACTOR_NAME_HEADERS
        .iter()
        .find_map(|name| header_text(headers, name));
    let id = header_text(headers, ACTOR_ID_HEADER).and_then(|v| v.parse::<i64>().ok());

    ActingIdentity::from_parts(username, id, None)
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
