/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/login` - Exchange credentials for a session token
/// - `GET /v1/auth/verify` - Echo the current session

use crate::{app::AppState, error::ApiResult, session::Session};
use axum::{extract::State, Json};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use validator::Validate;
use workshop_shared::{auth::jwt, models::user::User};

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Signed session token
    pub token: String,

    /// Always `Bearer`
    pub token_type: String,

    /// Seconds until the token expires
    pub expires_in: i64,

    pub user: User,
}

/// Log in
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "password": "Abcdef1!"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 43200,
///   "user": { "id": 1, "username": "alice", "force_password_change": false, ... }
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown user, wrong password or inactive account
/// - `422 Unprocessable Entity`: Missing fields
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = state.accounts.authenticate(&req.username, &req.password).await?;

    let ttl = Duration::hours(state.config.jwt.ttl_hours);
    let claims = jwt::Claims::with_expiration(
        user.id,
        user.username.clone(),
        user.role.clone(),
        user.permission_list(),
        ttl,
    );
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: ttl.num_seconds(),
        user,
    }))
}

/// Returns the session the token carries
pub async fn verify(session: Session) -> Json<Session> {
    Json(session)
}
