/// Account lifecycle endpoints
///
/// Every route here requires the `users:admin` permission. Mutations are
/// attributed to the resolved [`Actor`] in the audit trail.
///
/// # Endpoints
///
/// - `GET /v1/users` - List accounts (`q`, `page`, `page_size`, `limit`, `offset`)
/// - `POST /v1/users` - Create an account
/// - `GET /v1/users/:id` - Fetch one account
/// - `PUT /v1/users/:id` - Partial profile update
/// - `DELETE /v1/users/:id` - Delete an account
/// - `PATCH /v1/users/:id/status` - Activate or deactivate
/// - `POST /v1/users/:id/reset-password` - Reset the password
/// - `PUT /v1/users/:id/permissions` - Replace the permission set
/// - `POST /v1/users/:id/last-access` - Stamp the last access time

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::ListQuery,
    session::{Actor, Session},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use workshop_shared::{
    accounts::{AccountChanges, NewAccount},
    auth::permissions::USERS_ADMIN,
    models::user::User,
    pagination::Page,
};

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Status change request; `active` accepts booleans, `0`/`1` and their
/// string forms
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub active: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    /// Candidate password; generated when absent
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    /// New plaintext password, shown once
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionsRequest {
    #[serde(default)]
    pub permissions: Value,
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub permissions: Vec<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<User>>> {
    session.require(USERS_ADMIN)?;

    let page = state
        .accounts
        .list(query.q.as_deref(), &query.paging())
        .await?;
    Ok(Json(page))
}

/// Create an account
///
/// # Endpoint
///
/// ```text
/// POST /v1/users
/// Content-Type: application/json
///
/// {
///   "username": "bob",
///   "display_name": "Bob",
///   "email": "bob@shop.example",
///   "role": "mechanic",
///   "password": "Abcdef1!",
///   "permissions": ["audit.read"]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing field, malformed email or weak password
/// - `409 Conflict`: Username or email taken
pub async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Json(req): Json<NewAccount>,
) -> ApiResult<(StatusCode, Json<User>)> {
    session.require(USERS_ADMIN)?;

    let user = state.accounts.create(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    session.require(USERS_ADMIN)?;

    Ok(Json(state.accounts.get(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    Json(req): Json<AccountChanges>,
) -> ApiResult<Json<UpdatedResponse>> {
    session.require(USERS_ADMIN)?;

    let updated = state.accounts.update(&actor, id, req).await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    session.require(USERS_ADMIN)?;

    let deleted = state.accounts.delete(&actor, id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn set_status(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    session.require(USERS_ADMIN)?;

    let active = parse_flag(&req.active)
        .ok_or_else(|| ApiError::BadRequest("active is required (true or false)".to_string()))?;

    let updated = state.accounts.set_active(&actor, id, active).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// Reset a password
///
/// The body is optional. The response carries the new plaintext password,
/// which is not retrievable afterwards.
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    req: Option<Json<ResetPasswordRequest>>,
) -> ApiResult<Json<ResetPasswordResponse>> {
    session.require(USERS_ADMIN)?;

    let candidate = req.and_then(|Json(r)| r.password);
    let password = state.accounts.reset_password(&actor, id, candidate).await?;
    Ok(Json(ResetPasswordResponse { password }))
}

pub async fn update_permissions(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    Json(req): Json<PermissionsRequest>,
) -> ApiResult<Json<PermissionsResponse>> {
    session.require(USERS_ADMIN)?;

    let slugs = parse_slugs(&req.permissions)
        .ok_or_else(|| ApiError::BadRequest("permissions must be an array of strings".to_string()))?;

    let normalized = state.accounts.update_permissions(&actor, id, slugs).await?;
    Ok(Json(PermissionsResponse {
        permissions: normalized.into_iter().collect(),
    }))
}

pub async fn mark_last_access(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    session.require(USERS_ADMIN)?;

    state.accounts.mark_last_access(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reads a boolean-like JSON value
fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_slugs(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(String::from))
        .collect()
}
