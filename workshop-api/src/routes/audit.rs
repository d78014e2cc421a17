/// Audit trail endpoints
///
/// - `GET /v1/audit` - Newest entries first, filtered by `q` (substring) and
///   `user` (exact affected user or actor). Needs `audit:read` or
///   `users:admin`.
/// - `POST /v1/audit` - Record a manual entry. Needs `audit:write`.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::ListQuery,
    session::{Actor, Session},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use workshop_shared::{
    audit::ManualEntry,
    auth::permissions::{AUDIT_READ, AUDIT_WRITE, USERS_ADMIN},
    models::audit::AuditRecord,
    pagination::Page,
};

pub async fn list_entries(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<AuditRecord>>> {
    session.require_any(&[AUDIT_READ, USERS_ADMIN])?;

    let page = state
        .accounts
        .audit()
        .list(query.q.as_deref(), query.user.as_deref(), &query.paging())
        .await?;
    Ok(Json(page))
}

/// Record a manual entry
///
/// ```text
/// POST /v1/audit
/// Content-Type: application/json
///
/// {
///   "action": "INVENTORY_CHECK",
///   "affected_user": "bob",
///   "detail": "counted spare parts"
/// }
/// ```
///
/// The actor is always the caller. `created_at` may be supplied to backdate
/// the entry.
pub async fn record_entry(
    State(state): State<AppState>,
    session: Session,
    Actor(actor): Actor,
    Json(entry): Json<ManualEntry>,
) -> ApiResult<(StatusCode, Json<AuditRecord>)> {
    session.require(AUDIT_WRITE)?;

    let record = state.accounts.audit().record(&actor, entry).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
