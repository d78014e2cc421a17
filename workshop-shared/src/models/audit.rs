/// Audit trail model
///
/// Entries are append-only: nothing in this crate updates or deletes them.
/// They reference users by username, so deleting a user leaves its history
/// intact.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_log (
///     id BIGSERIAL PRIMARY KEY,
///     created_at TIMESTAMPTZ NOT NULL,
///     action TEXT NOT NULL,
///     affected_user TEXT NOT NULL DEFAULT '',
///     actor TEXT NOT NULL,
///     detail TEXT NOT NULL DEFAULT ''
/// );
/// CREATE INDEX idx_audit_log_created_at ON audit_log (created_at DESC, id DESC);
/// ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::contains_pattern;

const AUDIT_COLUMNS: &str = "id, created_at, action, affected_user, actor, detail";

const FILTER_CLAUSE: &str = "($1::text IS NULL \
     OR lower(action) LIKE $1 ESCAPE '\\' \
     OR lower(affected_user) LIKE $1 ESCAPE '\\' \
     OR lower(actor) LIKE $1 ESCAPE '\\' \
     OR lower(detail) LIKE $1 ESCAPE '\\') \
     AND ($2::text IS NULL OR lower(affected_user) = $2 OR lower(actor) = $2)";

/// Actions recorded by account operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateUser,
    UpdateUser,
    UpdateStatus,
    ResetPassword,
    DeleteUser,
    UpdatePermissions,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateUser => "CREATE_USER",
            AuditAction::UpdateUser => "UPDATE_USER",
            AuditAction::UpdateStatus => "UPDATE_STATUS",
            AuditAction::ResetPassword => "RESET_PASSWORD",
            AuditAction::DeleteUser => "DELETE_USER",
            AuditAction::UpdatePermissions => "UPDATE_PERMISSIONS",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored audit entry
///
/// `action` is kept as text: manual entries may carry tags outside
/// [`AuditAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditRecord {
    /// Insertion id, breaks ties between equal timestamps
    pub id: i64,

    pub created_at: DateTime<Utc>,

    pub action: String,

    /// Username of the user acted upon (may be empty)
    pub affected_user: String,

    /// Username, `id:<n>`, or `system`
    pub actor: String,

    pub detail: String,
}

/// Input for appending an entry
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub created_at: DateTime<Utc>,
    pub action: String,
    pub affected_user: String,
    pub actor: String,
    pub detail: String,
}

/// Filters for listing the trail
///
/// Both fields must already be trimmed and lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Substring of action, affected user, actor or detail
    pub text: Option<String>,

    /// Exact affected user or actor
    pub user: Option<String>,
}

impl AuditRecord {
    pub async fn insert(pool: &PgPool, data: NewAuditRecord) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO audit_log (created_at, action, affected_user, actor, detail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {AUDIT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, AuditRecord>(&query)
            .bind(data.created_at)
            .bind(data.action)
            .bind(data.affected_user)
            .bind(data.actor)
            .bind(data.detail)
            .fetch_one(pool)
            .await
    }

    /// Lists entries newest first, with the total number of matches
    pub async fn list(
        pool: &PgPool,
        filter: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let pattern = filter.text.as_deref().map(contains_pattern);
        let user = filter.user.as_deref();

        let count_query = format!("SELECT COUNT(*) FROM audit_log WHERE {FILTER_CLAUSE}");
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(pattern.as_deref())
            .bind(user)
            .fetch_one(pool)
            .await?;

        let query = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let records = sqlx::query_as::<_, AuditRecord>(&query)
            .bind(pattern.as_deref())
            .bind(user)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok((records, total))
    }
}
