/// Storage traits
///
/// The account and audit services talk to storage only through these traits,
/// so they run unchanged against PostgreSQL ([`postgres::PgStore`]) or the
/// in-process backend ([`memory::MemoryStore`]).
///
/// Each method is a single atomic statement. Callers that read, validate,
/// then write do so as separate calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ConflictField;
use crate::models::audit::{AuditQuery, AuditRecord, NewAuditRecord};
use crate::models::user::{NewUser, User, UserChanges};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique username or email index rejected the write
    #[error("duplicate {0}")]
    UniqueViolation(ConflictField),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure in a non-SQL backend
    #[error("store error: {0}")]
    Backend(String),
}

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Users matching `filter` (trimmed, lowercased substring), ascending id,
    /// plus the total match count
    async fn list_users(
        &self,
        filter: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<User>, i64)>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn count_users(&self) -> StoreResult<i64>;

    /// Active users whose role is administrator, ignoring `excluding`
    /// usernames (case-insensitive)
    async fn count_active_administrators(&self, excluding: &[String]) -> StoreResult<i64>;

    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    /// Returns rows changed (0 when the user does not exist)
    async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<u64>;

    async fn set_user_active(&self, id: i64, active: bool) -> StoreResult<u64>;

    async fn set_password(
        &self,
        id: i64,
        password_hash: &str,
        force_password_change: bool,
    ) -> StoreResult<u64>;

    async fn set_permissions(
        &self,
        id: i64,
        permissions: &std::collections::BTreeSet<String>,
    ) -> StoreResult<u64>;

    async fn touch_last_access(&self, id: i64, at: DateTime<Utc>) -> StoreResult<u64>;

    async fn delete_user(&self, id: i64) -> StoreResult<u64>;

    /// Cheap liveness check
    async fn ping(&self) -> StoreResult<()>;
}

/// Audit trail persistence, append and read only
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit(&self, record: NewAuditRecord) -> StoreResult<AuditRecord>;

    /// Entries newest first (`created_at DESC, id DESC`), plus the total
    /// match count
    async fn list_audit(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<AuditRecord>, i64)>;
}
