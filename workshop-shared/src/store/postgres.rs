/// PostgreSQL store
///
/// Thin adapter from the storage traits to the model SQL. The only logic here
/// is error translation: unique index violations on the username or email
/// index become [`StoreError::UniqueViolation`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{AuditStore, StoreError, StoreResult, UserStore};
use crate::db::pool::health_check;
use crate::error::ConflictField;
use crate::models::audit::{AuditQuery, AuditRecord, NewAuditRecord};
use crate::models::user::{NewUser, User, UserChanges};

/// Store backed by a connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translates unique violations by constraint name
fn map_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(constraint) = db_err.constraint() {
                if constraint.contains("email") {
                    return StoreError::UniqueViolation(ConflictField::Email);
                }
                if constraint.contains("username") {
                    return StoreError::UniqueViolation(ConflictField::Username);
                }
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn list_users(
        &self,
        filter: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<User>, i64)> {
        User::list(&self.pool, filter, limit, offset)
            .await
            .map_err(map_err)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        User::find_by_id(&self.pool, id).await.map_err(map_err)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        User::find_by_username(&self.pool, username)
            .await
            .map_err(map_err)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        User::count(&self.pool).await.map_err(map_err)
    }

    async fn count_active_administrators(&self, excluding: &[String]) -> StoreResult<i64> {
        User::count_active_administrators(&self.pool, excluding)
            .await
            .map_err(map_err)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        User::create(&self.pool, user).await.map_err(map_err)
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<u64> {
        User::update(&self.pool, id, changes).await.map_err(map_err)
    }

    async fn set_user_active(&self, id: i64, active: bool) -> StoreResult<u64> {
        User::set_active(&self.pool, id, active)
            .await
            .map_err(map_err)
    }

    async fn set_password(
        &self,
        id: i64,
        password_hash: &str,
        force_password_change: bool,
    ) -> StoreResult<u64> {
        User::set_password(&self.pool, id, password_hash, force_password_change)
            .await
            .map_err(map_err)
    }

    async fn set_permissions(&self, id: i64, permissions: &BTreeSet<String>) -> StoreResult<u64> {
        User::set_permissions(&self.pool, id, permissions)
            .await
            .map_err(map_err)
    }

    async fn touch_last_access(&self, id: i64, at: DateTime<Utc>) -> StoreResult<u64> {
        User::touch_last_access(&self.pool, id, at)
            .await
            .map_err(map_err)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<u64> {
        User::delete(&self.pool, id).await.map_err(map_err)
    }

    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await.map_err(map_err)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn insert_audit(&self, record: NewAuditRecord) -> StoreResult<AuditRecord> {
        AuditRecord::insert(&self.pool, record)
            .await
            .map_err(map_err)
    }

    async fn list_audit(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<AuditRecord>, i64)> {
        AuditRecord::list(&self.pool, query, limit, offset)
            .await
            .map_err(map_err)
    }
}
