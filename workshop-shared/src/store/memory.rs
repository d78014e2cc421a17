/// In-memory store for development and testing
///
/// Mirrors the PostgreSQL semantics: case-insensitive unique usernames and
/// emails, ascending ids, newest-first audit listing. State is lost when the
/// process exits.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{AuditStore, StoreError, StoreResult, UserStore};
use crate::auth::permissions::is_administrator_role;
use crate::error::ConflictField;
use crate::models::audit::{AuditQuery, AuditRecord, NewAuditRecord};
use crate::models::user::{NewUser, User, UserChanges};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    audit: Vec<AuditRecord>,
    next_user_id: i64,
    next_audit_id: i64,
}

impl Tables {
    fn user_mut(&mut self, id: i64) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Unique index check, ignoring the row being updated
    fn check_unique(&self, username: Option<&str>, email: Option<&str>, skip_id: Option<i64>) -> StoreResult<()> {
        for user in self.users.iter().filter(|u| Some(u.id) != skip_id) {
            if let Some(username) = username {
                if user.username.to_lowercase() == username.to_lowercase() {
                    return Err(StoreError::UniqueViolation(ConflictField::Username));
                }
            }
            if let Some(email) = email {
                if user.email.to_lowercase() == email.to_lowercase() {
                    return Err(StoreError::UniqueViolation(ConflictField::Email));
                }
            }
        }
        Ok(())
    }
}

/// Store holding all rows behind one lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_matches(user: &User, filter: &str) -> bool {
    [&user.username, &user.display_name, &user.role, &user.email]
        .iter()
        .any(|field| field.to_lowercase().contains(filter))
}

fn audit_matches(record: &AuditRecord, query: &AuditQuery) -> bool {
    let text_ok = match &query.text {
        Some(text) => [&record.action, &record.affected_user, &record.actor, &record.detail]
            .iter()
            .any(|field| field.to_lowercase().contains(text.as_str())),
        None => true,
    };
    let user_ok = match &query.user {
        Some(user) => {
            record.affected_user.to_lowercase() == *user || record.actor.to_lowercase() == *user
        }
        None => true,
    };
    text_ok && user_ok
}

fn window<T: Clone>(items: &[T], limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    items.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list_users(
        &self,
        filter: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<User>, i64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<User> = tables
            .users
            .iter()
            .filter(|u| filter.map(|f| user_matches(u, f)).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by_key(|u| u.id);

        let total = matching.len() as i64;
        Ok((window(&matching, limit, offset), total))
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let wanted = username.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn count_active_administrators(&self, excluding: &[String]) -> StoreResult<i64> {
        let excluded: Vec<String> = excluding.iter().map(|u| u.trim().to_lowercase()).collect();
        let tables = self.tables.read().await;
        let count = tables
            .users
            .iter()
            .filter(|u| u.active && is_administrator_role(&u.role))
            .filter(|u| !excluded.contains(&u.username.to_lowercase()))
            .count();
        Ok(count as i64)
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        tables.check_unique(Some(&user.username), Some(&user.email), None)?;

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            role: user.role,
            active: true,
            force_password_change: user.force_password_change,
            last_access_at: None,
            password_hash: user.password_hash,
            permissions: user.permissions,
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<u64> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut tables = self.tables.write().await;
        if tables.user_mut(id).is_none() {
            return Ok(0);
        }
        tables.check_unique(None, changes.email.as_deref(), Some(id))?;

        let Some(user) = tables.user_mut(id) else {
            return Ok(0);
        };
        if let Some(display_name) = &changes.display_name {
            user.display_name = display_name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(role) = &changes.role {
            user.role = role.clone();
        }
        if let Some(password_hash) = &changes.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(force) = changes.force_password_change {
            user.force_password_change = force;
        }
        Ok(1)
    }

    async fn set_user_active(&self, id: i64, active: bool) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.active = active;
                1
            }
            None => 0,
        })
    }

    async fn set_password(
        &self,
        id: i64,
        password_hash: &str,
        force_password_change: bool,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.force_password_change = force_password_change;
                1
            }
            None => 0,
        })
    }

    async fn set_permissions(&self, id: i64, permissions: &BTreeSet<String>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.permissions = permissions.clone();
                1
            }
            None => 0,
        })
    }

    async fn touch_last_access(&self, id: i64, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.last_access_at = Some(at);
                1
            }
            None => 0,
        })
    }

    async fn delete_user(&self, id: i64) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        Ok((before - tables.users.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert_audit(&self, record: NewAuditRecord) -> StoreResult<AuditRecord> {
        let mut tables = self.tables.write().await;
        tables.next_audit_id += 1;
        let stored = AuditRecord {
            id: tables.next_audit_id,
            created_at: record.created_at,
            action: record.action,
            affected_user: record.affected_user,
            actor: record.actor,
            detail: record.detail,
        };
        tables.audit.push(stored.clone());
        Ok(stored)
    }

    async fn list_audit(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<AuditRecord>, i64)> {
        let tables = self.tables.read().await;
        let mut matching: Vec<AuditRecord> = tables
            .audit
            .iter()
            .filter(|r| audit_matches(r, query))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        Ok((window(&matching, limit, offset), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str, email: &str, role: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            display_name: username.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            password_hash: "hash".to_string(),
            force_password_change: false,
            permissions: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryStore::new();
        store.insert_user(new_user("Ana", "ana@shop.test", "clerk")).await.unwrap();

        let err = store
            .insert_user(new_user("ANA", "other@shop.test", "clerk"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(ConflictField::Username)));

        let err = store
            .insert_user(new_user("bob", "ANA@shop.test", "clerk"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(ConflictField::Email)));
    }

    #[tokio::test]
    async fn test_update_email_conflict_ignores_self() {
        let store = MemoryStore::new();
        let ana = store.insert_user(new_user("ana", "ana@shop.test", "clerk")).await.unwrap();
        store.insert_user(new_user("bob", "bob@shop.test", "clerk")).await.unwrap();

        let same = UserChanges {
            email: Some("ana@shop.test".to_string()),
            ..Default::default()
        };
        assert_eq!(store.update_user(ana.id, &same).await.unwrap(), 1);

        let taken = UserChanges {
            email: Some("bob@shop.test".to_string()),
            ..Default::default()
        };
        assert!(store.update_user(ana.id, &taken).await.is_err());
        assert_eq!(store.update_user(999, &same).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_admin_count_excludes_and_ignores_inactive() {
        let store = MemoryStore::new();
        let a = store.insert_user(new_user("root", "r@x.io", "Administrator")).await.unwrap();
        store.insert_user(new_user("boss", "b@x.io", "administrator")).await.unwrap();
        store.insert_user(new_user("clerk", "c@x.io", "clerk")).await.unwrap();

        assert_eq!(store.count_active_administrators(&[]).await.unwrap(), 2);
        assert_eq!(
            store.count_active_administrators(&["BOSS".to_string()]).await.unwrap(),
            1
        );

        store.set_user_active(a.id, false).await.unwrap();
        assert_eq!(store.count_active_administrators(&[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filter_and_window() {
        let store = MemoryStore::new();
        for name in ["alpha", "beta", "gamma", "alphonse"] {
            store
                .insert_user(new_user(name, &format!("{}@x.io", name), "clerk"))
                .await
                .unwrap();
        }

        let (items, total) = store.list_users(Some("alph"), 1, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].username, "alphonse");

        let (items, total) = store.list_users(None, 500, 0).await.unwrap();
        assert_eq!(total, 4);
        assert!(items.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_audit_order_breaks_ties_by_id() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (action, at) in [("A", now), ("B", now), ("C", now - Duration::seconds(5))] {
            store
                .insert_audit(NewAuditRecord {
                    created_at: at,
                    action: action.to_string(),
                    affected_user: "ana".to_string(),
                    actor: "admin".to_string(),
                    detail: String::new(),
                })
                .await
                .unwrap();
        }

        let (items, total) = store.list_audit(&AuditQuery::default(), 10, 0).await.unwrap();
        assert_eq!(total, 3);
        let actions: Vec<_> = items.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["B", "A", "C"]);
    }
}
