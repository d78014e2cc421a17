//! Common test utilities for integration tests
//!
//! Wires an `AccountService` to a fresh `MemoryStore` and offers helpers
//! to seed accounts and read back the audit trail.

#![allow(dead_code)]

use std::sync::Arc;

use workshop_shared::accounts::{AccountService, NewAccount};
use workshop_shared::auth::identity::ActingIdentity;
use workshop_shared::models::audit::AuditRecord;
use workshop_shared::models::user::User;
use workshop_shared::pagination::PageRequest;
use workshop_shared::store::{MemoryStore, UserStore};

/// Password that satisfies the strength policy
pub const STRONG_PASSWORD: &str = "Abcdef1!";

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub accounts: AccountService,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let accounts = AccountService::new(store.clone(), store.clone());
        Self { store, accounts }
    }

    /// Creates an account as `system`
    pub async fn seed(&self, username: &str, role: &str) -> User {
        self.accounts
            .create(&ActingIdentity::system(), account(username, role))
            .await
            .unwrap_or_else(|e| panic!("failed to seed {}: {}", username, e))
    }

    /// Whole audit trail, newest first
    pub async fn audit_trail(&self) -> Vec<AuditRecord> {
        self.accounts
            .audit()
            .list(None, None, &PageRequest::default())
            .await
            .expect("audit list should succeed")
            .items
    }

    pub async fn active_admins(&self) -> i64 {
        self.store
            .count_active_administrators(&[])
            .await
            .expect("count should succeed")
    }
}

/// A valid account input with a derived email
pub fn account(username: &str, role: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        display_name: format!("{} display", username),
        email: format!("{}@x.com", username.to_lowercase()),
        role: role.to_string(),
        password: STRONG_PASSWORD.to_string(),
        ..Default::default()
    }
}

/// Identity of a seeded user, as the HTTP layer would resolve it
pub fn acting_as(user: &User) -> ActingIdentity {
    ActingIdentity::named(user.username.clone())
        .with_id(user.id)
        .with_role(user.role.clone())
}
