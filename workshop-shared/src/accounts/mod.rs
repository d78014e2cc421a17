/// Account lifecycle
///
/// [`AccountService`] owns every mutation of user accounts and enforces the
/// guardrails that keep the shop administrable:
///
/// - at least one active administrator always remains once one exists
/// - nobody deactivates or deletes their own account
/// - the bootstrap `admin` account is never deactivated or deleted
///
/// Each operation reads the target, validates against the current store
/// state (the administrator count is re-queried on every call), writes, and
/// then appends an audit entry. A failed audit write never fails the
/// operation.
///
/// Checks and writes are separate statements. Two concurrent demotions of
/// different administrators can both observe the other as remaining and
/// leave zero active administrators.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, OnceLock};
/// use workshop_shared::accounts::{AccountService, NewAccount};
/// use workshop_shared::auth::identity::ActingIdentity;
/// use workshop_shared::store::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let accounts = AccountService::new(store.clone(), store);
///
/// let bob = accounts
///     .create(
///         &ActingIdentity::named("alice"),
///         NewAccount {
///             username: "bob".to_string(),
///             display_name: "Bob".to_string(),
///             email: "bob@x.com".to_string(),
///             role: "mechanic".to_string(),
///             password: "Abcdef1!".to_string(),
///             ..Default::default()
///         },
///     )
///     .await?;
/// assert!(bob.active);
/// # Ok(())
/// # }
/// ```

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::audit::AuditLogger;
use crate::auth::identity::ActingIdentity;
use crate::auth::password::{self, hash_password, verify_password, validate_password_strength};
use crate::auth::permissions::{self, is_administrator_role, ADMINISTRATOR_ROLE};
use crate::error::{AccountError, AccountResult};
use crate::models::audit::AuditAction;
use crate::models::user::{NewUser, User, UserChanges, BOOTSTRAP_USERNAME};
use crate::pagination::{normalize_filter, Page, PageRequest};
use crate::store::{AuditStore, UserStore};

pub mod validation;

use validation::{normalize_email, required};

/// Message for any change that would leave no active administrator
pub const LAST_ADMIN_MESSAGE: &str = "must keep at least one active administrator";

/// Permissions granted to the seeded bootstrap account
pub const BOOTSTRAP_PERMISSIONS: [&str; 3] = [
    permissions::USERS_ADMIN,
    permissions::AUDIT_READ,
    permissions::AUDIT_WRITE,
];

/// Input for creating an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub password: String,
    #[serde(default)]
    pub force_password_change: bool,
    /// Initial permission slugs, normalized before storage
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// Partial profile update; `None` fields are left alone
///
/// A blank password counts as not supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
    pub force_password_change: Option<bool>,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    audit: AuditLogger,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self {
            users,
            audit: AuditLogger::new(audit),
        }
    }

    /// The logger mutations are recorded with
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Lists users by ascending id
    ///
    /// `filter` is matched case-insensitively as a substring of username,
    /// display name, role or email. A filter matching nobody yields an empty
    /// page with `total = 0`.
    pub async fn list(&self, filter: Option<&str>, paging: &PageRequest) -> AccountResult<Page<User>> {
        let paging = paging.resolve();
        let filter = normalize_filter(filter);

        let (items, total) = self
            .users
            .list_users(filter.as_deref(), paging.limit, paging.offset)
            .await?;

        Ok(Page::new(items, total, paging))
    }

    pub async fn get(&self, id: i64) -> AccountResult<User> {
        self.users.find_user(id).await?.ok_or(AccountError::NotFound)
    }

    /// Creates an active account
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank field, a malformed email or a weak password
    /// - `Conflict` when the username or email is taken
    pub async fn create(&self, actor: &ActingIdentity, input: NewAccount) -> AccountResult<User> {
        let username = required("username", &input.username)?;
        let display_name = required("display_name", &input.display_name)?;
        let email = normalize_email(&input.email)?;
        let role = required("role", &input.role)?;
        if input.password.is_empty() {
            return Err(AccountError::validation("password is required"));
        }
        validate_password_strength(&input.password).map_err(AccountError::Validation)?;

        let password_hash = hash_blocking(input.password).await?;
        let permissions = permissions::normalize(input.permissions.unwrap_or_default());

        let user = self
            .users
            .insert_user(NewUser {
                username,
                display_name,
                email,
                role,
                password_hash,
                force_password_change: input.force_password_change,
                permissions,
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "user creation rejected by store");
                AccountError::from(e)
            })?;

        info!(user_id = user.id, username = %user.username, actor = %actor.display(), "user created");
        self.audit
            .append(
                AuditAction::CreateUser,
                &user.username,
                actor,
                format!("role={}, email={}", user.role, user.email),
            )
            .await;

        Ok(user)
    }

    /// Applies a partial update, returning the number of rows changed
    ///
    /// An update with no fields succeeds with 0 and records nothing.
    pub async fn update(
        &self,
        actor: &ActingIdentity,
        id: i64,
        input: AccountChanges,
    ) -> AccountResult<u64> {
        let target = self.get(id).await?;

        let mut changes = UserChanges::default();
        if let Some(display_name) = input.display_name {
            changes.display_name = Some(required("display_name", &display_name)?);
        }
        if let Some(email) = input.email {
            changes.email = Some(normalize_email(&email)?);
        }
        if let Some(role) = input.role {
            changes.role = Some(required("role", &role)?);
        }
        if let Some(password) = input.password.filter(|p| !p.is_empty()) {
            validate_password_strength(&password).map_err(AccountError::Validation)?;
            changes.password_hash = Some(hash_blocking(password).await?);
        }
        changes.force_password_change = input.force_password_change;

        if changes.is_empty() {
            return Ok(0);
        }

        let demoting = changes
            .role
            .as_deref()
            .map(|role| target.is_active_administrator() && !is_administrator_role(role))
            .unwrap_or(false);
        if demoting {
            self.ensure_other_admin(&target).await?;
        }

        let updated = self.users.update_user(id, &changes).await.map_err(|e| {
            warn!(user_id = id, error = %e, "user update rejected by store");
            AccountError::from(e)
        })?;

        let fields = changes.changed_fields().join(", ");
        info!(user_id = id, actor = %actor.display(), fields = %fields, "user updated");
        self.audit
            .append(
                AuditAction::UpdateUser,
                &target.username,
                actor,
                format!("changed: {}", fields),
            )
            .await;

        Ok(updated)
    }

    /// Activates or deactivates an account
    pub async fn set_active(&self, actor: &ActingIdentity, id: i64, active: bool) -> AccountResult<u64> {
        let target = self.get(id).await?;

        if !active {
            if target.is_bootstrap() {
                warn!(user_id = id, actor = %actor.display(), "refused to deactivate bootstrap account");
                return Err(AccountError::validation("the admin account cannot be deactivated"));
            }
            if actor.is_user(target.id, &target.username) {
                warn!(user_id = id, actor = %actor.display(), "refused self-deactivation");
                return Err(AccountError::validation("you cannot deactivate your own account"));
            }
            if target.is_administrator() {
                self.ensure_other_admin(&target).await?;
            }
        }

        let updated = self.users.set_user_active(id, active).await?;

        info!(user_id = id, active, actor = %actor.display(), "user status changed");
        self.audit
            .append(
                AuditAction::UpdateStatus,
                &target.username,
                actor,
                format!("active={}", active),
            )
            .await;

        Ok(updated)
    }

    /// Replaces the password and forces a change at next login
    ///
    /// Uses `candidate` when given, otherwise a generated password. A
    /// candidate that only lacks a symbol gets `!` appended. Returns the
    /// plaintext, which is not stored anywhere.
    pub async fn reset_password(
        &self,
        actor: &ActingIdentity,
        id: i64,
        candidate: Option<String>,
    ) -> AccountResult<String> {
        let target = self.get(id).await?;

        let candidate = candidate
            .filter(|c| !c.is_empty())
            .unwrap_or_else(password::generate_password);
        let plaintext = password::strengthen(&candidate).map_err(AccountError::Validation)?;

        let password_hash = hash_blocking(plaintext.clone()).await?;
        self.users.set_password(id, &password_hash, true).await?;

        info!(user_id = id, actor = %actor.display(), "password reset");
        self.audit
            .append(
                AuditAction::ResetPassword,
                &target.username,
                actor,
                "force_password_change=true",
            )
            .await;

        Ok(plaintext)
    }

    /// Permanently deletes an account
    pub async fn delete(&self, actor: &ActingIdentity, id: i64) -> AccountResult<u64> {
        let target = self.get(id).await?;

        if target.is_bootstrap() {
            warn!(user_id = id, actor = %actor.display(), "refused to delete bootstrap account");
            return Err(AccountError::validation("the admin account cannot be deleted"));
        }
        if actor.is_user(target.id, &target.username) {
            warn!(user_id = id, actor = %actor.display(), "refused self-deletion");
            return Err(AccountError::validation("you cannot delete your own account"));
        }
        if target.is_active_administrator() {
            self.ensure_other_admin(&target).await?;
        }

        let deleted = self.users.delete_user(id).await?;

        info!(user_id = id, username = %target.username, actor = %actor.display(), "user deleted");
        self.audit
            .append(AuditAction::DeleteUser, &target.username, actor, "")
            .await;

        Ok(deleted)
    }

    /// Replaces the permission set, returning it normalized
    pub async fn update_permissions(
        &self,
        actor: &ActingIdentity,
        id: i64,
        slugs: Vec<String>,
    ) -> AccountResult<BTreeSet<String>> {
        let target = self.get(id).await?;
        let normalized = permissions::normalize(slugs);

        self.users.set_permissions(id, &normalized).await?;

        let detail = normalized.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        info!(user_id = id, actor = %actor.display(), permissions = %detail, "permissions updated");
        self.audit
            .append(AuditAction::UpdatePermissions, &target.username, actor, detail)
            .await;

        Ok(normalized)
    }

    /// Stamps the last access time; not audited
    pub async fn mark_last_access(&self, id: i64) -> AccountResult<()> {
        let updated = self.users.touch_last_access(id, Utc::now()).await?;
        if updated == 0 {
            return Err(AccountError::NotFound);
        }
        Ok(())
    }

    /// Checks credentials for login
    ///
    /// Unknown usernames, wrong passwords and inactive accounts all fail with
    /// the same `Unauthenticated` error, and all of them pay for one argon2
    /// verification. Success stamps the last access time.
    pub async fn authenticate(&self, username: &str, password: &str) -> AccountResult<User> {
        let Some(mut user) = self.users.find_user_by_username(username).await? else {
            verify_against_placeholder(password.to_string()).await;
            warn!(username = %username.trim(), "login for unknown user");
            return Err(AccountError::Unauthenticated);
        };

        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            warn!(user_id = user.id, "login with wrong password");
            return Err(AccountError::Unauthenticated);
        }
        if !user.active {
            warn!(user_id = user.id, "login for inactive user");
            return Err(AccountError::Unauthenticated);
        }

        let now = Utc::now();
        self.users.touch_last_access(user.id, now).await?;
        user.last_access_at = Some(now);

        info!(user_id = user.id, "user logged in");
        Ok(user)
    }

    /// Seeds the bootstrap administrator into an empty store
    ///
    /// Does nothing when any user exists. The account must change its
    /// password at first login.
    pub async fn ensure_bootstrap_admin(&self, password: &str) -> AccountResult<Option<User>> {
        if self.users.count_users().await? > 0 {
            return Ok(None);
        }

        let user = self
            .create(
                &ActingIdentity::system(),
                NewAccount {
                    username: BOOTSTRAP_USERNAME.to_string(),
                    display_name: "Administrator".to_string(),
                    email: "admin@workshop.local".to_string(),
                    role: ADMINISTRATOR_ROLE.to_string(),
                    password: password.to_string(),
                    force_password_change: true,
                    permissions: Some(BOOTSTRAP_PERMISSIONS.iter().map(|s| s.to_string()).collect()),
                },
            )
            .await?;

        info!(user_id = user.id, "bootstrap administrator created");
        Ok(Some(user))
    }

    /// Fails unless an active administrator other than `target` exists
    async fn ensure_other_admin(&self, target: &User) -> AccountResult<()> {
        let remaining = self
            .users
            .count_active_administrators(std::slice::from_ref(&target.username))
            .await?;

        if remaining < 1 {
            warn!(user_id = target.id, username = %target.username, "refused to remove last active administrator");
            return Err(AccountError::validation(LAST_ADMIN_MESSAGE));
        }
        Ok(())
    }
}

/// Hashes on the blocking pool
async fn hash_blocking(password: String) -> AccountResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AccountError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(AccountError::from)
}

async fn verify_blocking(password: String, hash: String) -> AccountResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AccountError::Internal(format!("verification task failed: {}", e)))?
        .map_err(AccountError::from)
}

/// Runs one verification against [`placeholder_hash`], discarding the result
async fn verify_against_placeholder(password: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = placeholder_hash() {
            let _ = verify_password(&password, hash);
        }
    })
    .await;
}

/// Hash of a fixed password, computed on first use with the regular parameters
fn placeholder_hash() -> Option<&'static str> {
    static HASH: OnceLock<Option<String>> = OnceLock::new();
    HASH.get_or_init(|| hash_password("placeholder-for-unknown-users").ok())
        .as_deref()
}
