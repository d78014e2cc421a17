/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username TEXT NOT NULL,
///     display_name TEXT NOT NULL,
///     email TEXT NOT NULL,
///     role TEXT NOT NULL,
///     active BOOLEAN NOT NULL DEFAULT TRUE,
///     force_password_change BOOLEAN NOT NULL DEFAULT FALSE,
///     last_access_at TIMESTAMPTZ,
///     password_hash TEXT NOT NULL,
///     permissions TEXT NOT NULL DEFAULT '[]',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX users_username_lower_key ON users (lower(username));
/// CREATE UNIQUE INDEX users_email_lower_key ON users (lower(email));
/// ```
///
/// Permissions are stored as JSON text. Rows whose permissions column does not
/// parse are read with an empty permission set.
///
/// # Example
///
/// ```no_run
/// use workshop_shared::models::user::User;
/// use workshop_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// if let Some(user) = User::find_by_username(&pool, "Admin").await? {
///     println!("{} is active: {}", user.username, user.active);
/// }
/// # Ok(())
/// # }
/// ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::permissions::{self, is_administrator_role};
use crate::models::contains_pattern;

/// Username of the bootstrap account
pub const BOOTSTRAP_USERNAME: &str = "admin";

const USER_COLUMNS: &str = "id, username, display_name, email, role, active, \
     force_password_change, last_access_at, password_hash, permissions, created_at";

const FILTER_CLAUSE: &str = "($1::text IS NULL \
     OR lower(username) LIKE $1 ESCAPE '\\' \
     OR lower(display_name) LIKE $1 ESCAPE '\\' \
     OR lower(role) LIKE $1 ESCAPE '\\' \
     OR lower(email) LIKE $1 ESCAPE '\\')";

/// Raw `users` row
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    display_name: String,
    email: String,
    role: String,
    active: bool,
    force_password_change: bool,
    last_access_at: Option<DateTime<Utc>>,
    password_hash: String,
    permissions: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            email: row.email,
            role: row.role,
            active: row.active,
            force_password_change: row.force_password_change,
            last_access_at: row.last_access_at,
            password_hash: row.password_hash,
            permissions: permissions::parse_stored(row.permissions.as_deref()),
            created_at: row.created_at,
        }
    }
}

/// A user account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned id, immutable
    pub id: i64,

    /// Unique, compared case-insensitively
    pub username: String,

    pub display_name: String,

    /// Unique, stored lowercased
    pub email: String,

    /// Free-form role; "administrator" (any case) is an administrator
    pub role: String,

    pub active: bool,

    /// User must choose a new password at next login
    pub force_password_change: bool,

    pub last_access_at: Option<DateTime<Utc>>,

    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Normalized permission slugs
    pub permissions: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_administrator(&self) -> bool {
        is_administrator_role(&self.role)
    }

    /// Active administrator, the only kind that counts toward lockout checks
    pub fn is_active_administrator(&self) -> bool {
        self.active && self.is_administrator()
    }

    /// Whether this is the protected bootstrap account
    pub fn is_bootstrap(&self) -> bool {
        self.username.trim().eq_ignore_ascii_case(BOOTSTRAP_USERNAME)
    }

    /// Permissions as a list, for tokens and responses
    pub fn permission_list(&self) -> Vec<String> {
        self.permissions.iter().cloned().collect()
    }
}

/// Input for inserting a user
///
/// Fields must already be validated and normalized; the password is
/// already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub password_hash: String,
    pub force_password_change: bool,
    pub permissions: BTreeSet<String>,
}

/// Partial update of profile fields
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub password_hash: Option<String>,
    pub force_password_change: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the fields being changed, in a fixed order
    ///
    /// The password is reported as `password`, never by value.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.display_name.is_some() {
            fields.push("display_name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.role.is_some() {
            fields.push("role");
        }
        if self.password_hash.is_some() {
            fields.push("password");
        }
        if self.force_password_change.is_some() {
            fields.push("force_password_change");
        }
        fields
    }
}

impl User {
    /// Inserts a user with `active = true`
    ///
    /// # Errors
    ///
    /// Fails with a database error on a duplicate username or email
    /// (unique indexes `users_username_lower_key` / `users_email_lower_key`).
    pub async fn create(pool: &PgPool, data: NewUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (username, display_name, email, role, active,
                               force_password_change, password_hash, permissions)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(data.username)
            .bind(data.display_name)
            .bind(data.email)
            .bind(data.role)
            .bind(data.force_password_change)
            .bind(data.password_hash)
            .bind(permissions::to_stored(&data.permissions))
            .fetch_one(pool)
            .await?;

        Ok(row.into())
    }

    /// Finds a user by id
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Finds a user by username, case-insensitively
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)");

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(username.trim())
            .fetch_optional(pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Lists users ordered by ascending id
    ///
    /// `filter` must already be trimmed and lowercased; it is matched as a
    /// substring of username, display name, role or email. Returns the page
    /// and the total number of matches.
    pub async fn list(
        pool: &PgPool,
        filter: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let pattern = filter.map(contains_pattern);

        let count_query = format!("SELECT COUNT(*) FROM users WHERE {FILTER_CLAUSE}");
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(pattern.as_deref())
            .fetch_one(pool)
            .await?;

        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {FILTER_CLAUSE} \
             ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, UserRow>(&query)
            .bind(pattern.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Counts all users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts active administrators, ignoring the listed usernames
    ///
    /// `excluding` is compared case-insensitively.
    pub async fn count_active_administrators(
        pool: &PgPool,
        excluding: &[String],
    ) -> Result<i64, sqlx::Error> {
        let excluded: Vec<String> = excluding.iter().map(|u| u.trim().to_lowercase()).collect();

        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM users
            WHERE active = TRUE
              AND lower(trim(role)) = 'administrator'
              AND NOT (lower(username) = ANY($1))
            "#,
        )
        .bind(excluded)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Applies a partial update, returning the number of rows changed
    pub async fn update(pool: &PgPool, id: i64, data: &UserChanges) -> Result<u64, sqlx::Error> {
        let mut assignments: Vec<String> = Vec::new();
        let mut bind_count = 1;

        if data.display_name.is_some() {
            bind_count += 1;
            assignments.push(format!("display_name = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            assignments.push(format!("email = ${}", bind_count));
        }
        if data.role.is_some() {
            bind_count += 1;
            assignments.push(format!("role = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            assignments.push(format!("password_hash = ${}", bind_count));
        }
        if data.force_password_change.is_some() {
            bind_count += 1;
            assignments.push(format!("force_password_change = ${}", bind_count));
        }

        if assignments.is_empty() {
            return Ok(0);
        }

        let query = format!("UPDATE users SET {} WHERE id = $1", assignments.join(", "));
        let mut q = sqlx::query(&query).bind(id);

        if let Some(display_name) = &data.display_name {
            q = q.bind(display_name);
        }
        if let Some(email) = &data.email {
            q = q.bind(email);
        }
        if let Some(role) = &data.role {
            q = q.bind(role);
        }
        if let Some(password_hash) = &data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(force) = data.force_password_change {
            q = q.bind(force);
        }

        let result = q.execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn set_active(pool: &PgPool, id: i64, active: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn set_password(
        pool: &PgPool,
        id: i64,
        password_hash: &str,
        force_password_change: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, force_password_change = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(force_password_change)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Replaces the permission set
    pub async fn set_permissions(
        pool: &PgPool,
        id: i64,
        permissions: &BTreeSet<String>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET permissions = $2 WHERE id = $1")
            .bind(id)
            .bind(permissions::to_stored(permissions))
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn touch_last_access(
        pool: &PgPool,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_access_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Permanently deletes a user
    ///
    /// Audit records keep the username; there is no foreign key to cascade.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(role: &str, active: bool) -> User {
        User {
            id: 1,
            username: "Admin".to_string(),
            display_name: "Shop owner".to_string(),
            email: "owner@shop.test".to_string(),
            role: role.to_string(),
            active,
            force_password_change: false,
            last_access_at: None,
            password_hash: "$argon2id$secret".to_string(),
            permissions: BTreeSet::from(["users:admin".to_string()]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample("administrator", true)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["permissions"], serde_json::json!(["users:admin"]));
    }

    #[test]
    fn test_role_helpers() {
        assert!(sample("Administrator", true).is_active_administrator());
        assert!(!sample("Administrator", false).is_active_administrator());
        assert!(!sample("technician", true).is_administrator());
        assert!(sample("technician", true).is_bootstrap());
    }

    #[test]
    fn test_changed_fields() {
        assert!(UserChanges::default().is_empty());

        let changes = UserChanges {
            email: Some("x@y.z".to_string()),
            password_hash: Some("hash".to_string()),
            ..Default::default()
        };
        assert_eq!(changes.changed_fields(), vec!["email", "password"]);
    }

    #[test]
    fn test_row_with_malformed_permissions() {
        let row = UserRow {
            id: 5,
            username: "bob".to_string(),
            display_name: "Bob".to_string(),
            email: "bob@shop.test".to_string(),
            role: "clerk".to_string(),
            active: true,
            force_password_change: false,
            last_access_at: None,
            password_hash: "h".to_string(),
            permissions: Some("{broken".to_string()),
            created_at: Utc::now(),
        };
        let user: User = row.into();
        assert!(user.permissions.is_empty());
    }
}
