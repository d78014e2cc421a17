/// Acting identity
///
/// Who is performing an operation. Passed explicitly to every mutating
/// account operation and recorded as the actor of each audit entry.

use serde::{Deserialize, Serialize};

/// Actor name used when nothing identifies the caller
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingIdentity {
    pub username: Option<String>,
    pub id: Option<i64>,
    pub role: Option<String>,
}

impl ActingIdentity {
    /// An anonymous caller, recorded as `"system"`
    pub fn system() -> Self {
        Self::default()
    }

    /// A caller known by username
    pub fn named(username: impl Into<String>) -> Self {
        Self::from_parts(Some(username.into()), None, None)
    }

    /// Builds an identity, dropping blank usernames and roles
    pub fn from_parts(username: Option<String>, id: Option<i64>, role: Option<String>) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };

        Self {
            username: clean(username),
            id,
            role: clean(role),
        }
    }

    /// Builder-style id setter
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Builder-style role setter
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Actor string for audit records: username, else `id:<n>`, else `"system"`
    pub fn display(&self) -> String {
        match (&self.username, self.id) {
            (Some(username), _) => username.clone(),
            (None, Some(id)) => format!("id:{}", id),
            (None, None) => SYSTEM_ACTOR.to_string(),
        }
    }

    /// Whether this identity is the given user
    ///
    /// Matches on username (case-insensitive) or on id when both sides
    /// carry one.
    pub fn is_user(&self, user_id: i64, username: &str) -> bool {
        let by_name = self
            .username
            .as_deref()
            .map(|u| u.eq_ignore_ascii_case(username.trim()))
            .unwrap_or(false);
        let by_id = self.id.map(|id| id == user_id).unwrap_or(false);

        by_name || by_id
    }
}
