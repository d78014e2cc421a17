/// Permission slugs
///
/// A slug is a capability token such as `users:admin`. The canonical
/// separator is `:`; the legacy `.` separator is rewritten on input. Sets are
/// kept sorted and deduplicated, and persisted as a JSON array of strings.

use std::collections::BTreeSet;

/// Full user administration
pub const USERS_ADMIN: &str = "users:admin";

/// Read the audit trail
pub const AUDIT_READ: &str = "audit:read";

/// Record manual audit entries
pub const AUDIT_WRITE: &str = "audit:write";

/// Grants everything
pub const WILDCARD: &str = "*";

/// Role name that bypasses permission checks (compared case-insensitively)
pub const ADMINISTRATOR_ROLE: &str = "administrator";

/// Returns whether `role` names an administrator
pub fn is_administrator_role(role: &str) -> bool {
    role.trim().eq_ignore_ascii_case(ADMINISTRATOR_ROLE)
}

/// Normalizes one slug: trimmed, `.` rewritten to `:`
///
/// Returns `None` for a blank slug.
pub fn normalize_slug(slug: &str) -> Option<String> {
    let slug = slug.trim();
    if slug.is_empty() {
        return None;
    }
    Some(slug.replace('.', ":"))
}

/// Normalizes a list of slugs into a sorted set
pub fn normalize<I, S>(slugs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    slugs
        .into_iter()
        .filter_map(|s| normalize_slug(s.as_ref()))
        .collect()
}

/// Parses the stored JSON text
///
/// Missing, malformed or non-array data reads as the empty set.
pub fn parse_stored(raw: Option<&str>) -> BTreeSet<String> {
    let Some(raw) = raw else {
        return BTreeSet::new();
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => normalize(values.iter().filter_map(|v| v.as_str())),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed stored permissions");
            BTreeSet::new()
        }
    }
}

/// Serializes a set for storage
pub fn to_stored(permissions: &BTreeSet<String>) -> String {
    // A set of strings always serializes
    serde_json::to_string(permissions).unwrap_or_else(|_| "[]".to_string())
}

/// Checks whether a caller with `role` and `permissions` holds `required`
///
/// Administrators hold every permission, as does anyone holding `*`.
pub fn grants<S: AsRef<str>>(role: &str, permissions: &[S], required: &str) -> bool {
    if is_administrator_role(role) {
        return true;
    }

    let required = normalize_slug(required);
    permissions.iter().any(|held| match normalize_slug(held.as_ref()) {
        Some(held) if held == WILDCARD => true,
        Some(held) => Some(&held) == required.as_ref(),
        None => false,
    })
}
