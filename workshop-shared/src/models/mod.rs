/// Database models
///
/// Each model carries its own SQL as associated functions taking a `PgPool`.
/// The store layer wraps them behind the storage traits.
///
/// # Models
///
/// - `user`: User accounts, roles, permissions
/// - `audit`: Append-only audit trail entries

pub mod audit;
pub mod user;

/// Builds a `LIKE` pattern matching `needle` as a substring
///
/// Escapes `\`, `%` and `_` so user input is matched literally; queries use
/// `ESCAPE '\'`.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
