/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing, strength policy, reset password generation
/// - [`jwt`]: HS256 session tokens
/// - [`permissions`]: Permission slug normalization and grant checks
/// - [`identity`]: The acting identity passed to every mutating operation
///
/// # Example
///
/// ```
/// use workshop_shared::auth::permissions::{grants, AUDIT_READ};
///
/// assert!(grants("clerk", &["audit.read"], AUDIT_READ));
/// assert!(grants("Administrator", &[] as &[&str], AUDIT_READ));
/// ```

pub mod identity;
pub mod jwt;
pub mod password;
pub mod permissions;
