/// Password hashing and password policy
///
/// Passwords are hashed with Argon2id and stored as PHC strings. Plaintext
/// never reaches the store or the logs.
///
/// # Strength Policy
///
/// A password is accepted when it has at least 8 characters and contains an
/// uppercase letter, a lowercase letter, a digit, and a symbol (any character
/// that is not an ASCII letter or digit).
///
/// # Example
///
/// ```
/// use workshop_shared::auth::password::{hash_password, verify_password, validate_password_strength};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// assert!(validate_password_strength("Abcdef1!").is_ok());
///
/// let hash = hash_password("Abcdef1!")?;
/// assert!(verify_password("Abcdef1!", &hash)?);
/// assert!(!verify_password("Abcdef1?", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length of generated reset passwords, before any symbol is appended
pub const GENERATED_PASSWORD_LENGTH: usize = 12;

/// Character appended to a candidate that only lacks a symbol
pub const FALLBACK_SYMBOL: char = '!';

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password using Argon2id
///
/// Parameters: 64 MB memory, 3 passes, 4 lanes, 32-byte output, random
/// 16-byte salt. The returned PHC string embeds all of them, so
/// [`verify_password`] needs nothing else.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the stored
/// hash itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a password against the strength policy
///
/// Returns the first unmet requirement as a human-readable message.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        return Err("Password must contain at least one symbol".to_string());
    }

    Ok(())
}

/// Generates a random alphanumeric password
///
/// The result always holds at least one uppercase letter, one lowercase
/// letter and one digit, but no symbol; [`strengthen`] supplies that.
/// Look-alike characters (`0`, `O`, `1`, `l`, `I`) are excluded.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    let pool: Vec<u8> = [UPPER, LOWER, DIGITS].concat();

    let mut chars: Vec<u8> = vec![
        UPPER[rng.gen_range(0..UPPER.len())],
        LOWER[rng.gen_range(0..LOWER.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
    ];
    while chars.len() < GENERATED_PASSWORD_LENGTH {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

/// Makes a reset candidate policy-compliant if a trailing symbol suffices
///
/// A compliant candidate is returned unchanged. Otherwise
/// [`FALLBACK_SYMBOL`] is appended once and the policy re-checked; if the
/// candidate still fails, the policy message is returned.
pub fn strengthen(candidate: &str) -> Result<String, String> {
    if validate_password_strength(candidate).is_ok() {
        return Ok(candidate.to_string());
    }

    let mut patched = candidate.to_string();
    patched.push(FALLBACK_SYMBOL);
    validate_password_strength(&patched)?;

    Ok(patched)
}
