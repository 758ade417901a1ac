/// Argon2id password hashing
///
/// Stored hashes are PHC strings, so they carry their own salt and cost
/// parameters. Verification reads those back, which keeps older hashes
/// valid after the costs below change.
///
/// ```
/// use teamboard_shared::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("correct horse battery").unwrap();
/// assert!(verify_password("correct horse battery", &hash).unwrap());
/// assert!(!verify_password("Correct horse battery", &hash).unwrap());
/// ```

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Memory cost in KiB (19 MiB)
const MEMORY_KIB: u32 = 19 * 1024;
const PASSES: u32 = 2;
const LANES: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid Argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("could not hash password: {0}")]
    Hash(argon2::password_hash::Error),

    /// The stored value is not a PHC string we can read
    #[error("stored password hash is unreadable: {0}")]
    Malformed(argon2::password_hash::Error),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, PASSES, LANES, None).map_err(PasswordError::Params)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// `Ok(false)` means the password is wrong; errors are reserved for bad hashes
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(PasswordError::Malformed)?;

    match hasher()?.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Malformed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc() {
        let hash = hash_password("s3cret-enough").unwrap();

        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains(&format!("m={},t={},p={}", MEMORY_KIB, PASSES, LANES)));
    }

    #[test]
    fn test_same_password_gets_fresh_salt() {
        assert_ne!(hash_password("repeat").unwrap(), hash_password("repeat").unwrap());
    }

    #[test]
    fn test_verify() {
        let hash = hash_password("contraseña-segura").unwrap();

        assert!(verify_password("contraseña-segura", &hash).unwrap());
        assert!(!verify_password("contrasena-segura", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_unreadable_hash() {
        assert!(matches!(
            verify_password("whatever", "plain-text"),
            Err(PasswordError::Malformed(_))
        ));
    }
}
