//! Argon2id hashes of match access codes, stored as PHC strings.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

pub fn hash_access_code(code: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(code.as_bytes(), &salt)?
        .to_string())
}

/// Whether `presented` is the code behind `stored`.
///
/// A wrong code is `Ok(false)`. Only an unparseable `stored` hash is an error.
pub fn access_code_matches(presented: &str, stored: &str) -> Result<bool, password_hash::Error> {
    let stored = PasswordHash::new(stored)?;
    Ok(Argon2::default()
        .verify_password(presented.as_bytes(), &stored)
        .is_ok())
}
