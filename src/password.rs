use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{PasswordHash, PasswordHasher, PasswordVerifier};

/// Password hashing and verification
pub trait PasswordAlgorithm {
    /// Error type for password hashing and verification
    type Error;

    /// Hashes a password
    fn hash_password(&self, password: &str) -> Result<String, Self::Error>;

    /// Verifies a password against a stored hash.
    ///
    /// `Ok(false)` means the password simply did not match; `Err` means the
    /// stored hash itself was unusable.
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, Self::Error>;
}

/// Argon2 password hashing and verification
#[derive(Debug, Clone, Default)]
pub struct Argon2PasswordAlgorithm<'a> {
    config: argon2::Argon2<'a>,
}

impl<'a> Argon2PasswordAlgorithm<'a> {
    /// Creates a new [Argon2PasswordAlgorithm] with the given config
    pub fn new(config: argon2::Argon2<'a>) -> Self {
        Self { config }
    }
}

impl<'a> PasswordAlgorithm for Argon2PasswordAlgorithm<'a> {
    type Error = password_hash::Error;

    fn hash_password(&self, password: &str) -> Result<String, Self::Error> {
        let salt = SaltString::generate(&mut OsRng);
        self.config
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, Self::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        match self.config.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
