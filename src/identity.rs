use std::fmt;

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidateEmail;

use crate::password::{Argon2PasswordAlgorithm, PasswordAlgorithm};

/// The scope a credential set belongs to.
///
/// Guest and signed-in scopes share one credential-set abstraction; only the
/// storage key differs, so merging needs no second code path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    /// The implicit scope used before anyone signs in
    Guest,
    /// A registered user, keyed by email address
    User(CompactString),
}

impl Owner {
    /// Stable storage key for this scope; distinct per owner.
    pub fn storage_key(&self) -> CompactString {
        match self {
            Owner::Guest => CompactString::const_new("accounts-guest"),
            Owner::User(email) => format_compact!("accounts-{email}"),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Guest => f.write_str("guest"),
            Owner::User(email) => f.write_str(email),
        }
    }
}

/// A registered user as seen by the rest of the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Validated email address
    pub email: CompactString,
    /// Optional display name
    pub display_name: Option<CompactString>,
}

impl Identity {
    /// The owner scope holding this identity's credentials.
    pub fn owner(&self) -> Owner {
        Owner::User(self.email.clone())
    }
}

/// Errors from registration and sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The supplied address is not a valid email
    #[error("not a valid email address")]
    InvalidEmail,
    /// Another user already registered this address
    #[error("an account with this email already exists")]
    DuplicateEmail,
    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("invalid email or password")]
    BadCredentials,
    /// The password could not be hashed or the stored hash was unusable
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    email: CompactString,
    display_name: Option<CompactString>,
    password_hash: String,
}

impl UserRecord {
    fn identity(&self) -> Identity {
        Identity {
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Locally registered users with Argon2-hashed passwords.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDirectory {
    users: Vec<UserRecord>,
}

impl UserDirectory {
    /// Register a new user and return the signed-in identity.
    pub fn register(
        &mut self,
        email: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<Identity, DirectoryError> {
        if !email.validate_email() {
            return Err(DirectoryError::InvalidEmail);
        }
        if self.find(email).is_some() {
            return Err(DirectoryError::DuplicateEmail);
        }

        let password_hash = Argon2PasswordAlgorithm::default()
            .hash_password(password)
            .map_err(|err| DirectoryError::Hash(err.to_string()))?;
        let record = UserRecord {
            email: email.into(),
            display_name: display_name.map(CompactString::from),
            password_hash,
        };
        let identity = record.identity();
        self.users.push(record);
        tracing::info!(email, "registered user");
        Ok(identity)
    }

    /// Verify credentials and return the signed-in identity.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Identity, DirectoryError> {
        let record = self.find(email).ok_or(DirectoryError::BadCredentials)?;
        match Argon2PasswordAlgorithm::default().verify_password(password, &record.password_hash)
        {
            Ok(true) => Ok(record.identity()),
            Ok(false) => {
                tracing::warn!(email, "sign-in rejected");
                Err(DirectoryError::BadCredentials)
            }
            Err(err) => Err(DirectoryError::Hash(err.to_string())),
        }
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether nobody has registered yet
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn find(&self, email: &str) -> Option<&UserRecord> {
        self.users.iter().find(|user| user.email == email)
    }
}
