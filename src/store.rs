use std::collections::HashMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::PathBuf;

use compact_str::CompactString;
use thiserror::Error;

use crate::account::Account;
use crate::identity::Owner;

/// Whole-set persistence for credential sets, one key per owner scope.
///
/// Implementations only need read-whole-set / write-whole-set semantics;
/// callers never patch individual accounts in place. The storage medium
/// itself (files, key-value store, embedded DB) is the implementor's
/// business.
pub trait CredentialStorage {
    /// Error type for storage operations
    type Error;

    /// Load the set stored for `owner`; a scope never written reads as empty.
    fn load(&self, owner: &Owner) -> Result<Vec<Account>, Self::Error>;

    /// Replace the set stored for `owner`.
    fn save(&mut self, owner: &Owner, accounts: &[Account]) -> Result<(), Self::Error>;

    /// Remove the set stored for `owner`; removing an absent key is a no-op.
    fn remove(&mut self, owner: &Owner) -> Result<(), Self::Error>;
}

/// In-memory storage for tests and for embedders with their own persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    sets: HashMap<CompactString, Vec<Account>>,
}

impl MemoryStorage {
    /// Whether anything is stored under `owner`'s key.
    pub fn contains(&self, owner: &Owner) -> bool {
        self.sets.contains_key(&owner.storage_key())
    }
}

impl CredentialStorage for MemoryStorage {
    type Error = Infallible;

    fn load(&self, owner: &Owner) -> Result<Vec<Account>, Self::Error> {
        Ok(self
            .sets
            .get(&owner.storage_key())
            .cloned()
            .unwrap_or_default())
    }

    fn save(&mut self, owner: &Owner, accounts: &[Account]) -> Result<(), Self::Error> {
        self.sets.insert(owner.storage_key(), accounts.to_vec());
        Ok(())
    }

    fn remove(&mut self, owner: &Owner) -> Result<(), Self::Error> {
        self.sets.remove(&owner.storage_key());
        Ok(())
    }
}

/// Errors from the JSON file backend.
#[derive(Debug, Error)]
pub enum FileStorageError {
    /// The filesystem failed underneath the store
    #[error("credential store I/O failed")]
    Io(#[from] io::Error),
    /// An on-disk set could not be read or written as JSON
    #[error("credential store serialization failed")]
    Serde(#[from] serde_json::Error),
    /// The platform exposes no data directory to put the store in
    #[error("no data directory available")]
    NoDataDir,
}

/// One JSON file per owner key beneath a root directory.
#[derive(Debug, Clone)]
pub struct JsonDirStorage {
    root: PathBuf,
}

impl JsonDirStorage {
    /// Store beneath an explicit root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store beneath the platform data directory.
    pub fn open_default() -> Result<Self, FileStorageError> {
        let mut root = dirs::data_dir().ok_or(FileStorageError::NoDataDir)?;
        root.push("authenticator-core");
        Ok(Self { root })
    }

    fn set_path(&self, owner: &Owner) -> PathBuf {
        self.root.join(format!("{}.json", owner.storage_key()))
    }
}

impl CredentialStorage for JsonDirStorage {
    type Error = FileStorageError;

    fn load(&self, owner: &Owner) -> Result<Vec<Account>, Self::Error> {
        let path = self.set_path(owner);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&mut self, owner: &Owner, accounts: &[Account]) -> Result<(), Self::Error> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(accounts)?;
        fs::write(self.set_path(owner), json)?;
        tracing::debug!(owner = %owner.storage_key(), count = accounts.len(), "saved credential set");
        Ok(())
    }

    fn remove(&mut self, owner: &Owner) -> Result<(), Self::Error> {
        match fs::remove_file(self.set_path(owner)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::Account;

    fn scratch_dir() -> PathBuf {
        use rand::Rng;
        let tag: u64 = rand::rng().random();
        std::env::temp_dir().join(format!("authenticator-core-test-{tag:016x}"))
    }

    #[test]
    fn memory_storage_round_trips_per_owner() {
        let mut storage = MemoryStorage::default();
        let guest = Owner::Guest;
        let user = Owner::User("alice@example.com".into());

        let accounts = vec![Account::new("GitHub", "octocat", "JBSWY3DPEHPK3PXP")];
        storage.save(&guest, &accounts).unwrap();

        assert_eq!(storage.load(&guest).unwrap(), accounts);
        assert_eq!(storage.load(&user).unwrap(), Vec::new());

        storage.remove(&guest).unwrap();
        assert!(!storage.contains(&guest));
        assert_eq!(storage.load(&guest).unwrap(), Vec::new());
    }

    #[test]
    fn json_storage_round_trips_per_owner() {
        let root = scratch_dir();
        let mut storage = JsonDirStorage::new(&root);
        let owner = Owner::User("alice@example.com".into());

        assert_eq!(storage.load(&owner).unwrap(), Vec::new());

        let accounts = vec![
            Account::new("GitHub", "octocat", "JBSWY3DPEHPK3PXP"),
            Account::new("Forge", "alice", "GEZDGNBVGY3TQOJQ"),
        ];
        storage.save(&owner, &accounts).unwrap();
        assert_eq!(storage.load(&owner).unwrap(), accounts);

        storage.remove(&owner).unwrap();
        assert_eq!(storage.load(&owner).unwrap(), Vec::new());
        // Removing again is a no-op, not an error.
        storage.remove(&owner).unwrap();

        fs::remove_dir_all(&root).unwrap();
    }
}
