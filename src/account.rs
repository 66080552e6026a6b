use std::fmt;
use std::time::SystemTime;

use compact_str::{CompactString, format_compact};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::base32;
use crate::clock::TotpClock;
use crate::identity::Owner;
use crate::totp;

/// Opaque account identifier, assigned at creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(CompactString);

impl AccountId {
    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        let raw: u128 = rand::rng().random();
        Self(format_compact!("{raw:032x}"))
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplication key derived from an account's secret.
///
/// Well-formed secrets key on their decoded bytes, so spelling differences
/// (case, whitespace, padding) never hide a duplicate. Undecodable secrets
/// key on their normalized text instead and can never collide with a
/// well-formed one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecretKey {
    /// Decoded bytes of a well-formed secret
    Bytes(Vec<u8>),
    /// Normalized text of a secret the codec rejects
    Text(String),
}

/// One stored credential: a service, a display label and the shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identifier assigned at creation
    pub id: AccountId,
    /// Service the code is for
    pub service: CompactString,
    /// Account label within the service
    pub label: CompactString,
    /// Base32 secret text as entered or scanned
    pub secret: CompactString,
}

impl Account {
    /// Create an account with a fresh identifier.
    pub fn new(
        service: impl Into<CompactString>,
        label: impl Into<CompactString>,
        secret: impl Into<CompactString>,
    ) -> Self {
        Self {
            id: AccountId::generate(),
            service: service.into(),
            label: label.into(),
            secret: secret.into(),
        }
    }

    /// The key this account deduplicates by.
    ///
    /// Two accounts with the same decoded secret are the same credential even
    /// when their ids and display metadata differ; the identifier and the
    /// service name play no part.
    pub fn secret_key(&self) -> SecretKey {
        match base32::decode(&self.secret) {
            Ok(bytes) => SecretKey::Bytes(bytes),
            Err(_) => SecretKey::Text(base32::normalize(&self.secret)),
        }
    }

    /// The code to display for the window containing `time`.
    ///
    /// Failures become display sentinels, never faults; see
    /// [`totp::code_or_sentinel`].
    pub fn code_at(&self, clock: &TotpClock, time: SystemTime) -> String {
        totp::code_or_sentinel(&self.secret, clock, time)
    }

    /// The code to display right now.
    pub fn code_now(&self, clock: &TotpClock) -> String {
        self.code_at(clock, SystemTime::now())
    }
}

/// An ordered collection of accounts scoped to one owner.
///
/// Created when a scope is first accessed, mutated by add and merge, and
/// cleared only when a guest scope is absorbed into a signed-in one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    owner: Owner,
    accounts: Vec<Account>,
}

impl CredentialSet {
    /// An empty set for `owner`.
    pub fn empty(owner: Owner) -> Self {
        Self {
            owner,
            accounts: Vec::new(),
        }
    }

    /// A set for `owner` holding `accounts` in their given order.
    pub fn from_accounts(owner: Owner, accounts: Vec<Account>) -> Self {
        Self { owner, accounts }
    }

    /// The scope this set belongs to
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// The accounts in display order
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the set holds no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Append an account at the end of the display order.
    pub fn add(&mut self, account: Account) {
        self.accounts.push(account);
    }

    /// Whether any stored account shares `key`.
    pub fn contains_secret(&self, key: &SecretKey) -> bool {
        self.accounts.iter().any(|account| account.secret_key() == *key)
    }

    /// Iterate accounts in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    /// Drop every account.
    pub fn clear(&mut self) {
        self.accounts.clear();
    }

    pub(crate) fn replace_accounts(&mut self, accounts: Vec<Account>) {
        self.accounts = accounts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(AccountId::generate(), AccountId::generate());
    }

    #[test]
    fn secret_key_ignores_spelling() {
        let canonical = Account::new("GitHub", "octocat", "JBSWY3DPEHPK3PXP");
        let spaced = Account::new("Forge", "other", "jbsw y3dp ehpk 3pxp==");
        assert_eq!(canonical.secret_key(), spaced.secret_key());
    }

    #[test]
    fn distinct_secrets_have_distinct_keys() {
        let one = Account::new("GitHub", "octocat", "JBSWY3DPEHPK3PXP");
        let two = Account::new("GitHub", "octocat", "GEZDGNBVGY3TQOJQ");
        assert_ne!(one.secret_key(), two.secret_key());
    }

    #[test]
    fn malformed_secrets_key_on_their_text() {
        let bad = Account::new("Old", "import", "not base32!");
        let same_bad = Account::new("New", "import", "NOT BASE32!");
        let good = Account::new("GitHub", "octocat", "JBSWY3DPEHPK3PXP");
        assert_eq!(bad.secret_key(), same_bad.secret_key());
        assert_ne!(bad.secret_key(), good.secret_key());
    }

    #[test]
    fn sets_preserve_insertion_order() {
        let mut set = CredentialSet::empty(Owner::Guest);
        set.add(Account::new("A", "first", "AAAA"));
        set.add(Account::new("B", "second", "BBBB"));
        let services: Vec<_> = set.iter().map(|account| account.service.as_str()).collect();
        assert_eq!(services, ["A", "B"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn contains_secret_matches_by_key() {
        let mut set = CredentialSet::empty(Owner::Guest);
        let account = Account::new("GitHub", "octocat", "JBSWY3DPEHPK3PXP");
        let key = account.secret_key();
        set.add(account);
        assert!(set.contains_secret(&key));
        assert!(!set.contains_secret(&Account::new("X", "y", "GEZDGNBVGY3TQOJQ").secret_key()));
    }
}
