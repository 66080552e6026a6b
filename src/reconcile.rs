use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{Account, CredentialSet, SecretKey};
use crate::identity::{Identity, Owner};
use crate::store::CredentialStorage;

/// Which entry's metadata survives when both sets hold the same secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreak {
    /// Keep the signed-in identity's pre-existing entry
    #[default]
    PreferPrimary,
    /// Keep the absorbed (guest) entry
    PreferSecondary,
}

/// Configuration for a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Tie-break applied when both sets contain the same secret
    pub tie_break: TieBreak,
}

/// Merge two account lists, deduplicating by secret.
///
/// The result preserves first-seen order across `primary` then `secondary`;
/// this is a stable merge, not a sort. The dedup key is the secret (see
/// [`Account::secret_key`]), so two entries for the same service with
/// different secrets stay distinct while two entries with identical secrets
/// and different display metadata collapse to one, the tie-break deciding
/// which survives.
pub fn merged(primary: &[Account], secondary: &[Account], policy: MergePolicy) -> Vec<Account> {
    let mut accounts: Vec<Account> = Vec::with_capacity(primary.len() + secondary.len());
    let mut positions: HashMap<SecretKey, usize> = HashMap::new();

    let tagged = primary
        .iter()
        .map(|account| (false, account))
        .chain(secondary.iter().map(|account| (true, account)));

    for (from_secondary, account) in tagged {
        match positions.entry(account.secret_key()) {
            Entry::Vacant(slot) => {
                slot.insert(accounts.len());
                accounts.push(account.clone());
            }
            Entry::Occupied(slot) => {
                let replace = match policy.tie_break {
                    TieBreak::PreferPrimary => false,
                    TieBreak::PreferSecondary => from_secondary,
                };
                if replace {
                    accounts[*slot.get()] = account.clone();
                }
            }
        }
    }

    accounts
}

/// Merge `secondary` into `primary` in place and clear `secondary`.
///
/// The in-memory counterpart of [`absorb`]: afterwards `primary` holds the
/// stable merge of both sets and `secondary` is empty, so its credentials
/// are no longer addressable under the old scope.
pub fn merge_into(primary: &mut CredentialSet, secondary: &mut CredentialSet, policy: MergePolicy) {
    let accounts = merged(primary.accounts(), secondary.accounts(), policy);
    primary.replace_accounts(accounts);
    secondary.clear();
}

/// Errors surfaced while absorbing the guest scope into an identity.
///
/// These are surfaced rather than swallowed: a lost merge is a data-loss
/// event, unlike the cosmetic sentinels of code generation.
#[derive(Debug, Error)]
pub enum ReconcileError<E: std::error::Error + 'static> {
    /// A credential set could not be read; nothing was changed
    #[error("failed to load a credential set")]
    Load(#[source] E),
    /// The merged set could not be written; nothing was changed
    #[error("failed to persist the merged credential set")]
    Persist(#[source] E),
    /// The merged set was written but the guest key was not cleared;
    /// retrying the whole operation is safe
    #[error("failed to clear the absorbed guest set")]
    Clear(#[source] E),
}

/// Absorb the guest scope's credentials into `identity`'s persisted set.
///
/// Runs once per successful sign-in. The merged set is durably recorded
/// *before* the guest key is cleared, so an interruption between the two
/// steps never loses secrets. Re-running after a failed clear finds nothing
/// new to merge and clears an already-empty key, making the operation
/// idempotent.
pub fn absorb<S>(
    storage: &mut S,
    identity: &Identity,
    policy: MergePolicy,
) -> Result<CredentialSet, ReconcileError<S::Error>>
where
    S: CredentialStorage,
    S::Error: std::error::Error + 'static,
{
    let owner = identity.owner();
    let primary = storage.load(&owner).map_err(ReconcileError::Load)?;
    let guest = storage.load(&Owner::Guest).map_err(ReconcileError::Load)?;

    let accounts = merged(&primary, &guest, policy);
    storage.save(&owner, &accounts).map_err(|err| {
        tracing::error!(owner = %owner, "failed to persist merged credential set");
        ReconcileError::Persist(err)
    })?;
    storage.remove(&Owner::Guest).map_err(|err| {
        tracing::error!(owner = %owner, "merged set persisted but guest set not cleared");
        ReconcileError::Clear(err)
    })?;

    tracing::info!(
        owner = %owner,
        kept = primary.len(),
        adopted = accounts.len() - primary.len(),
        "absorbed guest credentials"
    );
    Ok(CredentialSet::from_accounts(owner, accounts))
}
