//! Ciphertext Access Control
//!
//! Per-handle allow-lists. A handle produced by any operation starts with an
//! empty list; whoever stores or returns it must grant access before the
//! transaction ends, or the value is inert for everyone.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::address::Address;
use super::handle::Handle;

/// Accounts that must hold a grant on a stored or returned handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantRequirement {
    /// Handle being checked.
    pub handle: Handle,
    /// Accounts entitled to it.
    pub accounts: Vec<Address>,
    /// Where the handle lives (for reports).
    pub location: String,
}

/// A grant that should exist but does not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingGrant {
    /// Handle lacking the grant.
    pub handle: Handle,
    /// Account that cannot use it.
    pub account: Address,
    /// Where the handle lives.
    pub location: String,
}

/// Allow-list store keyed by ciphertext handle.
///
/// Uses BTreeMap for deterministic iteration order. Between [`AclManager::begin`]
/// and [`AclManager::commit`] every new grant is logged so
/// [`AclManager::rollback`] can take it back.
#[derive(Clone, Debug, Default)]
pub struct AclManager {
    grants: BTreeMap<Handle, BTreeSet<Address>>,
    undo: Option<Vec<(Handle, Address)>>,
}

impl AclManager {
    /// Create an empty ACL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `account` to use and request decryption of `handle`.
    pub fn allow(&mut self, handle: Handle, account: Address) {
        trace!(?handle, ?account, "acl grant");
        if self.grants.entry(handle).or_default().insert(account) {
            if let Some(undo) = self.undo.as_mut() {
                undo.push((handle, account));
            }
        }
    }

    /// Grant every listed account. Called at each mutation site for the
    /// handle it stores or returns.
    pub fn allow_all(&mut self, handle: Handle, accounts: &[Address]) {
        for account in accounts {
            self.allow(handle, *account);
        }
    }

    /// Start logging grants for a transaction.
    pub fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    /// Remove every grant made since [`AclManager::begin`].
    pub fn rollback(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for (handle, account) in undo.into_iter().rev() {
            if let Some(set) = self.grants.get_mut(&handle) {
                set.remove(&account);
                if set.is_empty() {
                    self.grants.remove(&handle);
                }
            }
        }
    }

    /// Keep the grants made since [`AclManager::begin`].
    pub fn commit(&mut self) {
        self.undo = None;
    }

    /// Whether any account holds a grant on `handle`.
    pub fn has_grants(&self, handle: Handle) -> bool {
        self.grants.get(&handle).is_some_and(|set| !set.is_empty())
    }

    /// Whether `account` holds a grant on `handle`.
    pub fn is_allowed(&self, handle: Handle, account: Address) -> bool {
        self.grants
            .get(&handle)
            .map(|set| set.contains(&account))
            .unwrap_or(false)
    }

    /// Every account granted on `handle`, in address order.
    pub fn allowed_accounts(&self, handle: Handle) -> Vec<Address> {
        self.grants
            .get(&handle)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Check a set of requirements, returning every absent grant.
    pub fn missing(&self, requirements: &[GrantRequirement]) -> Vec<MissingGrant> {
        let mut out = Vec::new();
        for req in requirements {
            for account in &req.accounts {
                if !self.is_allowed(req.handle, *account) {
                    out.push(MissingGrant {
                        handle: req.handle,
                        account: *account,
                        location: req.location.clone(),
                    });
                }
            }
        }
        out
    }

    /// Number of handles with at least one grant.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether no grants were ever recorded.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handle::CipherType;

    fn handle(byte: u8) -> Handle {
        Handle::tagged([byte; 32], CipherType::Uint64)
    }

    #[test]
    fn test_new_handle_has_no_grants() {
        let acl = AclManager::new();
        assert!(!acl.is_allowed(handle(1), Address::new([1; 20])));
        assert!(acl.allowed_accounts(handle(1)).is_empty());
        assert!(acl.is_empty());
    }

    #[test]
    fn test_grants_are_per_handle() {
        let mut acl = AclManager::new();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);

        acl.allow(handle(1), alice);
        assert!(acl.is_allowed(handle(1), alice));
        assert!(!acl.is_allowed(handle(1), bob));
        assert!(!acl.is_allowed(handle(2), alice));
    }

    #[test]
    fn test_allow_all_is_idempotent() {
        let mut acl = AclManager::new();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);

        acl.allow_all(handle(9), &[alice, bob, alice]);
        acl.allow_all(handle(9), &[bob]);

        assert_eq!(acl.allowed_accounts(handle(9)), vec![alice, bob]);
        assert_eq!(acl.len(), 1);
    }

    #[test]
    fn test_rollback_removes_only_new_grants() {
        let mut acl = AclManager::new();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);
        acl.allow(handle(1), alice);

        acl.begin();
        acl.allow(handle(1), alice);
        acl.allow(handle(1), bob);
        acl.allow_all(handle(2), &[alice, bob]);
        acl.rollback();

        assert_eq!(acl.allowed_accounts(handle(1)), vec![alice]);
        assert!(!acl.has_grants(handle(2)));
        assert_eq!(acl.len(), 1);
    }

    #[test]
    fn test_commit_keeps_grants() {
        let mut acl = AclManager::new();
        let alice = Address::new([1; 20]);

        acl.begin();
        acl.allow(handle(3), alice);
        acl.commit();
        acl.rollback();

        assert!(acl.is_allowed(handle(3), alice));
    }

    #[test]
    fn test_missing_reports_each_absent_account() {
        let mut acl = AclManager::new();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);
        acl.allow(handle(1), alice);

        let reqs = vec![GrantRequirement {
            handle: handle(1),
            accounts: vec![alice, bob],
            location: "balance".into(),
        }];
        let missing = acl.missing(&reqs);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].account, bob);
        assert_eq!(missing[0].location, "balance");
    }
}
