//! Encrypted Token Ledger
//!
//! The single owner of the holder -> balance map and the total-supply cell.
//! Every mutation goes through an operation here, and every handle an
//! operation stores or returns is granted to the ledger and to each entitled
//! holder before the operation returns.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::acl::GrantRequirement;
use crate::core::address::Address;
use crate::core::fhe::{EncryptedInput, FheBackend, FheError};
use crate::core::handle::{Euint64, Handle};
use crate::core::hash::StateHasher;
use crate::host::context::CallContext;
use crate::host::events::EventData;
use crate::host::Host;

use super::config::{LedgerConfig, ShortfallPolicy, WEI_PER_ETH};

/// Operator expiry meaning "until revoked".
pub const OPERATOR_FOREVER: u64 = u64::MAX;

/// Ledger errors. All of them abort the whole transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Owner-only operation called by someone else.
    #[error("{caller} is not the ledger owner")]
    NotOwner {
        /// Rejected caller.
        caller: Address,
    },

    /// Zero address used as a party.
    #[error("zero address is not a valid party")]
    ZeroAddress,

    /// Account balance was never initialized.
    #[error("{0} has no balance")]
    ZeroBalance(Address),

    /// Caller is not an operator for the holder.
    #[error("{spender} is not an operator for {holder}")]
    UnauthorizedSpender {
        /// Holder whose funds were targeted.
        holder: Address,
        /// Rejected spender.
        spender: Address,
    },

    /// Caller tried to move a ciphertext it has no grant on.
    #[error("{caller} may not use ciphertext {handle}")]
    UnauthorizedUseOfEncryptedAmount {
        /// Rejected caller.
        caller: Address,
        /// Handle it tried to move.
        handle: Handle,
    },

    /// Purchase below the minimum.
    #[error("payment of {paid} wei is below the minimum of {minimum} wei")]
    InsufficientPayment {
        /// Value attached.
        paid: u128,
        /// Configured minimum.
        minimum: u128,
    },

    /// Plaintext conversion exceeds 64 bits.
    #[error("token amount overflows 64 bits")]
    AmountOverflow,

    /// Withdrawal larger than the treasury.
    #[error("treasury holds {available} wei, {requested} requested")]
    InsufficientTreasury {
        /// Treasury balance.
        available: u128,
        /// Requested amount.
        requested: u128,
    },

    /// Primitive layer failure (bad proof, unknown handle).
    #[error(transparent)]
    Fhe(#[from] FheError),
}

impl LedgerError {
    /// Stable reason identifier for the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotOwner { .. } => "NotOwner",
            Self::ZeroAddress => "ZeroAddress",
            Self::ZeroBalance(_) => "ZeroBalance",
            Self::UnauthorizedSpender { .. } => "UnauthorizedSpender",
            Self::UnauthorizedUseOfEncryptedAmount { .. } => "UnauthorizedUseOfEncryptedAmount",
            Self::InsufficientPayment { .. } => "InsufficientPayment",
            Self::AmountOverflow => "AmountOverflow",
            Self::InsufficientTreasury { .. } => "InsufficientTreasury",
            Self::Fhe(e) => e.reason(),
        }
    }
}

/// Confidential token ledger.
#[derive(Clone, Debug)]
pub struct ConfidentialLedger {
    address: Address,
    owner: Address,
    config: LedgerConfig,
    balances: BTreeMap<Address, Euint64>,
    total_supply: Option<Euint64>,
    /// (holder, operator) -> last timestamp the delegation is valid.
    operators: BTreeMap<(Address, Address), u64>,
    treasury_wei: u128,
}

impl ConfidentialLedger {
    /// Deploy a ledger at `address` owned by `owner`.
    pub fn new(address: Address, owner: Address, config: LedgerConfig) -> Self {
        Self {
            address,
            owner,
            config,
            balances: BTreeMap::new(),
            total_supply: None,
            operators: BTreeMap::new(),
            treasury_wei: 0,
        }
    }

    /// Ledger contract identity.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current balance handle. `None` if the account was never credited.
    ///
    /// Grants nothing; the holder already has access to its own balance.
    pub fn balance_of(&self, holder: &Address) -> Option<Euint64> {
        self.balances.get(holder).copied()
    }

    /// Total supply handle, readable by the ledger only.
    pub fn total_supply(&self) -> Option<Euint64> {
        self.total_supply
    }

    /// Native value held from purchases, in wei.
    pub fn treasury_wei(&self) -> u128 {
        self.treasury_wei
    }

    /// Holders with an initialized balance, in address order.
    pub fn holders(&self) -> impl Iterator<Item = &Address> {
        self.balances.keys()
    }

    /// Whether `spender` may move `holder`'s funds at time `now`.
    ///
    /// A holder is always its own operator.
    pub fn is_operator(&self, holder: &Address, spender: &Address, now: u64) -> bool {
        if holder == spender {
            return true;
        }
        self.operators
            .get(&(*holder, *spender))
            .map(|until| now <= *until)
            .unwrap_or(false)
    }

    /// Stored expiry for a delegation, if one was ever set.
    pub fn operator_expiry(&self, holder: &Address, spender: &Address) -> Option<u64> {
        self.operators.get(&(*holder, *spender)).copied()
    }

    // =========================================================================
    // SUPPLY
    // =========================================================================

    /// Owner-only mint of a plaintext amount.
    pub fn mint<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        to: Address,
        amount: u64,
    ) -> Result<Euint64, LedgerError> {
        self.require_owner(ctx)?;
        let amount = host.backend.trivial_u64(amount);
        self.mint_encrypted(host, ctx, to, amount)
    }

    /// Convert attached native value into tokens for the caller.
    ///
    /// Returns the number of units minted.
    pub fn buy_tokens<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
    ) -> Result<u64, LedgerError> {
        if ctx.value < self.config.min_purchase_wei {
            warn!(buyer = ?ctx.caller, paid = ctx.value, "purchase below minimum");
            return Err(LedgerError::InsufficientPayment {
                paid: ctx.value,
                minimum: self.config.min_purchase_wei,
            });
        }

        let units = ctx
            .value
            .checked_mul(self.config.units_per_eth as u128)
            .ok_or(LedgerError::AmountOverflow)?
            / WEI_PER_ETH;
        let units = u64::try_from(units).map_err(|_| LedgerError::AmountOverflow)?;
        let treasury = self
            .treasury_wei
            .checked_add(ctx.value)
            .ok_or(LedgerError::AmountOverflow)?;

        let amount = host.backend.trivial_u64(units);
        self.mint_encrypted(host, ctx, ctx.caller, amount)?;
        self.treasury_wei = treasury;

        host.emit(
            ctx.timestamp,
            self.address,
            EventData::TokensPurchased { buyer: ctx.caller, paid_wei: ctx.value, units },
        );
        info!(buyer = ?ctx.caller, units, "tokens purchased");
        Ok(units)
    }

    /// Credit `amount` to `to` and to the supply.
    ///
    /// If the supply would wrap, the minted amount becomes zero.
    fn mint_encrypted<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        to: Address,
        amount: Euint64,
    ) -> Result<Euint64, LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let supply = self.supply_or_zero(host);
        let candidate = host.backend.add(supply, amount)?;
        let no_wrap = host.backend.ge(candidate, supply)?;
        let zero = host.backend.trivial_u64(0);
        let minted = host.backend.select(no_wrap, amount, zero)?;

        let new_supply = host.backend.add(supply, minted)?;
        self.set_total_supply(host, new_supply);

        let balance = self.balance_or_zero(host, &to);
        let new_balance = host.backend.add(balance, minted)?;
        self.set_balance(host, to, new_balance);

        host.acl.allow_all(minted.handle(), &[self.address, to]);
        host.emit(ctx.timestamp, self.address, EventData::Minted { to, amount: minted });
        info!(?to, minted = ?minted.handle(), "mint");
        Ok(minted)
    }

    /// Burn up to `amount` from `from`, clamped to the available balance.
    ///
    /// Caller must be `from` or one of its operators.
    pub fn burn<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        from: Address,
        amount: u64,
    ) -> Result<Euint64, LedgerError> {
        self.require_operator(&from, ctx)?;
        let balance = self
            .balances
            .get(&from)
            .copied()
            .ok_or(LedgerError::ZeroBalance(from))?;

        let requested = host.backend.trivial_u64(amount);
        let has_enough = host.backend.ge(balance, requested)?;
        let burned = host.backend.select(has_enough, requested, balance)?;

        let new_balance = host.backend.sub(balance, burned)?;
        self.set_balance(host, from, new_balance);

        let supply = self.supply_or_zero(host);
        let new_supply = host.backend.sub(supply, burned)?;
        self.set_total_supply(host, new_supply);

        host.acl.allow_all(burned.handle(), &[self.address, from, ctx.caller]);
        host.emit(ctx.timestamp, self.address, EventData::Burned { from, amount: burned });
        info!(?from, burned = ?burned.handle(), "burn");
        Ok(burned)
    }

    // =========================================================================
    // TRANSFERS
    // =========================================================================

    /// Move an encrypted client input from the caller to `to`.
    pub fn transfer<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        to: Address,
        input: &EncryptedInput,
    ) -> Result<Euint64, LedgerError> {
        let amount = host.backend.verify_input(input, self.address, ctx.caller)?;
        self.move_balance(host, ctx, ctx.caller, to, amount)
    }

    /// Move an already-imported ciphertext from the caller to `to`.
    pub fn transfer_handle<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        to: Address,
        amount: Euint64,
    ) -> Result<Euint64, LedgerError> {
        self.require_use(host, ctx, amount)?;
        self.move_balance(host, ctx, ctx.caller, to, amount)
    }

    /// Operator transfer of a ciphertext the caller holds a grant on.
    pub fn transfer_from<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        from: Address,
        to: Address,
        amount: Euint64,
    ) -> Result<Euint64, LedgerError> {
        self.require_operator(&from, ctx)?;
        self.require_use(host, ctx, amount)?;
        self.move_balance(host, ctx, from, to, amount)
    }

    /// Operator transfer of an encrypted client input.
    pub fn transfer_from_input<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        from: Address,
        to: Address,
        input: &EncryptedInput,
    ) -> Result<Euint64, LedgerError> {
        self.require_operator(&from, ctx)?;
        let amount = host.backend.verify_input(input, self.address, ctx.caller)?;
        self.move_balance(host, ctx, from, to, amount)
    }

    /// Safe subtraction/addition pair. Returns the amount that actually moved,
    /// granted to the ledger, both parties and the caller.
    fn move_balance<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        from: Address,
        to: Address,
        amount: Euint64,
    ) -> Result<Euint64, LedgerError> {
        if from.is_zero() || to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let from_balance = self.balance_or_zero(host, &from);
        let has_enough = host.backend.ge(from_balance, amount)?;
        let fallback = match self.config.shortfall {
            ShortfallPolicy::TransferZero => host.backend.trivial_u64(0),
            ShortfallPolicy::ClampToBalance => from_balance,
        };
        let transferred = host.backend.select(has_enough, amount, fallback)?;

        let new_from = host.backend.sub(from_balance, transferred)?;
        self.set_balance(host, from, new_from);

        // Read after the debit so a self-transfer nets to zero
        let to_balance = self.balance_or_zero(host, &to);
        let new_to = host.backend.add(to_balance, transferred)?;
        self.set_balance(host, to, new_to);

        host.acl
            .allow_all(transferred.handle(), &[self.address, from, to, ctx.caller]);
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::Transfer { from, to, amount: transferred },
        );
        debug!(?from, ?to, transferred = ?transferred.handle(), "transfer");
        Ok(transferred)
    }

    // =========================================================================
    // DELEGATION & ADMIN
    // =========================================================================

    /// Let `operator` move the caller's funds until `until` (inclusive).
    ///
    /// `0` revokes; [`OPERATOR_FOREVER`] never lapses.
    pub fn set_operator<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        operator: Address,
        until: u64,
    ) -> Result<(), LedgerError> {
        if operator.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.operators.insert((ctx.caller, operator), until);
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::OperatorSet { holder: ctx.caller, operator, until },
        );
        info!(holder = ?ctx.caller, ?operator, until, "operator set");
        Ok(())
    }

    /// Owner-only withdrawal of purchase proceeds.
    pub fn withdraw<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        to: Address,
        amount_wei: u128,
    ) -> Result<(), LedgerError> {
        self.require_owner(ctx)?;
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        if amount_wei > self.treasury_wei {
            return Err(LedgerError::InsufficientTreasury {
                available: self.treasury_wei,
                requested: amount_wei,
            });
        }
        self.treasury_wei -= amount_wei;
        host.emit(ctx.timestamp, self.address, EventData::Withdrawn { to, amount_wei });
        info!(?to, amount_wei, "treasury withdrawal");
        Ok(())
    }

    /// Hand the ledger to a new owner.
    pub fn transfer_ownership<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        new_owner: Address,
    ) -> Result<(), LedgerError> {
        self.require_owner(ctx)?;
        if new_owner.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::OwnershipTransferred { previous, new_owner },
        );
        info!(?previous, ?new_owner, "ledger ownership transferred");
        Ok(())
    }

    // =========================================================================
    // AUDIT
    // =========================================================================

    /// Grants every stored handle must carry.
    pub fn required_grants(&self) -> Vec<GrantRequirement> {
        let mut reqs: Vec<GrantRequirement> = self
            .balances
            .iter()
            .map(|(holder, balance)| GrantRequirement {
                handle: balance.handle(),
                accounts: vec![self.address, *holder],
                location: format!("ledger.balance[{}]", holder),
            })
            .collect();
        if let Some(supply) = self.total_supply {
            reqs.push(GrantRequirement {
                handle: supply.handle(),
                accounts: vec![self.address],
                location: "ledger.total_supply".into(),
            });
        }
        reqs
    }

    /// Feed committed state into a state hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_address(&self.address);
        hasher.update_address(&self.owner);
        hasher.update_u64(self.balances.len() as u64);
        for (holder, balance) in &self.balances {
            hasher.update_address(holder);
            hasher.update_handle(&balance.handle());
        }
        hasher.update_opt_handle(self.total_supply.map(|s| s.handle()).as_ref());
        hasher.update_u64(self.operators.len() as u64);
        for ((holder, operator), until) in &self.operators {
            hasher.update_address(holder);
            hasher.update_address(operator);
            hasher.update_u64(*until);
        }
        hasher.update_u128(self.treasury_wei);
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn require_owner(&self, ctx: &CallContext) -> Result<(), LedgerError> {
        if ctx.caller != self.owner {
            warn!(caller = ?ctx.caller, "ledger owner check failed");
            return Err(LedgerError::NotOwner { caller: ctx.caller });
        }
        Ok(())
    }

    fn require_operator(&self, holder: &Address, ctx: &CallContext) -> Result<(), LedgerError> {
        if !self.is_operator(holder, &ctx.caller, ctx.timestamp) {
            warn!(?holder, spender = ?ctx.caller, "operator check failed");
            return Err(LedgerError::UnauthorizedSpender { holder: *holder, spender: ctx.caller });
        }
        Ok(())
    }

    fn require_use<B>(&self, host: &Host<B>, ctx: &CallContext, amount: Euint64) -> Result<(), LedgerError> {
        if !host.acl.is_allowed(amount.handle(), ctx.caller) {
            warn!(caller = ?ctx.caller, handle = ?amount.handle(), "ciphertext use denied");
            return Err(LedgerError::UnauthorizedUseOfEncryptedAmount {
                caller: ctx.caller,
                handle: amount.handle(),
            });
        }
        Ok(())
    }

    fn balance_or_zero<B: FheBackend>(&self, host: &mut Host<B>, holder: &Address) -> Euint64 {
        match self.balances.get(holder) {
            Some(balance) => *balance,
            None => host.backend.trivial_u64(0),
        }
    }

    fn supply_or_zero<B: FheBackend>(&self, host: &mut Host<B>) -> Euint64 {
        match self.total_supply {
            Some(supply) => supply,
            None => host.backend.trivial_u64(0),
        }
    }

    fn set_balance<B>(&mut self, host: &mut Host<B>, holder: Address, balance: Euint64) {
        host.acl.allow_all(balance.handle(), &[self.address, holder]);
        self.balances.insert(holder, balance);
    }

    fn set_total_supply<B>(&mut self, host: &mut Host<B>, supply: Euint64) {
        host.acl.allow(supply.handle(), self.address);
        self.total_supply = Some(supply);
    }
}

// =============================================================================
// TESTS
// =============================================================================
