//! Transaction Runtime
//!
//! The single serialized log every state change goes through. A transaction
//! runs inside a host scope plus a snapshot of the ledger and wheel; if any
//! step fails the scope is rolled back and the snapshot restored, so no
//! partial effect of an aborted call survives. Both outcomes are journaled in
//! submission order.
//!
//! Contract addresses never sign transactions: a call submitted as the ledger
//! or the wheel is rejected before it runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::acl::{GrantRequirement, MissingGrant};
use crate::core::address::Address;
use crate::core::clear::{ClearBackend, DEFAULT_MAX_PENDING_INPUTS};
use crate::core::fhe::{EncryptedInput, FheBackend, FheError};
use crate::core::handle::{Euint64, Handle};
use crate::core::hash::{StateHash, StateHasher};
use crate::game::spin::{BetAmount, BetInput, SpinResult};
use crate::game::wheel::{WheelConfig, WheelError, WheelGame, WheelMode};
use crate::ledger::{ConfidentialLedger, LedgerConfig, LedgerError, ShortfallPolicy};

use super::context::{CallContext, Clock};
use super::events::Event;
use super::journal::{JournalEntry, TransactionJournal, TxStatus};
use super::Host;

/// Label the ledger address derives from.
pub const LEDGER_LABEL: &[u8] = b"confidential-ledger";

/// Label the wheel address derives from.
pub const WHEEL_LABEL: &[u8] = b"prize-wheel";

// =============================================================================
// CONFIG
// =============================================================================

/// Runtime configuration.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Ledger parameters.
    pub ledger: LedgerConfig,
    /// Wheel parameters.
    pub wheel: WheelConfig,
    /// Owner of both contracts.
    pub owner: Address,
    /// Seed for the reference backend. `None` draws fresh entropy.
    pub rng_seed: Option<u64>,
    /// Tokens minted to the house wallet at startup.
    pub house_bankroll: u64,
    /// Issued inputs the reference backend holds before evicting the oldest.
    pub max_pending_inputs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            wheel: WheelConfig::default(),
            owner: Address::derive(b"operator"),
            rng_seed: None,
            house_bankroll: 0,
            max_pending_inputs: DEFAULT_MAX_PENDING_INPUTS,
        }
    }
}

impl RuntimeConfig {
    /// Create config from environment variables. Unparseable values fall
    /// back to defaults with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.rng_seed = env_parse("WHEEL_RNG_SEED");
        if let Some(mode) = env_parse::<WheelMode>("WHEEL_MODE") {
            config.wheel.mode = mode;
        }
        if let Some(policy) = env_parse::<ShortfallPolicy>("WHEEL_SHORTFALL") {
            config.ledger.shortfall = policy;
        }
        if let Some(bankroll) = env_parse("WHEEL_HOUSE_BANKROLL") {
            config.house_bankroll = bankroll;
        }
        if let Some(limit) = env_parse("WHEEL_MAX_PENDING_INPUTS") {
            config.max_pending_inputs = limit;
        }
        if let Some(owner) = std::env::var("WHEEL_OWNER").ok().and_then(|v| Address::from_hex(&v)) {
            config.owner = owner;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// A state-changing call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    /// Owner mint of a public amount.
    Mint {
        /// Recipient.
        to: Address,
        /// Token units.
        amount: u64,
    },
    /// Convert the attached value into tokens.
    BuyTokens,
    /// Transfer a client-encrypted amount.
    Transfer {
        /// Recipient.
        to: Address,
        /// Ciphertext bound to the ledger and the caller.
        amount: EncryptedInput,
    },
    /// Transfer a ciphertext the caller already holds a grant on.
    TransferHandle {
        /// Recipient.
        to: Address,
        /// Amount handle.
        amount: Euint64,
    },
    /// Operator transfer of a client-encrypted amount.
    TransferFrom {
        /// Holder.
        from: Address,
        /// Recipient.
        to: Address,
        /// Ciphertext bound to the ledger and the caller.
        amount: EncryptedInput,
    },
    /// Operator transfer of a granted ciphertext.
    TransferFromHandle {
        /// Holder.
        from: Address,
        /// Recipient.
        to: Address,
        /// Amount handle.
        amount: Euint64,
    },
    /// Burn up to `amount` from `from`.
    Burn {
        /// Holder.
        from: Address,
        /// Token units.
        amount: u64,
    },
    /// Delegate to an operator until a timestamp.
    SetOperator {
        /// Delegate.
        operator: Address,
        /// Last valid timestamp (0 revokes).
        until: u64,
    },
    /// Owner withdrawal from the ledger treasury.
    Withdraw {
        /// Recipient.
        to: Address,
        /// Amount in wei.
        #[serde(with = "super::u128_str")]
        amount_wei: u128,
    },
    /// Hand the ledger to a new owner.
    TransferLedgerOwnership {
        /// New owner.
        new_owner: Address,
    },
    /// Place a wager.
    Spin {
        /// Bet in the wheel's mode.
        bet: BetInput,
    },
    /// Open the pending segment (reveal mode).
    RevealSegment {
        /// Self-decrypted segment index.
        segment: u8,
    },
    /// Settle the pending wager.
    ClaimPrize,
    /// Change bet bounds.
    SetBetLimits {
        /// Lower bound.
        min_bet: u64,
        /// Upper bound.
        max_bet: u64,
    },
    /// Change one multiplier.
    SetMultiplier {
        /// Segment index.
        segment: u8,
        /// Fixed-point multiplier.
        multiplier: u64,
    },
    /// Change the payout source.
    SetHouseWallet {
        /// New wallet.
        wallet: Address,
    },
    /// Hand the wheel to a new owner.
    TransferWheelOwnership {
        /// New owner.
        new_owner: Address,
    },
}

impl Transaction {
    /// Short kind label for logs and the journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::BuyTokens => "buy_tokens",
            Self::Transfer { .. } => "transfer",
            Self::TransferHandle { .. } => "transfer_handle",
            Self::TransferFrom { .. } => "transfer_from",
            Self::TransferFromHandle { .. } => "transfer_from_handle",
            Self::Burn { .. } => "burn",
            Self::SetOperator { .. } => "set_operator",
            Self::Withdraw { .. } => "withdraw",
            Self::TransferLedgerOwnership { .. } => "transfer_ledger_ownership",
            Self::Spin { .. } => "spin",
            Self::RevealSegment { .. } => "reveal_segment",
            Self::ClaimPrize => "claim_prize",
            Self::SetBetLimits { .. } => "set_bet_limits",
            Self::SetMultiplier { .. } => "set_multiplier",
            Self::SetHouseWallet { .. } => "set_house_wallet",
            Self::TransferWheelOwnership { .. } => "transfer_wheel_ownership",
        }
    }

    /// Whether native value may be attached.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::BuyTokens)
    }
}

/// Operation-specific result of a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxOutput {
    /// Nothing beyond events.
    None,
    /// Minted amount handle.
    Minted {
        /// Amount actually minted.
        amount: Euint64,
    },
    /// Units bought.
    Purchased {
        /// Token units credited.
        units: u64,
    },
    /// Transferred amount handle.
    Transferred {
        /// Amount that actually moved.
        amount: Euint64,
    },
    /// Burned amount handle.
    Burned {
        /// Amount actually burned.
        amount: Euint64,
    },
    /// Spin view.
    Spun {
        /// Record after the spin.
        result: SpinResult,
    },
    /// Claim result.
    Claimed {
        /// Amount credited, if anything was due.
        amount: Option<Euint64>,
    },
}

/// Proof of a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction identifier.
    pub tx_id: Uuid,
    /// Journal position.
    pub index: u64,
    /// Transaction kind.
    pub kind: String,
    /// Submitting account.
    pub caller: Address,
    /// Block time used.
    pub timestamp: u64,
    /// Operation result.
    pub output: TxOutput,
    /// Events emitted, in order.
    pub events: Vec<Event>,
    /// Post-state hash (hex).
    pub state_hash: String,
}

impl Receipt {
    /// Grants every handle in the output and the events must carry.
    pub fn required_grants(&self, ledger: Address, wheel: Address) -> Vec<GrantRequirement> {
        let mut reqs = Vec::new();
        let mut push = |handle: Handle, accounts: Vec<Address>, field: &str| {
            reqs.push(GrantRequirement {
                handle,
                accounts,
                location: format!("receipt[{}].{}", self.index, field),
            });
        };
        match &self.output {
            TxOutput::Minted { amount } => push(amount.handle(), vec![ledger], "minted"),
            TxOutput::Transferred { amount } => {
                push(amount.handle(), vec![ledger, self.caller], "transferred")
            }
            TxOutput::Burned { amount } => push(amount.handle(), vec![ledger, self.caller], "burned"),
            TxOutput::Spun { result } => {
                let entitled = vec![wheel, self.caller];
                push(result.segment.handle(), entitled.clone(), "segment");
                if let BetAmount::Encrypted { handle } = result.bet {
                    push(handle.handle(), entitled.clone(), "bet");
                }
                if let Some(winnings) = result.winnings {
                    push(winnings.handle(), entitled, "winnings");
                }
            }
            TxOutput::Claimed { amount: Some(amount) } => {
                push(amount.handle(), vec![wheel, self.caller], "claimed")
            }
            TxOutput::None | TxOutput::Purchased { .. } | TxOutput::Claimed { amount: None } => {}
        }
        for (i, event) in self.events.iter().enumerate() {
            for req in event.required_grants() {
                reqs.push(GrantRequirement {
                    location: format!("receipt[{}].events[{}].{}", self.index, i, req.location),
                    ..req
                });
            }
        }
        reqs
    }
}

/// Runtime errors. Every variant means the transaction was reverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A contract address submitted a transaction.
    #[error("contract address {caller} cannot submit transactions")]
    ReservedCaller {
        /// Submitting address.
        caller: Address,
    },

    /// Native value attached to a non-payable call.
    #[error("{kind} does not accept native value")]
    NonPayable {
        /// Transaction kind.
        kind: &'static str,
    },

    /// Ledger rejection.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Wheel rejection.
    #[error(transparent)]
    Wheel(#[from] WheelError),

    /// Primitive layer failure.
    #[error(transparent)]
    Fhe(#[from] FheError),
}

impl RuntimeError {
    /// Stable reason identifier for the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ReservedCaller { .. } => "ReservedCaller",
            Self::NonPayable { .. } => "NonPayable",
            Self::Ledger(e) => e.reason(),
            Self::Wheel(e) => e.reason(),
            Self::Fhe(e) => e.reason(),
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Read-only call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Balance handle of a holder.
    BalanceOf {
        /// Holder.
        holder: Address,
    },
    /// Total supply handle.
    TotalSupply,
    /// Operator check at the current time.
    IsOperator {
        /// Holder.
        holder: Address,
        /// Candidate operator.
        spender: Address,
    },
    /// Latest spin of a player.
    SpinResult {
        /// Player.
        player: Address,
    },
    /// Latest clamped bet of a player.
    LastBet {
        /// Player.
        player: Address,
    },
    /// Whether a player has an outstanding wager.
    HasPendingSpin {
        /// Player.
        player: Address,
    },
    /// Ledger identity and parameters.
    LedgerInfo,
    /// Wheel identity and parameters.
    WheelInfo,
    /// Journal slice.
    Journal {
        /// First index.
        from: u64,
        /// Maximum number of entries.
        limit: u64,
    },
    /// Current state hash.
    StateHash,
}

/// Query answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    /// Balance handle (`None` if never credited).
    Balance {
        /// Handle.
        handle: Option<Euint64>,
    },
    /// Total supply handle.
    TotalSupply {
        /// Handle.
        handle: Option<Euint64>,
    },
    /// Operator check result.
    IsOperator {
        /// Whether the spender may act now.
        allowed: bool,
    },
    /// Spin view.
    SpinResult {
        /// View, if the player ever spun.
        result: Option<SpinResult>,
    },
    /// Last bet.
    LastBet {
        /// Bet, if the player ever spun.
        bet: Option<BetAmount>,
    },
    /// Pending flag.
    HasPendingSpin {
        /// Whether a wager is outstanding.
        pending: bool,
    },
    /// Ledger info.
    LedgerInfo {
        /// Contract address.
        address: Address,
        /// Owner.
        owner: Address,
        /// Treasury in wei.
        #[serde(with = "super::u128_str")]
        treasury_wei: u128,
        /// Conversion rate.
        units_per_eth: u64,
        /// Minimum purchase in wei.
        #[serde(with = "super::u128_str")]
        min_purchase_wei: u128,
    },
    /// Wheel info.
    WheelInfo {
        /// Contract address.
        address: Address,
        /// Owner.
        owner: Address,
        /// Settlement mode.
        mode: WheelMode,
        /// Payout source.
        house_wallet: Address,
        /// Lower bet bound.
        min_bet: u64,
        /// Upper bet bound.
        max_bet: u64,
        /// Segment thresholds.
        thresholds: Vec<u8>,
        /// Segment multipliers.
        multipliers: Vec<u64>,
    },
    /// Journal slice.
    Journal {
        /// Entries in order.
        entries: Vec<JournalEntry>,
    },
    /// State hash (hex).
    StateHash {
        /// Hex digest.
        hash: String,
    },
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Serialized executor for one ledger and one wheel.
pub struct Runtime<B> {
    host: Host<B>,
    ledger: ConfidentialLedger,
    wheel: WheelGame,
    journal: TransactionJournal,
    clock: Arc<dyn Clock>,
}

impl<B: FheBackend> Runtime<B> {
    /// Deploy both contracts and mint the house bankroll.
    pub fn new(backend: B, config: RuntimeConfig, clock: Arc<dyn Clock>) -> Result<Self, RuntimeError> {
        let ledger = ConfidentialLedger::new(Address::derive(LEDGER_LABEL), config.owner, config.ledger);
        let wheel = WheelGame::new(Address::derive(WHEEL_LABEL), config.owner, config.wheel)?;
        info!(
            ledger = %ledger.address(),
            wheel = %wheel.address(),
            mode = %wheel.mode(),
            "contracts deployed"
        );

        let mut runtime = Self {
            host: Host::new(backend),
            ledger,
            wheel,
            journal: TransactionJournal::new(),
            clock,
        };
        if config.house_bankroll > 0 {
            let house = runtime.wheel.house_wallet();
            runtime.execute(
                config.owner,
                0,
                Transaction::Mint { to: house, amount: config.house_bankroll },
            )?;
        }
        Ok(runtime)
    }

    /// Apply one transaction atomically.
    ///
    /// On error every effect is discarded and the revert is journaled.
    pub fn execute(
        &mut self,
        caller: Address,
        value: u128,
        tx: Transaction,
    ) -> Result<Receipt, RuntimeError> {
        let tx_id = Uuid::new_v4();
        let ctx = CallContext::new(caller, self.clock.now()).with_value(value);
        let kind = tx.kind();

        let checkpoint = self.host.begin();
        let snapshot = (self.ledger.clone(), self.wheel.clone());
        match self.apply(&ctx, &tx) {
            Ok(output) => {
                let events = self.host.commit();
                let state_hash = self.state_hash();
                let entry = self.journal.append(
                    tx_id,
                    caller,
                    kind,
                    TxStatus::Committed,
                    ctx.timestamp,
                    state_hash,
                );
                info!(%tx_id, index = entry.index, kind, ?caller, "transaction committed");
                Ok(Receipt {
                    tx_id,
                    index: entry.index,
                    kind: kind.to_string(),
                    caller,
                    timestamp: ctx.timestamp,
                    output,
                    events,
                    state_hash: hex::encode(state_hash),
                })
            }
            Err(err) => {
                self.host.rollback(checkpoint);
                (self.ledger, self.wheel) = snapshot;
                let state_hash = self.state_hash();
                self.journal.append(
                    tx_id,
                    caller,
                    kind,
                    TxStatus::Reverted { reason: err.reason().to_string() },
                    ctx.timestamp,
                    state_hash,
                );
                warn!(%tx_id, kind, ?caller, reason = err.reason(), "transaction reverted");
                Err(err)
            }
        }
    }

    fn apply(&mut self, ctx: &CallContext, tx: &Transaction) -> Result<TxOutput, RuntimeError> {
        if self.reserved_addresses().contains(&ctx.caller) {
            return Err(RuntimeError::ReservedCaller { caller: ctx.caller });
        }
        if ctx.value > 0 && !tx.is_payable() {
            return Err(RuntimeError::NonPayable { kind: tx.kind() });
        }
        debug!(kind = tx.kind(), caller = ?ctx.caller, "applying transaction");

        let host = &mut self.host;
        let ledger = &mut self.ledger;
        let wheel = &mut self.wheel;
        let output = match tx {
            Transaction::Mint { to, amount } => TxOutput::Minted {
                amount: ledger.mint(host, ctx, *to, *amount)?,
            },
            Transaction::BuyTokens => TxOutput::Purchased {
                units: ledger.buy_tokens(host, ctx)?,
            },
            Transaction::Transfer { to, amount } => TxOutput::Transferred {
                amount: ledger.transfer(host, ctx, *to, amount)?,
            },
            Transaction::TransferHandle { to, amount } => TxOutput::Transferred {
                amount: ledger.transfer_handle(host, ctx, *to, *amount)?,
            },
            Transaction::TransferFrom { from, to, amount } => TxOutput::Transferred {
                amount: ledger.transfer_from_input(host, ctx, *from, *to, amount)?,
            },
            Transaction::TransferFromHandle { from, to, amount } => TxOutput::Transferred {
                amount: ledger.transfer_from(host, ctx, *from, *to, *amount)?,
            },
            Transaction::Burn { from, amount } => TxOutput::Burned {
                amount: ledger.burn(host, ctx, *from, *amount)?,
            },
            Transaction::SetOperator { operator, until } => {
                ledger.set_operator(host, ctx, *operator, *until)?;
                TxOutput::None
            }
            Transaction::Withdraw { to, amount_wei } => {
                ledger.withdraw(host, ctx, *to, *amount_wei)?;
                TxOutput::None
            }
            Transaction::TransferLedgerOwnership { new_owner } => {
                ledger.transfer_ownership(host, ctx, *new_owner)?;
                TxOutput::None
            }
            Transaction::Spin { bet } => TxOutput::Spun {
                result: wheel.spin(host, ledger, ctx, bet)?,
            },
            Transaction::RevealSegment { segment } => {
                wheel.reveal_segment(host, ctx, *segment)?;
                TxOutput::None
            }
            Transaction::ClaimPrize => TxOutput::Claimed {
                amount: wheel.claim_prize(host, ledger, ctx)?,
            },
            Transaction::SetBetLimits { min_bet, max_bet } => {
                wheel.set_bet_limits(host, ctx, *min_bet, *max_bet)?;
                TxOutput::None
            }
            Transaction::SetMultiplier { segment, multiplier } => {
                wheel.set_multiplier(host, ctx, *segment, *multiplier)?;
                TxOutput::None
            }
            Transaction::SetHouseWallet { wallet } => {
                wheel.set_house_wallet(host, ctx, *wallet)?;
                TxOutput::None
            }
            Transaction::TransferWheelOwnership { new_owner } => {
                wheel.transfer_ownership(host, ctx, *new_owner)?;
                TxOutput::None
            }
        };
        Ok(output)
    }
}

impl<B> Runtime<B> {
    /// Answer a read-only query.
    pub fn query(&self, query: &Query) -> QueryResult {
        match query {
            Query::BalanceOf { holder } => QueryResult::Balance {
                handle: self.ledger.balance_of(holder),
            },
            Query::TotalSupply => QueryResult::TotalSupply {
                handle: self.ledger.total_supply(),
            },
            Query::IsOperator { holder, spender } => QueryResult::IsOperator {
                allowed: self.ledger.is_operator(holder, spender, self.clock.now()),
            },
            Query::SpinResult { player } => QueryResult::SpinResult {
                result: self.wheel.get_spin_result(player),
            },
            Query::LastBet { player } => QueryResult::LastBet {
                bet: self.wheel.get_last_bet(player),
            },
            Query::HasPendingSpin { player } => QueryResult::HasPendingSpin {
                pending: self.wheel.has_pending_spin(player),
            },
            Query::LedgerInfo => QueryResult::LedgerInfo {
                address: self.ledger.address(),
                owner: self.ledger.owner(),
                treasury_wei: self.ledger.treasury_wei(),
                units_per_eth: self.ledger.config().units_per_eth,
                min_purchase_wei: self.ledger.config().min_purchase_wei,
            },
            Query::WheelInfo => {
                let (min_bet, max_bet) = self.wheel.bet_limits();
                QueryResult::WheelInfo {
                    address: self.wheel.address(),
                    owner: self.wheel.owner(),
                    mode: self.wheel.mode(),
                    house_wallet: self.wheel.house_wallet(),
                    min_bet,
                    max_bet,
                    thresholds: self.wheel.prizes().thresholds().to_vec(),
                    multipliers: self.wheel.prizes().multipliers().to_vec(),
                }
            }
            Query::Journal { from, limit } => QueryResult::Journal {
                entries: self
                    .journal
                    .entries()
                    .iter()
                    .skip(*from as usize)
                    .take(*limit as usize)
                    .cloned()
                    .collect(),
            },
            Query::StateHash => QueryResult::StateHash {
                hash: hex::encode(self.state_hash()),
            },
        }
    }

    /// Every grant a stored handle should carry but does not.
    ///
    /// Empty after every committed transaction.
    pub fn audit_grants(&self) -> Vec<MissingGrant> {
        let mut requirements = self.ledger.required_grants();
        requirements.extend(self.wheel.required_grants());
        self.host.acl.missing(&requirements)
    }

    /// Every grant a handle in `receipt` should carry but does not.
    pub fn audit_receipt(&self, receipt: &Receipt) -> Vec<MissingGrant> {
        let requirements = receipt.required_grants(self.ledger.address(), self.wheel.address());
        self.host.acl.missing(&requirements)
    }

    /// Contract addresses, which may never appear as a transaction caller.
    pub fn reserved_addresses(&self) -> [Address; 2] {
        [self.ledger.address(), self.wheel.address()]
    }

    /// Hash of committed contract state.
    pub fn state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_runtime_state();
        self.ledger.hash_into(&mut hasher);
        self.wheel.hash_into(&mut hasher);
        hasher.finalize()
    }

    /// Whether `account` holds a grant on `handle`.
    pub fn is_allowed(&self, handle: Handle, account: Address) -> bool {
        self.host.acl.is_allowed(handle, account)
    }

    /// Current block time.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Host (backend, ACL, pending events).
    pub fn host(&self) -> &Host<B> {
        &self.host
    }

    /// Ledger contract.
    pub fn ledger(&self) -> &ConfidentialLedger {
        &self.ledger
    }

    /// Wheel contract.
    pub fn wheel(&self) -> &WheelGame {
        &self.wheel
    }

    /// Transaction log.
    pub fn journal(&self) -> &TransactionJournal {
        &self.journal
    }
}

impl Runtime<ClearBackend> {
    /// Runtime over the reference backend, seeded from config or fresh entropy.
    pub fn with_clear_backend(config: RuntimeConfig, clock: Arc<dyn Clock>) -> Result<Self, RuntimeError> {
        let backend = match config.rng_seed {
            Some(seed) => ClearBackend::new(seed),
            None => {
                let mut entropy = [0u8; 32];
                entropy[..16].copy_from_slice(Uuid::new_v4().as_bytes());
                entropy[16..].copy_from_slice(Uuid::new_v4().as_bytes());
                ClearBackend::from_entropy(&entropy)
            }
        };
        Self::new(backend.with_input_limit(config.max_pending_inputs), config, clock)
    }

    /// Client-side encryption of `value` for submission to `contract`.
    ///
    /// Does not touch contract state and is not journaled.
    pub fn encrypt_input(&mut self, contract: Address, submitter: Address, value: u64) -> EncryptedInput {
        self.host.backend.encrypt_input(contract, submitter, value)
    }

    /// Key-service decryption; requires a grant for `requester`.
    pub fn decrypt(&self, handle: Handle, requester: Address) -> Result<u64, FheError> {
        self.host.backend.decrypt(&self.host.acl, handle, requester)
    }
}

// =============================================================================
// TESTS
// =============================================================================
