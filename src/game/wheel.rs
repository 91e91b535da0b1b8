//! Wheel Game
//!
//! The spin / reveal / claim state machine. Each player holds at most one
//! outstanding wager:
//!
//! ```text
//! Idle --spin--> Pending --claim--> Idle                 (encrypted mode)
//! Idle --spin--> Pending --reveal--> Revealed --claim--> Idle   (reveal mode)
//! ```
//!
//! Bets and prizes move through [`ConfidentialLedger::transfer_from`] with the
//! wheel as the calling contract, so players must approve the wheel as an
//! operator before their first spin.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::acl::GrantRequirement;
use crate::core::address::Address;
use crate::core::fhe::{FheBackend, FheError};
use crate::core::handle::Euint64;
use crate::core::hash::StateHasher;
use crate::host::context::CallContext;
use crate::host::events::EventData;
use crate::host::Host;
use crate::ledger::{ConfidentialLedger, LedgerError};

use super::outcome::{calculate_winnings, clamp_bet, clamp_plain_bet, derive_segment};
use super::prize::{PrizeTable, SEGMENT_COUNT};
use super::spin::{BetAmount, BetInput, SpinRecord, SpinResult};

/// Default minimum bet (1 token at 6 decimals).
pub const DEFAULT_MIN_BET: u64 = 1_000_000;

/// Default maximum bet (100 tokens).
pub const DEFAULT_MAX_BET: u64 = 100_000_000;

// =============================================================================
// MODE
// =============================================================================

/// Which settlement design a wheel instance runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelMode {
    /// Encrypted bet, encrypted segment, encrypted winnings computed at spin.
    #[default]
    Encrypted,
    /// Plaintext bet, encrypted segment opened by the player, plaintext payout.
    Reveal,
}

impl fmt::Display for WheelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypted => write!(f, "encrypted"),
            Self::Reveal => write!(f, "reveal"),
        }
    }
}

impl FromStr for WheelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "encrypted" => Ok(Self::Encrypted),
            "reveal" | "hybrid" => Ok(Self::Reveal),
            other => Err(format!("unknown wheel mode: {}", other)),
        }
    }
}

// =============================================================================
// CONFIG & ERRORS
// =============================================================================

/// Construction parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WheelConfig {
    /// Settlement design.
    pub mode: WheelMode,
    /// Lower bet bound.
    pub min_bet: u64,
    /// Upper bet bound.
    pub max_bet: u64,
    /// Thresholds and multipliers.
    pub prizes: PrizeTable,
    /// Payout source. Defaults to the wheel's own address.
    pub house_wallet: Option<Address>,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            mode: WheelMode::default(),
            min_bet: DEFAULT_MIN_BET,
            max_bet: DEFAULT_MAX_BET,
            prizes: PrizeTable::default(),
            house_wallet: None,
        }
    }
}

/// Wheel errors. All of them abort the whole transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WheelError {
    /// Owner-only operation called by someone else.
    #[error("{caller} is not the wheel owner")]
    NotOwner {
        /// Rejected caller.
        caller: Address,
    },

    /// Zero address supplied.
    #[error("zero address is not allowed")]
    ZeroAddress,

    /// Player already has an outstanding wager.
    #[error("{0} already has a pending spin")]
    PendingSpinExists(Address),

    /// Player has no outstanding wager.
    #[error("{0} has no pending spin")]
    NoPendingSpin(Address),

    /// Claim attempted before the segment was revealed.
    #[error("segment must be revealed before claiming")]
    NotRevealed,

    /// Segment already revealed for this wager.
    #[error("segment already revealed")]
    AlreadyRevealed,

    /// Segment index out of range.
    #[error("segment {0} is out of range")]
    InvalidSegment(u8),

    /// Bounds violate `0 < min <= max`.
    #[error("invalid bet limits: min {min}, max {max}")]
    InvalidBetLimits {
        /// Requested minimum.
        min: u64,
        /// Requested maximum.
        max: u64,
    },

    /// Maximum bet times a multiplier would exceed 64 bits.
    #[error("max bet times multiplier overflows 64 bits")]
    PayoutOverflow,

    /// Operation or bet kind belongs to the other mode.
    #[error("operation requires {expected} mode")]
    ModeMismatch {
        /// Mode the operation needs.
        expected: WheelMode,
    },

    /// Ledger rejected the settlement transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Primitive layer failure.
    #[error(transparent)]
    Fhe(#[from] FheError),
}

impl WheelError {
    /// Stable reason identifier for the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotOwner { .. } => "NotOwner",
            Self::ZeroAddress => "ZeroAddress",
            Self::PendingSpinExists(_) => "PendingSpinExists",
            Self::NoPendingSpin(_) => "NoPendingSpin",
            Self::NotRevealed => "NotRevealed",
            Self::AlreadyRevealed => "AlreadyRevealed",
            Self::InvalidSegment(_) => "InvalidSegment",
            Self::InvalidBetLimits { .. } => "InvalidBetLimits",
            Self::PayoutOverflow => "PayoutOverflow",
            Self::ModeMismatch { .. } => "ModeMismatch",
            Self::Ledger(e) => e.reason(),
            Self::Fhe(e) => e.reason(),
        }
    }
}

// =============================================================================
// WHEEL
// =============================================================================

/// Prize wheel bound to one ledger.
#[derive(Clone, Debug)]
pub struct WheelGame {
    address: Address,
    owner: Address,
    mode: WheelMode,
    house_wallet: Address,
    min_bet: u64,
    max_bet: u64,
    prizes: PrizeTable,
    spins: BTreeMap<Address, SpinRecord>,
}

impl WheelGame {
    /// Deploy a wheel at `address` owned by `owner`.
    pub fn new(address: Address, owner: Address, config: WheelConfig) -> Result<Self, WheelError> {
        validate_limits(config.min_bet, config.max_bet, &config.prizes)?;
        let house_wallet = config.house_wallet.unwrap_or(address);
        if house_wallet.is_zero() {
            return Err(WheelError::ZeroAddress);
        }
        Ok(Self {
            address,
            owner,
            mode: config.mode,
            house_wallet,
            min_bet: config.min_bet,
            max_bet: config.max_bet,
            prizes: config.prizes,
            spins: BTreeMap::new(),
        })
    }

    /// Wheel contract identity.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Settlement mode.
    pub fn mode(&self) -> WheelMode {
        self.mode
    }

    /// Account bets are paid into and prizes out of.
    pub fn house_wallet(&self) -> Address {
        self.house_wallet
    }

    /// `(min_bet, max_bet)`.
    pub fn bet_limits(&self) -> (u64, u64) {
        (self.min_bet, self.max_bet)
    }

    /// Active prize table.
    pub fn prizes(&self) -> &PrizeTable {
        &self.prizes
    }

    /// Whether `player` has an outstanding wager.
    pub fn has_pending_spin(&self, player: &Address) -> bool {
        self.spins.get(player).map(|r| r.pending).unwrap_or(false)
    }

    /// Latest spin for `player`, pending or retired.
    pub fn get_spin_result(&self, player: &Address) -> Option<SpinResult> {
        self.spins.get(player).map(SpinRecord::view)
    }

    /// Latest clamped bet for `player`.
    pub fn get_last_bet(&self, player: &Address) -> Option<BetAmount> {
        self.spins.get(player).map(|r| r.bet)
    }

    /// Raw record, for audits.
    pub fn spin_record(&self, player: &Address) -> Option<&SpinRecord> {
        self.spins.get(player)
    }

    // =========================================================================
    // SPIN
    // =========================================================================

    /// Place a wager: clamp, debit, draw, derive.
    pub fn spin<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ledger: &mut ConfidentialLedger,
        ctx: &CallContext,
        bet: &BetInput,
    ) -> Result<SpinResult, WheelError> {
        let player = ctx.caller;
        if self.has_pending_spin(&player) {
            warn!(?player, "spin rejected: pending spin");
            return Err(WheelError::PendingSpinExists(player));
        }

        let (bet_ct, recorded, plain_bet) = match (self.mode, bet) {
            (WheelMode::Encrypted, BetInput::Encrypted { input }) => {
                let raw = host.backend.verify_input(input, self.address, player)?;
                let clamped = clamp_bet(&mut host.backend, raw, self.min_bet, self.max_bet)?;
                (clamped, BetAmount::Encrypted { handle: clamped }, None)
            }
            (WheelMode::Reveal, BetInput::Plain { amount }) => {
                let clamped = clamp_plain_bet(*amount, self.min_bet, self.max_bet);
                let ct = host.backend.trivial_u64(clamped);
                (ct, BetAmount::Plain { amount: clamped }, Some(clamped))
            }
            (mode, _) => return Err(WheelError::ModeMismatch { expected: mode }),
        };
        host.acl.allow_all(bet_ct.handle(), &[self.address, player]);

        let contract_ctx = ctx.as_contract(self.address);
        let transferred =
            ledger.transfer_from(host, &contract_ctx, player, self.house_wallet, bet_ct)?;
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::SpinStarted { player, bet: bet_ct, plain_bet },
        );

        let random = host.backend.random_u8();
        host.acl.allow(random.handle(), self.address);
        let segment = derive_segment(&mut host.backend, random, &self.prizes)?;
        host.acl.allow_all(segment.handle(), &[self.address, player]);

        let winnings = match self.mode {
            WheelMode::Encrypted => {
                let w = calculate_winnings(&mut host.backend, transferred, segment, &self.prizes)?;
                host.acl.allow_all(w.handle(), &[self.address, player]);
                Some(w)
            }
            WheelMode::Reveal => None,
        };

        let record = SpinRecord {
            bet: recorded,
            transferred,
            segment,
            winnings,
            revealed_segment: None,
            pending: true,
            created_at: ctx.timestamp,
        };
        let view = record.view();
        self.spins.insert(player, record);

        host.emit(
            ctx.timestamp,
            self.address,
            EventData::SpinCompleted { player, segment, winnings },
        );
        info!(?player, mode = %self.mode, segment = ?segment.handle(), "spin");
        Ok(view)
    }

    /// Record the player's self-decrypted segment (reveal mode).
    ///
    /// The claimed index is accepted as authoritative; the event carries the
    /// committed handle for off-chain audit.
    pub fn reveal_segment<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        segment: u8,
    ) -> Result<(), WheelError> {
        if self.mode != WheelMode::Reveal {
            return Err(WheelError::ModeMismatch { expected: WheelMode::Reveal });
        }
        let player = ctx.caller;
        let record = self
            .spins
            .get_mut(&player)
            .filter(|r| r.pending)
            .ok_or(WheelError::NoPendingSpin(player))?;
        if record.is_revealed() {
            return Err(WheelError::AlreadyRevealed);
        }
        if segment as usize >= SEGMENT_COUNT {
            return Err(WheelError::InvalidSegment(segment));
        }

        record.revealed_segment = Some(segment);
        let committed = record.segment;
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::SegmentRevealed { player, segment, committed },
        );
        info!(?player, segment, "segment revealed");
        Ok(())
    }

    /// Settle the outstanding wager and return to idle.
    ///
    /// Returns the handle of the amount credited, or `None` when a revealed
    /// segment pays nothing.
    pub fn claim_prize<B: FheBackend>(
        &mut self,
        host: &mut Host<B>,
        ledger: &mut ConfidentialLedger,
        ctx: &CallContext,
    ) -> Result<Option<Euint64>, WheelError> {
        let player = ctx.caller;
        let record = self
            .spins
            .get(&player)
            .filter(|r| r.pending)
            .cloned()
            .ok_or(WheelError::NoPendingSpin(player))?;

        let amount = match (self.mode, record.winnings, record.bet) {
            (WheelMode::Encrypted, Some(winnings), _) => {
                let zero = host.backend.trivial_u64(0);
                let positive = host.backend.gt(winnings, zero)?;
                Some(host.backend.select(positive, winnings, zero)?)
            }
            (WheelMode::Reveal, _, BetAmount::Plain { amount: bet }) => {
                let segment = record.revealed_segment.ok_or(WheelError::NotRevealed)?;
                let payout = self.prizes.payout(bet, segment);
                if payout > 0 {
                    // Shortfall spins (nothing debited) pay nothing
                    let expected = host.backend.trivial_u64(bet);
                    let paid = host.backend.eq(record.transferred, expected)?;
                    let prize = host.backend.trivial_u64(payout);
                    let zero = host.backend.trivial_u64(0);
                    Some(host.backend.select(paid, prize, zero)?)
                } else {
                    None
                }
            }
            _ => return Err(WheelError::ModeMismatch { expected: self.mode }),
        };

        let credited = match amount {
            Some(amount) => {
                host.acl.allow(amount.handle(), self.address);
                let contract_ctx = ctx.as_contract(self.address);
                let moved =
                    ledger.transfer_from(host, &contract_ctx, self.house_wallet, player, amount)?;
                Some(moved)
            }
            None => None,
        };

        if let Some(record) = self.spins.get_mut(&player) {
            record.pending = false;
        }
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::PrizeClaimed { player, amount: credited },
        );
        info!(?player, credited = ?credited.map(|c| c.handle()), "prize claimed");
        Ok(credited)
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    /// Change bet bounds.
    pub fn set_bet_limits<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        min_bet: u64,
        max_bet: u64,
    ) -> Result<(), WheelError> {
        self.require_owner(ctx)?;
        validate_limits(min_bet, max_bet, &self.prizes)?;
        self.min_bet = min_bet;
        self.max_bet = max_bet;
        host.emit(ctx.timestamp, self.address, EventData::BetLimitsUpdated { min_bet, max_bet });
        info!(min_bet, max_bet, "bet limits updated");
        Ok(())
    }

    /// Change one segment's multiplier.
    pub fn set_multiplier<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        segment: u8,
        multiplier: u64,
    ) -> Result<(), WheelError> {
        self.require_owner(ctx)?;
        if segment as usize >= SEGMENT_COUNT {
            return Err(WheelError::InvalidSegment(segment));
        }
        if self.max_bet.checked_mul(multiplier).is_none() {
            return Err(WheelError::PayoutOverflow);
        }
        self.prizes.set_multiplier(segment, multiplier);
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::MultiplierUpdated { segment, multiplier },
        );
        info!(segment, multiplier, "multiplier updated");
        Ok(())
    }

    /// Change the payout source. The new wallet must approve the wheel as an
    /// operator unless it is the wheel itself.
    pub fn set_house_wallet<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        wallet: Address,
    ) -> Result<(), WheelError> {
        self.require_owner(ctx)?;
        if wallet.is_zero() {
            return Err(WheelError::ZeroAddress);
        }
        self.house_wallet = wallet;
        host.emit(ctx.timestamp, self.address, EventData::HouseWalletUpdated { wallet });
        info!(?wallet, "house wallet updated");
        Ok(())
    }

    /// Hand the wheel to a new owner.
    pub fn transfer_ownership<B>(
        &mut self,
        host: &mut Host<B>,
        ctx: &CallContext,
        new_owner: Address,
    ) -> Result<(), WheelError> {
        self.require_owner(ctx)?;
        if new_owner.is_zero() {
            return Err(WheelError::ZeroAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        host.emit(
            ctx.timestamp,
            self.address,
            EventData::OwnershipTransferred { previous, new_owner },
        );
        info!(?previous, ?new_owner, "wheel ownership transferred");
        Ok(())
    }

    // =========================================================================
    // AUDIT
    // =========================================================================

    /// Grants every stored handle must carry.
    pub fn required_grants(&self) -> Vec<GrantRequirement> {
        let mut reqs = Vec::new();
        for (player, record) in &self.spins {
            let entitled = vec![self.address, *player];
            let mut push = |handle, field: &str| {
                reqs.push(GrantRequirement {
                    handle,
                    accounts: entitled.clone(),
                    location: format!("wheel.spin[{}].{}", player, field),
                });
            };
            push(record.segment.handle(), "segment");
            push(record.transferred.handle(), "transferred");
            if let BetAmount::Encrypted { handle } = record.bet {
                push(handle.handle(), "bet");
            }
            if let Some(winnings) = record.winnings {
                push(winnings.handle(), "winnings");
            }
        }
        reqs
    }

    /// Feed committed state into a state hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_address(&self.address);
        hasher.update_address(&self.owner);
        hasher.update_u8(self.mode as u8);
        hasher.update_address(&self.house_wallet);
        hasher.update_u64(self.min_bet);
        hasher.update_u64(self.max_bet);
        for threshold in self.prizes.thresholds() {
            hasher.update_u8(*threshold);
        }
        for multiplier in self.prizes.multipliers() {
            hasher.update_u64(*multiplier);
        }
        hasher.update_u64(self.spins.len() as u64);
        for (player, record) in &self.spins {
            hasher.update_address(player);
            match record.bet {
                BetAmount::Encrypted { handle } => hasher.update_handle(&handle.handle()),
                BetAmount::Plain { amount } => hasher.update_u64(amount),
            }
            hasher.update_handle(&record.transferred.handle());
            hasher.update_handle(&record.segment.handle());
            hasher.update_opt_handle(record.winnings.map(|w| w.handle()).as_ref());
            hasher.update_u8(record.revealed_segment.map(|s| s + 1).unwrap_or(0));
            hasher.update_bool(record.pending);
            hasher.update_u64(record.created_at);
        }
    }

    fn require_owner(&self, ctx: &CallContext) -> Result<(), WheelError> {
        if ctx.caller != self.owner {
            warn!(caller = ?ctx.caller, "wheel owner check failed");
            return Err(WheelError::NotOwner { caller: ctx.caller });
        }
        Ok(())
    }
}

fn validate_limits(min_bet: u64, max_bet: u64, prizes: &PrizeTable) -> Result<(), WheelError> {
    if min_bet == 0 || min_bet > max_bet {
        return Err(WheelError::InvalidBetLimits { min: min_bet, max: max_bet });
    }
    if max_bet.checked_mul(prizes.max_multiplier()).is_none() {
        return Err(WheelError::PayoutOverflow);
    }
    debug!(min_bet, max_bet, "bet limits validated");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clear::ClearBackend;
    use crate::ledger::{LedgerConfig, OPERATOR_FOREVER};

    const NOW: u64 = 1_700_000_000;
    const BET: u64 = 10_000_000;

    fn owner() -> Address {
        Address::new([0xaa; 20])
    }
    fn player() -> Address {
        Address::new([1; 20])
    }

    struct Fixture {
        host: Host<ClearBackend>,
        ledger: ConfidentialLedger,
        wheel: WheelGame,
    }

    impl Fixture {
        fn new(mode: WheelMode) -> Self {
            let mut host = Host::new(ClearBackend::new(42));
            let mut ledger =
                ConfidentialLedger::new(Address::derive(b"ledger"), owner(), LedgerConfig::default());
            let config = WheelConfig { mode, ..Default::default() };
            let wheel = WheelGame::new(Address::derive(b"wheel"), owner(), config).unwrap();

            let admin = CallContext::new(owner(), NOW);
            ledger.mint(&mut host, &admin, wheel.address(), 10_000_000_000).unwrap();
            ledger.mint(&mut host, &admin, player(), 500_000_000).unwrap();
            ledger
                .set_operator(&mut host, &ctx(), wheel.address(), OPERATOR_FOREVER)
                .unwrap();
            Self { host, ledger, wheel }
        }

        fn balance(&self, who: Address) -> u64 {
            let handle = self.ledger.balance_of(&who).unwrap().handle();
            self.host.backend.plaintext(handle).unwrap()
        }

        fn bet_input(&mut self, amount: u64) -> BetInput {
            match self.wheel.mode() {
                WheelMode::Encrypted => BetInput::Encrypted {
                    input: self.host.backend.encrypt_input(self.wheel.address(), player(), amount),
                },
                WheelMode::Reveal => BetInput::Plain { amount },
            }
        }

        fn spin(&mut self, amount: u64) -> Result<SpinResult, WheelError> {
            let bet = self.bet_input(amount);
            self.wheel.spin(&mut self.host, &mut self.ledger, &ctx(), &bet)
        }

        fn segment(&self) -> u8 {
            let rec = self.wheel.spin_record(&player()).unwrap();
            self.host.backend.plaintext(rec.segment.handle()).unwrap() as u8
        }
    }

    fn ctx() -> CallContext {
        CallContext::new(player(), NOW)
    }

    #[test]
    fn test_encrypted_spin_and_claim() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        let house_before = fx.balance(fx.wheel.address());

        let result = fx.spin(BET).unwrap();
        assert!(result.has_pending_spin());
        assert!(fx.wheel.has_pending_spin(&player()));
        assert_eq!(fx.balance(player()), 500_000_000 - BET);
        assert_eq!(fx.balance(fx.wheel.address()), house_before + BET);

        let segment = fx.segment();
        let expected = fx.wheel.prizes().payout(BET, segment);
        let winnings = result.winnings.unwrap();
        assert_eq!(fx.host.backend.plaintext(winnings.handle()), Some(expected));
        assert!(fx.host.acl.is_allowed(winnings.handle(), player()));
        assert!(fx.host.acl.is_allowed(result.segment.handle(), player()));

        let credited = fx
            .wheel
            .claim_prize(&mut fx.host, &mut fx.ledger, &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(fx.host.backend.plaintext(credited.handle()), Some(expected));
        assert_eq!(fx.balance(player()), 500_000_000 - BET + expected);
        assert!(!fx.wheel.has_pending_spin(&player()));
        assert!(fx.host.acl.missing(&fx.wheel.required_grants()).is_empty());
        assert!(fx.host.acl.missing(&fx.ledger.required_grants()).is_empty());
    }

    #[test]
    fn test_second_spin_rejected() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        fx.spin(BET).unwrap();
        let balance = fx.balance(player());

        let err = fx.spin(BET).unwrap_err();
        assert_eq!(err, WheelError::PendingSpinExists(player()));
        assert_eq!(fx.balance(player()), balance);
    }

    #[test]
    fn test_spin_clamps_bet() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        fx.spin(1).unwrap();
        assert_eq!(fx.balance(player()), 500_000_000 - DEFAULT_MIN_BET);

        fx.wheel.claim_prize(&mut fx.host, &mut fx.ledger, &ctx()).unwrap();
        let before = fx.balance(player());
        fx.spin(u64::MAX).unwrap();
        assert_eq!(before - fx.balance(player()), DEFAULT_MAX_BET);
    }

    #[test]
    fn test_shortfall_spin_pays_nothing() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        let broke = Address::new([9; 20]);
        let call = CallContext::new(broke, NOW);
        fx.ledger.set_operator(&mut fx.host, &call, fx.wheel.address(), OPERATOR_FOREVER).unwrap();

        let input = fx.host.backend.encrypt_input(fx.wheel.address(), broke, BET);
        let bet = BetInput::Encrypted { input };
        let result = fx.wheel.spin(&mut fx.host, &mut fx.ledger, &call, &bet).unwrap();
        assert_eq!(fx.host.backend.plaintext(result.winnings.unwrap().handle()), Some(0));
    }

    #[test]
    fn test_spin_without_operator_approval() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        fx.ledger.set_operator(&mut fx.host, &ctx(), fx.wheel.address(), 0).unwrap();
        let err = fx.spin(BET).unwrap_err();
        assert_eq!(err.reason(), "UnauthorizedSpender");
    }

    #[test]
    fn test_mode_mismatch() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        let bet = BetInput::Plain { amount: BET };
        let err = fx.wheel.spin(&mut fx.host, &mut fx.ledger, &ctx(), &bet).unwrap_err();
        assert_eq!(err, WheelError::ModeMismatch { expected: WheelMode::Encrypted });

        let err = fx.wheel.reveal_segment(&mut fx.host, &ctx(), 1).unwrap_err();
        assert_eq!(err, WheelError::ModeMismatch { expected: WheelMode::Reveal });
    }

    #[test]
    fn test_reveal_flow() {
        let mut fx = Fixture::new(WheelMode::Reveal);
        let result = fx.spin(BET).unwrap();
        assert!(result.winnings.is_none());
        assert_eq!(fx.wheel.get_last_bet(&player()), Some(BetAmount::Plain { amount: BET }));

        let err = fx.wheel.claim_prize(&mut fx.host, &mut fx.ledger, &ctx()).unwrap_err();
        assert_eq!(err, WheelError::NotRevealed);

        let err = fx.wheel.reveal_segment(&mut fx.host, &ctx(), 8).unwrap_err();
        assert_eq!(err, WheelError::InvalidSegment(8));

        let segment = fx.segment();
        fx.wheel.reveal_segment(&mut fx.host, &ctx(), segment).unwrap();
        let err = fx.wheel.reveal_segment(&mut fx.host, &ctx(), segment).unwrap_err();
        assert_eq!(err, WheelError::AlreadyRevealed);

        let before = fx.balance(player());
        fx.wheel.claim_prize(&mut fx.host, &mut fx.ledger, &ctx()).unwrap();
        let payout = fx.wheel.prizes().payout(BET, segment);
        assert_eq!(fx.balance(player()), before + payout);
        assert!(!fx.wheel.has_pending_spin(&player()));
    }

    #[test]
    fn test_reveal_jackpot_claim() {
        let mut fx = Fixture::new(WheelMode::Reveal);
        fx.spin(BET).unwrap();
        // Self-reported segment is authoritative
        fx.wheel.reveal_segment(&mut fx.host, &ctx(), 7).unwrap();
        let before = fx.balance(player());
        let credited = fx
            .wheel
            .claim_prize(&mut fx.host, &mut fx.ledger, &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(fx.host.backend.plaintext(credited.handle()), Some(1_000_000_000));
        assert_eq!(fx.balance(player()), before + 1_000_000_000);
    }

    #[test]
    fn test_reveal_zero_segment_claims_nothing() {
        let mut fx = Fixture::new(WheelMode::Reveal);
        fx.spin(BET).unwrap();
        fx.wheel.reveal_segment(&mut fx.host, &ctx(), 0).unwrap();
        let credited = fx.wheel.claim_prize(&mut fx.host, &mut fx.ledger, &ctx()).unwrap();
        assert!(credited.is_none());
        assert!(!fx.wheel.has_pending_spin(&player()));
    }

    #[test]
    fn test_claim_without_spin() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        let err = fx.wheel.claim_prize(&mut fx.host, &mut fx.ledger, &ctx()).unwrap_err();
        assert_eq!(err, WheelError::NoPendingSpin(player()));
    }

    #[test]
    fn test_admin_setters() {
        let mut fx = Fixture::new(WheelMode::Encrypted);
        let admin = CallContext::new(owner(), NOW);

        let err = fx.wheel.set_bet_limits(&mut fx.host, &ctx(), 1, 2).unwrap_err();
        assert_eq!(err.reason(), "NotOwner");
        assert!(matches!(
            fx.wheel.set_bet_limits(&mut fx.host, &admin, 0, 5),
            Err(WheelError::InvalidBetLimits { .. })
        ));
        assert!(matches!(
            fx.wheel.set_bet_limits(&mut fx.host, &admin, 10, 5),
            Err(WheelError::InvalidBetLimits { .. })
        ));
        assert_eq!(
            fx.wheel.set_bet_limits(&mut fx.host, &admin, 1, u64::MAX),
            Err(WheelError::PayoutOverflow)
        );
        fx.wheel.set_bet_limits(&mut fx.host, &admin, 5, 50).unwrap();
        assert_eq!(fx.wheel.bet_limits(), (5, 50));

        assert_eq!(
            fx.wheel.set_multiplier(&mut fx.host, &admin, 8, 1),
            Err(WheelError::InvalidSegment(8))
        );
        fx.wheel.set_multiplier(&mut fx.host, &admin, 0, 2_500).unwrap();
        assert_eq!(fx.wheel.prizes().multiplier(0), Some(2_500));

        assert_eq!(
            fx.wheel.set_house_wallet(&mut fx.host, &admin, Address::ZERO),
            Err(WheelError::ZeroAddress)
        );
        fx.wheel.set_house_wallet(&mut fx.host, &admin, owner()).unwrap();
        assert_eq!(fx.wheel.house_wallet(), owner());

        fx.wheel.transfer_ownership(&mut fx.host, &admin, player()).unwrap();
        assert_eq!(fx.wheel.owner(), player());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("encrypted".parse::<WheelMode>(), Ok(WheelMode::Encrypted));
        assert_eq!("Reveal".parse::<WheelMode>(), Ok(WheelMode::Reveal));
        assert!("plain".parse::<WheelMode>().is_err());
    }
}
