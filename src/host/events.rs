//! Observable Events
//!
//! One event per state transition. Amounts that are secret appear only as
//! ciphertext handles; public quantities (native value, plaintext bets in
//! reveal mode, admin parameters) appear in the clear.

use serde::{Deserialize, Serialize};

use crate::core::acl::GrantRequirement;
use crate::core::address::Address;
use crate::core::handle::{Euint64, Euint8, Handle};

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventData {
    /// Tokens minted to `to`.
    Minted {
        to: Address,
        amount: Euint64,
    },

    /// Native value converted to tokens.
    TokensPurchased {
        buyer: Address,
        #[serde(with = "super::u128_str")]
        paid_wei: u128,
        units: u64,
    },

    /// Balance moved between holders (`amount` is what actually moved).
    Transfer {
        from: Address,
        to: Address,
        amount: Euint64,
    },

    /// Tokens burned from `from`.
    Burned {
        from: Address,
        amount: Euint64,
    },

    /// Operator delegation changed.
    OperatorSet {
        holder: Address,
        operator: Address,
        until: u64,
    },

    /// Native value withdrawn from the treasury.
    Withdrawn {
        to: Address,
        #[serde(with = "super::u128_str")]
        amount_wei: u128,
    },

    /// Contract ownership moved.
    OwnershipTransferred {
        previous: Address,
        new_owner: Address,
    },

    /// Spin accepted and bet debited.
    SpinStarted {
        player: Address,
        bet: Euint64,
        /// Plaintext bet, reveal mode only.
        plain_bet: Option<u64>,
    },

    /// Outcome derived.
    SpinCompleted {
        player: Address,
        segment: Euint8,
        /// Encrypted winnings, encrypted mode only.
        winnings: Option<Euint64>,
    },

    /// Player opened their segment (reveal mode).
    SegmentRevealed {
        player: Address,
        segment: u8,
        /// Handle the claim refers to, for off-chain audit.
        committed: Euint8,
    },

    /// Spin settled.
    PrizeClaimed {
        player: Address,
        /// Amount credited; `None` when nothing was due.
        amount: Option<Euint64>,
    },

    /// Bet bounds changed.
    BetLimitsUpdated {
        min_bet: u64,
        max_bet: u64,
    },

    /// One segment's multiplier changed.
    MultiplierUpdated {
        segment: u8,
        multiplier: u64,
    },

    /// Payout source changed.
    HouseWalletUpdated {
        wallet: Address,
    },
}

/// An event with its emitter and block time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Block timestamp.
    pub timestamp: u64,
    /// Contract that emitted it.
    pub emitter: Address,
    /// Payload.
    pub data: EventData,
}

impl Event {
    /// Holder or player this event concerns, if any.
    pub fn subject(&self) -> Option<Address> {
        match &self.data {
            EventData::Minted { to, .. } => Some(*to),
            EventData::TokensPurchased { buyer, .. } => Some(*buyer),
            EventData::Transfer { from, .. } => Some(*from),
            EventData::Burned { from, .. } => Some(*from),
            EventData::OperatorSet { holder, .. } => Some(*holder),
            EventData::SpinStarted { player, .. }
            | EventData::SpinCompleted { player, .. }
            | EventData::SegmentRevealed { player, .. }
            | EventData::PrizeClaimed { player, .. } => Some(*player),
            _ => None,
        }
    }

    /// Grants every handle in the payload must carry: the emitter plus the
    /// parties the amount concerns.
    pub fn required_grants(&self) -> Vec<GrantRequirement> {
        let req = |handle: Handle, parties: &[Address], field: &str| {
            let mut accounts = vec![self.emitter];
            accounts.extend_from_slice(parties);
            GrantRequirement { handle, accounts, location: field.to_string() }
        };
        match &self.data {
            EventData::Minted { to, amount } => vec![req(amount.handle(), &[*to], "minted")],
            EventData::Transfer { from, to, amount } => {
                vec![req(amount.handle(), &[*from, *to], "transfer")]
            }
            EventData::Burned { from, amount } => vec![req(amount.handle(), &[*from], "burned")],
            EventData::SpinStarted { player, bet, .. } => vec![req(bet.handle(), &[*player], "bet")],
            EventData::SpinCompleted { player, segment, winnings } => {
                let mut reqs = vec![req(segment.handle(), &[*player], "segment")];
                if let Some(winnings) = winnings {
                    reqs.push(req(winnings.handle(), &[*player], "winnings"));
                }
                reqs
            }
            EventData::SegmentRevealed { player, committed, .. } => {
                vec![req(committed.handle(), &[*player], "committed")]
            }
            EventData::PrizeClaimed { player, amount: Some(amount) } => {
                vec![req(amount.handle(), &[*player], "claimed")]
            }
            _ => Vec::new(),
        }
    }

    /// Whether `account` appears as a party to this event.
    pub fn involves(&self, account: &Address) -> bool {
        match &self.data {
            EventData::Transfer { from, to, .. } => from == account || to == account,
            _ => self.subject().as_ref() == Some(account),
        }
    }
}
