//! End-to-end wheel scenarios through the transaction runtime.

use std::sync::Arc;

use proptest::prelude::*;

use cipher_wheel::core::ClearBackend;
use cipher_wheel::game::{BetInput, SpinPhase, WheelMode};
use cipher_wheel::host::{
    ManualClock, Query, QueryResult, Receipt, Runtime, RuntimeConfig, Transaction, TxOutput,
};
use cipher_wheel::ledger::OPERATOR_FOREVER;
use cipher_wheel::Address;

const NOW: u64 = 1_700_000_000;
const BANKROLL: u64 = 10_000_000_000;
/// 0.001 ETH in wei.
const MILLI_ETH: u128 = 1_000_000_000_000_000;

struct World {
    rt: Runtime<ClearBackend>,
    clock: ManualClock,
}

impl World {
    fn new(mode: WheelMode, seed: u64) -> Self {
        let clock = ManualClock::new(NOW);
        let mut config = RuntimeConfig {
            rng_seed: Some(seed),
            house_bankroll: BANKROLL,
            ..Default::default()
        };
        config.wheel.mode = mode;
        let rt = Runtime::with_clear_backend(config, Arc::new(clock.clone())).unwrap();
        Self { rt, clock }
    }

    fn owner(&self) -> Address {
        self.rt.wheel().owner()
    }

    fn wheel(&self) -> Address {
        self.rt.wheel().address()
    }

    fn house(&self) -> Address {
        self.rt.wheel().house_wallet()
    }

    fn balance(&self, who: Address) -> u64 {
        self.rt
            .ledger()
            .balance_of(&who)
            .map(|b| self.rt.decrypt(b.handle(), who).unwrap())
            .unwrap_or(0)
    }

    /// Buy tokens and approve the wheel.
    fn onboard(&mut self, player: Address) {
        let receipt = self.rt.execute(player, MILLI_ETH, Transaction::BuyTokens).unwrap();
        assert_eq!(receipt.output, TxOutput::Purchased { units: 1_000_000 });
        let wheel = self.wheel();
        self.rt
            .execute(player, 0, Transaction::SetOperator { operator: wheel, until: OPERATOR_FOREVER })
            .unwrap();
    }

    fn encrypted_spin(&mut self, player: Address, amount: u64) -> Result<(), String> {
        let wheel = self.wheel();
        let input = self.rt.encrypt_input(wheel, player, amount);
        self.rt
            .execute(player, 0, Transaction::Spin { bet: BetInput::Encrypted { input } })
            .map(|_| ())
            .map_err(|e| e.reason().to_string())
    }
}

fn player() -> Address {
    Address::new([0xAA; 20])
}

#[test]
fn test_end_to_end_encrypted_spin() {
    let mut world = World::new(WheelMode::Encrypted, 42);
    let owner = world.owner();
    world
        .rt
        .execute(owner, 0, Transaction::SetBetLimits { min_bet: 1, max_bet: 100_000_000 })
        .unwrap();
    world.onboard(player());
    assert_eq!(world.balance(player()), 1_000_000);

    world.encrypted_spin(player(), 10).unwrap();
    assert_eq!(world.balance(player()), 999_990);
    assert_eq!(world.balance(world.house()), BANKROLL + 10);
    assert!(world.rt.wheel().has_pending_spin(&player()));

    let result = world.rt.wheel().get_spin_result(&player()).unwrap();
    assert_eq!(result.phase, SpinPhase::Pending);
    let segment = world.rt.decrypt(result.segment.handle(), player()).unwrap();
    let winnings = world.rt.decrypt(result.winnings.unwrap().handle(), player()).unwrap();
    assert!(segment < 8);
    assert_eq!(winnings, world.rt.wheel().prizes().payout(10, segment as u8));

    world.rt.execute(player(), 0, Transaction::ClaimPrize).unwrap();
    assert_eq!(world.balance(player()), 999_990 + winnings);
    assert_eq!(world.balance(world.house()), BANKROLL + 10 - winnings);
    assert_eq!(
        world.rt.query(&Query::HasPendingSpin { player: player() }),
        QueryResult::HasPendingSpin { pending: false }
    );
    assert!(world.rt.audit_grants().is_empty());
    assert!(world.rt.journal().verify_chain().is_ok());
}

#[test]
fn test_second_spin_is_rejected_without_effect() {
    let mut world = World::new(WheelMode::Encrypted, 7);
    world.onboard(player());
    world.encrypted_spin(player(), 1_000_000).unwrap();

    let hash = world.rt.state_hash();
    assert_eq!(world.encrypted_spin(player(), 1_000_000), Err("PendingSpinExists".to_string()));
    assert_eq!(world.rt.state_hash(), hash);

    world.rt.execute(player(), 0, Transaction::ClaimPrize).unwrap();
    assert!(world.rt.execute(player(), 0, Transaction::ClaimPrize).is_err());
}

#[test]
fn test_spin_without_approval_fails() {
    let mut world = World::new(WheelMode::Encrypted, 8);
    world.rt.execute(player(), MILLI_ETH, Transaction::BuyTokens).unwrap();
    assert_eq!(world.encrypted_spin(player(), 1_000_000), Err("UnauthorizedSpender".to_string()));
    assert_eq!(world.balance(player()), 1_000_000);
    assert!(!world.rt.wheel().has_pending_spin(&player()));
}

#[test]
fn test_operator_expiry_has_no_grace_period() {
    let mut world = World::new(WheelMode::Encrypted, 9);
    let bob = Address::new([0xBB; 20]);
    world.rt.execute(player(), MILLI_ETH, Transaction::BuyTokens).unwrap();
    world
        .rt
        .execute(player(), 0, Transaction::SetOperator { operator: bob, until: NOW + 10 })
        .unwrap();

    let ledger = world.rt.ledger().address();
    world.clock.set(NOW + 10);
    let input = world.rt.encrypt_input(ledger, bob, 100);
    world
        .rt
        .execute(bob, 0, Transaction::TransferFrom { from: player(), to: bob, amount: input })
        .unwrap();
    assert_eq!(world.balance(bob), 100);

    world.clock.advance(1);
    let input = world.rt.encrypt_input(ledger, bob, 100);
    let err = world
        .rt
        .execute(bob, 0, Transaction::TransferFrom { from: player(), to: bob, amount: input })
        .unwrap_err();
    assert_eq!(err.reason(), "UnauthorizedSpender");
    assert_eq!(world.balance(bob), 100);
}

#[test]
fn test_reveal_flow() {
    let mut world = World::new(WheelMode::Reveal, 11);
    world.onboard(player());

    let err = world.encrypted_spin(player(), 1_000_000).unwrap_err();
    assert_eq!(err, "ModeMismatch");

    let bet = BetInput::Plain { amount: 1_000_000 };
    world.rt.execute(player(), 0, Transaction::Spin { bet }).unwrap();
    assert_eq!(world.balance(player()), 0);

    let err = world.rt.execute(player(), 0, Transaction::ClaimPrize).unwrap_err();
    assert_eq!(err.reason(), "NotRevealed");

    let result = world.rt.wheel().get_spin_result(&player()).unwrap();
    assert!(result.winnings.is_none());
    let segment = world.rt.decrypt(result.segment.handle(), player()).unwrap() as u8;

    let err = world
        .rt
        .execute(player(), 0, Transaction::RevealSegment { segment: 8 })
        .unwrap_err();
    assert_eq!(err.reason(), "InvalidSegment");

    world.rt.execute(player(), 0, Transaction::RevealSegment { segment }).unwrap();
    let err = world
        .rt
        .execute(player(), 0, Transaction::RevealSegment { segment })
        .unwrap_err();
    assert_eq!(err.reason(), "AlreadyRevealed");

    let result = world.rt.wheel().get_spin_result(&player()).unwrap();
    assert_eq!(result.phase, SpinPhase::Revealed);
    assert_eq!(result.revealed_segment, Some(segment));

    world.rt.execute(player(), 0, Transaction::ClaimPrize).unwrap();
    let payout = world.rt.wheel().prizes().payout(1_000_000, segment);
    assert_eq!(world.balance(player()), payout);
    assert!(!world.rt.wheel().has_pending_spin(&player()));
    assert!(world.rt.audit_grants().is_empty());
}

#[test]
fn test_events_pair_per_spin() {
    use cipher_wheel::host::EventData;

    let mut world = World::new(WheelMode::Encrypted, 12);
    world.onboard(player());
    let wheel = world.wheel();
    let input = world.rt.encrypt_input(wheel, player(), 1_000_000);
    let receipt = world
        .rt
        .execute(player(), 0, Transaction::Spin { bet: BetInput::Encrypted { input } })
        .unwrap();

    let started = receipt
        .events
        .iter()
        .position(|e| matches!(e.data, EventData::SpinStarted { .. }))
        .unwrap();
    let completed = receipt
        .events
        .iter()
        .position(|e| matches!(e.data, EventData::SpinCompleted { .. }))
        .unwrap();
    assert!(started < completed);
    assert!(receipt.events.iter().all(|e| e.timestamp == NOW));
}

// ─────────────────────────────────────────────────────────────────────────────
// ACL completeness over random sessions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Step {
    Spin { who: u8, amount: u64 },
    Claim { who: u8 },
    Transfer { from: u8, to: u8, amount: u64 },
}

/// Every handle a receipt hands out must still exist and carry its grants.
fn check_receipt(world: &World, receipt: &Receipt) -> Result<usize, TestCaseError> {
    let requirements = receipt.required_grants(world.rt.ledger().address(), world.wheel());
    for req in &requirements {
        prop_assert!(
            world.rt.host().backend.plaintext(req.handle).is_some(),
            "{} was released",
            req.location
        );
    }
    let missing = world.rt.audit_receipt(receipt);
    prop_assert!(missing.is_empty(), "missing grants: {:?}", missing);
    Ok(requirements.len())
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..2, 0u64..3_000_000).prop_map(|(who, amount)| Step::Spin { who, amount }),
        (0u8..2).prop_map(|who| Step::Claim { who }),
        (0u8..2, 0u8..2, 0u64..600_000).prop_map(|(from, to, amount)| Step::Transfer { from, to, amount }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_every_handed_out_handle_stays_granted(
        steps in prop::collection::vec(arb_step(), 1..16),
        seed in any::<u64>(),
    ) {
        let mut world = World::new(WheelMode::Encrypted, seed);
        let players = [Address::new([0x10; 20]), Address::new([0x20; 20])];
        for p in players {
            world.onboard(p);
        }

        let mut checked = 0;
        for step in &steps {
            let outcome = match *step {
                Step::Spin { who, amount } => {
                    let player = players[who as usize];
                    let wheel = world.wheel();
                    let input = world.rt.encrypt_input(wheel, player, amount);
                    world.rt.execute(player, 0, Transaction::Spin { bet: BetInput::Encrypted { input } })
                }
                Step::Claim { who } => {
                    world.rt.execute(players[who as usize], 0, Transaction::ClaimPrize)
                }
                Step::Transfer { from, to, amount } => {
                    let ledger = world.rt.ledger().address();
                    let sender = players[from as usize];
                    let input = world.rt.encrypt_input(ledger, sender, amount);
                    world.rt.execute(
                        sender,
                        0,
                        Transaction::Transfer { to: players[to as usize], amount: input },
                    )
                }
            };
            if let Ok(receipt) = outcome {
                prop_assert!(!receipt.events.is_empty(), "{:?} committed silently", step);
                checked += check_receipt(&world, &receipt)?;
            }
            prop_assert!(world.rt.audit_grants().is_empty(), "after {:?}", step);
        }
        // Transfers from an onboarded player always commit
        prop_assert!(checked > 0 || steps.iter().all(|s| !matches!(s, Step::Transfer { .. })), "no transfer steps were checked");

        let total: u64 = world
            .rt
            .ledger()
            .holders()
            .map(|h| world.rt.host().backend.plaintext(world.rt.ledger().balance_of(h).unwrap().handle()).unwrap())
            .sum();
        let supply = world.rt.ledger().total_supply().unwrap().handle();
        prop_assert_eq!(Some(total), world.rt.host().backend.plaintext(supply));
    }
}
