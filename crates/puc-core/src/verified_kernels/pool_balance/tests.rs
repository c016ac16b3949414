//! Tests for pool_balance.

use super::*;
use proptest::prelude::*;

#[test]
fn funded_satisfies_invariants() {
    assert!(check_invariants(&State::funded(25_000)).is_ok());
}

#[test]
fn broken_triple_is_rejected() {
    let s = State {
        total: 100,
        remaining: 60,
        spent: 30,
    };
    assert_eq!(
        check_invariants(&s),
        Err(Error::InvariantViolation("TotalEqualsRemainingPlusSpent"))
    );
    assert!(step(&s, Command::Debit { amt: 1 }).is_err());
}

#[test]
fn debit_moves_remaining_to_spent() {
    let (post, effects) = step(&State::funded(25_000), Command::Debit { amt: 500 }).unwrap();
    assert_eq!(post.remaining, 24_500);
    assert_eq!(post.spent, 500);
    assert_eq!(effects.moved, 500);
}

#[test]
fn debit_of_whole_remaining_empties_pool() {
    let s = State {
        total: 25_000,
        remaining: 300,
        spent: 24_700,
    };
    let (post, _) = step(&s, Command::Debit { amt: 300 }).unwrap();
    assert_eq!(post.remaining, 0);
    assert_eq!(post.spent, post.total);
}

#[test]
fn debit_beyond_remaining_fails_without_change() {
    let s = State {
        total: 25_000,
        remaining: 300,
        spent: 24_700,
    };
    assert_eq!(
        step(&s, Command::Debit { amt: 301 }),
        Err(Error::PreconditionFailed("debit guard"))
    );
}

#[test]
fn credit_beyond_spent_fails() {
    assert_eq!(
        step(&State::funded(100), Command::Credit { amt: 1 }),
        Err(Error::PreconditionFailed("credit guard"))
    );
}

#[test]
fn zero_debit_is_a_no_op() {
    let s = State::funded(100);
    let (post, effects) = step(&s, Command::Debit { amt: 0 }).unwrap();
    assert_eq!(post, s);
    assert_eq!(effects.moved, 0);
}

proptest! {
    #[test]
    fn any_accepted_sequence_conserves_total(
        total in 0u64..1_000_000,
        cmds in proptest::collection::vec((any::<bool>(), 0u64..50_000), 0..64),
    ) {
        let mut s = State::funded(total);
        for (is_debit, amt) in cmds {
            let cmd = if is_debit { Command::Debit { amt } } else { Command::Credit { amt } };
            if let Ok((post, _)) = step(&s, cmd) {
                s = post;
            }
            prop_assert_eq!(s.remaining + s.spent, s.total);
        }
    }

    #[test]
    fn debit_then_credit_restores_state(total in 0u64..1_000_000, spent in 0u64..1_000_000, amt in 0u64..1_000_000) {
        prop_assume!(spent <= total);
        let s = State { total, remaining: total - spent, spent };
        if let Ok((debited, _)) = step(&s, Command::Debit { amt }) {
            let (restored, _) = step(&debited, Command::Credit { amt }).unwrap();
            prop_assert_eq!(restored, s);
        }
    }
}
