//! Post-operation delta reconciliation.
//!
//! Deposits and withdrawals change raw NAV without being market
//! performance, so they must not flow through the waterfall. The
//! caller declares what it just did and the engine checks the raw
//! deltas are consistent with that declaration, then adjusts effective
//! NAV one-for-one.

use crate::error::{EngineError, Result};
use crate::math;
use crate::state::{AccountingState, PerTranche, Tranche};
use crate::sync::RawObservation;
use crate::units::Nav;

/// What the caller claims to have done between the pre-op sync and
/// this reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrancheOp {
    /// A deposit into one tranche. That tranche's raw NAV may only go
    /// up; the counterpart's must not move at all.
    Increase(Tranche),
    /// A withdrawal from one tranche. Both raw NAVs may go down
    /// (a junior claim can pull senior-side assets); the total pulled
    /// comes out of the withdrawing tranche's effective NAV.
    Decrease(Tranche),
}

/// Reconcile an operation's raw deltas into the book.
///
/// The input state is untouched; the returned state is complete and
/// conservation-checked.
///
/// # Errors
///
/// `DisallowedRawDelta` when a delta's sign contradicts the declared
/// operation, `ArithmeticOverflow` when a withdrawal pulls more than
/// the tranche's effective NAV, `ConservationViolated` if the adjusted
/// book fails to balance.
pub fn compute(
    state: &AccountingState,
    op: TrancheOp,
    observation: RawObservation,
) -> Result<AccountingState> {
    observation.validate()?;

    let mut st = *state;
    let observed = PerTranche::new(observation.senior, observation.junior);

    match op {
        TrancheOp::Increase(tranche) => {
            let other = tranche.other();
            if observed[other] != st.raw_nav[other] {
                return Err(EngineError::DisallowedRawDelta);
            }
            if observed[tranche] < st.raw_nav[tranche] {
                return Err(EngineError::DisallowedRawDelta);
            }
            let delta = observed[tranche].try_sub(st.raw_nav[tranche])?;
            st.effective_nav[tranche] = st.effective_nav[tranche].try_add(delta)?;
            st.raw_nav[tranche] = observed[tranche];
        }
        TrancheOp::Decrease(tranche) => {
            if observed.senior > st.raw_nav.senior || observed.junior > st.raw_nav.junior {
                return Err(EngineError::DisallowedRawDelta);
            }
            let pulled_senior = st.raw_nav.senior.try_sub(observed.senior)?;
            let pulled_junior = st.raw_nav.junior.try_sub(observed.junior)?;
            let total = pulled_senior.try_add(pulled_junior)?;

            let before = st.effective_nav[tranche];
            let after = before.try_sub(total)?;

            // The departing share of the counterpart's unresolved IL
            // leaves with the withdrawer. Senior IL rounds up and
            // junior IL rounds down, so rounding always favors the
            // senior side.
            if !total.is_zero() && !before.is_zero() {
                let other = tranche.other();
                let il = st.impermanent_loss[other];
                let scaled = match other {
                    Tranche::Senior => {
                        math::mul_div_ceil(il.raw(), after.raw(), before.raw())?
                    }
                    Tranche::Junior => {
                        math::mul_div_floor(il.raw(), after.raw(), before.raw())?
                    }
                };
                st.impermanent_loss[other] = Nav::new(scaled);
            }

            st.effective_nav[tranche] = after;
            st.raw_nav = observed;
        }
    }

    let raw_total = st.total_raw()?;
    let effective_total = st.total_effective()?;
    if raw_total != effective_total {
        log::error!(
            "conservation violated after {:?}: raw {} != effective {}",
            op,
            raw_total,
            effective_total
        );
        return Err(EngineError::ConservationViolated {
            raw_total,
            effective_total,
        });
    }

    Ok(st)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(senior: u128, junior: u128) -> RawObservation {
        RawObservation::new(Nav::new(senior), Nav::new(junior))
    }

    fn seeded(raw_st: u128, raw_jt: u128) -> AccountingState {
        AccountingState {
            raw_nav: PerTranche::new(Nav::new(raw_st), Nav::new(raw_jt)),
            effective_nav: PerTranche::new(Nav::new(raw_st), Nav::new(raw_jt)),
            ..AccountingState::new()
        }
    }

    #[test]
    fn senior_deposit_credits_effective_one_for_one() {
        let st = seeded(1000, 500);
        let out = compute(&st, TrancheOp::Increase(Tranche::Senior), obs(1300, 500)).unwrap();
        assert_eq!(out.raw_nav.senior, Nav::new(1300));
        assert_eq!(out.effective_nav.senior, Nav::new(1300));
        assert_eq!(out.effective_nav.junior, Nav::new(500));
        assert!(out.conservation_holds());
    }

    #[test]
    fn deposit_with_negative_delta_rejected() {
        let st = seeded(1000, 500);
        assert_eq!(
            compute(&st, TrancheOp::Increase(Tranche::Senior), obs(900, 500)),
            Err(EngineError::DisallowedRawDelta)
        );
    }

    #[test]
    fn deposit_with_moving_counterpart_rejected() {
        let st = seeded(1000, 500);
        assert_eq!(
            compute(&st, TrancheOp::Increase(Tranche::Senior), obs(1300, 501)),
            Err(EngineError::DisallowedRawDelta)
        );
        assert_eq!(
            compute(&st, TrancheOp::Increase(Tranche::Junior), obs(999, 600)),
            Err(EngineError::DisallowedRawDelta)
        );
    }

    #[test]
    fn withdrawal_with_positive_delta_rejected() {
        let st = seeded(1000, 500);
        assert_eq!(
            compute(&st, TrancheOp::Decrease(Tranche::Junior), obs(1001, 400)),
            Err(EngineError::DisallowedRawDelta)
        );
    }

    #[test]
    fn junior_withdrawal_may_pull_both_sides() {
        // Junior effective exceeds junior raw: part of the claim sits
        // in senior-side assets.
        let st = AccountingState {
            raw_nav: PerTranche::new(Nav::new(600), Nav::new(200)),
            effective_nav: PerTranche::new(Nav::new(500), Nav::new(300)),
            ..AccountingState::new()
        };
        let out = compute(&st, TrancheOp::Decrease(Tranche::Junior), obs(550, 150)).unwrap();
        assert_eq!(out.effective_nav.junior, Nav::new(200));
        assert_eq!(out.effective_nav.senior, Nav::new(500));
        assert_eq!(out.raw_nav, PerTranche::new(Nav::new(550), Nav::new(150)));
        assert!(out.conservation_holds());
    }

    #[test]
    fn withdrawal_beyond_effective_value_fails() {
        let st = AccountingState {
            raw_nav: PerTranche::new(Nav::new(600), Nav::new(200)),
            effective_nav: PerTranche::new(Nav::new(700), Nav::new(100)),
            ..AccountingState::new()
        };
        // Pulling 150 against 100 of junior effective value.
        assert_eq!(
            compute(&st, TrancheOp::Decrease(Tranche::Junior), obs(500, 150)),
            Err(EngineError::ArithmeticOverflow)
        );
    }

    #[test]
    fn senior_withdrawal_rescales_junior_il_rounding_down() {
        let st = AccountingState {
            raw_nav: PerTranche::new(Nav::new(110), Nav::new(200)),
            effective_nav: PerTranche::new(Nav::new(310), Nav::ZERO),
            impermanent_loss: PerTranche::new(Nav::new(190), Nav::new(390)),
            ..AccountingState::new()
        };
        let out = compute(&st, TrancheOp::Decrease(Tranche::Senior), obs(10, 200)).unwrap();
        assert_eq!(out.effective_nav.senior, Nav::new(210));
        // 390 * 210 / 310 = 264.19..., floored.
        assert_eq!(out.impermanent_loss.junior, Nav::new(264));
        assert_eq!(out.impermanent_loss.senior, Nav::new(190));
        assert!(out.conservation_holds());
    }

    #[test]
    fn junior_withdrawal_rescales_senior_il_rounding_up() {
        let st = AccountingState {
            raw_nav: PerTranche::new(Nav::new(110), Nav::new(350)),
            effective_nav: PerTranche::new(Nav::new(310), Nav::new(150)),
            impermanent_loss: PerTranche::new(Nav::new(190), Nav::new(390)),
            ..AccountingState::new()
        };
        let out = compute(&st, TrancheOp::Decrease(Tranche::Junior), obs(110, 300)).unwrap();
        assert_eq!(out.effective_nav.junior, Nav::new(100));
        // 190 * 100 / 150 = 126.67..., ceiled.
        assert_eq!(out.impermanent_loss.senior, Nav::new(127));
        assert_eq!(out.impermanent_loss.junior, Nav::new(390));
        assert!(out.conservation_holds());
    }

    #[test]
    fn zero_delta_operations_are_noops() {
        let st = seeded(1000, 500);
        let inc = compute(&st, TrancheOp::Increase(Tranche::Junior), obs(1000, 500)).unwrap();
        assert_eq!(inc, st);
        let dec = compute(&st, TrancheOp::Decrease(Tranche::Senior), obs(1000, 500)).unwrap();
        assert_eq!(dec, st);
    }

    #[test]
    fn full_withdrawal_empties_the_tranche() {
        let st = seeded(1000, 500);
        let out = compute(&st, TrancheOp::Decrease(Tranche::Junior), obs(1000, 0)).unwrap();
        assert_eq!(out.effective_nav.junior, Nav::ZERO);
        assert_eq!(out.raw_nav.junior, Nav::ZERO);
        assert!(out.conservation_holds());
    }
}

// ═══════════════════════════════════════════════════════════════
// KANI FORMAL VERIFICATION PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    fn bounded_state() -> AccountingState {
        let raw_st: u128 = kani::any();
        let raw_jt: u128 = kani::any();
        let eff_st: u128 = kani::any();
        let il_st: u128 = kani::any();
        let il_jt: u128 = kani::any();

        kani::assume(raw_st <= 1_000_000 && raw_jt <= 1_000_000);
        kani::assume(eff_st <= raw_st + raw_jt);
        let eff_jt = raw_st + raw_jt - eff_st;
        kani::assume(il_st <= 1_000_000 && il_jt <= 1_000_000);

        AccountingState {
            raw_nav: PerTranche::new(Nav::new(raw_st), Nav::new(raw_jt)),
            effective_nav: PerTranche::new(Nav::new(eff_st), Nav::new(eff_jt)),
            impermanent_loss: PerTranche::new(Nav::new(il_st), Nav::new(il_jt)),
            ..AccountingState::new()
        }
    }

    /// P1: a successful increase conserves value exactly.
    #[kani::proof]
    #[kani::unwind(3)]
    fn p1_increase_conserves() {
        let st = bounded_state();
        let delta: u128 = kani::any();
        kani::assume(delta <= 1_000_000);

        let observation = RawObservation::new(
            Nav::new(st.raw_nav.senior.raw() + delta),
            st.raw_nav.junior,
        );
        if let Ok(next) = compute(&st, TrancheOp::Increase(Tranche::Senior), observation) {
            assert!(next.conservation_holds(), "P1: conservation after deposit");
            assert!(
                next.effective_nav.senior.raw() == st.effective_nav.senior.raw() + delta,
                "P1: deposit credits exactly delta"
            );
        }
    }

    /// P2: a successful decrease conserves value and never grows the
    /// counterpart's impermanent loss.
    #[kani::proof]
    #[kani::unwind(3)]
    fn p2_decrease_conserves_and_shrinks_il() {
        let st = bounded_state();
        let pull_st: u128 = kani::any();
        let pull_jt: u128 = kani::any();
        kani::assume(pull_st <= st.raw_nav.senior.raw());
        kani::assume(pull_jt <= st.raw_nav.junior.raw());

        let observation = RawObservation::new(
            Nav::new(st.raw_nav.senior.raw() - pull_st),
            Nav::new(st.raw_nav.junior.raw() - pull_jt),
        );
        if let Ok(next) = compute(&st, TrancheOp::Decrease(Tranche::Junior), observation) {
            assert!(next.conservation_holds(), "P2: conservation after withdrawal");
            assert!(
                next.impermanent_loss.senior <= st.impermanent_loss.senior,
                "P2: counterpart IL never grows"
            );
        }
    }
}
