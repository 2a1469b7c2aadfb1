//! Coverage requirement, utilization, and closed-form operation sizing.
//!
//! The junior tranche must hold effective value against the market's
//! risk-weighted exposure:
//!
//! `(rawST + rawJT * beta) * coverage <= jtEffectiveNAV`
//!
//! Rounding always favors the requirement: exposure and the required
//! cover round up, sizing answers round down.

use crate::config::MarketConfig;
use crate::error::{EngineError, Result};
use crate::math::{self, FRAC_ONE, MAX_NAV};
use crate::state::AccountingState;
use crate::units::{Frac, Nav};

/// Risk-weighted exposure `rawST + ceil(rawJT * beta)`.
fn exposure(raw_senior: Nav, raw_junior: Nav, beta: Frac) -> Result<u128> {
    let junior_weighted = math::frac_ceil(raw_junior.raw(), beta.raw())?;
    raw_senior
        .raw()
        .checked_add(junior_weighted)
        .ok_or(EngineError::ArithmeticOverflow)
}

/// The junior effective value required to cover the given raw book.
pub fn required_cover(
    raw_senior: Nav,
    raw_junior: Nav,
    beta: Frac,
    coverage: Frac,
) -> Result<Nav> {
    let exposure = exposure(raw_senior, raw_junior, beta)?;
    math::frac_ceil(exposure, coverage.raw()).map(Nav::new)
}

/// Whether the market currently satisfies its coverage requirement.
pub fn is_covered(state: &AccountingState, config: &MarketConfig) -> Result<bool> {
    let required = required_cover(
        state.raw_nav.senior,
        state.raw_nav.junior,
        config.beta,
        config.coverage,
    )?;
    Ok(required <= state.effective_nav.junior)
}

/// Coverage utilization from raw book components: required cover over
/// junior effective value, ceil-rounded. Saturates to `Frac::MAX` when
/// the junior side holds nothing against a non-zero requirement.
///
/// `utilization <= 1` holds exactly when [`is_covered`] returns true.
pub fn utilization_for(
    raw_senior: Nav,
    raw_junior: Nav,
    beta: Frac,
    coverage: Frac,
    junior_effective: Nav,
) -> Result<Frac> {
    let exposure = exposure(raw_senior, raw_junior, beta)?;
    if exposure == 0 {
        return Ok(Frac::ZERO);
    }
    if junior_effective.is_zero() {
        return Ok(Frac::MAX);
    }
    let util = math::mul_div_ceil(exposure, coverage.raw(), junior_effective.raw())?;
    Ok(Frac::new(util))
}

/// Current coverage utilization of a market.
pub fn utilization(state: &AccountingState, config: &MarketConfig) -> Result<Frac> {
    utilization_for(
        state.raw_nav.senior,
        state.raw_nav.junior,
        config.beta,
        config.coverage,
        state.effective_nav.junior,
    )
}

/// The largest senior deposit the coverage bound admits, exact to the
/// unit: depositing the returned amount keeps the market covered,
/// depositing one unit more does not.
///
/// A senior deposit raises `rawST` (and `effST`) without touching the
/// junior side, so the bound inverts to
/// `X <= floor(jtEff / coverage) - rawST - ceil(rawJT * beta)`.
/// The answer is additionally capped at the observation bound
/// `MAX_NAV - rawST`.
pub fn max_senior_deposit(state: &AccountingState, config: &MarketConfig) -> Result<Nav> {
    let budget = math::mul_div_floor(
        state.effective_nav.junior.raw(),
        FRAC_ONE,
        config.coverage.raw(),
    )?;
    let exposure = exposure(state.raw_nav.senior, state.raw_nav.junior, config.beta)?;
    let room = budget.saturating_sub(exposure);
    let observable = MAX_NAV.saturating_sub(state.raw_nav.senior.raw());
    Ok(Nav::new(room.min(observable)))
}

/// How a junior redemption's pulls split across the raw books.
///
/// Junior effective value lives first in junior-side raw assets; any
/// excess is owed out of the senior-side book. Conservation guarantees
/// the excess never exceeds `rawST`.
pub fn junior_claim_split(state: &AccountingState) -> (Nav, Nav) {
    let junior_side = state.effective_nav.junior.min(state.raw_nav.junior);
    let senior_side = state.effective_nav.junior.saturating_sub(state.raw_nav.junior);
    (senior_side, junior_side)
}

/// The largest junior withdrawal the coverage bound admits, assuming
/// the redemption pulls raw assets pro-rata to the claim split.
///
/// Each withdrawn unit removes one unit of cover and relieves
/// `k = (s + j * beta) * coverage` units of requirement, where `s` and
/// `j` are the claim-mix weights. `beta * coverage < 1` makes `k < 1`,
/// so the binding constraint is `W * (1 - k) <= jtEff - required`.
/// A small fixed margin absorbs the per-unit rounding of an actual
/// redemption, keeping the answer safe rather than exact.
pub fn max_junior_withdrawal(state: &AccountingState, config: &MarketConfig) -> Result<Nav> {
    let required = required_cover(
        state.raw_nav.senior,
        state.raw_nav.junior,
        config.beta,
        config.coverage,
    )?;
    let junior_effective = state.effective_nav.junior;
    let headroom = junior_effective.saturating_sub(required);
    if headroom.is_zero() {
        return Ok(Nav::ZERO);
    }

    let weighted_unit = FRAC_ONE
        .checked_add(config.beta.raw())
        .ok_or(EngineError::ArithmeticOverflow)?;
    let margin = math::mul_div_ceil(weighted_unit, config.coverage.raw(), FRAC_ONE)? + 2;
    let usable = headroom.saturating_sub(Nav::new(margin));
    if usable.is_zero() {
        return Ok(Nav::ZERO);
    }

    let (senior_side, junior_side) = junior_claim_split(state);
    let inner = senior_side
        .raw()
        .checked_mul(FRAC_ONE)
        .and_then(|lhs| {
            junior_side
                .raw()
                .checked_mul(config.beta.raw())
                .and_then(|rhs| lhs.checked_add(rhs))
        })
        .ok_or(EngineError::ArithmeticOverflow)?;
    // headroom > 0 implies junior_effective > 0.
    let per_unit = inner / junior_effective.raw();
    let relief = math::frac_floor(per_unit, config.coverage.raw())?;
    let withdrawal = math::mul_div_floor(usable.raw(), FRAC_ONE, FRAC_ONE - relief)?;
    Ok(Nav::new(withdrawal).min(junior_effective))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PerTranche;

    fn config() -> MarketConfig {
        MarketConfig {
            coverage: Frac::new(FRAC_ONE / 2),
            beta: Frac::ONE,
            lltv: Frac::new(FRAC_ONE * 9 / 10),
            fixed_term_secs: 0,
            senior_fee: Frac::ZERO,
            junior_fee: Frac::ZERO,
        }
    }

    fn state(raw_st: u128, raw_jt: u128, eff_st: u128, eff_jt: u128) -> AccountingState {
        AccountingState {
            raw_nav: PerTranche::new(Nav::new(raw_st), Nav::new(raw_jt)),
            effective_nav: PerTranche::new(Nav::new(eff_st), Nav::new(eff_jt)),
            ..AccountingState::new()
        }
    }

    #[test]
    fn required_cover_rounds_up() {
        // (100 + 100) * 0.5 = 100 exactly.
        let req = required_cover(
            Nav::new(100),
            Nav::new(100),
            Frac::ONE,
            Frac::new(FRAC_ONE / 2),
        )
        .unwrap();
        assert_eq!(req, Nav::new(100));

        // (101 + 0) * 0.5 = 50.5, required is 51.
        let req = required_cover(
            Nav::new(101),
            Nav::ZERO,
            Frac::ONE,
            Frac::new(FRAC_ONE / 2),
        )
        .unwrap();
        assert_eq!(req, Nav::new(51));
    }

    #[test]
    fn utilization_matches_coverage_predicate() {
        let cfg = config();
        // Exactly at the bound: (100 + 100) * 0.5 = 100 = effJT.
        let st = state(100, 100, 100, 100);
        assert!(is_covered(&st, &cfg).unwrap());
        assert_eq!(utilization(&st, &cfg).unwrap(), Frac::ONE);

        // One unit of cover short.
        let st = state(100, 100, 101, 99);
        assert!(!is_covered(&st, &cfg).unwrap());
        assert!(utilization(&st, &cfg).unwrap() > Frac::ONE);
    }

    #[test]
    fn utilization_empty_book_is_zero() {
        let cfg = config();
        let st = state(0, 0, 0, 0);
        assert_eq!(utilization(&st, &cfg).unwrap(), Frac::ZERO);
        assert!(is_covered(&st, &cfg).unwrap());
    }

    #[test]
    fn utilization_saturates_without_cover() {
        let cfg = config();
        let st = state(100, 0, 100, 0);
        assert_eq!(utilization(&st, &cfg).unwrap(), Frac::MAX);
        assert!(!is_covered(&st, &cfg).unwrap());
    }

    #[test]
    fn max_senior_deposit_is_exact() {
        let cfg = config();
        // effJT 100 at coverage 0.5 budgets 200 of exposure; the book
        // already carries 100 + 50 = 150.
        let st = state(100, 50, 50, 100);
        let max = max_senior_deposit(&st, &cfg).unwrap();
        assert_eq!(max, Nav::new(50));

        // Depositing exactly max keeps the bound.
        let mut after = st;
        after.raw_nav.senior = after.raw_nav.senior.try_add(max).unwrap();
        after.effective_nav.senior = after.effective_nav.senior.try_add(max).unwrap();
        assert!(is_covered(&after, &cfg).unwrap());

        // One more unit breaks it.
        after.raw_nav.senior = after.raw_nav.senior.try_add(Nav::new(1)).unwrap();
        after.effective_nav.senior = after.effective_nav.senior.try_add(Nav::new(1)).unwrap();
        assert!(!is_covered(&after, &cfg).unwrap());
    }

    #[test]
    fn max_senior_deposit_zero_when_over() {
        let cfg = config();
        let st = state(300, 50, 250, 100);
        assert_eq!(max_senior_deposit(&st, &cfg).unwrap(), Nav::ZERO);
    }

    #[test]
    fn claim_split_prefers_junior_side_assets() {
        // effJT fits inside rawJT: everything pulls junior-side.
        let st = state(100, 200, 250, 50);
        assert_eq!(junior_claim_split(&st), (Nav::ZERO, Nav::new(50)));

        // effJT exceeds rawJT: the excess is owed out of rawST.
        let st = state(200, 40, 140, 100);
        assert_eq!(junior_claim_split(&st), (Nav::new(60), Nav::new(40)));
    }

    #[test]
    fn max_junior_withdrawal_safe_under_redemption() {
        let cfg = config();
        let st = state(100, 400, 100, 400);
        let max = max_junior_withdrawal(&st, &cfg).unwrap();
        assert!(!max.is_zero());

        // Redeem max with pro-rata pulls and re-check the bound.
        let (senior_side, junior_side) = junior_claim_split(&st);
        let junior_pull = math::mul_div_floor(
            max.raw(),
            junior_side.raw(),
            st.effective_nav.junior.raw(),
        )
        .unwrap();
        let senior_pull = max.raw() - junior_pull;
        assert!(senior_pull <= senior_side.raw());

        let mut after = st;
        after.raw_nav.junior = Nav::new(after.raw_nav.junior.raw() - junior_pull);
        after.raw_nav.senior = Nav::new(after.raw_nav.senior.raw() - senior_pull);
        after.effective_nav.junior = after.effective_nav.junior.try_sub(max).unwrap();
        assert!(is_covered(&after, &cfg).unwrap());
    }

    #[test]
    fn max_junior_withdrawal_zero_at_bound() {
        let cfg = config();
        // Exactly at the bound: no headroom at all.
        let st = state(100, 100, 100, 100);
        assert_eq!(max_junior_withdrawal(&st, &cfg).unwrap(), Nav::ZERO);
    }
}
