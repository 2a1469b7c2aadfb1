//! Fixed-point math utilities.
//!
//! All NAV quantities are `u128` integers and all fractions are
//! WAD-scaled (`FRAC_ONE` = 1e18). Arithmetic is checked: anything
//! that could wrap returns `ArithmeticOverflow` instead.
//!
//! The domain bounds below are chosen so that every product the engine
//! forms fits in `u128` without a wide-integer type:
//!
//! * raw NAV per tranche is capped at `MAX_NAV` = 1e19, so a two-tranche
//!   total is at most 2e19;
//! * beta is capped at `MAX_BETA` = 4e18 (4.0);
//! * the largest product formed is `total_nav * MAX_BETA` ~ 8e37,
//!   comfortably below `u128::MAX` ~ 3.4e38.

use crate::error::{EngineError, Result};

/// Fixed-point scale for fractions (18 decimals).
pub const FRAC_ONE: u128 = 1_000_000_000_000_000_000;

/// Upper bound on a single raw NAV observation.
pub const MAX_NAV: u128 = 10_000_000_000_000_000_000;

/// Upper bound on the junior risk multiplier beta (4.0, WAD-scaled).
pub const MAX_BETA: u128 = 4_000_000_000_000_000_000;

/// `floor(a * b / denom)` with checked intermediate product.
#[inline]
pub fn mul_div_floor(a: u128, b: u128, denom: u128) -> Result<u128> {
    if denom == 0 {
        return Err(EngineError::ArithmeticOverflow);
    }
    let prod = a.checked_mul(b).ok_or(EngineError::ArithmeticOverflow)?;
    Ok(prod / denom)
}

/// `ceil(a * b / denom)` with checked intermediate product.
#[inline]
pub fn mul_div_ceil(a: u128, b: u128, denom: u128) -> Result<u128> {
    if denom == 0 {
        return Err(EngineError::ArithmeticOverflow);
    }
    let prod = a.checked_mul(b).ok_or(EngineError::ArithmeticOverflow)?;
    let adjusted = prod
        .checked_add(denom - 1)
        .ok_or(EngineError::ArithmeticOverflow)?;
    Ok(adjusted / denom)
}

/// `floor(amount * frac / FRAC_ONE)`: take a WAD fraction of an amount,
/// rounding down.
#[inline]
pub fn frac_floor(amount: u128, frac: u128) -> Result<u128> {
    mul_div_floor(amount, frac, FRAC_ONE)
}

/// `ceil(amount * frac / FRAC_ONE)`: take a WAD fraction of an amount,
/// rounding up.
#[inline]
pub fn frac_ceil(amount: u128, frac: u128) -> Result<u128> {
    mul_div_ceil(amount, frac, FRAC_ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_and_ceil_agree_on_exact_division() {
        assert_eq!(mul_div_floor(10, 6, 3).unwrap(), 20);
        assert_eq!(mul_div_ceil(10, 6, 3).unwrap(), 20);
    }

    #[test]
    fn ceil_rounds_up_inexact_division() {
        assert_eq!(mul_div_floor(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_ceil(10, 1, 3).unwrap(), 4);
    }

    #[test]
    fn zero_denominator_is_an_error() {
        assert_eq!(
            mul_div_floor(1, 1, 0),
            Err(EngineError::ArithmeticOverflow)
        );
        assert_eq!(mul_div_ceil(1, 1, 0), Err(EngineError::ArithmeticOverflow));
    }

    #[test]
    fn overflowing_product_is_an_error() {
        assert_eq!(
            mul_div_floor(u128::MAX, 2, 1),
            Err(EngineError::ArithmeticOverflow)
        );
    }

    #[test]
    fn frac_helpers_scale_by_wad() {
        // 25% of 1000
        let quarter = FRAC_ONE / 4;
        assert_eq!(frac_floor(1000, quarter).unwrap(), 250);
        assert_eq!(frac_ceil(1000, quarter).unwrap(), 250);
        // 1/3 of 100 rounds differently per mode
        let third = FRAC_ONE / 3;
        assert_eq!(frac_floor(100, third).unwrap(), 33);
        assert_eq!(frac_ceil(100, third).unwrap(), 34);
    }

    #[test]
    fn domain_bounds_keep_products_in_u128() {
        // Largest exposure product the engine forms.
        let total = 2 * MAX_NAV;
        assert!(total.checked_mul(MAX_BETA).is_some());
        assert!(total.checked_mul(FRAC_ONE).is_some());
    }
}

// ═══════════════════════════════════════════════════════════════
// KANI FORMAL VERIFICATION PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// M1: ceil >= floor, and they differ by at most 1.
    #[kani::proof]
    #[kani::unwind(3)]
    fn m1_rounding_modes() {
        let a: u128 = kani::any();
        let b: u128 = kani::any();
        let d: u128 = kani::any();

        kani::assume(d > 0 && d <= 2 * MAX_NAV);
        kani::assume(a <= MAX_NAV && b <= MAX_BETA);

        let floor = mul_div_floor(a, b, d).unwrap();
        let ceil = mul_div_ceil(a, b, d).unwrap();

        assert!(ceil >= floor, "M1: ceil must be >= floor");
        assert!(ceil - floor <= 1, "M1: ceil and floor differ by at most 1");
        if (a * b) % d == 0 {
            assert!(ceil == floor, "M1: exact division has ceil == floor");
        }
    }

    /// M2: taking a fraction <= 1 never grows the amount.
    #[kani::proof]
    #[kani::unwind(3)]
    fn m2_frac_of_amount_bounded() {
        let amount: u128 = kani::any();
        let frac: u128 = kani::any();

        kani::assume(amount <= 2 * MAX_NAV);
        kani::assume(frac <= FRAC_ONE);

        let floor = frac_floor(amount, frac).unwrap();
        let ceil = frac_ceil(amount, frac).unwrap();

        assert!(floor <= amount, "M2: floor fraction bounded by amount");
        assert!(ceil <= amount, "M2: ceil fraction bounded by amount");
    }

    /// M3: bounded inputs never overflow the intermediate product.
    #[kani::proof]
    #[kani::unwind(3)]
    fn m3_bounded_products_fit() {
        let amount: u128 = kani::any();
        let frac: u128 = kani::any();

        kani::assume(amount <= 2 * MAX_NAV);
        kani::assume(frac <= MAX_BETA);

        assert!(frac_floor(amount, frac).is_ok(), "M3: product must fit u128");
    }
}
