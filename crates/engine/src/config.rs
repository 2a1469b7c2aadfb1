//! Market configuration and validation.

use crate::error::{EngineError, Result};
use crate::math::{self, FRAC_ONE, MAX_BETA};
use crate::units::Frac;

/// Smallest accepted coverage fraction (0.1%).
pub const MIN_COVERAGE: Frac = Frac::new(FRAC_ONE / 1000);

/// Largest accepted protocol fee fraction (50%).
pub const MAX_PROTOCOL_FEE: Frac = Frac::new(FRAC_ONE / 2);

/// Immutable-per-epoch parameters of a market.
///
/// Every setter on a market revalidates the whole record before
/// committing, so a constructed-and-validated `MarketConfig` is always
/// internally consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarketConfig {
    /// Fraction of risk-weighted exposure the junior tranche must hold
    /// as cover. Strictly inside `[MIN_COVERAGE, 1)`.
    pub coverage: Frac,
    /// Risk multiplier on junior raw NAV when computing exposure. May
    /// exceed 1, capped at `MAX_BETA`, and `beta * coverage` must stay
    /// below 1.
    pub beta: Frac,
    /// Liquidation LTV threshold. Strictly between the maximum
    /// theoretical initial LTV and 1.
    pub lltv: Frac,
    /// Length of a recovery window in seconds. Zero disables the
    /// RECOVERY state entirely.
    pub fixed_term_secs: u64,
    /// Protocol fee on senior yield portions.
    pub senior_fee: Frac,
    /// Protocol fee on junior gain and yield portions.
    pub junior_fee: Frac,
}

impl MarketConfig {
    /// The largest LTV a freshly funded market can open at while still
    /// meeting its coverage requirement with equality:
    ///
    /// `(1 - beta * coverage) / (1 + coverage - beta * coverage)`
    ///
    /// The product term rounds down and the final division rounds up.
    /// Both biases enlarge the result, so an `lltv` that clears this
    /// bound clears the exact real-valued bound too.
    pub fn max_initial_ltv(&self) -> Result<Frac> {
        let bc = self.beta.mul_floor(self.coverage)?.clamp_to_one();
        let numerator = FRAC_ONE - bc.raw();
        let denominator = FRAC_ONE
            .checked_add(self.coverage.raw())
            .ok_or(EngineError::ArithmeticOverflow)?
            - bc.raw();
        math::mul_div_ceil(numerator, FRAC_ONE, denominator).map(Frac::new)
    }

    /// Check every parameter against its legal range.
    pub fn validate(&self) -> Result<()> {
        if self.coverage < MIN_COVERAGE || self.coverage >= Frac::ONE {
            return Err(EngineError::CoverageOutOfRange);
        }
        if self.beta.raw() > MAX_BETA {
            return Err(EngineError::BetaOutOfRange);
        }
        // The risk-weighted cover on the junior side must stay under
        // 100% of junior value or the market could never be funded.
        let bc_hi = self.beta.mul_ceil(self.coverage)?;
        if bc_hi >= Frac::ONE {
            return Err(EngineError::BetaOutOfRange);
        }
        let floor_ltv = self.max_initial_ltv()?;
        if self.lltv <= floor_ltv || self.lltv >= Frac::ONE {
            return Err(EngineError::LltvOutOfRange);
        }
        if self.senior_fee > MAX_PROTOCOL_FEE || self.junior_fee > MAX_PROTOCOL_FEE {
            return Err(EngineError::FeeAboveCap);
        }
        Ok(())
    }
}
