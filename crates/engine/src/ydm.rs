//! Yield distribution models.
//!
//! A model answers one question: what fraction of senior upside does
//! the junior tranche earn right now, given the current book. The
//! engine samples the answer on every synchronization, accumulates it
//! time-weighted, and applies the period average when senior yield is
//! actually distributed. Models are pure; anything above 1.0 is
//! clamped by the engine.

use crate::coverage;
use crate::error::Result;
use crate::units::{Frac, Nav};

/// Book snapshot handed to a model on each sample.
#[derive(Debug, Clone, Copy)]
pub struct YdmInputs {
    pub raw_senior: Nav,
    pub raw_junior: Nav,
    pub beta: Frac,
    pub coverage: Frac,
    pub junior_effective: Nav,
}

/// Pluggable junior yield-share policy.
pub trait YieldDistributionModel: Send + Sync {
    /// The instantaneous junior share of senior upside, WAD-scaled.
    fn instantaneous_junior_share(&self, inputs: &YdmInputs) -> Result<Frac>;
}

/// A constant junior share, independent of the book.
#[derive(Debug, Clone, Copy)]
pub struct FlatYieldShare {
    share: Frac,
}

impl FlatYieldShare {
    pub fn new(share: Frac) -> Self {
        FlatYieldShare { share }
    }
}

impl YieldDistributionModel for FlatYieldShare {
    fn instantaneous_junior_share(&self, _inputs: &YdmInputs) -> Result<Frac> {
        Ok(self.share)
    }
}

/// A share that grows with coverage utilization: the harder the junior
/// tranche is working, the more of the upside it earns.
///
/// `share(u) = min(max, base + slope * min(u, kink))`
#[derive(Debug, Clone, Copy)]
pub struct UtilizationCurve {
    pub base: Frac,
    pub slope: Frac,
    pub kink: Frac,
    pub max: Frac,
}

impl YieldDistributionModel for UtilizationCurve {
    fn instantaneous_junior_share(&self, inputs: &YdmInputs) -> Result<Frac> {
        let util = coverage::utilization_for(
            inputs.raw_senior,
            inputs.raw_junior,
            inputs.beta,
            inputs.coverage,
            inputs.junior_effective,
        )?;
        let capped = if util > self.kink { self.kink } else { util };
        let share = self.slope.mul_floor(capped)?.try_add(self.base)?;
        Ok(share.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_ONE;

    fn inputs(raw_st: u128, raw_jt: u128, eff_jt: u128) -> YdmInputs {
        YdmInputs {
            raw_senior: Nav::new(raw_st),
            raw_junior: Nav::new(raw_jt),
            beta: Frac::ONE,
            coverage: Frac::new(FRAC_ONE / 2),
            junior_effective: Nav::new(eff_jt),
        }
    }

    #[test]
    fn flat_share_ignores_the_book() {
        let model = FlatYieldShare::new(Frac::new(FRAC_ONE / 4));
        let a = model.instantaneous_junior_share(&inputs(0, 0, 0)).unwrap();
        let b = model
            .instantaneous_junior_share(&inputs(1000, 500, 750))
            .unwrap();
        assert_eq!(a, Frac::new(FRAC_ONE / 4));
        assert_eq!(a, b);
    }

    #[test]
    fn curve_grows_with_utilization() {
        let model = UtilizationCurve {
            base: Frac::new(FRAC_ONE / 10),
            slope: Frac::new(FRAC_ONE / 2),
            kink: Frac::ONE,
            max: Frac::new(FRAC_ONE * 8 / 10),
        };
        // Empty book: share is the base.
        let idle = model.instantaneous_junior_share(&inputs(0, 0, 0)).unwrap();
        assert_eq!(idle, Frac::new(FRAC_ONE / 10));

        // Fully utilized: base + slope * 1 = 0.6.
        let busy = model
            .instantaneous_junior_share(&inputs(100, 100, 100))
            .unwrap();
        assert_eq!(busy, Frac::new(FRAC_ONE * 6 / 10));
    }

    #[test]
    fn curve_caps_at_max() {
        let model = UtilizationCurve {
            base: Frac::new(FRAC_ONE / 2),
            slope: Frac::ONE,
            kink: Frac::ONE,
            max: Frac::new(FRAC_ONE * 7 / 10),
        };
        let busy = model
            .instantaneous_junior_share(&inputs(100, 100, 100))
            .unwrap();
        assert_eq!(busy, Frac::new(FRAC_ONE * 7 / 10));
    }

    #[test]
    fn curve_kink_flattens_above_threshold() {
        let model = UtilizationCurve {
            base: Frac::ZERO,
            slope: Frac::ONE,
            kink: Frac::new(FRAC_ONE / 2),
            max: Frac::ONE,
        };
        // Utilization saturates with no cover, but the kink caps the
        // share contribution at 0.5.
        let uncovered = model
            .instantaneous_junior_share(&inputs(100, 0, 0))
            .unwrap();
        assert_eq!(uncovered, Frac::new(FRAC_ONE / 2));
    }
}
