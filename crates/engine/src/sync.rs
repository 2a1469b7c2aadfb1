//! The synchronization waterfall.
//!
//! A synchronization reconciles freshly observed raw NAV against the
//! last recorded book, attributing every unit of loss and gain across
//! the two tranches in a fixed order:
//!
//! 1. settle the period start (recovery-window expiry, forgiveness);
//! 2. split the raw deltas per tranche into loss or gain;
//! 3. apply the junior side: losses burn the junior buffer first and
//!    only then spill into senior effective value (tracked as senior
//!    impermanent loss); gains repay senior impermanent loss before
//!    the junior side keeps anything;
//! 4. apply the senior side: losses are covered by the junior buffer
//!    (tracked as junior impermanent loss) and only the uncovered rest
//!    hits senior value; gains repay senior impermanent loss, then
//!    junior impermanent loss, and only the remainder is distributed
//!    as yield using the time-weighted average junior share;
//! 5. resolve the HEALTHY/RECOVERY state machine;
//! 6. verify exact conservation before anything is returned.
//!
//! Everything here is pure: the caller owns the state record and
//! decides whether to commit the returned copy. A failed transition
//! therefore never leaves a partially updated book behind.

use crate::config::MarketConfig;
use crate::error::{EngineError, Result};
use crate::math::FRAC_ONE;
use crate::state::{AccountingState, MarketState, PerTranche};
use crate::units::{Frac, Nav};
use crate::ydm::{YdmInputs, YieldDistributionModel};

/// Raw NAV per tranche as observed at the investment venues, already
/// converted into the engine's NAV unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawObservation {
    pub senior: Nav,
    pub junior: Nav,
}

impl RawObservation {
    pub fn new(senior: Nav, junior: Nav) -> Self {
        RawObservation { senior, junior }
    }

    /// Observations above `MAX_NAV` are rejected before any arithmetic
    /// runs; the overflow analysis of the whole engine depends on this
    /// bound.
    pub fn validate(&self) -> Result<()> {
        if self.senior.raw() > crate::math::MAX_NAV || self.junior.raw() > crate::math::MAX_NAV {
            return Err(EngineError::NavBoundExceeded);
        }
        Ok(())
    }
}

/// Protocol fees recorded by one synchronization.
///
/// Fees are notional bookkeeping for the caller: the underlying value
/// stays inside the tranches' effective NAV, which is what keeps
/// conservation exact. Moving fees out is a separate post-op concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeeDeltas {
    pub senior: Nav,
    pub junior: Nav,
}

impl FeeDeltas {
    pub fn is_zero(&self) -> bool {
        self.senior.is_zero() && self.junior.is_zero()
    }
}

/// Per-step attribution of one waterfall run. Useful for logging,
/// display, and asserting ordering in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaterfallTrace {
    /// Junior impermanent loss wiped by a recovery window expiring.
    pub recovery_forgiven: Nav,
    /// Junior loss absorbed by the junior buffer.
    pub junior_loss_absorbed: Nav,
    /// Junior loss that spilled into senior effective value.
    pub junior_loss_to_senior: Nav,
    /// Junior gain used to repay senior impermanent loss.
    pub junior_gain_repaid_senior_il: Nav,
    /// Junior gain retained by the junior tranche.
    pub junior_gain_retained: Nav,
    /// Senior loss covered by the junior buffer.
    pub senior_loss_covered: Nav,
    /// Senior loss the junior buffer could not cover.
    pub senior_loss_uncovered: Nav,
    /// Senior gain used to repay senior impermanent loss.
    pub senior_gain_repaid_senior_il: Nav,
    /// Senior gain used to repay junior impermanent loss.
    pub senior_gain_repaid_junior_il: Nav,
    /// Senior yield kept by the senior tranche.
    pub yield_to_senior: Nav,
    /// Senior yield shared with the junior tranche.
    pub yield_to_junior: Nav,
}

/// Result of one synchronization: the next state plus attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncOutcome {
    pub state: AccountingState,
    pub fees: FeeDeltas,
    pub trace: WaterfallTrace,
}

/// Advance the time-weighted junior yield-share accumulator to `now`.
///
/// The instantaneous share is sampled from the model against the new
/// observation, clamped into `[0, 1]`, and weighted by the elapsed
/// seconds since the last accrual. Returns the accumulator value the
/// transition should carry; the caller passes it to [`compute`].
pub fn accrued_yield_share(
    state: &AccountingState,
    config: &MarketConfig,
    model: &dyn YieldDistributionModel,
    observation: RawObservation,
    now: u64,
) -> Result<u128> {
    let elapsed = now.saturating_sub(state.last_accrual_ts);
    if elapsed == 0 {
        return Ok(state.yield_share_acc);
    }
    let inputs = YdmInputs {
        raw_senior: observation.senior,
        raw_junior: observation.junior,
        beta: config.beta,
        coverage: config.coverage,
        junior_effective: state.effective_nav.junior,
    };
    let share = model.instantaneous_junior_share(&inputs)?.clamp_to_one();
    let weighted = share
        .raw()
        .checked_mul(elapsed as u128)
        .ok_or(EngineError::ArithmeticOverflow)?;
    state
        .yield_share_acc
        .checked_add(weighted)
        .ok_or(EngineError::ArithmeticOverflow)
}

/// Run the waterfall against `observation` at time `now`.
///
/// `accrued_share` is the accumulator value as of `now`, normally
/// produced by [`accrued_yield_share`]. The input state is not
/// modified; the returned state is a complete, conservation-checked
/// replacement.
///
/// # Errors
///
/// `NavBoundExceeded` for out-of-range observations, `ArithmeticOverflow`
/// if any checked step fails, `ConservationViolated` if the resulting
/// book does not balance to the unit. In every case the caller's state
/// is untouched.
pub fn compute(
    state: &AccountingState,
    config: &MarketConfig,
    observation: RawObservation,
    accrued_share: u128,
    now: u64,
) -> Result<SyncOutcome> {
    observation.validate()?;

    let mut st = *state;
    let mut fees = FeeDeltas::default();
    let mut trace = WaterfallTrace::default();

    // Step 1: settle the period start. A recovery window that has run
    // its course forgives the junior impermanent loss accrued while
    // the senior side was being protected.
    if st.market_state == MarketState::Recovery
        && config.fixed_term_secs > 0
        && now >= st.recovery_end_ts
    {
        trace.recovery_forgiven = st.impermanent_loss.junior;
        st.impermanent_loss.junior = Nav::ZERO;
        st.market_state = MarketState::Healthy;
    }
    if config.fixed_term_secs == 0 {
        st.market_state = MarketState::Healthy;
    }

    st.yield_share_acc = accrued_share;
    st.last_accrual_ts = now;

    // Steps 2 and 3: the junior side settles first so its buffer state
    // is final before senior losses draw on it.
    if observation.junior < st.raw_nav.junior {
        let loss = st.raw_nav.junior.try_sub(observation.junior)?;
        let absorbed = loss.min(st.effective_nav.junior);
        st.effective_nav.junior = st.effective_nav.junior.try_sub(absorbed)?;
        let residual = loss.try_sub(absorbed)?;
        if !residual.is_zero() {
            st.effective_nav.senior = st.effective_nav.senior.try_sub(residual)?;
            st.impermanent_loss.senior = st.impermanent_loss.senior.try_add(residual)?;
        }
        trace.junior_loss_absorbed = absorbed;
        trace.junior_loss_to_senior = residual;
    } else if observation.junior > st.raw_nav.junior {
        let gain = observation.junior.try_sub(st.raw_nav.junior)?;
        let repaid = gain.min(st.impermanent_loss.senior);
        st.impermanent_loss.senior = st.impermanent_loss.senior.try_sub(repaid)?;
        st.effective_nav.senior = st.effective_nav.senior.try_add(repaid)?;
        let retained = gain.try_sub(repaid)?;
        st.effective_nav.junior = st.effective_nav.junior.try_add(retained)?;
        if !retained.is_zero() {
            let fee = retained.frac_floor(config.junior_fee)?;
            fees.junior = fees.junior.try_add(fee)?;
        }
        trace.junior_gain_repaid_senior_il = repaid;
        trace.junior_gain_retained = retained;
    }

    // Step 4: the senior side.
    if observation.senior < st.raw_nav.senior {
        let loss = st.raw_nav.senior.try_sub(observation.senior)?;
        let covered = loss.min(st.effective_nav.junior);
        st.effective_nav.junior = st.effective_nav.junior.try_sub(covered)?;
        st.impermanent_loss.junior = st.impermanent_loss.junior.try_add(covered)?;
        let uncovered = loss.try_sub(covered)?;
        if !uncovered.is_zero() {
            st.effective_nav.senior = st.effective_nav.senior.try_sub(uncovered)?;
            st.impermanent_loss.senior = st.impermanent_loss.senior.try_add(uncovered)?;
        }
        trace.senior_loss_covered = covered;
        trace.senior_loss_uncovered = uncovered;
    } else if observation.senior > st.raw_nav.senior {
        let gain = observation.senior.try_sub(st.raw_nav.senior)?;

        let repay_senior_il = gain.min(st.impermanent_loss.senior);
        st.impermanent_loss.senior = st.impermanent_loss.senior.try_sub(repay_senior_il)?;
        st.effective_nav.senior = st.effective_nav.senior.try_add(repay_senior_il)?;
        let mut remaining = gain.try_sub(repay_senior_il)?;

        let repay_junior_il = remaining.min(st.impermanent_loss.junior);
        st.impermanent_loss.junior = st.impermanent_loss.junior.try_sub(repay_junior_il)?;
        st.effective_nav.junior = st.effective_nav.junior.try_add(repay_junior_il)?;
        remaining = remaining.try_sub(repay_junior_il)?;

        trace.senior_gain_repaid_senior_il = repay_senior_il;
        trace.senior_gain_repaid_junior_il = repay_junior_il;

        if !remaining.is_zero() {
            let elapsed = now.saturating_sub(st.last_distribution_ts);
            if elapsed == 0 {
                // Zero-length distribution window: no average exists,
                // the senior side keeps the whole remainder.
                st.effective_nav.senior = st.effective_nav.senior.try_add(remaining)?;
                trace.yield_to_senior = remaining;
            } else {
                let average = (st.yield_share_acc / elapsed as u128).min(FRAC_ONE);
                let junior_cut = remaining.frac_floor(Frac::new(average))?;
                let senior_cut = remaining.try_sub(junior_cut)?;
                st.effective_nav.junior = st.effective_nav.junior.try_add(junior_cut)?;
                st.effective_nav.senior = st.effective_nav.senior.try_add(senior_cut)?;
                fees.junior = fees.junior.try_add(junior_cut.frac_floor(config.junior_fee)?)?;
                fees.senior = fees.senior.try_add(senior_cut.frac_floor(config.senior_fee)?)?;
                trace.yield_to_junior = junior_cut;
                trace.yield_to_senior = senior_cut;
                if !junior_cut.is_zero() {
                    st.yield_share_acc = 0;
                    st.last_distribution_ts = now;
                }
            }
        }
    }

    st.raw_nav = PerTranche::new(observation.senior, observation.junior);

    // Step 5: resolve the state machine against the settled book.
    let ltv = st.ltv()?;
    let healthy = st.impermanent_loss.junior.is_zero()
        || ltv >= config.lltv
        || config.fixed_term_secs == 0;
    if healthy {
        st.market_state = MarketState::Healthy;
    } else {
        if st.market_state == MarketState::Healthy {
            st.recovery_end_ts = now
                .checked_add(config.fixed_term_secs)
                .ok_or(EngineError::ArithmeticOverflow)?;
            log::debug!(
                "entering recovery: junior IL {} ltv {} until {}",
                st.impermanent_loss.junior,
                ltv,
                st.recovery_end_ts
            );
        }
        st.market_state = MarketState::Recovery;
    }

    // Step 6: the book must balance exactly. Raw deltas were attributed
    // in full, so any divergence is a computation bug and nothing of
    // this transition may survive.
    let raw_total = st.total_raw()?;
    let effective_total = st.total_effective()?;
    if raw_total != effective_total {
        log::error!(
            "conservation violated: raw {} != effective {}",
            raw_total,
            effective_total
        );
        return Err(EngineError::ConservationViolated {
            raw_total,
            effective_total,
        });
    }

    Ok(SyncOutcome { state: st, fees, trace })
}
