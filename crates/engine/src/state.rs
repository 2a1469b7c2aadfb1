//! Per-market accounting record.
//!
//! `AccountingState` is the whole of a market's book: raw NAV as last
//! observed at the investment venues, effective NAV as owed to each
//! tranche after waterfall redistribution, unresolved impermanent loss
//! per tranche, the health state machine, and the yield-share
//! accumulator. It is a plain `Copy` record so transitions can be
//! computed on a scratch copy and committed only after every check
//! passes.

use core::ops::{Index, IndexMut};

use crate::error::Result;
use crate::math::FRAC_ONE;
use crate::units::{Frac, Nav};

/// The two tranches of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Tranche {
    /// Loss-protected side. Pays for protection by sharing upside.
    Senior,
    /// Loss-absorbing side. Earns a share of senior upside.
    Junior,
}

impl Tranche {
    /// The opposite tranche.
    #[inline]
    pub fn other(self) -> Tranche {
        match self {
            Tranche::Senior => Tranche::Junior,
            Tranche::Junior => Tranche::Senior,
        }
    }
}

/// A pair of values, one per tranche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerTranche<T> {
    pub senior: T,
    pub junior: T,
}

impl<T> PerTranche<T> {
    pub const fn new(senior: T, junior: T) -> Self {
        PerTranche { senior, junior }
    }
}

impl<T> Index<Tranche> for PerTranche<T> {
    type Output = T;

    #[inline]
    fn index(&self, tranche: Tranche) -> &T {
        match tranche {
            Tranche::Senior => &self.senior,
            Tranche::Junior => &self.junior,
        }
    }
}

impl<T> IndexMut<Tranche> for PerTranche<T> {
    #[inline]
    fn index_mut(&mut self, tranche: Tranche) -> &mut T {
        match tranche {
            Tranche::Senior => &mut self.senior,
            Tranche::Junior => &mut self.junior,
        }
    }
}

/// Health state of a market.
///
/// RECOVERY gates junior upside while the junior tranche carries
/// unresolved impermanent loss and the market sits below its
/// liquidation LTV. Fixed-term-zero markets never leave HEALTHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MarketState {
    #[default]
    Healthy,
    Recovery,
}

/// The complete accounting record of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountingState {
    /// Raw NAV per tranche as of the last synchronization.
    pub raw_nav: PerTranche<Nav>,
    /// Effective NAV per tranche: what each side is actually owed.
    pub effective_nav: PerTranche<Nav>,
    /// Unresolved impermanent loss per tranche.
    ///
    /// `impermanent_loss.senior` is value the junior side owes the
    /// senior side; `impermanent_loss.junior` is value the senior side
    /// owes the junior side. Both are repaid out of future gains.
    pub impermanent_loss: PerTranche<Nav>,
    /// Health state machine position.
    pub market_state: MarketState,
    /// When the current recovery window ends. Meaningful only while in
    /// RECOVERY; stale afterwards.
    pub recovery_end_ts: u64,
    /// Time-weighted accumulator of the instantaneous junior yield
    /// share, in WAD-seconds.
    pub yield_share_acc: u128,
    /// Timestamp of the last accrual into `yield_share_acc`.
    pub last_accrual_ts: u64,
    /// Timestamp of the last yield distribution that paid the junior
    /// tranche a non-zero portion.
    pub last_distribution_ts: u64,
}

impl AccountingState {
    /// A fresh market: everything zero, HEALTHY.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw NAV summed across tranches.
    pub fn total_raw(&self) -> Result<Nav> {
        self.raw_nav.senior.try_add(self.raw_nav.junior)
    }

    /// Effective NAV summed across tranches.
    pub fn total_effective(&self) -> Result<Nav> {
        self.effective_nav.senior.try_add(self.effective_nav.junior)
    }

    /// Exact conservation: raw total equals effective total.
    ///
    /// The waterfall only moves value between tranches, so the two
    /// totals must match to the unit after every transition.
    pub fn conservation_holds(&self) -> bool {
        match (self.total_raw(), self.total_effective()) {
            (Ok(raw), Ok(eff)) => raw == eff,
            _ => false,
        }
    }

    /// Loan-to-value of the senior side against the whole book:
    /// `effST / (effST + stIL + effJT)`, floor-rounded. Zero when the
    /// denominator is zero.
    pub fn ltv(&self) -> Result<Frac> {
        let denom = self
            .effective_nav
            .senior
            .try_add(self.impermanent_loss.senior)?
            .try_add(self.effective_nav.junior)?;
        if denom.is_zero() {
            return Ok(Frac::ZERO);
        }
        let ltv = crate::math::mul_div_floor(
            self.effective_nav.senior.raw(),
            FRAC_ONE,
            denom.raw(),
        )?;
        Ok(Frac::new(ltv))
    }
}
