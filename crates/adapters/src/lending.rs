//! Lending-pool adapter with index accrual.

use strata_engine::math::{self, FRAC_ONE};
use strata_engine::{
    AssetAmount, ConversionRate, Frac, InvestmentAdapter, PerTranche, Result, Tranche,
};

/// Venue accounting shaped like an Aave-style pool: positions are
/// scaled balances and a single monotone index carries the accrued
/// interest. A slash moves the index down instead.
#[derive(Debug, Clone)]
pub struct LendingPoolAdapter {
    scaled: PerTranche<AssetAmount>,
    index: Frac,
    rate: ConversionRate,
}

impl LendingPoolAdapter {
    pub fn new(rate: ConversionRate) -> Self {
        LendingPoolAdapter {
            scaled: PerTranche::new(AssetAmount::ZERO, AssetAmount::ZERO),
            index: Frac::ONE,
            rate,
        }
    }

    pub fn index(&self) -> Frac {
        self.index
    }

    pub fn scaled_balance(&self, tranche: Tranche) -> AssetAmount {
        self.scaled[tranche]
    }

    /// Deposit principal. The scaled balance rounds down, so the
    /// position right after a deposit is worth at most the deposit.
    pub fn deposit(&mut self, tranche: Tranche, assets: AssetAmount) -> Result<AssetAmount> {
        let scaled = math::mul_div_floor(assets.raw(), FRAC_ONE, self.index.raw())
            .map(AssetAmount::new)?;
        self.scaled[tranche] = self.scaled[tranche].try_add(scaled)?;
        Ok(scaled)
    }

    /// Withdraw a target asset amount. The scaled balance burned
    /// rounds up, so the pool never pays out more than was burned.
    pub fn withdraw(&mut self, tranche: Tranche, assets: AssetAmount) -> Result<()> {
        let burned = math::mul_div_ceil(assets.raw(), FRAC_ONE, self.index.raw())
            .map(AssetAmount::new)?;
        self.scaled[tranche] = self.scaled[tranche].try_sub(burned)?;
        Ok(())
    }

    /// Accrue interest: the index grows by `rate_frac`.
    pub fn accrue(&mut self, rate_frac: Frac) -> Result<()> {
        self.index = self.index.mul_floor(Frac::ONE.try_add(rate_frac)?)?;
        Ok(())
    }

    /// A pool-level loss event: the index shrinks by `loss_frac`.
    pub fn slash(&mut self, loss_frac: Frac) -> Result<()> {
        self.index = self.index.mul_floor(loss_frac.clamp_to_one().complement())?;
        log::debug!("pool slashed by {}, index now {}", loss_frac, self.index);
        Ok(())
    }
}

impl InvestmentAdapter for LendingPoolAdapter {
    fn position_value(&self, tranche: Tranche) -> Result<AssetAmount> {
        self.scaled[tranche].frac_floor(self.index)
    }

    fn conversion_rate(&self) -> ConversionRate {
        self.rate
    }
}
