//! Balance-tracking adapter for venues that hold the engine's asset
//! directly.

use strata_engine::{
    AssetAmount, ConversionRate, InvestmentAdapter, PerTranche, Result, Tranche,
};

/// The simplest venue shape: per-tranche balances, no derived
/// accounting. The conversion rate is injectable so a venue whose
/// accounting unit drifts away from the NAV unit can still be modeled.
#[derive(Debug, Clone)]
pub struct IdenticalAssetAdapter {
    balances: PerTranche<AssetAmount>,
    rate: ConversionRate,
}

impl IdenticalAssetAdapter {
    pub fn new(rate: ConversionRate) -> Self {
        IdenticalAssetAdapter {
            balances: PerTranche::new(AssetAmount::ZERO, AssetAmount::ZERO),
            rate,
        }
    }

    pub fn balance(&self, tranche: Tranche) -> AssetAmount {
        self.balances[tranche]
    }

    pub fn deposit(&mut self, tranche: Tranche, amount: AssetAmount) -> Result<()> {
        self.balances[tranche] = self.balances[tranche].try_add(amount)?;
        Ok(())
    }

    pub fn withdraw(&mut self, tranche: Tranche, amount: AssetAmount) -> Result<()> {
        self.balances[tranche] = self.balances[tranche].try_sub(amount)?;
        Ok(())
    }

    /// Venue performance: mark a gain on one tranche's position.
    pub fn mark_gain(&mut self, tranche: Tranche, amount: AssetAmount) -> Result<()> {
        self.balances[tranche] = self.balances[tranche].try_add(amount)?;
        Ok(())
    }

    /// Venue performance: mark a loss. A position cannot be worth less
    /// than nothing, so losses beyond the balance empty it.
    pub fn mark_loss(&mut self, tranche: Tranche, amount: AssetAmount) {
        self.balances[tranche] = self.balances[tranche].saturating_sub(amount);
    }

    pub fn set_rate(&mut self, rate: ConversionRate) {
        self.rate = rate;
    }
}

impl InvestmentAdapter for IdenticalAssetAdapter {
    fn position_value(&self, tranche: Tranche) -> Result<AssetAmount> {
        Ok(self.balances[tranche])
    }

    fn conversion_rate(&self) -> ConversionRate {
        self.rate
    }
}
