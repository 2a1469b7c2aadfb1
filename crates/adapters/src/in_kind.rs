//! Foreign-denominated adapter.

use strata_engine::{
    AssetAmount, ConversionRate, Frac, InvestmentAdapter, PerTranche, Result, Tranche,
};

/// Venue holding a different asset entirely: positions are counted in
/// the foreign unit and valued through an exchange rate. A depeg is a
/// rate move, all the way to zero.
#[derive(Debug, Clone)]
pub struct InKindAssetAdapter {
    units: PerTranche<AssetAmount>,
    exchange_rate: Frac,
    rate: ConversionRate,
}

impl InKindAssetAdapter {
    pub fn new(rate: ConversionRate, exchange_rate: Frac) -> Self {
        InKindAssetAdapter {
            units: PerTranche::new(AssetAmount::ZERO, AssetAmount::ZERO),
            exchange_rate,
            rate,
        }
    }

    pub fn units(&self, tranche: Tranche) -> AssetAmount {
        self.units[tranche]
    }

    pub fn exchange_rate(&self) -> Frac {
        self.exchange_rate
    }

    pub fn deposit_units(&mut self, tranche: Tranche, units: AssetAmount) -> Result<()> {
        self.units[tranche] = self.units[tranche].try_add(units)?;
        Ok(())
    }

    pub fn withdraw_units(&mut self, tranche: Tranche, units: AssetAmount) -> Result<()> {
        self.units[tranche] = self.units[tranche].try_sub(units)?;
        Ok(())
    }

    pub fn set_exchange_rate(&mut self, exchange_rate: Frac) {
        if exchange_rate < self.exchange_rate {
            log::debug!(
                "exchange rate marked down {} -> {}",
                self.exchange_rate,
                exchange_rate
            );
        }
        self.exchange_rate = exchange_rate;
    }
}

impl InvestmentAdapter for InKindAssetAdapter {
    fn position_value(&self, tranche: Tranche) -> Result<AssetAmount> {
        self.units[tranche].frac_floor(self.exchange_rate)
    }

    fn conversion_rate(&self) -> ConversionRate {
        self.rate
    }
}
