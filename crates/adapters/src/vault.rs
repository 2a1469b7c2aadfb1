//! Share-based vault adapter.

use strata_engine::math::{self, FRAC_ONE};
use strata_engine::{
    AssetAmount, ConversionRate, EngineError, Frac, InvestmentAdapter, PerTranche, Result,
    Tranche,
};

/// Venue accounting shaped like an ERC-4626 vault: each tranche holds
/// a share count and the venue quotes one price for all shares.
/// Performance arrives as price moves, not balance changes.
#[derive(Debug, Clone)]
pub struct VaultAdapter {
    shares: PerTranche<AssetAmount>,
    share_price: Frac,
    rate: ConversionRate,
}

impl VaultAdapter {
    pub fn new(rate: ConversionRate, share_price: Frac) -> Result<Self> {
        if share_price.is_zero() {
            return Err(EngineError::RateOutOfRange);
        }
        Ok(VaultAdapter {
            shares: PerTranche::new(AssetAmount::ZERO, AssetAmount::ZERO),
            share_price,
            rate,
        })
    }

    pub fn shares(&self, tranche: Tranche) -> AssetAmount {
        self.shares[tranche]
    }

    pub fn share_price(&self) -> Frac {
        self.share_price
    }

    /// Deposit assets, minting shares at the current price. Minting
    /// rounds down, so a fresh deposit can never be worth more than
    /// what was put in.
    pub fn deposit(&mut self, tranche: Tranche, assets: AssetAmount) -> Result<AssetAmount> {
        let minted = math::mul_div_floor(assets.raw(), FRAC_ONE, self.share_price.raw())
            .map(AssetAmount::new)?;
        self.shares[tranche] = self.shares[tranche].try_add(minted)?;
        Ok(minted)
    }

    /// Burn shares, returning the assets they are worth.
    pub fn redeem(&mut self, tranche: Tranche, shares: AssetAmount) -> Result<AssetAmount> {
        self.shares[tranche] = self.shares[tranche].try_sub(shares)?;
        shares.frac_floor(self.share_price)
    }

    /// Venue performance arrives as a share-price move.
    pub fn set_share_price(&mut self, share_price: Frac) -> Result<()> {
        if share_price.is_zero() {
            return Err(EngineError::RateOutOfRange);
        }
        self.share_price = share_price;
        Ok(())
    }
}

impl InvestmentAdapter for VaultAdapter {
    fn position_value(&self, tranche: Tranche) -> Result<AssetAmount> {
        self.shares[tranche].frac_floor(self.share_price)
    }

    fn conversion_rate(&self) -> ConversionRate {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_engine::{observe, Nav};

    #[test]
    fn price_moves_show_as_performance() {
        let mut vault = VaultAdapter::new(
            ConversionRate::identity(),
            Frac::new(FRAC_ONE * 5 / 4),
        )
        .unwrap();
        let minted = vault.deposit(Tranche::Senior, AssetAmount::new(1000)).unwrap();
        assert_eq!(minted, AssetAmount::new(800));
        assert_eq!(
            vault.position_value(Tranche::Senior).unwrap(),
            AssetAmount::new(1000)
        );

        vault.set_share_price(Frac::new(FRAC_ONE * 3 / 2)).unwrap();
        let observation = observe(&vault).unwrap();
        assert_eq!(observation.senior, Nav::new(1200));
    }

    #[test]
    fn deposits_never_mint_value() {
        let mut vault =
            VaultAdapter::new(ConversionRate::identity(), Frac::new(FRAC_ONE * 3)).unwrap();
        // 100 assets at price 3 mint 33 shares worth 99.
        vault.deposit(Tranche::Junior, AssetAmount::new(100)).unwrap();
        assert_eq!(
            vault.position_value(Tranche::Junior).unwrap(),
            AssetAmount::new(99)
        );
    }

    #[test]
    fn redeem_burns_and_pays() {
        let mut vault =
            VaultAdapter::new(ConversionRate::identity(), Frac::new(FRAC_ONE)).unwrap();
        vault.deposit(Tranche::Senior, AssetAmount::new(500)).unwrap();
        let paid = vault.redeem(Tranche::Senior, AssetAmount::new(200)).unwrap();
        assert_eq!(paid, AssetAmount::new(200));
        assert_eq!(vault.shares(Tranche::Senior), AssetAmount::new(300));
        assert!(vault.redeem(Tranche::Senior, AssetAmount::new(301)).is_err());
    }

    #[test]
    fn zero_price_is_refused() {
        assert!(VaultAdapter::new(ConversionRate::identity(), Frac::ZERO).is_err());
    }
}
