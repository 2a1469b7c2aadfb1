//! Registry of markets keyed by id.
//!
//! Markets are independent: per-market calls are strictly ordered by
//! the caller, while concurrent preview reads across markets are fine.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::fmt;

use crate::config::MarketConfig;
use crate::error::{EngineError, Result};
use crate::market::Market;
use crate::ydm::YieldDistributionModel;

/// Opaque market identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MarketId(pub u64);

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market-{}", self.0)
    }
}

/// All markets the engine is accounting for.
#[derive(Default)]
pub struct Ledger {
    markets: BTreeMap<MarketId, Market>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            markets: BTreeMap::new(),
        }
    }

    /// Register a new market. Ids are never reused.
    pub fn create_market(
        &mut self,
        id: MarketId,
        config: MarketConfig,
        yield_model: Box<dyn YieldDistributionModel>,
    ) -> Result<&mut Market> {
        if self.markets.contains_key(&id) {
            return Err(EngineError::DuplicateMarket);
        }
        let market = Market::create(config, yield_model)?;
        log::debug!("created {}", id);
        Ok(self.markets.entry(id).or_insert(market))
    }

    pub fn market(&self, id: MarketId) -> Result<&Market> {
        self.markets.get(&id).ok_or(EngineError::UnknownMarket)
    }

    pub fn market_mut(&mut self, id: MarketId) -> Result<&mut Market> {
        self.markets.get_mut(&id).ok_or(EngineError::UnknownMarket)
    }

    pub fn contains(&self, id: MarketId) -> bool {
        self.markets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Registered market ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = MarketId> + '_ {
        self.markets.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_ONE;
    use crate::units::Frac;
    use crate::ydm::FlatYieldShare;

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

    fn model() -> Box<dyn YieldDistributionModel> {
        Box::new(FlatYieldShare::new(Frac::ZERO))
    }

    #[test]
    fn create_and_lookup() {
        let mut ledger = Ledger::new();
        assert!(ledger.is_empty());
        ledger.create_market(MarketId(7), config(), model()).unwrap();
        assert!(ledger.contains(MarketId(7)));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.market(MarketId(7)).is_ok());
        assert_eq!(
            ledger.market(MarketId(8)).err(),
            Some(EngineError::UnknownMarket)
        );
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut ledger = Ledger::new();
        ledger.create_market(MarketId(1), config(), model()).unwrap();
        let err = ledger.create_market(MarketId(1), config(), model());
        assert!(matches!(err, Err(EngineError::DuplicateMarket)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ids_iterate_in_order() {
        let mut ledger = Ledger::new();
        for id in [3u64, 1, 2] {
            ledger.create_market(MarketId(id), config(), model()).unwrap();
        }
        let ids: alloc::vec::Vec<_> = ledger.ids().collect();
        assert_eq!(ids, [MarketId(1), MarketId(2), MarketId(3)]);
    }
}
