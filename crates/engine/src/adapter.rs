//! The seam between the engine and investment venues.
//!
//! An adapter reports what each tranche's position at a venue is worth
//! in the venue's own asset unit, plus the rate to the engine's NAV
//! unit. The engine composes the two into a [`RawObservation`]; it
//! never talks to a venue directly.

use crate::error::Result;
use crate::state::Tranche;
use crate::sync::RawObservation;
use crate::units::{AssetAmount, ConversionRate};

/// Capability a venue integration must provide.
///
/// Reported values must track what is actually transferable: temporary
/// illiquidity is not a loss and must not be reported as one.
pub trait InvestmentAdapter {
    /// Current value of a tranche's position, in the venue's asset unit.
    fn position_value(&self, tranche: Tranche) -> Result<AssetAmount>;

    /// Rate from the venue's asset unit to the engine's NAV unit.
    fn conversion_rate(&self) -> ConversionRate;
}

/// Build a synchronization observation from an adapter.
///
/// Conversion rounds down, so the engine's view of raw NAV never
/// exceeds the value the venue could actually deliver.
pub fn observe(adapter: &dyn InvestmentAdapter) -> Result<RawObservation> {
    let rate = adapter.conversion_rate();
    let senior = rate.asset_to_nav(adapter.position_value(Tranche::Senior)?)?;
    let junior = rate.asset_to_nav(adapter.position_value(Tranche::Junior)?)?;
    let observation = RawObservation::new(senior, junior);
    observation.validate()?;
    Ok(observation)
}
