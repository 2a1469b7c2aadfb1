//! Simulated investment adapters for the strata accounting engine
//!
//! Each adapter models one venue-accounting shape behind the engine's
//! [`InvestmentAdapter`](strata_engine::InvestmentAdapter) seam and
//! carries the mutators a simulation drives it with: deposits and
//! withdrawals move principal, marks and index moves model venue
//! performance. Value reporting always rounds down so an adapter never
//! claims more than the venue could deliver.

#![no_std]
#![forbid(unsafe_code)]

pub mod identical;
pub mod in_kind;
pub mod lending;
pub mod vault;

pub use identical::IdenticalAssetAdapter;
pub use in_kind::InKindAssetAdapter;
pub use lending::LendingPoolAdapter;
pub use vault::VaultAdapter;
