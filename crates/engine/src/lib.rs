//! Two-tranche accounting engine.
//!
//! Tracks senior and junior capital against raw investment NAV,
//! attributing losses and gains through a fixed waterfall so that the
//! junior tranche absorbs losses first and earns a time-weighted share
//! of senior upside in return.
//!
//! Guarantees, in order of precedence:
//!
//! 1. Conservation: raw NAV total equals effective NAV total, exactly,
//!    after every committed transition.
//! 2. Atomicity: a failed transition commits nothing.
//! 3. Coverage: enforcement calls refuse any book where junior
//!    effective value no longer covers the risk-weighted exposure.
//!
//! The crate is no_std + alloc: state lives wherever the caller puts
//! it, time and raw NAV are pushed in, and nothing here does I/O.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(kani)]
extern crate kani;

pub mod adapter;
pub mod config;
pub mod coverage;
pub mod error;
pub mod ledger;
pub mod market;
pub mod math;
pub mod postop;
pub mod state;
pub mod sync;
pub mod units;
pub mod ydm;

// Re-export the operational surface.
pub use adapter::{observe, InvestmentAdapter};
pub use config::{MarketConfig, MAX_PROTOCOL_FEE, MIN_COVERAGE};
pub use error::{EngineError, ErrorKind, Result};
pub use ledger::{Ledger, MarketId};
pub use market::Market;
pub use postop::TrancheOp;
pub use state::{AccountingState, MarketState, PerTranche, Tranche};
pub use sync::{FeeDeltas, RawObservation, SyncOutcome, WaterfallTrace};
pub use units::{AssetAmount, ConversionRate, Frac, Nav};
pub use ydm::{FlatYieldShare, UtilizationCurve, YdmInputs, YieldDistributionModel};
