//! Error taxonomy for the accounting engine.
//!
//! Every fallible operation returns [`EngineError`]. Callers route on
//! [`EngineError::kind`]: configuration and coverage rejections are
//! recoverable (the input was bad, engine state is untouched), invariant
//! failures are fatal (the engine detected internal inconsistency and
//! refused to persist anything).

use core::fmt;

use crate::units::Nav;

/// All failure modes of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Coverage fraction outside `[MIN_COVERAGE, 1)`.
    CoverageOutOfRange,
    /// Beta above `MAX_BETA`, or `beta * coverage >= 1`.
    BetaOutOfRange,
    /// Liquidation LTV not strictly between the maximum theoretical
    /// initial LTV and 1.
    LltvOutOfRange,
    /// Protocol fee fraction above `MAX_PROTOCOL_FEE`.
    FeeAboveCap,
    /// Conversion rate is zero or otherwise unusable.
    RateOutOfRange,
    /// Raw NAV observation above `MAX_NAV`.
    NavBoundExceeded,
    /// Checked arithmetic overflowed or underflowed.
    ArithmeticOverflow,
    /// Post-operation raw deltas have a sign the declared operation
    /// does not permit.
    DisallowedRawDelta,
    /// Raw and effective NAV totals diverged after a transition.
    ///
    /// This is a programming-error detector: the waterfall conserves
    /// value exactly, so the two totals can only differ if a step was
    /// computed wrong. Nothing is persisted when this fires.
    ConservationViolated {
        raw_total: Nav,
        effective_total: Nav,
    },
    /// Operation would leave the market over its coverage bound.
    CoverageExceeded,
    /// No market registered under the given id.
    UnknownMarket,
    /// A market is already registered under the given id.
    DuplicateMarket,
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration input. Rejected up front, state untouched.
    Config,
    /// Internal inconsistency. Fatal: the transition was discarded.
    Invariant,
    /// Coverage bound would be violated. The operation should be
    /// resized or abandoned; state untouched.
    Coverage,
    /// Lookup failure in the market registry.
    NotFound,
}

impl EngineError {
    /// Which class of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::CoverageOutOfRange
            | EngineError::BetaOutOfRange
            | EngineError::LltvOutOfRange
            | EngineError::FeeAboveCap
            | EngineError::RateOutOfRange => ErrorKind::Config,
            EngineError::NavBoundExceeded
            | EngineError::ArithmeticOverflow
            | EngineError::DisallowedRawDelta
            | EngineError::ConservationViolated { .. } => ErrorKind::Invariant,
            EngineError::CoverageExceeded => ErrorKind::Coverage,
            EngineError::UnknownMarket | EngineError::DuplicateMarket => ErrorKind::NotFound,
        }
    }

    /// True when the caller can retry with different inputs.
    /// Invariant failures are not retryable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Invariant)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::CoverageOutOfRange => {
                write!(f, "coverage fraction outside [MIN_COVERAGE, 1)")
            }
            EngineError::BetaOutOfRange => {
                write!(f, "beta above MAX_BETA or beta * coverage >= 1")
            }
            EngineError::LltvOutOfRange => {
                write!(f, "lltv not strictly between max initial LTV and 1")
            }
            EngineError::FeeAboveCap => write!(f, "protocol fee above MAX_PROTOCOL_FEE"),
            EngineError::RateOutOfRange => write!(f, "conversion rate out of range"),
            EngineError::NavBoundExceeded => write!(f, "raw NAV observation above MAX_NAV"),
            EngineError::ArithmeticOverflow => write!(f, "checked arithmetic overflow"),
            EngineError::DisallowedRawDelta => {
                write!(f, "raw delta sign not permitted by the declared operation")
            }
            EngineError::ConservationViolated {
                raw_total,
                effective_total,
            } => write!(
                f,
                "conservation violated: raw total {} != effective total {}",
                raw_total.raw(),
                effective_total.raw()
            ),
            EngineError::CoverageExceeded => {
                write!(f, "operation would exceed the coverage bound")
            }
            EngineError::UnknownMarket => write!(f, "unknown market id"),
            EngineError::DuplicateMarket => write!(f, "market id already registered"),
        }
    }
}

impl core::error::Error for EngineError {}

/// Engine-wide result alias.
pub type Result<T> = core::result::Result<T, EngineError>;
