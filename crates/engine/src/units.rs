//! Unit-distinct quantity types.
//!
//! The engine accounts in an abstract NAV unit; investment venues hold
//! tranche-native asset units. The two are deliberately separate types
//! so a conversion can never be skipped, even when the rate is 1:1.

use core::fmt;

use crate::error::{EngineError, Result};
use crate::math::{self, FRAC_ONE};

/// A NAV quantity in the engine's accounting unit. Non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Nav(u128);

impl Nav {
    pub const ZERO: Nav = Nav(0);

    #[inline]
    pub const fn new(raw: u128) -> Self {
        Nav(raw)
    }

    #[inline]
    pub const fn raw(self) -> u128 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    #[inline]
    pub fn try_add(self, other: Nav) -> Result<Nav> {
        self.0
            .checked_add(other.0)
            .map(Nav)
            .ok_or(EngineError::ArithmeticOverflow)
    }

    /// Checked subtraction. Underflow is an invariant failure: the
    /// waterfall only ever subtracts amounts it has proven available.
    #[inline]
    pub fn try_sub(self, other: Nav) -> Result<Nav> {
        self.0
            .checked_sub(other.0)
            .map(Nav)
            .ok_or(EngineError::ArithmeticOverflow)
    }

    #[inline]
    pub fn saturating_sub(self, other: Nav) -> Nav {
        Nav(self.0.saturating_sub(other.0))
    }

    /// `floor(self * frac)` of this amount.
    #[inline]
    pub fn frac_floor(self, frac: Frac) -> Result<Nav> {
        math::frac_floor(self.0, frac.raw()).map(Nav)
    }

    /// `ceil(self * frac)` of this amount.
    #[inline]
    pub fn frac_ceil(self, frac: Frac) -> Result<Nav> {
        math::frac_ceil(self.0, frac.raw()).map(Nav)
    }
}

impl fmt::Display for Nav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An amount in an investment venue's native asset unit. Non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AssetAmount(u128);

impl AssetAmount {
    pub const ZERO: AssetAmount = AssetAmount(0);

    #[inline]
    pub const fn new(raw: u128) -> Self {
        AssetAmount(raw)
    }

    #[inline]
    pub const fn raw(self) -> u128 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn try_add(self, other: AssetAmount) -> Result<AssetAmount> {
        self.0
            .checked_add(other.0)
            .map(AssetAmount)
            .ok_or(EngineError::ArithmeticOverflow)
    }

    #[inline]
    pub fn try_sub(self, other: AssetAmount) -> Result<AssetAmount> {
        self.0
            .checked_sub(other.0)
            .map(AssetAmount)
            .ok_or(EngineError::ArithmeticOverflow)
    }

    #[inline]
    pub fn saturating_sub(self, other: AssetAmount) -> AssetAmount {
        AssetAmount(self.0.saturating_sub(other.0))
    }

    /// Multiply by a fraction, rounding down.
    #[inline]
    pub fn frac_floor(self, frac: Frac) -> Result<AssetAmount> {
        math::mul_div_floor(self.0, frac.raw(), FRAC_ONE).map(AssetAmount)
    }
}

impl fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A WAD-scaled fraction (`FRAC_ONE` = 1.0). May exceed 1.0 where the
/// domain allows it (beta, conversion rates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Frac(u128);

impl Frac {
    pub const ZERO: Frac = Frac(0);
    pub const ONE: Frac = Frac(FRAC_ONE);
    /// Saturation sentinel for ratios with a zero denominator.
    pub const MAX: Frac = Frac(u128::MAX);

    #[inline]
    pub const fn new(raw: u128) -> Self {
        Frac(raw)
    }

    #[inline]
    pub const fn raw(self) -> u128 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Clamp into `[0, 1]`.
    #[inline]
    pub fn clamp_to_one(self) -> Frac {
        Frac(self.0.min(FRAC_ONE))
    }

    /// `1 - self`, saturating at zero.
    #[inline]
    pub fn complement(self) -> Frac {
        Frac(FRAC_ONE.saturating_sub(self.0))
    }

    /// `floor(self * other)` as a fraction.
    #[inline]
    pub fn mul_floor(self, other: Frac) -> Result<Frac> {
        math::frac_floor(self.0, other.0).map(Frac)
    }

    /// `ceil(self * other)` as a fraction.
    #[inline]
    pub fn mul_ceil(self, other: Frac) -> Result<Frac> {
        math::frac_ceil(self.0, other.0).map(Frac)
    }

    #[inline]
    pub fn try_add(self, other: Frac) -> Result<Frac> {
        self.0
            .checked_add(other.0)
            .map(Frac)
            .ok_or(EngineError::ArithmeticOverflow)
    }
}

impl fmt::Display for Frac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Render as a decimal with trailing zeros trimmed.
        let whole = self.0 / FRAC_ONE;
        let frac = self.0 % FRAC_ONE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let mut digits = [0u8; 18];
        let mut rem = frac;
        for slot in digits.iter_mut().rev() {
            *slot = (rem % 10) as u8;
            rem /= 10;
        }
        let mut len = 18;
        while len > 0 && digits[len - 1] == 0 {
            len -= 1;
        }
        write!(f, "{whole}.")?;
        for d in &digits[..len] {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

/// NAV units per one asset unit, WAD-scaled.
///
/// Converts between a venue's asset unit and the engine's NAV unit.
/// Directions round differently on purpose: asset-to-NAV rounds down so
/// the engine never overstates the value it could actually pull back,
/// and NAV-to-asset rounds in the direction the caller names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionRate {
    nav_per_asset: Frac,
}

impl ConversionRate {
    /// Build a rate. Zero is rejected: a venue whose assets convert to
    /// nothing cannot be accounted.
    pub fn new(nav_per_asset: Frac) -> Result<Self> {
        if nav_per_asset.is_zero() {
            return Err(EngineError::RateOutOfRange);
        }
        Ok(ConversionRate { nav_per_asset })
    }

    /// The 1:1 rate. Still a real conversion at the type level.
    pub const fn identity() -> Self {
        ConversionRate {
            nav_per_asset: Frac::ONE,
        }
    }

    #[inline]
    pub fn nav_per_asset(&self) -> Frac {
        self.nav_per_asset
    }

    /// Convert an asset amount into NAV units, rounding down.
    pub fn asset_to_nav(&self, amount: AssetAmount) -> Result<Nav> {
        math::frac_floor(amount.raw(), self.nav_per_asset.raw()).map(Nav::new)
    }

    /// Convert a NAV amount into asset units, rounding down.
    pub fn nav_to_asset_floor(&self, amount: Nav) -> Result<AssetAmount> {
        math::mul_div_floor(amount.raw(), FRAC_ONE, self.nav_per_asset.raw()).map(AssetAmount::new)
    }

    /// Convert a NAV amount into asset units, rounding up.
    pub fn nav_to_asset_ceil(&self, amount: Nav) -> Result<AssetAmount> {
        math::mul_div_ceil(amount.raw(), FRAC_ONE, self.nav_per_asset.raw()).map(AssetAmount::new)
    }
}
