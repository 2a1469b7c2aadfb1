//! TOML document model and parsing for market and scenario files.
//!
//! Fractions and NAV amounts are written as strings ("0.25",
//! "1_000_000") because the engine's fixed-point range exceeds what
//! TOML integers can carry.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use strata_engine::math::FRAC_ONE;
use strata_engine::{
    FlatYieldShare, Frac, MarketConfig, Nav, UtilizationCurve, YieldDistributionModel,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid fraction {0:?}: expected a decimal like \"0.25\"")]
    BadFraction(String),
    #[error("fraction {0:?} carries more than 18 decimal places")]
    TooPrecise(String),
    #[error("fraction {0:?} does not fit the engine's fixed point")]
    FractionOverflow(String),
    #[error("invalid amount {0:?}: expected a non-negative integer")]
    BadAmount(String),
}

/// Parse a decimal string into a WAD fraction. Underscore separators
/// are allowed.
pub fn parse_frac(text: &str) -> Result<Frac, ParseError> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(ParseError::BadFraction(text.to_string()));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseError::BadFraction(text.to_string()));
    }
    if frac_part.len() > 18 {
        return Err(ParseError::TooPrecise(text.to_string()));
    }

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| ParseError::BadFraction(text.to_string()))?
    };
    let mut frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part
            .parse()
            .map_err(|_| ParseError::BadFraction(text.to_string()))?
    };
    for _ in frac_part.len()..18 {
        frac_value *= 10;
    }

    let scaled = int_value
        .checked_mul(FRAC_ONE)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| ParseError::FractionOverflow(text.to_string()))?;
    Ok(Frac::new(scaled))
}

/// Parse a NAV amount written as a plain integer. Underscore
/// separators are allowed.
pub fn parse_nav(text: &str) -> Result<Nav, ParseError> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::BadAmount(text.to_string()));
    }
    cleaned
        .parse()
        .map(Nav::new)
        .map_err(|_| ParseError::BadAmount(text.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MarketDoc {
    pub coverage: String,
    pub beta: String,
    pub lltv: String,
    pub fixed_term_secs: u64,
    #[serde(default = "zero")]
    pub senior_fee: String,
    #[serde(default = "zero")]
    pub junior_fee: String,
    pub yield_model: Option<YieldModelDoc>,
}

fn zero() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum YieldModelDoc {
    Flat {
        share: String,
    },
    Curve {
        base: String,
        slope: String,
        kink: String,
        max: String,
    },
}

/// Initial raw book, funded junior-first at time zero.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookDoc {
    pub senior: String,
    pub junior: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketFile {
    pub market: MarketDoc,
    pub book: Option<BookDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub name: String,
    pub market: MarketDoc,
    pub book: Option<BookDoc>,
    #[serde(default, rename = "step")]
    pub steps: Vec<StepDoc>,
}

#[derive(Debug, Deserialize)]
pub struct StepDoc {
    pub at: u64,
    #[serde(flatten)]
    pub action: ActionDoc,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ActionDoc {
    /// Fresh raw NAV marks from the venues.
    Observe { senior: String, junior: String },
    DepositSenior { amount: String },
    DepositJunior { amount: String },
    WithdrawSenior { amount: String },
    WithdrawJunior { amount: String },
    SetCoverage { value: String },
    SetBeta { value: String },
    SetLltv { value: String },
    SetTerm { secs: u64 },
    SetFees { senior: String, junior: String },
}

impl MarketDoc {
    pub fn to_config(&self) -> Result<MarketConfig> {
        Ok(MarketConfig {
            coverage: parse_frac(&self.coverage).context("market.coverage")?,
            beta: parse_frac(&self.beta).context("market.beta")?,
            lltv: parse_frac(&self.lltv).context("market.lltv")?,
            fixed_term_secs: self.fixed_term_secs,
            senior_fee: parse_frac(&self.senior_fee).context("market.senior-fee")?,
            junior_fee: parse_frac(&self.junior_fee).context("market.junior-fee")?,
        })
    }

    pub fn to_model(&self) -> Result<Box<dyn YieldDistributionModel>> {
        match &self.yield_model {
            None => Ok(Box::new(FlatYieldShare::new(Frac::ZERO))),
            Some(YieldModelDoc::Flat { share }) => Ok(Box::new(FlatYieldShare::new(
                parse_frac(share).context("yield-model.share")?,
            ))),
            Some(YieldModelDoc::Curve {
                base,
                slope,
                kink,
                max,
            }) => Ok(Box::new(UtilizationCurve {
                base: parse_frac(base).context("yield-model.base")?,
                slope: parse_frac(slope).context("yield-model.slope")?,
                kink: parse_frac(kink).context("yield-model.kink")?,
                max: parse_frac(max).context("yield-model.max")?,
            })),
        }
    }
}

impl BookDoc {
    pub fn to_navs(&self) -> Result<(Nav, Nav)> {
        Ok((
            parse_nav(&self.senior).context("book.senior")?,
            parse_nav(&self.junior).context("book.junior")?,
        ))
    }
}

fn read_expanded(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path);
    fs::read_to_string(Path::new(expanded.as_ref()))
        .with_context(|| format!("failed to read {}", expanded))
}

pub fn load_market_file(path: &str) -> Result<MarketFile> {
    let data = read_expanded(path)?;
    toml::from_str(&data).with_context(|| format!("failed to parse market file {}", path))
}

pub fn load_scenario_file(path: &str) -> Result<ScenarioFile> {
    let data = read_expanded(path)?;
    toml::from_str(&data).with_context(|| format!("failed to parse scenario file {}", path))
}
