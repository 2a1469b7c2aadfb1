//! Market-file inspection commands: validation, previews, and sizing.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use strata_engine::{Frac, Market, Nav, RawObservation};

use crate::config::{self, MarketFile};
use crate::report;
use crate::simulate;

fn build_market(file: &MarketFile) -> Result<Market> {
    let market_config = file.market.to_config()?;
    let model = file.market.to_model()?;
    let mut market =
        Market::create(market_config, model).context("invalid market configuration")?;
    if let Some(book) = &file.book {
        let (senior, junior) = book.to_navs()?;
        simulate::fund_initial_book(&mut market, senior, junior)?;
    }
    Ok(market)
}

pub fn check_config(path: &str) -> Result<()> {
    let file = config::load_market_file(path)?;
    let market_config = file.market.to_config()?;

    if let Err(error) = market_config.validate() {
        println!("{} {}", "✗".bright_red(), error);
        anyhow::bail!("configuration is invalid");
    }

    report::section("Configuration Valid");
    report::print_config(&market_config);

    println!("\n{}", "Derived:".bright_yellow());
    let max_ltv = market_config.max_initial_ltv()?;
    println!(
        "  {} {}",
        "Max initial LTV:".bright_cyan(),
        max_ltv
    );
    println!(
        "  {} {}",
        "LLTV headroom:".bright_cyan(),
        Frac::new(market_config.lltv.raw().saturating_sub(max_ltv.raw()))
    );
    Ok(())
}

pub fn preview(
    path: &str,
    senior: &str,
    junior: &str,
    at: u64,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let file = config::load_market_file(path)?;
    let market = build_market(&file)?;

    let observation = RawObservation::new(
        config::parse_nav(senior).context("--senior")?,
        config::parse_nav(junior).context("--junior")?,
    );
    let outcome = market.preview_sync(observation, at)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    report::section("Synchronization Preview");
    report::kv("Observed senior", observation.senior);
    report::kv("Observed junior", observation.junior);
    report::kv("At", report::timestamp(at));
    report::print_outcome(&outcome, verbose);
    Ok(())
}

/// Single-step explainer: the full attribution tree plus the book
/// before and after.
pub fn waterfall(path: &str, senior: &str, junior: &str, at: u64, json: bool) -> Result<()> {
    let file = config::load_market_file(path)?;
    let mut market = build_market(&file)?;

    let observation = RawObservation::new(
        config::parse_nav(senior).context("--senior")?,
        config::parse_nav(junior).context("--junior")?,
    );
    let before = *market.state();
    let outcome = market.pre_op_sync(observation, at)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    report::section("Waterfall");
    report::kv("Observed senior", observation.senior);
    report::kv("Observed junior", observation.junior);
    report::kv("At", report::timestamp(at));

    println!("\n{}", "Before:".bright_yellow());
    println!(
        "  raw {}/{} effective {}/{}",
        before.raw_nav.senior,
        before.raw_nav.junior,
        before.effective_nav.senior,
        before.effective_nav.junior
    );

    report::print_trace(&outcome.trace);
    report::print_fees(&outcome.fees);
    report::print_state(&outcome.state);
    Ok(())
}

#[derive(Debug, Serialize)]
struct SizingReport {
    utilization: Frac,
    covered: bool,
    max_senior_deposit: Nav,
    max_junior_withdrawal: Nav,
}

pub fn sizing(path: &str, json: bool) -> Result<()> {
    let file = config::load_market_file(path)?;
    let market = build_market(&file)?;

    let sizing = SizingReport {
        utilization: market.utilization()?,
        covered: market.is_coverage_satisfied()?,
        max_senior_deposit: market.max_senior_deposit()?,
        max_junior_withdrawal: market.max_junior_withdrawal()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&sizing)?);
        return Ok(());
    }

    report::section("Coverage Sizing");
    report::print_state(market.state());
    println!("\n{}", "Sizing:".bright_yellow());
    report::print_utilization(sizing.utilization, sizing.covered);
    println!(
        "  {} {}",
        "Max senior deposit:".bright_cyan(),
        sizing.max_senior_deposit
    );
    println!(
        "  {} {}",
        "Max junior withdrawal:".bright_cyan(),
        sizing.max_junior_withdrawal
    );
    Ok(())
}
