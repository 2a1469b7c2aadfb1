//! Colored terminal rendering for engine state and outcomes.

use chrono::DateTime;
use colored::Colorize;
use strata_engine::{
    AccountingState, FeeDeltas, Frac, MarketConfig, MarketState, SyncOutcome, WaterfallTrace,
};

pub fn section(title: &str) {
    println!("{}", format!("=== {} ===", title).bright_green().bold());
}

pub fn kv(label: &str, value: impl std::fmt::Display) {
    println!("{} {}", format!("{}:", label).bright_cyan(), value);
}

fn kv_indent(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).bright_cyan(), value);
}

/// Render a unix timestamp with its UTC date when it parses as one.
pub fn timestamp(ts: u64) -> String {
    match DateTime::from_timestamp(ts as i64, 0) {
        Some(dt) => format!("{} ({})", ts, dt.format("%Y-%m-%d %H:%M:%S UTC")),
        None => ts.to_string(),
    }
}

pub fn print_config(config: &MarketConfig) {
    println!("\n{}", "Configuration:".bright_yellow());
    kv_indent("Coverage", config.coverage);
    kv_indent("Beta", config.beta);
    kv_indent("LLTV", config.lltv);
    kv_indent("Fixed term (secs)", config.fixed_term_secs);
    kv_indent("Senior fee", config.senior_fee);
    kv_indent("Junior fee", config.junior_fee);
}

pub fn print_state(state: &AccountingState) {
    println!("\n{}", "Book:".bright_yellow());
    kv_indent("Raw senior", state.raw_nav.senior);
    kv_indent("Raw junior", state.raw_nav.junior);
    kv_indent("Effective senior", state.effective_nav.senior);
    kv_indent("Effective junior", state.effective_nav.junior);
    kv_indent("Senior IL", state.impermanent_loss.senior);
    kv_indent("Junior IL", state.impermanent_loss.junior);
    match state.market_state {
        MarketState::Healthy => kv_indent("State", "HEALTHY".green()),
        MarketState::Recovery => kv_indent(
            "State",
            format!(
                "{} until {}",
                "RECOVERY".yellow(),
                timestamp(state.recovery_end_ts)
            ),
        ),
    }
    if state.conservation_holds() {
        println!("  {} raw and effective totals balance", "✓".green());
    } else {
        println!("  {} book does not balance", "✗".bright_red());
    }
}

/// Tree-style attribution of a waterfall run. Zero lines are kept, but
/// dimmed, so the full ordering is always visible.
pub fn print_trace(trace: &WaterfallTrace) {
    println!("\n{}", "Waterfall:".bright_yellow());
    let lines = [
        ("Recovery IL forgiven", trace.recovery_forgiven),
        ("Junior loss absorbed", trace.junior_loss_absorbed),
        ("Junior loss to senior", trace.junior_loss_to_senior),
        ("Junior gain repaid senior IL", trace.junior_gain_repaid_senior_il),
        ("Junior gain retained", trace.junior_gain_retained),
        ("Senior loss covered", trace.senior_loss_covered),
        ("Senior loss uncovered", trace.senior_loss_uncovered),
        ("Senior gain repaid senior IL", trace.senior_gain_repaid_senior_il),
        ("Senior gain repaid junior IL", trace.senior_gain_repaid_junior_il),
        ("Yield to senior", trace.yield_to_senior),
        ("Yield to junior", trace.yield_to_junior),
    ];
    for (i, (label, value)) in lines.iter().enumerate() {
        let branch = if i + 1 == lines.len() { "└─" } else { "├─" };
        let text = format!("{} {}: {}", branch, label, value);
        if value.is_zero() {
            println!("  {}", text.dimmed());
        } else {
            println!("  {}", text);
        }
    }
}

pub fn print_fees(fees: &FeeDeltas) {
    println!("\n{}", "Protocol fees (recorded):".bright_yellow());
    kv_indent("Senior", fees.senior);
    kv_indent("Junior", fees.junior);
}

pub fn print_outcome(outcome: &SyncOutcome, verbose: bool) {
    if verbose {
        print_trace(&outcome.trace);
    }
    print_fees(&outcome.fees);
    print_state(&outcome.state);
}

pub fn print_utilization(utilization: Frac, covered: bool) {
    if covered {
        kv_indent("Utilization", format!("{}", utilization).green());
    } else {
        kv_indent(
            "Utilization",
            format!("{} (requirement broken)", utilization).bright_red(),
        );
    }
}
