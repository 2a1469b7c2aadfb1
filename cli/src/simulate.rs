//! TOML scenario runner.
//!
//! Replays a scripted sequence of observations, operations, and
//! parameter changes against one market, re-verifying conservation
//! after every accepted step. Coverage and configuration rejections
//! are recorded and the run continues; invariant errors abort.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use strata_engine::{
    AccountingState, EngineError, ErrorKind, FeeDeltas, Ledger, Market, MarketId, MarketState,
    Nav, RawObservation, SyncOutcome, Tranche, TrancheOp,
};

use crate::config::{parse_frac, parse_nav, ActionDoc, ScenarioFile, StepDoc};
use crate::report;

#[derive(Debug, Serialize)]
pub struct StepRecord {
    pub at: u64,
    pub action: &'static str,
    pub accepted: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub name: String,
    pub steps_total: usize,
    pub steps_accepted: usize,
    pub steps_rejected: usize,
    pub recoveries_entered: u32,
    pub fees: FeeDeltas,
    pub final_state: AccountingState,
    pub steps: Vec<StepRecord>,
}

fn action_name(action: &ActionDoc) -> &'static str {
    match action {
        ActionDoc::Observe { .. } => "observe",
        ActionDoc::DepositSenior { .. } => "deposit-senior",
        ActionDoc::DepositJunior { .. } => "deposit-junior",
        ActionDoc::WithdrawSenior { .. } => "withdraw-senior",
        ActionDoc::WithdrawJunior { .. } => "withdraw-junior",
        ActionDoc::SetCoverage { .. } => "set-coverage",
        ActionDoc::SetBeta { .. } => "set-beta",
        ActionDoc::SetLltv { .. } => "set-lltv",
        ActionDoc::SetTerm { .. } => "set-term",
        ActionDoc::SetFees { .. } => "set-fees",
    }
}

/// Observation that redeems `desired` of a tranche's claim: its own
/// raw side is pulled first, then whatever the claim is owed out of
/// the counterpart's raw side.
fn withdrawal_observation(
    state: &AccountingState,
    tranche: Tranche,
    desired: Nav,
) -> Option<RawObservation> {
    let claim = state.effective_nav[tranche];
    if desired > claim {
        return None;
    }
    let own_side = claim.min(state.raw_nav[tranche]);
    let own_pull = desired.min(own_side);
    let other_pull = desired.saturating_sub(own_pull);
    let mut senior = state.raw_nav.senior;
    let mut junior = state.raw_nav.junior;
    match tranche {
        Tranche::Senior => {
            senior = senior.saturating_sub(own_pull);
            junior = junior.saturating_sub(other_pull);
        }
        Tranche::Junior => {
            junior = junior.saturating_sub(own_pull);
            senior = senior.saturating_sub(other_pull);
        }
    }
    Some(RawObservation::new(senior, junior))
}

/// Fund the initial book, junior first so the senior deposit lands on
/// an existing buffer.
pub fn fund_initial_book(market: &mut Market, senior: Nav, junior: Nav) -> Result<()> {
    if !junior.is_zero() {
        market
            .post_op_sync(
                TrancheOp::Increase(Tranche::Junior),
                RawObservation::new(Nav::ZERO, junior),
            )
            .context("funding initial junior book")?;
    }
    if !senior.is_zero() {
        market
            .post_op_sync(
                TrancheOp::Increase(Tranche::Senior),
                RawObservation::new(senior, junior),
            )
            .context("funding initial senior book")?;
    }
    Ok(())
}

fn apply_step(
    market: &mut Market,
    step: &StepDoc,
) -> Result<std::result::Result<Option<SyncOutcome>, EngineError>> {
    let at = step.at;
    let raws = market.state().raw_nav;
    let book = RawObservation::new(raws.senior, raws.junior);

    let result = match &step.action {
        ActionDoc::Observe { senior, junior } => {
            let observation = RawObservation::new(
                parse_nav(senior).context("step senior")?,
                parse_nav(junior).context("step junior")?,
            );
            market.pre_op_sync(observation, at).map(Some)
        }
        ActionDoc::DepositSenior { amount } => {
            let amount = parse_nav(amount).context("step amount")?;
            let target = raws
                .senior
                .try_add(amount)
                .context("senior deposit target")?;
            market
                .post_op_sync_enforce_coverage(
                    TrancheOp::Increase(Tranche::Senior),
                    RawObservation::new(target, raws.junior),
                )
                .map(|_| None)
        }
        ActionDoc::DepositJunior { amount } => {
            let amount = parse_nav(amount).context("step amount")?;
            let target = raws
                .junior
                .try_add(amount)
                .context("junior deposit target")?;
            market
                .post_op_sync_enforce_coverage(
                    TrancheOp::Increase(Tranche::Junior),
                    RawObservation::new(raws.senior, target),
                )
                .map(|_| None)
        }
        ActionDoc::WithdrawSenior { amount } => {
            let amount = parse_nav(amount).context("step amount")?;
            let observation = withdrawal_observation(market.state(), Tranche::Senior, amount)
                .context("withdrawal exceeds the senior claim")?;
            market
                .post_op_sync_enforce_coverage(TrancheOp::Decrease(Tranche::Senior), observation)
                .map(|_| None)
        }
        ActionDoc::WithdrawJunior { amount } => {
            let amount = parse_nav(amount).context("step amount")?;
            let observation = withdrawal_observation(market.state(), Tranche::Junior, amount)
                .context("withdrawal exceeds the junior claim")?;
            market
                .post_op_sync_enforce_coverage(TrancheOp::Decrease(Tranche::Junior), observation)
                .map(|_| None)
        }
        ActionDoc::SetCoverage { value } => {
            let value = parse_frac(value).context("step value")?;
            market.set_coverage(value, book, at).map(Some)
        }
        ActionDoc::SetBeta { value } => {
            let value = parse_frac(value).context("step value")?;
            market.set_beta(value, book, at).map(Some)
        }
        ActionDoc::SetLltv { value } => {
            let value = parse_frac(value).context("step value")?;
            market.set_lltv(value, book, at).map(Some)
        }
        ActionDoc::SetTerm { secs } => market.set_fixed_term(*secs, book, at).map(Some),
        ActionDoc::SetFees { senior, junior } => {
            let senior = parse_frac(senior).context("step senior fee")?;
            let junior = parse_frac(junior).context("step junior fee")?;
            market.set_protocol_fees(senior, junior, book, at).map(Some)
        }
    };
    Ok(result)
}

pub fn run(scenario: &ScenarioFile, show_progress: bool) -> Result<SimulationReport> {
    let config = scenario.market.to_config()?;
    let model = scenario.market.to_model()?;

    let mut ledger = Ledger::new();
    let id = MarketId(1);
    ledger
        .create_market(id, config, model)
        .context("invalid market configuration")?;

    if let Some(book) = &scenario.book {
        let (senior, junior) = book.to_navs()?;
        let market = ledger.market_mut(id).context("market lookup")?;
        fund_initial_book(market, senior, junior)?;
    }

    let bar = if show_progress && !scenario.steps.is_empty() {
        let bar = ProgressBar::new(scenario.steps.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Some(bar)
    } else {
        None
    };

    let mut records = Vec::with_capacity(scenario.steps.len());
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut recoveries_entered = 0u32;
    let mut fees = FeeDeltas::default();
    let mut last_at = 0u64;

    for (index, step) in scenario.steps.iter().enumerate() {
        if step.at < last_at {
            bail!(
                "step {} at t={} goes back in time (previous step at t={})",
                index + 1,
                step.at,
                last_at
            );
        }
        last_at = step.at;

        if let Some(bar) = &bar {
            bar.set_message(action_name(&step.action));
        }

        let market = ledger.market_mut(id).context("market lookup")?;
        let before = *market.state();
        let result = apply_step(market, step)
            .with_context(|| format!("step {} (t={})", index + 1, step.at))?;

        match result {
            Ok(outcome) => {
                accepted += 1;
                let state = *ledger.market(id).context("market lookup")?.state();
                if !state.conservation_holds() {
                    bail!(
                        "conservation failed after step {} (t={}): raw {:?} effective {:?}",
                        index + 1,
                        step.at,
                        state.raw_nav,
                        state.effective_nav
                    );
                }
                if before.market_state == MarketState::Healthy
                    && state.market_state == MarketState::Recovery
                {
                    recoveries_entered += 1;
                }
                let mut detail = String::new();
                if let Some(outcome) = outcome {
                    fees.senior = fees
                        .senior
                        .try_add(outcome.fees.senior)
                        .context("fee accumulator")?;
                    fees.junior = fees
                        .junior
                        .try_add(outcome.fees.junior)
                        .context("fee accumulator")?;
                    if !outcome.trace.recovery_forgiven.is_zero() {
                        detail = format!(
                            "forgave {} junior IL at window expiry",
                            outcome.trace.recovery_forgiven
                        );
                    }
                }
                if detail.is_empty() && state.market_state != before.market_state {
                    detail = match state.market_state {
                        MarketState::Recovery => "entered recovery".to_string(),
                        MarketState::Healthy => "returned to healthy".to_string(),
                    };
                }
                records.push(StepRecord {
                    at: step.at,
                    action: action_name(&step.action),
                    accepted: true,
                    detail,
                });
            }
            Err(error) => match error.kind() {
                ErrorKind::Coverage | ErrorKind::Config => {
                    rejected += 1;
                    let state = *ledger.market(id).context("market lookup")?.state();
                    if state != before {
                        bail!(
                            "rejected step {} (t={}) mutated the book",
                            index + 1,
                            step.at
                        );
                    }
                    records.push(StepRecord {
                        at: step.at,
                        action: action_name(&step.action),
                        accepted: false,
                        detail: error.to_string(),
                    });
                }
                _ => bail!("fatal engine error at step {} (t={}): {}", index + 1, step.at, error),
            },
        }

        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }

    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let final_state = *ledger.market(id).context("market lookup")?.state();
    Ok(SimulationReport {
        name: scenario.name.clone(),
        steps_total: scenario.steps.len(),
        steps_accepted: accepted,
        steps_rejected: rejected,
        recoveries_entered,
        fees,
        final_state,
        steps: records,
    })
}

pub fn print_report(simulation: &SimulationReport) {
    report::section(&format!("Scenario: {}", simulation.name));

    println!();
    for record in &simulation.steps {
        if record.accepted {
            if record.detail.is_empty() {
                println!("{} [t={}] {}", "✓".bright_green(), record.at, record.action);
            } else {
                println!(
                    "{} [t={}] {} {}",
                    "✓".bright_green(),
                    record.at,
                    record.action,
                    format!("({})", record.detail).dimmed()
                );
            }
        } else {
            println!(
                "{} [t={}] {} rejected: {}",
                "✗".bright_red(),
                record.at,
                record.action,
                record.detail
            );
        }
    }

    println!("\n{}", "Summary:".bright_yellow());
    println!(
        "  {} accepted, {} rejected, {} recovery entries",
        simulation.steps_accepted, simulation.steps_rejected, simulation.recoveries_entered
    );
    report::print_fees(&simulation.fees);
    report::print_state(&simulation.final_state);
}
