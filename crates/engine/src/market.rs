//! A single two-tranche market: configuration, accounting state, and
//! the yield model, behind the operation API a kernel drives.
//!
//! Mutating calls follow one discipline: compute the full transition
//! on a scratch copy, check everything, then commit. An error from any
//! method means the market is exactly as it was before the call.

use alloc::boxed::Box;

use crate::adapter::{self, InvestmentAdapter};
use crate::config::MarketConfig;
use crate::coverage;
use crate::error::{EngineError, Result};
use crate::postop::{self, TrancheOp};
use crate::state::AccountingState;
use crate::sync::{self, RawObservation, SyncOutcome};
use crate::units::{Frac, Nav};
use crate::ydm::YieldDistributionModel;

/// One market's full accounting stack.
pub struct Market {
    config: MarketConfig,
    state: AccountingState,
    yield_model: Box<dyn YieldDistributionModel>,
}

impl Market {
    /// Open a market with a validated configuration and an empty book.
    pub fn create(
        config: MarketConfig,
        yield_model: Box<dyn YieldDistributionModel>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Market {
            config,
            state: AccountingState::new(),
            yield_model,
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn state(&self) -> &AccountingState {
        &self.state
    }

    fn run_sync(&self, observation: RawObservation, now: u64) -> Result<SyncOutcome> {
        let accrued = sync::accrued_yield_share(
            &self.state,
            &self.config,
            self.yield_model.as_ref(),
            observation,
            now,
        )?;
        sync::compute(&self.state, &self.config, observation, accrued, now)
    }

    /// Run the waterfall without committing anything. Identical inputs
    /// produce identical outcomes, and the committed result of
    /// [`pre_op_sync`](Market::pre_op_sync) for the same inputs.
    pub fn preview_sync(&self, observation: RawObservation, now: u64) -> Result<SyncOutcome> {
        self.run_sync(observation, now)
    }

    /// Synchronize the book against fresh raw observations. Call
    /// before acting on any balance-dependent decision.
    pub fn pre_op_sync(&mut self, observation: RawObservation, now: u64) -> Result<SyncOutcome> {
        let outcome = self.run_sync(observation, now)?;
        self.state = outcome.state;
        Ok(outcome)
    }

    /// Observe an adapter and synchronize against it in one call.
    pub fn pre_op_sync_with(
        &mut self,
        adapter: &dyn InvestmentAdapter,
        now: u64,
    ) -> Result<SyncOutcome> {
        let observation = adapter::observe(adapter)?;
        self.pre_op_sync(observation, now)
    }

    /// Reconcile a deposit or withdrawal the caller just executed.
    pub fn post_op_sync(
        &mut self,
        op: TrancheOp,
        observation: RawObservation,
    ) -> Result<AccountingState> {
        let next = postop::compute(&self.state, op, observation)?;
        self.state = next;
        Ok(next)
    }

    /// Reconcile an operation, but refuse to commit a book that would
    /// violate the coverage requirement. On refusal the market is
    /// untouched and the caller should unwind or resize the operation.
    pub fn post_op_sync_enforce_coverage(
        &mut self,
        op: TrancheOp,
        observation: RawObservation,
    ) -> Result<AccountingState> {
        let next = postop::compute(&self.state, op, observation)?;
        if !coverage::is_covered(&next, &self.config)? {
            log::debug!("coverage enforcement rejected {:?}", op);
            return Err(EngineError::CoverageExceeded);
        }
        self.state = next;
        Ok(next)
    }

    /// Whether the book currently satisfies its coverage requirement.
    pub fn is_coverage_satisfied(&self) -> Result<bool> {
        coverage::is_covered(&self.state, &self.config)
    }

    /// Coverage utilization; above 1 means the requirement is broken.
    pub fn utilization(&self) -> Result<Frac> {
        coverage::utilization(&self.state, &self.config)
    }

    /// Largest senior deposit the coverage bound admits right now.
    pub fn max_senior_deposit(&self) -> Result<Nav> {
        coverage::max_senior_deposit(&self.state, &self.config)
    }

    /// Largest junior withdrawal the coverage bound admits right now.
    pub fn max_junior_withdrawal(&self) -> Result<Nav> {
        coverage::max_junior_withdrawal(&self.state, &self.config)
    }

    /// Validate a candidate configuration, settle the elapsed period
    /// under the old parameters, then commit both. Periods are always
    /// governed by the parameters that were live while they elapsed.
    fn reconfigure(
        &mut self,
        candidate: MarketConfig,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        candidate.validate()?;
        let outcome = self.run_sync(observation, now)?;
        self.state = outcome.state;
        self.config = candidate;
        Ok(outcome)
    }

    pub fn set_coverage(
        &mut self,
        coverage: Frac,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        let candidate = MarketConfig {
            coverage,
            ..self.config
        };
        self.reconfigure(candidate, observation, now)
    }

    pub fn set_beta(
        &mut self,
        beta: Frac,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        let candidate = MarketConfig { beta, ..self.config };
        self.reconfigure(candidate, observation, now)
    }

    pub fn set_lltv(
        &mut self,
        lltv: Frac,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        let candidate = MarketConfig { lltv, ..self.config };
        self.reconfigure(candidate, observation, now)
    }

    pub fn set_fixed_term(
        &mut self,
        fixed_term_secs: u64,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        let candidate = MarketConfig {
            fixed_term_secs,
            ..self.config
        };
        self.reconfigure(candidate, observation, now)
    }

    pub fn set_protocol_fees(
        &mut self,
        senior_fee: Frac,
        junior_fee: Frac,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        let candidate = MarketConfig {
            senior_fee,
            junior_fee,
            ..self.config
        };
        self.reconfigure(candidate, observation, now)
    }

    /// Swap the yield model. The elapsed period is settled under the
    /// outgoing model first.
    pub fn set_yield_model(
        &mut self,
        yield_model: Box<dyn YieldDistributionModel>,
        observation: RawObservation,
        now: u64,
    ) -> Result<SyncOutcome> {
        let outcome = self.run_sync(observation, now)?;
        self.state = outcome.state;
        self.yield_model = yield_model;
        Ok(outcome)
    }
}
