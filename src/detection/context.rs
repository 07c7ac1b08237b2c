use anyhow::Result as AnyResult;
use z3::Context;

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::solver::{solve_witness, Solution, TransactionSequence, WitnessOptions, Z3Solver};
use crate::state::{Actors, Constraints, StateView};

/// Everything a rule needs besides the state: the solver handle and the actor
/// constants. Passed explicitly into every rule evaluation.
#[derive(Clone, Debug)]
pub struct DetectionContext<'ctx> {
    solver: Z3Solver<'ctx>,
    actors: Actors<'ctx>,
    witness: WitnessOptions,
}

impl<'ctx> DetectionContext<'ctx> {
    pub fn new(ctx: &'ctx Context, config: &DetectorConfig) -> AnyResult<Self> {
        let addresses = config.actors.resolve()?;
        Ok(DetectionContext {
            solver: Z3Solver::new(ctx, config),
            actors: Actors::new(ctx, addresses),
            witness: WitnessOptions::from(config),
        })
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.solver.ctx()
    }

    pub fn actors(&self) -> &Actors<'ctx> {
        &self.actors
    }

    pub fn solver(&self) -> &Z3Solver<'ctx> {
        &self.solver
    }

    pub fn check_sat(&self, constraints: &Constraints<'ctx>) -> Result<bool> {
        self.solver.check_sat(constraints)
    }

    pub fn solve_witness(
        &self,
        view: &StateView<'_, 'ctx>,
        constraints: &Constraints<'ctx>,
    ) -> Result<Solution<TransactionSequence>> {
        solve_witness(&self.solver, &self.actors, &self.witness, view, constraints)
    }
}
