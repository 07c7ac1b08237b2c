use ethnum::U256;
use log::{trace, warn};
use z3::ast::{Ast, BV};
use z3::{Context, Model, Params, SatResult, Solver};

use super::Solution;
use crate::config::DetectorConfig;
use crate::error::{DetectorError, Result};
use crate::state::bitvec::{bv_from_u256, u256_from_bv, WORD_BITS};
use crate::state::Constraints;

/// Blocking adapter over z3. Every query runs on a fresh solver so queries
/// never observe each other's assertions; the configured timeout applies to
/// each individual check.
#[derive(Clone, Copy, Debug)]
pub struct Z3Solver<'ctx> {
    ctx: &'ctx Context,
    timeout_ms: u32,
    random_seed: u32,
}

impl<'ctx> Z3Solver<'ctx> {
    pub fn new(ctx: &'ctx Context, config: &DetectorConfig) -> Self {
        Z3Solver {
            ctx,
            timeout_ms: config.solver_timeout_ms,
            random_seed: config.random_seed,
        }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    fn params(&self) -> Params<'ctx> {
        let mut params = Params::new(self.ctx);
        params.set_u32("timeout", self.timeout_ms);
        params.set_u32("random_seed", self.random_seed);
        params
    }

    /// Whether the conjunction of `constraints` has a model at all.
    pub fn check_sat(&self, constraints: &Constraints<'ctx>) -> Result<bool> {
        let solver = Solver::new(self.ctx);
        solver.set_params(&self.params());
        for constraint in constraints.iter() {
            solver.assert(constraint);
        }
        trace!("check_sat over {} constraints", constraints.len());
        Ok(self.decide(&solver)?.is_some())
    }

    /// A model of `constraints`, minimising each of `objectives` in order when
    /// any are given.
    ///
    /// Minimisation bisects on the unsigned value of each objective with
    /// repeated checks of one solver, so every query runs under the configured
    /// timeout. A minimised objective is pinned before the next one is tried.
    pub fn get_model(
        &self,
        constraints: &Constraints<'ctx>,
        objectives: &[BV<'ctx>],
    ) -> Result<Solution<Model<'ctx>>> {
        let solver = Solver::new(self.ctx);
        solver.set_params(&self.params());
        for constraint in constraints.iter() {
            solver.assert(constraint);
        }
        trace!(
            "Solving over {} constraints, {} objectives",
            constraints.len(),
            objectives.len()
        );

        let mut model = match self.decide(&solver)? {
            Some(model) => model,
            None => return Ok(Solution::Unsatisfiable),
        };
        for objective in objectives {
            let (value, best) = self.minimise(&solver, model, objective)?;
            model = best;
            solver.assert(&objective._eq(&numeral(self.ctx, value, objective.get_size())));
        }
        Ok(Solution::Found(model))
    }

    // Smallest value of `objective` over the solver's assertions, starting from
    // a known model.
    fn minimise(
        &self,
        solver: &Solver<'ctx>,
        model: Model<'ctx>,
        objective: &BV<'ctx>,
    ) -> Result<(U256, Model<'ctx>)> {
        let mut best = model;
        let mut high = eval_objective(&best, objective)?;
        let mut low = U256::ZERO;

        while low < high {
            let mid = low + ((high - low) >> 1u32);
            solver.push();
            solver.assert(&objective.bvule(&numeral(self.ctx, mid, objective.get_size())));
            let outcome = self.decide(solver);
            solver.pop(1);
            match outcome? {
                Some(model) => {
                    high = eval_objective(&model, objective)?;
                    best = model;
                }
                None => low = mid + U256::ONE,
            }
        }
        Ok((high, best))
    }

    fn decide(&self, solver: &Solver<'ctx>) -> Result<Option<Model<'ctx>>> {
        match solver.check() {
            SatResult::Sat => solver
                .get_model()
                .map(Some)
                .ok_or_else(|| DetectorError::unknown("solver reported sat without a model")),
            SatResult::Unsat => Ok(None),
            SatResult::Unknown => {
                let reason = solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string());
                warn!("Solver returned unknown: {}", reason);
                Err(DetectorError::unknown(reason))
            }
        }
    }
}

// A constant of `width` bits (at most 256) holding `value`.
fn numeral<'ctx>(ctx: &'ctx Context, value: U256, width: u32) -> BV<'ctx> {
    let word = bv_from_u256(ctx, value);
    if width == WORD_BITS {
        word
    } else {
        word.extract(width - 1, 0)
    }
}

fn eval_objective<'ctx>(model: &Model<'ctx>, objective: &BV<'ctx>) -> Result<U256> {
    let value = model
        .eval(objective, true)
        .ok_or_else(|| DetectorError::malformed("objective", "model has no interpretation"))?;
    u256_from_bv("objective", &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    #[test]
    fn test_check_sat_distinguishes_sat_and_unsat() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Z3Solver::new(&ctx, &DetectorConfig::default());
        let x = BV::new_const(&ctx, "x", 8);

        let sat: Constraints = [x.bvugt(&BV::from_u64(&ctx, 3, 8))].into_iter().collect();
        assert!(solver.check_sat(&sat).unwrap());

        let unsat = sat.narrowed([x._eq(&BV::from_u64(&ctx, 1, 8))]);
        assert!(!solver.check_sat(&unsat).unwrap());
    }

    #[test]
    fn test_get_model_minimises_objectives() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Z3Solver::new(&ctx, &DetectorConfig::default());
        let x = BV::new_const(&ctx, "x", 16);

        let constraints: Constraints = [x.bvuge(&BV::from_u64(&ctx, 10, 16))].into_iter().collect();
        let model = match solver.get_model(&constraints, &[x.clone()]).unwrap() {
            Solution::Found(model) => model,
            Solution::Unsatisfiable => panic!("expected a model"),
        };
        assert_eq!(model.eval(&x, true).and_then(|v| v.as_u64()), Some(10));
    }

    #[test]
    fn test_get_model_reports_unsatisfiable() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Z3Solver::new(&ctx, &DetectorConfig::default());
        let x = BV::new_const(&ctx, "x", 8);

        let constraints: Constraints = [
            x._eq(&BV::from_u64(&ctx, 1, 8)),
            x._eq(&BV::from_u64(&ctx, 2, 8)),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            solver.get_model(&constraints, &[]).unwrap(),
            Solution::Unsatisfiable
        ));
    }

    #[test]
    fn test_get_model_minimises_objectives_in_order() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Z3Solver::new(&ctx, &DetectorConfig::default());
        let x = BV::new_const(&ctx, "x", 256);
        let y = BV::new_const(&ctx, "y", 256);
        let floor = bv_from_u256(&ctx, U256::ONE << 200u32);

        let constraints: Constraints = [
            x.bvuge(&floor),
            y.bvugt(&x),
        ]
        .into_iter()
        .collect();
        let model = match solver.get_model(&constraints, &[x.clone(), y.clone()]).unwrap() {
            Solution::Found(model) => model,
            Solution::Unsatisfiable => panic!("expected a model"),
        };

        let x_value = u256_from_bv("x", &model.eval(&x, true).unwrap()).unwrap();
        let y_value = u256_from_bv("y", &model.eval(&y, true).unwrap()).unwrap();
        assert_eq!(x_value, U256::ONE << 200u32);
        assert_eq!(y_value, (U256::ONE << 200u32) + U256::ONE);
    }

    // x * y == (2^61 - 1) * (2^89 - 1) with both factors non-trivial: far more
    // than a millisecond of bit-blasting.
    fn factoring<'ctx>(ctx: &'ctx Context) -> (Constraints<'ctx>, BV<'ctx>) {
        let p = (U256::ONE << 61u32) - U256::ONE;
        let q = (U256::ONE << 89u32) - U256::ONE;
        let x = BV::new_const(ctx, "x", 256);
        let y = BV::new_const(ctx, "y", 256);
        let one = bv_from_u256(ctx, U256::ONE);
        let bound = bv_from_u256(ctx, U256::ONE << 128u32);

        let constraints: Constraints = [
            x.bvmul(&y)._eq(&bv_from_u256(ctx, p * q)),
            x.bvugt(&one),
            y.bvugt(&one),
            x.bvult(&bound),
            y.bvult(&bound),
        ]
        .into_iter()
        .collect();
        (constraints, x)
    }

    #[test]
    fn test_timeout_surfaces_as_solver_unknown() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let config = DetectorConfig {
            solver_timeout_ms: 1,
            ..DetectorConfig::default()
        };
        let solver = Z3Solver::new(&ctx, &config);
        let (constraints, x) = factoring(&ctx);

        assert!(matches!(
            solver.check_sat(&constraints),
            Err(DetectorError::SolverUnknown { .. })
        ));
        assert!(matches!(
            solver.get_model(&constraints, &[x]),
            Err(DetectorError::SolverUnknown { .. })
        ));
    }
}
