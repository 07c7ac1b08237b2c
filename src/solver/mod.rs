pub mod witness;
pub mod z3_solver;

pub use witness::{solve_witness, TransactionSequence, TransactionStep, WitnessOptions};
pub use z3_solver::Z3Solver;

/// Outcome of a solver query that was decided. Solver failures are errors,
/// not a third variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Solution<T> {
    Found(T),
    Unsatisfiable,
}
