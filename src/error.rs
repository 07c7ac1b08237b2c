//! Error taxonomy of the detection engine.
//!
//! An unsatisfiable constraint set is not an error: it is reported through
//! [`crate::solver::Solution::Unsatisfiable`]. Everything in this module aborts
//! the analysis of the state being inspected.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// The execution engine handed over a state without a field the rules
    /// depend on (stack operand, active account, transaction record).
    #[error("state field `{field}` was not populated by the execution engine")]
    MissingStateField { field: String },

    /// z3 answered `unknown` (timeout, resource limit, incomplete theory).
    #[error("solver could not decide the constraint set: {reason}")]
    SolverUnknown { reason: String },

    /// A model value could not be projected into a concrete witness.
    #[error("malformed model value for `{name}`: {detail}")]
    MalformedModel { name: String, detail: String },
}

impl DetectorError {
    pub fn missing(field: impl Into<String>) -> Self {
        DetectorError::MissingStateField { field: field.into() }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        DetectorError::SolverUnknown { reason: reason.into() }
    }

    pub fn malformed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        DetectorError::MalformedModel {
            name: name.into(),
            detail: detail.into(),
        }
    }
}
