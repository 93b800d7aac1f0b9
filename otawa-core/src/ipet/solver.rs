//! ILP solving and back-annotation (component C12, `spec.md` §4.11).
//!
//! `good_lp`'s builder API is consumed by value on `solve()`, so the
//! solver here is a one-shot function rather than a long-lived object;
//! the [`LpSolver`] trait still gives the rest of the crate a named seam
//! to swap backends at, mirroring the original system's own pluggable
//! ILP-plugin design (`lp_solve`, `cplex`, ...) without carrying their
//! API shape.

use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{Constraint, Expression, ProblemVariables, Solution, SolverModel, Variable};

use crate::error::{OtawaError, Result};

/// A fully assembled ILP system ready to hand to a backend.
pub struct IpetProblem {
    pub vars: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
}

/// The result of a successful solve: variable values and the objective.
pub trait LpSolution {
    fn value_of(&self, var: Variable) -> i64;
    fn objective_value(&self) -> i64;
}

pub trait LpSolver {
    fn solve(&self, problem: IpetProblem) -> Result<Box<dyn LpSolution>>;
}

struct CoinCbcSolution {
    inner: good_lp::solvers::coin_cbc::CoinCbcSolution,
    objective: Expression,
}

impl LpSolution for CoinCbcSolution {
    fn value_of(&self, var: Variable) -> i64 {
        round_nonneg(self.inner.value(var))
    }

    fn objective_value(&self) -> i64 {
        round_nonneg(self.objective.eval_with(&self.inner))
    }
}

/// ILP values are rounded to the nearest non-negative integer
/// (`spec.md` §5); the variables are already declared integer, so this
/// only guards against solver floating-point noise around `.0`.
fn round_nonneg(value: f64) -> i64 {
    value.round().max(0.0) as i64
}

#[derive(Default)]
pub struct CoinCbcSolver;

impl LpSolver for CoinCbcSolver {
    fn solve(&self, problem: IpetProblem) -> Result<Box<dyn LpSolution>> {
        let IpetProblem { vars, objective, constraints } = problem;
        let mut model = vars.maximise(objective.clone()).using(coin_cbc);
        for constraint in constraints {
            model = model.with(constraint);
        }
        let solution = model.solve().map_err(map_solver_error)?;
        Ok(Box::new(CoinCbcSolution { inner: solution, objective }))
    }
}

fn map_solver_error(err: good_lp::ResolutionError) -> OtawaError {
    match err {
        good_lp::ResolutionError::Infeasible => OtawaError::Infeasible { constraint: None },
        good_lp::ResolutionError::Unbounded => OtawaError::Unbounded,
        other => OtawaError::SolverError(other.to_string()),
    }
}
