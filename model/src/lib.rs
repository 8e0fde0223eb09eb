//! Lifted first-order planning model: types, terms, predicates, functions, the formula
//! algebra, effects, action schemas, and domain/problem containers.
//!
//! This crate has no notion of a partial plan or a step's place within one; `StepId` here is
//! only the bare integer used by `Formula::Equality`/`Inequality` to tag which step's
//! codesignation is being asserted. The full plan-state-aware `Step` wrapper lives in the
//! `planning` crate.

pub mod actions;
pub mod effects;
pub mod errors;
pub mod expressions;
pub mod formula;
pub mod functions;
pub mod predicates;
pub mod problem;
pub mod step_id;
pub mod terms;
pub mod types;

pub use actions::{ActionId, ActionKind, ActionSchema, ActionTable, Duration, DurationConstraint, TimedCondition};
pub use effects::{AssignOp, Effect, EffectTarget, EffectTiming};
pub use errors::ModelError;
pub use expressions::{ArithOp, Expression, ExpressionError, FluentApplication, Rational};
pub use formula::{Atom, AtomTable, Formula, FormulaTime, Literal};
pub use functions::{FunctionId, FunctionStaticity, FunctionTable};
pub use predicates::{PredicateId, PredicateTable, Staticity};
pub use problem::{Domain, Metric, OptimizationSense, Problem, Requirements, TimedInitialLiteral};
pub use step_id::StepId;
pub use terms::{ObjectId, ObjectTable, Term, VariableId, VariableTable};
pub use types::{TypeId, TypeTable};
