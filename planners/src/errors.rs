//! Errors raised while configuring or running search, as opposed to errors raised while
//! building the model (those live in `pocl_model::ModelError`).

use thiserror::Error;

use pocl_model::ExpressionError;

/// A malformed `Configuration`: an unknown grammar token, an inconsistent list length, or a
/// parameter outside its valid range.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown search algorithm: {0}")]
    UnknownSearchAlgorithm(String),
    #[error("unknown heuristic: {0}")]
    UnknownHeuristic(String),
    #[error("unknown action cost mode: {0}")]
    UnknownActionCostMode(String),
    #[error("malformed flaw-order expression {0:?}: {1}")]
    FlawOrderGrammar(String, String),
    #[error("at least one flaw order must be configured")]
    EmptyFlawOrders,
    #[error("{search_limits} search limits configured for {flaw_orders} flaw orders; the lists must be the same length")]
    SearchLimitMismatch { flaw_orders: usize, search_limits: usize },
    #[error("weight must be non-negative, got {0}")]
    NegativeWeight(f64),
}

/// The five ways a planning run can fail to produce a plan, per the search driver's contract.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("the problem has no solution")]
    Unsatisfiable,
    #[error("search limit reached without finding a plan")]
    SearchLimitReached,
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}
