//! Errors raised while building or grounding a domain/problem model, as opposed to errors
//! raised during search (those live in the `planners` crate).

use arcstr::ArcStr;
use thiserror::Error;

use crate::expressions::ExpressionError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown type: {0}")]
    UnknownType(ArcStr),
    #[error("unknown predicate: {0}")]
    UnknownPredicate(ArcStr),
    #[error("unknown function: {0}")]
    UnknownFunction(ArcStr),
    #[error("unknown object: {0}")]
    UnknownObject(ArcStr),
    #[error("unknown action: {0}")]
    UnknownAction(ArcStr),
    #[error("action {action} applied with {got} arguments, expected {expected}")]
    ArityMismatch {
        action: ArcStr,
        expected: usize,
        got: usize,
    },
    #[error("argument {index} of {action} has type {got}, expected a subtype of {expected}")]
    TypeMismatch {
        action: ArcStr,
        index: usize,
        expected: ArcStr,
        got: ArcStr,
    },
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}
