//! Numeric expressions over function applications, constants, and the four arithmetic
//! operators, plus evaluation against a fluent-value snapshot.

use std::sync::Arc;

use smallvec::SmallVec;
use thiserror::Error;

use crate::functions::FunctionId;
use crate::terms::Term;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FluentApplication {
    pub function: FunctionId,
    pub args: SmallVec<[Term; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// A numeric value, kept as a rational (numerator, denominator) pair rather than a float so
/// that equality and ordering of durations and metric values are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub fn integer(n: i64) -> Self {
        Rational { num: n, den: 1 }
    }

    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "rational with zero denominator");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1);
        Rational {
            num: num / g as i64,
            den: den / g as i64,
        }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn checked_add(self, rhs: Rational) -> Rational {
        Rational::new(self.num * rhs.den + rhs.num * self.den, self.den * rhs.den)
    }
    pub fn checked_sub(self, rhs: Rational) -> Rational {
        Rational::new(self.num * rhs.den - rhs.num * self.den, self.den * rhs.den)
    }
    pub fn checked_mul(self, rhs: Rational) -> Rational {
        Rational::new(self.num * rhs.num, self.den * rhs.den)
    }
    pub fn checked_div(self, rhs: Rational) -> Result<Rational, ExpressionError> {
        if rhs.num == 0 {
            return Err(ExpressionError::DivisionByZero);
        }
        Ok(Rational::new(self.num * rhs.den, self.den * rhs.num))
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Constant(Rational),
    Fluent(Arc<FluentApplication>),
    BinOp(ArithOp, Arc<Expression>, Arc<Expression>),
    Negate(Arc<Expression>),
}

impl Expression {
    pub fn constant(n: i64) -> Self {
        Expression::Constant(Rational::integer(n))
    }

    pub fn fluent(function: FunctionId, args: impl Into<SmallVec<[Term; 4]>>) -> Self {
        Expression::Fluent(Arc::new(FluentApplication {
            function,
            args: args.into(),
        }))
    }

    pub fn op(self, op: ArithOp, rhs: Expression) -> Self {
        Expression::BinOp(op, Arc::new(self), Arc::new(rhs))
    }

    pub fn substitute(&self, sub: &impl Fn(crate::terms::VariableId) -> Term) -> Expression {
        match self {
            Expression::Constant(c) => Expression::Constant(*c),
            Expression::Fluent(f) => {
                let args: SmallVec<[Term; 4]> = f
                    .args
                    .iter()
                    .map(|t| match t {
                        Term::Variable(v) => sub(*v),
                        Term::Object(_) => *t,
                    })
                    .collect();
                Expression::Fluent(Arc::new(FluentApplication {
                    function: f.function,
                    args,
                }))
            }
            Expression::BinOp(op, l, r) => Expression::BinOp(*op, Arc::new(l.substitute(sub)), Arc::new(r.substitute(sub))),
            Expression::Negate(e) => Expression::Negate(Arc::new(e.substitute(sub))),
        }
    }

    /// Evaluates the expression against a snapshot of fluent values, propagating the
    /// well-formedness errors this algebra can raise: division by zero and reference to a
    /// fluent that currently has no assigned value.
    pub fn evaluate(&self, values: &impl Fn(&FluentApplication) -> Option<Rational>) -> Result<Rational, ExpressionError> {
        match self {
            Expression::Constant(c) => Ok(*c),
            Expression::Fluent(f) => values(f).ok_or_else(|| ExpressionError::UndefinedFluent(f.function)),
            Expression::Negate(e) => Ok(Rational::integer(0).checked_sub(e.evaluate(values)?)),
            Expression::BinOp(op, l, r) => {
                let lv = l.evaluate(values)?;
                let rv = r.evaluate(values)?;
                match op {
                    ArithOp::Add => Ok(lv.checked_add(rv)),
                    ArithOp::Subtract => Ok(lv.checked_sub(rv)),
                    ArithOp::Multiply => Ok(lv.checked_mul(rv)),
                    ArithOp::Divide => lv.checked_div(rv),
                }
            }
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("fluent {0:?} has no assigned value")]
    UndefinedFluent(FunctionId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_arithmetic() {
        let e = Expression::constant(2).op(ArithOp::Add, Expression::constant(3));
        let v = e.evaluate(&|_| None).unwrap();
        assert_eq!(v, Rational::integer(5));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let e = Expression::constant(1).op(ArithOp::Divide, Expression::constant(0));
        let err = e.evaluate(&|_| None).unwrap_err();
        assert_eq!(err, ExpressionError::DivisionByZero);
    }

    #[test]
    fn undefined_fluent_is_an_error() {
        let fluent_id: FunctionId = 0u32.into();
        let e = Expression::fluent(fluent_id, smallvec::SmallVec::<[Term; 4]>::new());
        let err = e.evaluate(&|_| None).unwrap_err();
        assert_eq!(err, ExpressionError::UndefinedFluent(fluent_id));
    }
}
