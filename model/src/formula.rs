//! Formula algebra: a tagged tree of logical formulas with structural sharing and reference
//! counting. `Formula` is a cheap-to-clone handle (interior `Arc`s) so that refinement can
//! build new formulas that mostly reuse subtrees of their parent.
//!
//! Atoms and negated atoms are interned *only when ground* (no variables), so ground
//! instances compare by pointer identity in the common case; lifted atoms (those still
//! containing a variable) are plain un-interned `Arc`s compared structurally.

use std::sync::Arc;

use once_cell::unsync::OnceCell;
use smallvec::SmallVec;

use crate::functions::FunctionId;
use crate::predicates::{PredicateId, PredicateTable, Staticity};
use crate::step_id::StepId;
use crate::terms::{ObjectTable, Term, VariableId, VariableTable};
use crate::types::TypeTable;

/// `(predicate arg1 arg2 ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub predicate: PredicateId,
    pub args: SmallVec<[Term; 4]>,
}

impl Atom {
    pub fn new(predicate: PredicateId, args: impl Into<SmallVec<[Term; 4]>>) -> Self {
        Atom {
            predicate,
            args: args.into(),
        }
    }

    pub fn is_ground(&self) -> bool {
        self.args.iter().all(Term::is_object)
    }

    /// Substitutes variables in this atom's arguments, leaving object constants untouched.
    pub fn substitute_args(&self, sub: &impl Fn(VariableId) -> Term) -> Atom {
        let args: SmallVec<[Term; 4]> = self
            .args
            .iter()
            .map(|t| match t {
                Term::Variable(v) => sub(*v),
                Term::Object(_) => *t,
            })
            .collect();
        Atom::new(self.predicate, args)
    }
}

/// Interns ground atoms so that two occurrences of the same ground atom are the same `Arc`
/// (fast identity comparison); lifted atoms are left un-interned.
#[derive(Default)]
pub struct AtomTable {
    ground: hashbrown::HashMap<Atom, Arc<Atom>>,
}

impl AtomTable {
    pub fn intern(&mut self, atom: Atom) -> Arc<Atom> {
        if atom.is_ground() {
            if let Some(existing) = self.ground.get(&atom) {
                return existing.clone();
            }
            let arc = Arc::new(atom.clone());
            self.ground.insert(atom, arc.clone());
            arc
        } else {
            Arc::new(atom)
        }
    }
}

/// A literal: a (possibly negated) atom. Two literals with the same interned atom and
/// polarity are `==` in O(1) when the atom is ground (pointer comparison via `Arc::ptr_eq`
/// would be even cheaper but structural equality is already cheap here since args are small).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub atom: Arc<Atom>,
    pub positive: bool,
}

impl Literal {
    pub fn positive(atom: Arc<Atom>) -> Self {
        Literal { atom, positive: true }
    }
    pub fn negative(atom: Arc<Atom>) -> Self {
        Literal { atom, positive: false }
    }
    pub fn negate(&self) -> Self {
        Literal {
            atom: self.atom.clone(),
            positive: !self.positive,
        }
    }
}

/// The temporal tag attached to a condition, matching the three durative-action annotations
/// plus the classical (non-durative) case, which is treated as `AtStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaTime {
    AtStart,
    OverAll,
    AtEnd,
}

struct ForallNode {
    vars: Vec<VariableId>,
    body: Formula,
    universal_base: OnceCell<Formula>,
}

/// A formula handle. Cloning is cheap: compound nodes hold their children behind `Arc`.
#[derive(Clone)]
pub enum Formula {
    True,
    False,
    Literal(Literal),
    /// `var@step == term@step` (or the negated form via `Inequality`).
    Equality(Term, StepId, Term, StepId),
    Inequality(Term, StepId, Term, StepId),
    Conjunction(Arc<[Formula]>),
    Disjunction(Arc<[Formula]>),
    Exists(Arc<[VariableId]>, Arc<Formula>),
    Forall(Arc<ForallNode>),
    Timed(Arc<Formula>, FormulaTime),
}

impl Formula {
    pub fn conjunction(parts: Vec<Formula>) -> Formula {
        let parts: Vec<Formula> = parts.into_iter().filter(|f| !matches!(f, Formula::True)).collect();
        if parts.iter().any(|f| matches!(f, Formula::False)) {
            return Formula::False;
        }
        match parts.len() {
            0 => Formula::True,
            1 => parts.into_iter().next().unwrap(),
            _ => Formula::Conjunction(parts.into()),
        }
    }

    pub fn disjunction(parts: Vec<Formula>) -> Formula {
        let parts: Vec<Formula> = parts.into_iter().filter(|f| !matches!(f, Formula::False)).collect();
        if parts.iter().any(|f| matches!(f, Formula::True)) {
            return Formula::True;
        }
        match parts.len() {
            0 => Formula::False,
            1 => parts.into_iter().next().unwrap(),
            _ => Formula::Disjunction(parts.into()),
        }
    }

    pub fn exists(vars: Vec<VariableId>, body: Formula) -> Formula {
        if vars.is_empty() {
            return body;
        }
        Formula::Exists(vars.into(), Arc::new(body))
    }

    pub fn forall(vars: Vec<VariableId>, body: Formula) -> Formula {
        if vars.is_empty() {
            return body;
        }
        Formula::Forall(Arc::new(ForallNode {
            vars,
            body,
            universal_base: OnceCell::new(),
        }))
    }

    pub fn timed(self, when: FormulaTime) -> Formula {
        Formula::Timed(Arc::new(self), when)
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Formula::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.as_literal().is_some()
    }

    /// Pushes negation all the way to the leaves (De Morgan), so that `Negation` never wraps
    /// anything but a `Literal`'s polarity flip inside the returned tree.
    pub fn negate(&self) -> Formula {
        match self {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Literal(l) => Formula::Literal(l.negate()),
            Formula::Equality(v, vs, t, ts) => Formula::Inequality(*v, *vs, *t, *ts),
            Formula::Inequality(v, vs, t, ts) => Formula::Equality(*v, *vs, *t, *ts),
            Formula::Conjunction(parts) => Formula::disjunction(parts.iter().map(Formula::negate).collect()),
            Formula::Disjunction(parts) => Formula::conjunction(parts.iter().map(Formula::negate).collect()),
            Formula::Exists(vars, body) => Formula::forall(vars.to_vec(), body.negate()),
            Formula::Forall(node) => Formula::exists(node.vars.clone(), node.body.negate()),
            Formula::Timed(body, when) => body.negate().timed(*when),
        }
    }

    /// Substitutes variables according to `sub`; objects and already-ground terms pass
    /// through unchanged. Used both for grounding (schema parameter -> object) and for
    /// "freshening" universally quantified effect parameters during threat separation.
    pub fn substitute(&self, sub: &impl Fn(VariableId) -> Term) -> Formula {
        let sub_term = |t: &Term| -> Term {
            match t {
                Term::Variable(v) => sub(*v),
                Term::Object(_) => *t,
            }
        };
        match self {
            Formula::True => Formula::True,
            Formula::False => Formula::False,
            Formula::Literal(l) => {
                let args: SmallVec<[Term; 4]> = l.atom.args.iter().map(sub_term).collect();
                let new_atom = Arc::new(Atom::new(l.atom.predicate, args));
                Formula::Literal(Literal {
                    atom: new_atom,
                    positive: l.positive,
                })
            }
            Formula::Equality(v, vs, t, ts) => Formula::Equality(sub_term(v), *vs, sub_term(t), *ts),
            Formula::Inequality(v, vs, t, ts) => Formula::Inequality(sub_term(v), *vs, sub_term(t), *ts),
            Formula::Conjunction(parts) => Formula::Conjunction(parts.iter().map(|f| f.substitute(sub)).collect()),
            Formula::Disjunction(parts) => Formula::Disjunction(parts.iter().map(|f| f.substitute(sub)).collect()),
            Formula::Exists(vars, body) => Formula::Exists(vars.clone(), Arc::new(body.substitute(sub))),
            Formula::Forall(node) => Formula::forall(node.vars.clone(), node.body.substitute(sub)),
            Formula::Timed(body, when) => Formula::Timed(Arc::new(body.substitute(sub)), *when),
        }
    }

    /// Expands a `Forall` to the finite conjunction obtained by substituting every object
    /// compatible with the quantified variables' types, caching the result. Non-`Forall`
    /// formulas are returned unchanged (recursing into their children first).
    pub fn universal_base(&self, objects: &ObjectTable, vars: &VariableTable, types: &TypeTable) -> Formula {
        match self {
            Formula::Forall(node) => node
                .universal_base
                .get_or_init(|| expand_forall(node, objects, vars, types))
                .clone(),
            Formula::Conjunction(parts) => {
                Formula::Conjunction(parts.iter().map(|f| f.universal_base(objects, vars, types)).collect())
            }
            Formula::Disjunction(parts) => {
                Formula::Disjunction(parts.iter().map(|f| f.universal_base(objects, vars, types)).collect())
            }
            Formula::Exists(qvars, body) => {
                Formula::Exists(qvars.clone(), Arc::new(body.universal_base(objects, vars, types)))
            }
            Formula::Timed(body, when) => Formula::Timed(Arc::new(body.universal_base(objects, vars, types)), *when),
            other => other.clone(),
        }
    }

    /// Replaces fully-ground literals over a static predicate with `True`/`False` according to
    /// whether the ground atom is in the initial state, and simplifies the tree in the process.
    pub fn instantiate_against_init(&self, init: &hashbrown::HashSet<Arc<Atom>>, statics: &Staticity) -> Formula {
        match self {
            Formula::Literal(l) if l.atom.is_ground() && statics.is_static(l.atom.predicate) => {
                let holds = init.contains(&l.atom);
                if holds == l.positive {
                    Formula::True
                } else {
                    Formula::False
                }
            }
            Formula::Conjunction(parts) => Formula::conjunction(
                parts
                    .iter()
                    .map(|f| f.instantiate_against_init(init, statics))
                    .collect(),
            ),
            Formula::Disjunction(parts) => Formula::disjunction(
                parts
                    .iter()
                    .map(|f| f.instantiate_against_init(init, statics))
                    .collect(),
            ),
            Formula::Exists(vars, body) => {
                Formula::Exists(vars.clone(), Arc::new(body.instantiate_against_init(init, statics)))
            }
            Formula::Forall(node) => Formula::forall(node.vars.clone(), node.body.instantiate_against_init(init, statics)),
            Formula::Timed(body, when) => Formula::Timed(Arc::new(body.instantiate_against_init(init, statics)), *when),
            other => other.clone(),
        }
    }
}

fn expand_forall(node: &ForallNode, objects: &ObjectTable, vars: &VariableTable, types: &TypeTable) -> Formula {
    fn rec(
        remaining: &[VariableId],
        body: &Formula,
        objects: &ObjectTable,
        vars: &VariableTable,
        types: &TypeTable,
        acc: &mut Vec<(VariableId, Term)>,
        out: &mut Vec<Formula>,
    ) {
        match remaining.split_first() {
            None => {
                let subst = |v: VariableId| -> Term {
                    acc.iter()
                        .find(|(qv, _)| *qv == v)
                        .map(|(_, t)| *t)
                        .unwrap_or(Term::Variable(v))
                };
                out.push(body.substitute(&subst));
            }
            Some((&v, rest)) => {
                let tpe = vars.type_of(v);
                for obj in objects.iter() {
                    if types.subtype(objects.type_of(obj), tpe) {
                        acc.push((v, Term::Object(obj)));
                        rec(rest, body, objects, vars, types, acc, out);
                        acc.pop();
                    }
                }
            }
        }
    }
    let mut out = Vec::new();
    rec(&node.vars, &node.body, objects, vars, types, &mut Vec::new(), &mut out);
    Formula::conjunction(out)
}

/// Lets a caller that only has predicate metadata (no full atom table) still name a fluent
/// used by a numeric expression; kept here since `FunctionId` is otherwise only referenced by
/// `expressions.rs`.
pub fn is_reserved_total_time(function: FunctionId, functions: &crate::functions::FunctionTable) -> bool {
    functions.signature(function).name.as_str() == crate::functions::TOTAL_TIME
}

#[allow(unused)]
fn _assert_predicate_table_used(_: &PredicateTable) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::PredicateTable;
    use crate::terms::ObjectTable;
    use crate::types::TypeTable;

    fn setup() -> (TypeTable, ObjectTable, VariableTable, PredicateTable) {
        let mut types = TypeTable::new();
        let top = types.top();
        let mut objects = ObjectTable::default();
        objects.declare("a", top);
        objects.declare("b", top);
        let vars = VariableTable::default();
        let mut preds = PredicateTable::default();
        preds.declare("p", vec![top]);
        (types, objects, vars, preds)
    }

    #[test]
    fn ground_atoms_are_interned() {
        let (_, _, _, preds) = setup();
        let p = preds.get("p").unwrap();
        let mut atoms = AtomTable::default();
        let args1: SmallVec<[Term; 4]> = smallvec::smallvec![Term::Object(0u32.into())];
        let args2: SmallVec<[Term; 4]> = smallvec::smallvec![Term::Object(0u32.into())];
        let a1 = atoms.intern(Atom::new(p, args1));
        let a2 = atoms.intern(Atom::new(p, args2));
        assert!(Arc::ptr_eq(&a1, &a2));
    }

    #[test]
    fn negation_is_involutive() {
        let (_, _, _, preds) = setup();
        let p = preds.get("p").unwrap();
        let mut atoms = AtomTable::default();
        let args: SmallVec<[Term; 4]> = smallvec::smallvec![Term::Object(0u32.into())];
        let a = atoms.intern(Atom::new(p, args));
        let f = Formula::Literal(Literal::positive(a));
        let nn = f.negate().negate();
        match (&f, &nn) {
            (Formula::Literal(l1), Formula::Literal(l2)) => assert_eq!(l1, l2),
            _ => panic!("expected literal"),
        }
    }

    #[test]
    fn forall_expands_over_compatible_objects() {
        let (types, objects, vars, preds) = setup();
        let mut vars = vars;
        let x = vars.fresh(types.top());
        let p = preds.get("p").unwrap();
        let mut atoms = AtomTable::default();
        let args: SmallVec<[Term; 4]> = smallvec::smallvec![Term::Variable(x)];
        let atom = atoms.intern(Atom::new(p, args));
        let body = Formula::Literal(Literal::positive(atom));
        let forall = Formula::forall(vec![x], body);
        let expanded = forall.universal_base(&objects, &vars, &types);
        match expanded {
            Formula::Conjunction(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected conjunction of 2, got {:?}", std::mem::discriminant(&other)),
        }
    }
}
