//! Bindings solver: decides whether a set of equality/inequality constraints over terms is
//! consistent, and produces a refined persistent snapshot when it is.
//!
//! Variables are grouped into *varsets* (codesignation classes) plus a non-codesignation list
//! and an optional bound constant. A step's parameters additionally carry a `StepDomain`: the
//! still-possible parameter tuples for that step's action, which shrinks monotonically as
//! bindings are added and can force a variable to a single remaining object. Snapshots share
//! structure with their parent via `im::HashMap`'s persistent tree, so branching a plan in two
//! different ways from the same bindings is O(1) up front and O(log n) per touched entry.

use std::sync::Arc;

use im::{HashMap as PersistentMap, HashSet as PersistentSet};
use pocl_model::{Atom, Literal, ObjectId, ObjectTable, Term, TypeTable, VariableId, VariableTable};
use smallvec::SmallVec;

#[derive(Clone, Debug)]
struct Varset {
    members: PersistentSet<VariableId>,
    constant: Option<ObjectId>,
    non_codesignations: PersistentSet<Term>,
}

impl Varset {
    fn singleton(v: VariableId) -> Self {
        Varset {
            members: PersistentSet::unit(v),
            constant: None,
            non_codesignations: PersistentSet::new(),
        }
    }
}

/// The still-possible parameter tuples for one step's action, shared across every snapshot
/// that has not yet had to narrow it.
#[derive(Clone, Debug, Default)]
pub struct ActionDomain {
    tuples: Vec<SmallVec<[ObjectId; 4]>>,
}

impl ActionDomain {
    pub fn new(tuples: Vec<SmallVec<[ObjectId; 4]>>) -> Self {
        ActionDomain { tuples }
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn projection(&self, column: usize) -> PersistentSet<ObjectId> {
        self.tuples.iter().map(|t| t[column]).collect()
    }

    pub fn projection_size(&self, column: usize) -> usize {
        self.projection(column).len()
    }

    pub fn restrict(&self, column: usize, obj: ObjectId) -> ActionDomain {
        ActionDomain {
            tuples: self.tuples.iter().filter(|t| t[column] == obj).cloned().collect(),
        }
    }

    pub fn exclude(&self, column: usize, obj: ObjectId) -> ActionDomain {
        ActionDomain {
            tuples: self.tuples.iter().filter(|t| t[column] != obj).cloned().collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StepDomain {
    pub params: Vec<VariableId>,
    pub domain: Arc<ActionDomain>,
}

impl StepDomain {
    fn column_of(&self, v: VariableId) -> Option<usize> {
        self.params.iter().position(|&p| p == v)
    }
}

/// The persistent constraint-store snapshot. Cloning is O(1): both maps are structurally
/// shared persistent trees.
#[derive(Clone, Default)]
pub struct Bindings {
    varsets: PersistentMap<VariableId, Arc<Varset>>,
    step_domains: PersistentMap<pocl_model::StepId, Arc<StepDomain>>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn register_step_domain(&self, step: pocl_model::StepId, domain: StepDomain) -> Bindings {
        let mut next = self.clone();
        next.step_domains = next.step_domains.update(step, Arc::new(domain));
        next
    }

    fn varset_of(&self, t: Term) -> Option<Arc<Varset>> {
        match t {
            Term::Variable(v) => self.varsets.get(&v).cloned(),
            Term::Object(_) => None,
        }
    }

    /// Resolves `t` to the object it is bound to, or returns it unchanged if unconstrained.
    pub fn binding(&self, t: Term) -> Term {
        match t {
            Term::Object(_) => t,
            Term::Variable(v) => self
                .varsets
                .get(&v)
                .and_then(|vs| vs.constant)
                .map(Term::Object)
                .unwrap_or(t),
        }
    }

    /// The objects still possible for `t`, narrowed by the step's `StepDomain` column if one
    /// applies. `None` means "unconstrained beyond its declared type" — the caller falls back
    /// to every object of that type.
    pub fn domain(&self, t: Term, step: pocl_model::StepId) -> Option<PersistentSet<ObjectId>> {
        if let Term::Object(o) = self.binding(t) {
            return Some(PersistentSet::unit(o));
        }
        let v = t.as_variable()?;
        let sd = self.step_domains.get(&step)?;
        let column = sd.column_of(v)?;
        Some(sd.domain.projection(column))
    }

    /// Cheap, non-mutating check of whether asserting `a == b` is still possible.
    pub fn consistent_with_equality(&self, a: Term, b: Term) -> bool {
        let a = self.binding(a);
        let b = self.binding(b);
        if a == b {
            return true;
        }
        if let (Term::Object(o1), Term::Object(o2)) = (a, b) {
            return o1 == o2;
        }
        if let Some(vs) = self.varset_of(a) {
            if vs.non_codesignations.contains(&b) {
                return false;
            }
        }
        if let Some(vs) = self.varset_of(b) {
            if vs.non_codesignations.contains(&a) {
                return false;
            }
        }
        true
    }

    /// Cheap, non-mutating check of whether asserting `a != b` is still possible.
    pub fn consistent_with_inequality(&self, a: Term, b: Term) -> bool {
        let ra = self.binding(a);
        let rb = self.binding(b);
        if ra == rb {
            return false;
        }
        match (self.varset_of(a), self.varset_of(b)) {
            (Some(va), Some(vb)) => !Arc::ptr_eq(&va, &vb),
            _ => true,
        }
    }

    /// Extends the snapshot with one equality binding, propagating step-domain narrowing. This
    /// is the inner step of `add`; `add` folds a whole binding list through it.
    pub fn add_equality(
        &self,
        a: Term,
        b: Term,
        objects: &ObjectTable,
        vars: &VariableTable,
        types: &TypeTable,
    ) -> Option<Bindings> {
        if a == b {
            return Some(self.clone());
        }
        let type_of = |t: Term| match t {
            Term::Object(o) => objects.type_of(o),
            Term::Variable(v) => vars.type_of(v),
        };
        if types.most_specific(type_of(a), type_of(b)).is_none() {
            return None;
        }

        let va = self.varset_of(a);
        let vb = self.varset_of(b);

        let merged = match (va, vb) {
            (None, None) => {
                let mut members = PersistentSet::new();
                let mut constant = None;
                for t in [a, b] {
                    match t {
                        Term::Variable(v) => members = members.update(v),
                        Term::Object(o) => {
                            if constant.is_some_and(|c| c != o) {
                                return None;
                            }
                            constant = Some(o);
                        }
                    }
                }
                Varset {
                    members,
                    constant,
                    non_codesignations: PersistentSet::new(),
                }
            }
            (Some(vs), None) | (None, Some(vs)) => {
                let other = if self.varset_of(a).is_some() { b } else { a };
                let mut members = vs.members.clone();
                let mut constant = vs.constant;
                if vs.non_codesignations.contains(&other) {
                    return None;
                }
                match other {
                    Term::Variable(v) => {
                        members = members.update(v);
                    }
                    Term::Object(o) => {
                        if constant.is_some_and(|c| c != o) {
                            return None;
                        }
                        constant = Some(o);
                    }
                }
                Varset {
                    members,
                    constant,
                    non_codesignations: vs.non_codesignations.clone(),
                }
            }
            (Some(v1), Some(v2)) => {
                if Arc::ptr_eq(&v1, &v2) {
                    return Some(self.clone());
                }
                let constant = match (v1.constant, v2.constant) {
                    (Some(c1), Some(c2)) => {
                        if c1 != c2 {
                            return None;
                        }
                        Some(c1)
                    }
                    (Some(c), None) | (None, Some(c)) => Some(c),
                    (None, None) => None,
                };
                let conflict = v1.members.iter().any(|m| v2.non_codesignations.contains(&Term::Variable(*m)))
                    || v2.members.iter().any(|m| v1.non_codesignations.contains(&Term::Variable(*m)))
                    || constant.is_some_and(|c| {
                        v1.non_codesignations.contains(&Term::Object(c)) || v2.non_codesignations.contains(&Term::Object(c))
                    });
                if conflict {
                    return None;
                }
                Varset {
                    members: v1.members.clone().union(v2.members.clone()),
                    constant,
                    non_codesignations: v1.non_codesignations.clone().union(v2.non_codesignations.clone()),
                }
            }
        };

        let merged = Arc::new(merged);
        let mut next = self.clone();
        for v in merged.members.iter() {
            next.varsets = next.varsets.update(*v, merged.clone());
        }

        if let Some(c) = merged.constant {
            next.restrict_to_constant(&merged.members, c)
        } else {
            next.tighten_step_domains(&merged.members)
        }
    }

    fn restrict_to_constant(&self, members: &PersistentSet<VariableId>, c: ObjectId) -> Option<Bindings> {
        let mut next = self.clone();
        let touched: Vec<pocl_model::StepId> = next.step_domains.keys().copied().collect();
        let mut worklist = Vec::new();
        for step in touched {
            let sd = next.step_domains.get(&step).unwrap().clone();
            let mut changed = false;
            let mut domain = (*sd.domain).clone();
            for &v in members.iter() {
                if let Some(col) = sd.column_of(v) {
                    domain = domain.restrict(col, c);
                    changed = true;
                }
            }
            if changed {
                if domain.is_empty() {
                    return None;
                }
                for (col, &p) in sd.params.iter().enumerate() {
                    if domain.projection_size(col) == 1 && self.varsets.get(&p).and_then(|vs| vs.constant).is_none() {
                        let only = domain.projection(col).iter().next().copied().unwrap();
                        worklist.push((p, only));
                    }
                }
                next.step_domains = next
                    .step_domains
                    .update(step, Arc::new(StepDomain { params: sd.params.clone(), domain: Arc::new(domain) }));
            }
        }
        for (v, obj) in worklist {
            if next.varsets.get(&v).and_then(|vs| vs.constant) != Some(obj) {
                next.varsets = next.varsets.update(
                    v,
                    Arc::new(Varset {
                        members: PersistentSet::unit(v),
                        constant: Some(obj),
                        non_codesignations: PersistentSet::new(),
                    }),
                );
            }
        }
        Some(next)
    }

    fn tighten_step_domains(&self, members: &PersistentSet<VariableId>) -> Option<Bindings> {
        if members.len() < 2 {
            return Some(self.clone());
        }
        let mut next = self.clone();
        let touched: Vec<pocl_model::StepId> = next.step_domains.keys().copied().collect();
        for step in touched {
            let sd = next.step_domains.get(&step).unwrap().clone();
            let cols: Vec<usize> = members.iter().filter_map(|&v| sd.column_of(v)).collect();
            if cols.len() < 2 {
                continue;
            }
            let mut intersection: Option<PersistentSet<ObjectId>> = None;
            for &col in &cols {
                let proj = sd.domain.projection(col);
                intersection = Some(match intersection {
                    None => proj,
                    Some(acc) => acc.intersection(proj),
                });
            }
            let allowed = intersection.unwrap();
            if allowed.is_empty() {
                return None;
            }
            let mut domain = (*sd.domain).clone();
            for &col in &cols {
                domain.tuples.retain(|t| allowed.contains(&t[col]));
            }
            if domain.is_empty() {
                return None;
            }
            next.step_domains = next
                .step_domains
                .update(step, Arc::new(StepDomain { params: sd.params.clone(), domain: Arc::new(domain) }));
        }
        Some(next)
    }

    pub fn add_inequality(&self, a: Term, b: Term) -> Option<Bindings> {
        if !self.consistent_with_inequality(a, b) {
            return None;
        }
        let mut next = self.clone();
        if let Term::Variable(v) = a {
            let vs = next.varsets.get(&v).cloned().unwrap_or_else(|| Arc::new(Varset::singleton(v)));
            let mut vs = (*vs).clone();
            vs.non_codesignations = vs.non_codesignations.update(b);
            let arc = Arc::new(vs);
            for m in arc.members.clone().iter() {
                next.varsets = next.varsets.update(*m, arc.clone());
            }
        }
        if let Term::Variable(v) = b {
            let vs = next.varsets.get(&v).cloned().unwrap_or_else(|| Arc::new(Varset::singleton(v)));
            let mut vs = (*vs).clone();
            vs.non_codesignations = vs.non_codesignations.update(a);
            let arc = Arc::new(vs);
            for m in arc.members.clone().iter() {
                next.varsets = next.varsets.update(*m, arc.clone());
            }
        }
        if let Term::Object(oa) = next.binding(a) {
            if let Term::Variable(vb) = b {
                if let Some(step) = next.step_with_param(vb) {
                    next = next.exclude_from_step_domain(step, vb, oa)?;
                }
            }
        }
        if let Term::Object(ob) = next.binding(b) {
            if let Term::Variable(va) = a {
                if let Some(step) = next.step_with_param(va) {
                    next = next.exclude_from_step_domain(step, va, ob)?;
                }
            }
        }
        Some(next)
    }

    fn step_with_param(&self, v: VariableId) -> Option<pocl_model::StepId> {
        self.step_domains.iter().find(|(_, sd)| sd.column_of(v).is_some()).map(|(s, _)| *s)
    }

    fn exclude_from_step_domain(&self, step: pocl_model::StepId, v: VariableId, obj: ObjectId) -> Option<Bindings> {
        let mut next = self.clone();
        let sd = next.step_domains.get(&step)?.clone();
        let col = sd.column_of(v)?;
        let domain = sd.domain.exclude(col, obj);
        if domain.is_empty() {
            return None;
        }
        next.step_domains = next
            .step_domains
            .update(step, Arc::new(StepDomain { params: sd.params.clone(), domain: Arc::new(domain) }));
        Some(next)
    }

    /// Most-general unifier of two atoms, treated symbolically (independent of any binding
    /// already recorded in `self`): fails if the predicates differ, if any object-vs-object
    /// argument pair mismatches, or if a variable-vs-term pair's types have no common subtype.
    /// Ground atoms unify only when identical. The result is a binding list suitable for
    /// `Bindings::add` — every entry is an equality (`unify` never produces inequalities).
    pub fn unify(a1: &Atom, a2: &Atom, objects: &ObjectTable, vars: &VariableTable, types: &TypeTable) -> Option<Vec<(Term, Term, bool)>> {
        if a1.predicate != a2.predicate || a1.args.len() != a2.args.len() {
            return None;
        }
        let type_of = |t: Term| match t {
            Term::Object(o) => objects.type_of(o),
            Term::Variable(v) => vars.type_of(v),
        };
        let mut out = Vec::new();
        for (&t1, &t2) in a1.args.iter().zip(a2.args.iter()) {
            if t1 == t2 {
                continue;
            }
            match (t1, t2) {
                (Term::Object(o1), Term::Object(o2)) => {
                    if o1 != o2 {
                        return None;
                    }
                }
                _ => {
                    if types.most_specific(type_of(t1), type_of(t2)).is_none() {
                        return None;
                    }
                    out.push((t1, t2, true));
                }
            }
        }
        Some(out)
    }

    /// True iff `l1` and `l2` have opposite polarity and their atoms unify — i.e. one could,
    /// under some binding, falsify the other. Used by threat detection: an effect `affects` a
    /// causal link's condition when it could clobber it.
    pub fn affects(l1: &Literal, l2: &Literal, objects: &ObjectTable, vars: &VariableTable, types: &TypeTable) -> bool {
        l1.positive != l2.positive && Bindings::unify(&l1.atom, &l2.atom, objects, vars, types).is_some()
    }

    /// Folds a whole list of equality (`true`)/inequality (`false`) bindings through the
    /// solver. `test_only` skips nothing semantically (the check is already non-mutating by
    /// construction) but lets callers avoid holding on to the returned snapshot.
    pub fn add(
        &self,
        list: &[(Term, Term, bool)],
        objects: &ObjectTable,
        vars: &VariableTable,
        types: &TypeTable,
        test_only: bool,
    ) -> Option<Bindings> {
        let mut cur = self.clone();
        for &(a, b, is_eq) in list {
            cur = if is_eq {
                cur.add_equality(a, b, objects, vars, types)?
            } else {
                cur.add_inequality(a, b)?
            };
        }
        if test_only {
            Some(self.clone())
        } else {
            Some(cur)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_model::{ObjectTable, TypeTable, VariableTable};

    fn setup() -> (TypeTable, ObjectTable, VariableTable) {
        let mut types = TypeTable::new();
        let top = types.top();
        let mut objects = ObjectTable::default();
        objects.declare("a", top);
        objects.declare("b", top);
        (types, objects, VariableTable::default())
    }

    #[test]
    fn equality_binds_variable_to_constant() {
        let (types, objects, mut vars) = setup();
        let x = vars.fresh(types.top());
        let a = objects.get("a").unwrap();
        let b = Bindings::new();
        let b = b.add_equality(Term::Variable(x), Term::Object(a), &objects, &vars, &types).unwrap();
        assert_eq!(b.binding(Term::Variable(x)), Term::Object(a));
    }

    #[test]
    fn conflicting_constants_fail() {
        let (types, objects, mut vars) = setup();
        let x = vars.fresh(types.top());
        let a = objects.get("a").unwrap();
        let bobj = objects.get("b").unwrap();
        let b = Bindings::new();
        let b = b.add_equality(Term::Variable(x), Term::Object(a), &objects, &vars, &types).unwrap();
        assert!(b.add_equality(Term::Variable(x), Term::Object(bobj), &objects, &vars, &types).is_none());
    }

    #[test]
    fn inequality_rejects_later_equality() {
        let (types, objects, mut vars) = setup();
        let x = vars.fresh(types.top());
        let y = vars.fresh(types.top());
        let b = Bindings::new();
        let b = b.add_inequality(Term::Variable(x), Term::Variable(y)).unwrap();
        assert!(!b.consistent_with_equality(Term::Variable(x), Term::Variable(y)));
    }

    #[test]
    fn step_domain_narrows_to_singleton_and_binds() {
        let (types, objects, mut vars) = setup();
        let x = vars.fresh(types.top());
        let a = objects.get("a").unwrap();
        let bobj = objects.get("b").unwrap();
        let step = pocl_model::StepId::new(1);
        let domain = ActionDomain::new(vec![SmallVec::from_slice(&[a]), SmallVec::from_slice(&[bobj])]);
        let bindings = Bindings::new().register_step_domain(
            step,
            StepDomain {
                params: vec![x],
                domain: Arc::new(domain),
            },
        );
        let bindings = bindings.add_inequality(Term::Variable(x), Term::Object(bobj)).unwrap();
        assert_eq!(bindings.binding(Term::Variable(x)), Term::Object(a));
    }
}
