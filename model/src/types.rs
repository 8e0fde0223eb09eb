//! Type lattice: user-declared type names with (possibly multiple) supertypes, plus
//! "either-of" union types. Answers the two queries the rest of the planner needs:
//! `subtype(a, b)` and `most_specific(a, b)` (the join of two types, or `None` if they are
//! incompatible).

use arcstr::ArcStr;
use hashbrown::HashMap;
use pocl_collections::create_ref_type;
use smallvec::SmallVec;

create_ref_type!(TypeId);

#[derive(Debug, Clone)]
enum TypeDef {
    /// A primitively declared type, with zero or more declared supertypes. No supertypes at
    /// all means it is only a subtype of itself (besides the implicit top type).
    Base {
        name: ArcStr,
        supertypes: SmallVec<[TypeId; 2]>,
    },
    /// A union `(either t1 t2 ...)`. Subtype of `b` iff every member is; `a` is subtype of the
    /// union iff `a` is subtype of some member.
    Either(SmallVec<[TypeId; 4]>),
}

/// Interns type names and unions, and answers subtype/join queries over the resulting lattice.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    defs: Vec<TypeDef>,
    by_name: HashMap<ArcStr, TypeId>,
    top: Option<TypeId>,
    either_cache: HashMap<Vec<TypeId>, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable::default();
        let top = table.declare("object", &[]);
        table.top = Some(top);
        table
    }

    /// The implicit top type ("object" in PDDL), of which every other type is a subtype.
    pub fn top(&self) -> TypeId {
        self.top.expect("TypeTable::new was not used to construct this table")
    }

    pub fn declare(&mut self, name: impl Into<ArcStr>, supertypes: &[TypeId]) -> TypeId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id: TypeId = self.defs.len().into();
        self.defs.push(TypeDef::Base {
            name,
            supertypes: supertypes.iter().copied().collect(),
        });
        self.by_name.insert(self.name_of(id).into(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, tpe: TypeId) -> ArcStr {
        match &self.defs[usize::from(tpe)] {
            TypeDef::Base { name, .. } => name.clone(),
            TypeDef::Either(members) => {
                let names: Vec<String> = members.iter().map(|m| self.name_of(*m).to_string()).collect();
                arcstr::format!("(either {})", names.join(" "))
            }
        }
    }

    /// Interns a union type over `members` (deduplicated, order-independent).
    pub fn either_of(&mut self, members: &[TypeId]) -> TypeId {
        let mut members: Vec<TypeId> = members.to_vec();
        members.sort_by_key(|t| usize::from(*t));
        members.dedup();
        if members.len() == 1 {
            return members[0];
        }
        if let Some(&id) = self.either_cache.get(&members) {
            return id;
        }
        let id: TypeId = self.defs.len().into();
        self.defs.push(TypeDef::Either(members.iter().copied().collect()));
        self.either_cache.insert(members, id);
        id
    }

    fn direct_supertypes(&self, tpe: TypeId) -> SmallVec<[TypeId; 2]> {
        match &self.defs[usize::from(tpe)] {
            TypeDef::Base { supertypes, .. } => supertypes.clone(),
            TypeDef::Either(_) => SmallVec::new(),
        }
    }

    /// `true` iff every value of type `a` is also a value of type `b`.
    pub fn subtype(&self, a: TypeId, b: TypeId) -> bool {
        if a == b || b == self.top() {
            return true;
        }
        match &self.defs[usize::from(a)] {
            TypeDef::Either(members) => members.iter().all(|&m| self.subtype(m, b)),
            TypeDef::Base { .. } => match &self.defs[usize::from(b)] {
                TypeDef::Either(members) => members.iter().any(|&m| self.subtype(a, m)),
                TypeDef::Base { .. } => self
                    .direct_supertypes(a)
                    .iter()
                    .any(|&sup| sup == b || self.subtype(sup, b)),
            },
        }
    }

    /// Returns the join of `a` and `b`: the most specific type that both are subtypes of, or
    /// `None` if no common type exists (other than an explicit incompatibility — the top type
    /// `object` always exists as a fallback common ancestor, so this really only returns
    /// `None` when one of the ids is unknown or when either-of members share no type at all).
    pub fn most_specific(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        if self.subtype(a, b) {
            return Some(a);
        }
        if self.subtype(b, a) {
            return Some(b);
        }
        // Search ancestors of `a` for the most specific one that is also an ancestor of `b`.
        let mut candidates: Vec<TypeId> = self.ancestors(a).into_iter().filter(|&anc| self.subtype(b, anc)).collect();
        if candidates.is_empty() {
            return None;
        }
        // Keep only the minimal (most specific) ones.
        candidates.retain(|&c| !candidates.iter().any(|&other| other != c && self.subtype(other, c)));
        candidates.into_iter().next()
    }

    fn ancestors(&self, tpe: TypeId) -> Vec<TypeId> {
        let mut seen = vec![tpe];
        let mut frontier = vec![tpe];
        while let Some(t) = frontier.pop() {
            for sup in self.direct_supertypes(t) {
                if !seen.contains(&sup) {
                    seen.push(sup);
                    frontier.push(sup);
                }
            }
        }
        seen.push(self.top());
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chain_subtyping() {
        let mut t = TypeTable::new();
        let vehicle = t.declare("vehicle", &[]);
        let car = t.declare("car", &[vehicle]);
        assert!(t.subtype(car, vehicle));
        assert!(t.subtype(car, t.top()));
        assert!(!t.subtype(vehicle, car));
    }

    #[test]
    fn either_of_union() {
        let mut t = TypeTable::new();
        let car = t.declare("car", &[]);
        let truck = t.declare("truck", &[]);
        let either = t.either_of(&[car, truck]);
        assert!(t.subtype(car, either));
        assert!(t.subtype(truck, either));
        assert!(!t.subtype(either, car));
    }

    #[test]
    fn most_specific_common_ancestor() {
        let mut t = TypeTable::new();
        let vehicle = t.declare("vehicle", &[]);
        let car = t.declare("car", &[vehicle]);
        let truck = t.declare("truck", &[vehicle]);
        assert_eq!(t.most_specific(car, truck), Some(vehicle));
        assert_eq!(t.most_specific(car, car), Some(car));
    }

    #[test]
    fn multiple_supertypes() {
        let mut t = TypeTable::new();
        let floats = t.declare("floats", &[]);
        let drives = t.declare("drives", &[]);
        let amphibious_car = t.declare("amphibious-car", &[floats, drives]);
        assert!(t.subtype(amphibious_car, floats));
        assert!(t.subtype(amphibious_car, drives));
    }
}
