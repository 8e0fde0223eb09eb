//! Predicate table. A predicate is *static* if no action in the domain ever mentions it in an
//! effect — static predicates can be fully evaluated at grounding time.

use arcstr::ArcStr;
use hashbrown::{HashMap, HashSet};
use pocl_collections::create_ref_type;

use crate::types::TypeId;

create_ref_type!(PredicateId);

#[derive(Debug, Clone)]
pub struct PredicateSignature {
    pub name: ArcStr,
    pub parameter_types: Vec<TypeId>,
}

#[derive(Debug, Clone, Default)]
pub struct PredicateTable {
    signatures: Vec<PredicateSignature>,
    by_name: HashMap<ArcStr, PredicateId>,
}

impl PredicateTable {
    pub fn declare(&mut self, name: impl Into<ArcStr>, parameter_types: Vec<TypeId>) -> PredicateId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id: PredicateId = self.signatures.len().into();
        self.by_name.insert(name.clone(), id);
        self.signatures.push(PredicateSignature {
            name,
            parameter_types,
        });
        id
    }

    pub fn get(&self, name: &str) -> Option<PredicateId> {
        self.by_name.get(name).copied()
    }

    pub fn signature(&self, id: PredicateId) -> &PredicateSignature {
        &self.signatures[usize::from(id)]
    }

    pub fn arity(&self, id: PredicateId) -> usize {
        self.signature(id).parameter_types.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = PredicateId> + '_ {
        (0..self.signatures.len()).map(PredicateId::from)
    }
}

/// Computed once per domain: which predicates are never the subject of an action effect.
/// Static predicates can be resolved directly against the initial state at grounding time
/// instead of being tracked as plan flaws.
#[derive(Debug, Clone, Default)]
pub struct Staticity {
    dynamic: HashSet<PredicateId>,
}

impl Staticity {
    pub fn new(dynamic_predicates: impl IntoIterator<Item = PredicateId>) -> Self {
        Staticity {
            dynamic: dynamic_predicates.into_iter().collect(),
        }
    }

    pub fn is_static(&self, id: PredicateId) -> bool {
        !self.dynamic.contains(&id)
    }
}
