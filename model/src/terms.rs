//! Terms (object constants and variables), interned in a shared, process-scoped table.
//!
//! Objects carry non-negative ids; variables are allocated fresh from a single global counter
//! for the duration of search. We keep the two in separate interned tables (`ObjectId`,
//! `VariableId`) rather than sharing one integer space with a sign bit, which reads more
//! naturally in Rust and is exactly as cheap.

use arcstr::ArcStr;
use hashbrown::HashMap;
use pocl_collections::create_ref_type;

use crate::types::TypeId;

create_ref_type!(ObjectId);
create_ref_type!(VariableId);

/// Either an interned object constant or a variable. Copy because both halves are bare
/// integers; equality/hashing follow naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Object(ObjectId),
    Variable(VariableId),
}

impl Term {
    pub fn is_object(&self) -> bool {
        matches!(self, Term::Object(_))
    }
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Term::Object(o) => Some(*o),
            Term::Variable(_) => None,
        }
    }
    pub fn as_variable(&self) -> Option<VariableId> {
        match self {
            Term::Variable(v) => Some(*v),
            Term::Object(_) => None,
        }
    }
}

impl From<ObjectId> for Term {
    fn from(o: ObjectId) -> Self {
        Term::Object(o)
    }
}
impl From<VariableId> for Term {
    fn from(v: VariableId) -> Self {
        Term::Variable(v)
    }
}

/// Table of declared objects (interned by name, one entry per problem/domain constant).
#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
    names: Vec<ArcStr>,
    types: Vec<TypeId>,
    by_name: HashMap<ArcStr, ObjectId>,
}

impl ObjectTable {
    pub fn declare(&mut self, name: impl Into<ArcStr>, tpe: TypeId) -> ObjectId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id: ObjectId = self.names.len().into();
        self.by_name.insert(name.clone(), id);
        self.names.push(name);
        self.types.push(tpe);
        id
    }

    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: ObjectId) -> &str {
        &self.names[usize::from(id)]
    }

    pub fn type_of(&self, id: ObjectId) -> TypeId {
        self.types[usize::from(id)]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        (0..self.names.len()).map(ObjectId::from)
    }
}

/// Allocator for fresh variables. A single instance is shared for the duration of search so
/// that every variable id is unique across the whole plan (no two steps' parameters, nor any
/// two refinement-introduced variables, ever collide).
///
/// Refinement freshens a schema's parameters into brand-new variables every time it
/// instantiates a step (so that two instances of the same action schema in one plan never
/// share a varset), and it does so while only holding a shared `&VariableTable` — the table
/// is threaded through the search context as `&'a VariableTable` alongside the other
/// frozen-after-parsing tables. The counter is therefore interior-mutable, not because of any
/// concurrency (the engine is single-threaded, per the concurrency model), but so `fresh` can
/// be called from deep inside refinement code without plumbing `&mut` through every signature
/// that touches a `Plan`.
#[derive(Debug, Default)]
pub struct VariableTable {
    types: std::cell::RefCell<Vec<TypeId>>,
    names: std::cell::RefCell<Vec<Option<ArcStr>>>,
}

impl Clone for VariableTable {
    fn clone(&self) -> Self {
        VariableTable {
            types: std::cell::RefCell::new(self.types.borrow().clone()),
            names: std::cell::RefCell::new(self.names.borrow().clone()),
        }
    }
}

impl VariableTable {
    pub fn fresh(&self, tpe: TypeId) -> VariableId {
        let mut types = self.types.borrow_mut();
        types.push(tpe);
        self.names.borrow_mut().push(None);
        (types.len() - 1).into()
    }

    pub fn fresh_named(&self, name: impl Into<ArcStr>, tpe: TypeId) -> VariableId {
        let v = self.fresh(tpe);
        self.names.borrow_mut()[usize::from(v)] = Some(name.into());
        v
    }

    pub fn type_of(&self, v: VariableId) -> TypeId {
        self.types.borrow()[usize::from(v)]
    }

    pub fn name(&self, v: VariableId) -> Option<String> {
        self.names.borrow()[usize::from(v)].as_ref().map(|s| s.to_string())
    }

    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn objects_interned_by_name() {
        let mut types = TypeTable::new();
        let obj_t = types.top();
        let mut objs = ObjectTable::default();
        let a1 = objs.declare("a", obj_t);
        let a2 = objs.declare("a", obj_t);
        assert_eq!(a1, a2);
        let b = objs.declare("b", obj_t);
        assert_ne!(a1, b);
    }

    #[test]
    fn variables_are_always_fresh() {
        let mut types = TypeTable::new();
        let obj_t = types.top();
        let mut vars = VariableTable::default();
        let x = vars.fresh(obj_t);
        let y = vars.fresh(obj_t);
        assert_ne!(x, y);
    }
}
