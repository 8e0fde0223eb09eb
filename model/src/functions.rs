//! Function table for numeric fluents. A function is static if no action effect ever mentions
//! it. `total-time` is a reserved name tracking plan makespan for metric expressions.

use arcstr::ArcStr;
use hashbrown::{HashMap, HashSet};
use pocl_collections::create_ref_type;

use crate::types::TypeId;

create_ref_type!(FunctionId);

pub const TOTAL_TIME: &str = "total-time";

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: ArcStr,
    pub parameter_types: Vec<TypeId>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    signatures: Vec<FunctionSignature>,
    by_name: HashMap<ArcStr, FunctionId>,
}

impl FunctionTable {
    pub fn declare(&mut self, name: impl Into<ArcStr>, parameter_types: Vec<TypeId>) -> FunctionId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id: FunctionId = self.signatures.len().into();
        self.by_name.insert(name.clone(), id);
        self.signatures.push(FunctionSignature {
            name,
            parameter_types,
        });
        id
    }

    pub fn get(&self, name: &str) -> Option<FunctionId> {
        self.by_name.get(name).copied()
    }

    pub fn signature(&self, id: FunctionId) -> &FunctionSignature {
        &self.signatures[usize::from(id)]
    }

    pub fn iter(&self) -> impl Iterator<Item = FunctionId> + '_ {
        (0..self.signatures.len()).map(FunctionId::from)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionStaticity {
    dynamic: HashSet<FunctionId>,
}

impl FunctionStaticity {
    pub fn new(dynamic_functions: impl IntoIterator<Item = FunctionId>) -> Self {
        FunctionStaticity {
            dynamic: dynamic_functions.into_iter().collect(),
        }
    }

    pub fn is_static(&self, id: FunctionId) -> bool {
        !self.dynamic.contains(&id)
    }
}
