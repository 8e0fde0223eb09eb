//! Action schemas: parameters, preconditions, effects, and (for durative actions) a duration
//! constraint plus the three condition timings VHPOP distinguishes (`at start`, `over all`,
//! `at end`).

use arcstr::ArcStr;
use hashbrown::HashMap;
use pocl_collections::create_ref_type;

use crate::effects::Effect;
use crate::expressions::Expression;
use crate::formula::{Formula, FormulaTime};
use crate::terms::VariableId;
use crate::types::TypeId;

create_ref_type!(ActionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationConstraint {
    /// `duration = expr`. Inequalities (`<=`, `>=`) are modeled as a min/max pair, so a single
    /// equality covers the common case without a separate variant.
    Exact,
    AtLeast,
    AtMost,
}

#[derive(Debug, Clone)]
pub struct Duration {
    pub constraint: DurationConstraint,
    pub value: Expression,
}

/// Is this schema instantaneous (classical STRIPS action) or does it span an interval with a
/// duration constraint and `over all` conditions?
#[derive(Debug, Clone)]
pub enum ActionKind {
    Instantaneous,
    Durative { duration: Duration },
}

#[derive(Debug, Clone)]
pub struct TimedCondition {
    pub formula: Formula,
    pub when: FormulaTime,
}

/// A lifted action schema (a PDDL `:action` or `:durative-action`), parameterized by fresh
/// variables allocated when the schema is declared.
#[derive(Debug, Clone)]
pub struct ActionSchema {
    pub name: ArcStr,
    pub parameters: Vec<VariableId>,
    pub parameter_types: Vec<TypeId>,
    pub kind: ActionKind,
    pub conditions: Vec<TimedCondition>,
    pub effects: Vec<Effect>,
}

impl ActionSchema {
    pub fn precondition(&self) -> Formula {
        Formula::conjunction(
            self.conditions
                .iter()
                .filter(|c| matches!(c.when, FormulaTime::AtStart))
                .map(|c| c.formula.clone())
                .collect(),
        )
    }

    pub fn is_durative(&self) -> bool {
        matches!(self.kind, ActionKind::Durative { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    schemas: Vec<ActionSchema>,
    by_name: HashMap<ArcStr, ActionId>,
}

impl ActionTable {
    pub fn declare(&mut self, schema: ActionSchema) -> ActionId {
        let id: ActionId = self.schemas.len().into();
        self.by_name.insert(schema.name.clone(), id);
        self.schemas.push(schema);
        id
    }

    pub fn get(&self, name: &str) -> Option<ActionId> {
        self.by_name.get(name).copied()
    }

    pub fn schema(&self, id: ActionId) -> &ActionSchema {
        &self.schemas[usize::from(id)]
    }

    pub fn iter(&self) -> impl Iterator<Item = ActionId> + '_ {
        (0..self.schemas.len()).map(ActionId::from)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
