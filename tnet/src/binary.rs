//! Boolean-matrix orderings solver: maintains a strict `before[i][j]` relation over positive
//! step ids with incremental transitive closure, used for classical (non-durative) planning
//! where only step order, not timing, matters.

use std::sync::Arc;

use fixedbitset::FixedBitSet;

use crate::step_time::{GOAL_STEP, INIT_STEP};

/// `before[i]` is a bit vector over step ids: bit `j` set means `i < j`. Rows are individually
/// reference counted so that adding one ordering only reallocates the rows it actually changes;
/// every other row is shared with the parent snapshot via `Arc::clone`.
#[derive(Clone, Default)]
pub struct BinaryOrderings {
    before: Vec<Arc<FixedBitSet>>,
}

impl BinaryOrderings {
    pub fn new() -> Self {
        BinaryOrderings::default()
    }

    fn ensure_len(&mut self, n: usize) {
        while self.before.len() < n {
            let mut row = FixedBitSet::with_capacity(n.max(self.before.len() + 1));
            if let Some(last) = self.before.last() {
                row.union_with(last);
            }
            self.before.push(Arc::new(row));
        }
        for row in &mut self.before {
            if row.len() < n {
                Arc::make_mut(row).grow(n);
            }
        }
    }

    fn predecessors(&self, j: u32) -> Vec<u32> {
        self.before
            .iter()
            .enumerate()
            .filter(|(_, row)| row.contains(j as usize))
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn successors(&self, i: u32) -> Vec<u32> {
        self.before
            .get(i as usize)
            .map(|row| row.ones().map(|b| b as u32).collect())
            .unwrap_or_default()
    }

    /// `true` iff `i < j` is already entailed by the current orderings.
    pub fn before(&self, i: u32, j: u32) -> bool {
        if i == INIT_STEP {
            return j != INIT_STEP;
        }
        if j == GOAL_STEP {
            return i != GOAL_STEP;
        }
        if i == GOAL_STEP || j == INIT_STEP {
            return false;
        }
        self.before
            .get(i as usize)
            .map(|row| row.len() > j as usize && row.contains(j as usize))
            .unwrap_or(false)
    }

    /// `true` iff asserting `i < j` would not contradict the current (strict, acyclic) order.
    pub fn possibly_before(&self, i: u32, j: u32) -> bool {
        !self.before(j, i)
    }

    pub fn possibly_after(&self, i: u32, j: u32) -> bool {
        self.possibly_before(j, i)
    }

    pub fn possibly_concurrent(&self, i: u32, j: u32) -> bool {
        i != j && !self.before(i, j) && !self.before(j, i)
    }

    /// Adds `i < j`, closing over existing predecessors of `i` and successors of `j`. Returns
    /// `None` if this would create a cycle (`j` already orders before `i`).
    pub fn refine(&self, i: u32, j: u32) -> Option<BinaryOrderings> {
        if i == INIT_STEP || j == GOAL_STEP {
            return Some(self.clone());
        }
        if self.before(j, i) {
            return None;
        }
        if self.before(i, j) {
            return Some(self.clone());
        }
        let mut next = self.clone();
        let n = (i.max(j) + 1) as usize;
        next.ensure_len(n);

        let mut froms = next.predecessors(i);
        froms.push(i);
        let mut tos = next.successors(j);
        tos.push(j);

        for &from in &froms {
            let row = Arc::make_mut(&mut next.before[from as usize]);
            for &to in &tos {
                row.grow((to as usize) + 1);
                row.insert(to as usize);
            }
        }
        Some(next)
    }

    pub fn register_step(&self, id: u32) -> BinaryOrderings {
        let mut next = self.clone();
        next.ensure_len((id as usize) + 1);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitive_closure_on_refine() {
        let o = BinaryOrderings::new().register_step(1).register_step(2).register_step(3);
        let o = o.refine(1, 2).unwrap();
        let o = o.refine(2, 3).unwrap();
        assert!(o.before(1, 3));
    }

    #[test]
    fn cycle_is_rejected() {
        let o = BinaryOrderings::new().register_step(1).register_step(2);
        let o = o.refine(1, 2).unwrap();
        assert!(o.refine(2, 1).is_none());
    }

    #[test]
    fn init_and_goal_are_sentinels() {
        let o = BinaryOrderings::new().register_step(1);
        assert!(o.before(INIT_STEP, 1));
        assert!(o.before(1, GOAL_STEP));
    }

    #[test]
    fn unordered_steps_are_possibly_concurrent() {
        let o = BinaryOrderings::new().register_step(1).register_step(2);
        assert!(o.possibly_concurrent(1, 2));
        let o = o.refine(1, 2).unwrap();
        assert!(!o.possibly_concurrent(1, 2));
    }
}
