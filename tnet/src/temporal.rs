//! Simple Temporal Network: an all-pairs-shortest-paths matrix over time points, used by
//! durative planning where actions have real-valued start/end times rather than a bare order.
//!
//! `distance[a][b]` is an upper bound on `t_b - t_a`; tightening it with a new constraint
//! `t_b - t_a <= d` is Floyd-Warshall propagation restricted to the rows/columns touched by the
//! new edge. A network is inconsistent iff some `distance[x][x] < 0`.

use std::sync::Arc;

use crate::step_time::{time_node, Point, INIT_STEP};

pub const INFINITY: f64 = f64::INFINITY;

#[derive(Clone)]
struct DistRow(Vec<f64>);

#[derive(Clone, Default)]
pub struct TemporalOrderings {
    distance: Vec<Arc<DistRow>>,
    /// The global minimum separation between any two distinct, order-constrained time points.
    pub threshold: f64,
}

impl TemporalOrderings {
    pub fn new(threshold: f64) -> Self {
        let mut t = TemporalOrderings {
            distance: Vec::new(),
            threshold,
        };
        t.ensure_len(1);
        t
    }

    fn ensure_len(&mut self, n: usize) {
        while self.distance.len() < n {
            let idx = self.distance.len();
            let mut row = vec![INFINITY; n];
            row[idx] = 0.0;
            self.distance.push(Arc::new(DistRow(row)));
        }
        for row in &mut self.distance {
            if row.0.len() < n {
                let grown = Arc::make_mut(row);
                grown.0.resize(n, INFINITY);
            }
        }
    }

    fn get(&self, a: u32, b: u32) -> f64 {
        self.distance
            .get(a as usize)
            .and_then(|row| row.0.get(b as usize))
            .copied()
            .unwrap_or(INFINITY)
    }

    pub fn register_step(&self, id: u32) -> TemporalOrderings {
        let mut next = self.clone();
        let n = (time_node(id, Point::End) as usize) + 1;
        next.ensure_len(n);
        next
    }

    /// Adds the constraint `t_to - t_from <= max_gap` (equivalently `t_from - t_to >= -max_gap`).
    /// Returns `None` if this would make the network inconsistent.
    pub fn tighten(&self, from: u32, to: u32, max_gap: f64) -> Option<TemporalOrderings> {
        if self.get(from, to) <= max_gap {
            return Some(self.clone());
        }
        let mut next = self.clone();
        let n = next.distance.len();
        let mut changed_rows: Vec<usize> = Vec::new();

        {
            let row = Arc::make_mut(&mut next.distance[from as usize]);
            row.0[to as usize] = max_gap;
            changed_rows.push(from as usize);
        }

        // Floyd-Warshall restricted to paths that can route through the new edge.
        for k in 0..n {
            let dk_from = next.get(k as u32, from);
            if dk_from == INFINITY {
                continue;
            }
            let candidate = dk_from + max_gap;
            if candidate < next.get(k as u32, to) {
                let row = Arc::make_mut(&mut next.distance[k]);
                row.0[to as usize] = candidate;
                changed_rows.push(k);
            }
        }
        for row_idx in changed_rows.clone() {
            for j in 0..n {
                let direct = next.get(row_idx as u32, to);
                if direct == INFINITY {
                    continue;
                }
                let through_to = next.get(to, j as u32);
                if through_to == INFINITY {
                    continue;
                }
                let candidate = direct + through_to;
                if candidate < next.get(row_idx as u32, j as u32) {
                    let row = Arc::make_mut(&mut next.distance[row_idx]);
                    row.0[j] = candidate;
                }
            }
        }

        for x in 0..n {
            if next.get(x as u32, x as u32) < 0.0 {
                return None;
            }
        }
        Some(next)
    }

    /// `true` iff point `(id1, t1)` can occur no later than `(id2, t2)` given the current
    /// network (i.e. asserting the opposite strict order would be inconsistent).
    pub fn possibly_before(&self, id1: u32, t1: Point, id2: u32, t2: Point) -> bool {
        let a = time_node(id1, t1);
        let b = time_node(id2, t2);
        // "possibly before" fails only if b is already forced strictly before a by more than
        // the threshold separation.
        self.get(b, a) > -self.threshold || a == b
    }

    pub fn possibly_after(&self, id1: u32, t1: Point, id2: u32, t2: Point) -> bool {
        self.possibly_before(id2, t2, id1, t1)
    }

    pub fn possibly_concurrent(&self, id1: u32, id2: u32) -> (bool, bool, bool, bool) {
        let ss = self.possibly_before(id1, Point::Start, id2, Point::Start) && self.possibly_before(id2, Point::Start, id1, Point::Start);
        let se = self.possibly_before(id1, Point::Start, id2, Point::End) && self.possibly_before(id2, Point::End, id1, Point::Start);
        let es = self.possibly_before(id1, Point::End, id2, Point::Start) && self.possibly_before(id2, Point::Start, id1, Point::End);
        let ee = self.possibly_before(id1, Point::End, id2, Point::End) && self.possibly_before(id2, Point::End, id1, Point::End);
        (ss, se, es, ee)
    }

    /// Earliest feasible time for every registered point, computed as shortest path from the
    /// origin (node 0, step 0's instant). Used both to schedule a finished plan and to compute
    /// its makespan (the latest end time among all steps).
    pub fn schedule(&self) -> Vec<f64> {
        (0..self.distance.len()).map(|node| -self.get(0, node as u32)).collect()
    }

    pub fn makespan(&self) -> f64 {
        self.schedule().into_iter().filter(|t| t.is_finite()).fold(0.0, f64::max)
    }

    /// Registers a durative step's duration bounds (`min <= end - start <= max`) and the
    /// threshold separation from its predecessor-in-time (its start must be at least
    /// `threshold` after node 0 unless it is the initial step).
    pub fn with_duration(&self, id: u32, min_duration: f64, max_duration: f64) -> Option<TemporalOrderings> {
        let next = self.register_step(id);
        let start = time_node(id, Point::Start);
        let end = time_node(id, Point::End);
        let next = next.tighten(start, end, max_duration)?;
        let next = next.tighten(end, start, -min_duration)?;
        if id != INIT_STEP {
            next.tighten(0, start, -self.threshold)
        } else {
            Some(next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_bounds_are_enforced() {
        let t = TemporalOrderings::new(0.01);
        let t = t.with_duration(1, 2.0, 5.0).unwrap();
        let sched = t.schedule();
        let start = sched[time_node(1, Point::Start) as usize];
        let end = sched[time_node(1, Point::End) as usize];
        assert!(end - start >= 2.0 - 1e-9);
    }

    #[test]
    fn inconsistent_duration_is_rejected() {
        let t = TemporalOrderings::new(0.01);
        let t = t.register_step(1);
        let start = time_node(1, Point::Start);
        let end = time_node(1, Point::End);
        let t = t.tighten(start, end, 5.0).unwrap();
        assert!(t.tighten(end, start, -6.0).is_none());
    }

    #[test]
    fn makespan_tracks_latest_end() {
        let t = TemporalOrderings::new(0.01);
        let t = t.with_duration(1, 2.0, 2.0).unwrap();
        assert!(t.makespan() >= 2.01 - 1e-6);
    }
}
