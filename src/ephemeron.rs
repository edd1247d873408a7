//! The per-zone ephemeron edge table.
//!
//! While a zone's maps are scanned, the engine records the cycle's
//! conditional-liveness dependencies here: key→value and delegate→key. If a
//! source cell's color rises after the map was scanned (an incremental
//! marking hazard), [`crate::marking::mark_implicit_edges`] promotes the
//! recorded targets without re-scanning any map. The table is a within-cycle
//! artifact: [`crate::marking::unmark_zone`] discards it.

use std::collections::HashMap;

use crate::cell::{CellColor, CellRef};
use crate::collector::EdgeAllocError;

/// A conditional-liveness edge: if the source cell is marked, the target
/// must be marked at least `min(source color, edge color)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EphemeronEdge {
    pub color: CellColor,
    pub target: CellRef,
}

/// Edges bucketed by their (tenured) source cell.
pub struct EphemeronEdgeTable {
    edges: HashMap<CellRef, Vec<EphemeronEdge>>,
    initial_capacity: usize,
}

impl EphemeronEdgeTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            edges: HashMap::with_capacity(capacity),
            initial_capacity: capacity,
        }
    }

    /// Record an edge from `src` to `dst`, creating the bucket on first
    /// insert. Idempotent: an exact `(color, target)` duplicate is not
    /// re-added, so every propagation pass may re-register the entries it
    /// scans without growing the table.
    pub fn add_edge(
        &mut self,
        color: CellColor,
        src: CellRef,
        dst: CellRef,
    ) -> Result<(), EdgeAllocError> {
        self.edges.try_reserve(1)?;
        let bucket = self.edges.entry(src).or_default();
        let edge = EphemeronEdge { color, target: dst };
        if bucket.contains(&edge) {
            return Ok(());
        }
        bucket.try_reserve(1)?;
        bucket.push(edge);
        Ok(())
    }

    /// The edges recorded under `src` this cycle, if any.
    pub fn edges_of(&self, src: CellRef) -> Option<&[EphemeronEdge]> {
        self.edges.get(&src).map(Vec::as_slice)
    }

    /// Discard all edges and return the table to its initial footprint.
    pub fn clear_and_compact(&mut self) {
        self.edges.clear();
        self.edges.shrink_to(self.initial_capacity);
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of source cells with at least one recorded edge.
    pub fn len(&self) -> usize {
        self.edges.len()
    }
}
