//! The seam between the engine and the driving collector.
//!
//! The engine never walks the heap itself. Cell identity, tenure, mark
//! state, delegates, the store buffer and the nursery all belong to the
//! collector and are reached through the traits in this module. [`Collector`]
//! is the long-lived service interface; [`Marker`], [`Tracer`],
//! [`WeakTracer`], [`SweepGroups`] and [`MappingVisitor`] are per-phase
//! contexts passed into the individual operations.

use std::collections::TryReserveError;
use std::fmt;
use std::sync::MutexGuard;

use crate::cell::{CellColor, CellRef, ZoneId};
use crate::weak_map::MapId;

/// Services the driving collector provides to the engine.
pub trait Collector {
    /// Whether the cell lives outside the nursery. Only tenured cells may
    /// source or terminate a zone-level ephemeron edge.
    fn is_tenured(&self, cell: CellRef) -> bool;

    /// The zone the cell belongs to.
    fn zone_of(&self, cell: CellRef) -> ZoneId;

    /// Whether the cell is a cross-zone-visible symbol. Symbol keys force a
    /// sweep-group edge from the atoms zone.
    fn is_symbol(&self, cell: CellRef) -> bool;

    /// The key's delegate, if it has one: a secondary cell whose liveness
    /// implies the key's, without a direct strong pointer between them.
    fn delegate_of(&self, key: CellRef) -> Option<CellRef>;

    /// Whether the given zone is currently in its mark phase.
    fn zone_is_marking(&self, zone: ZoneId) -> bool;

    /// Record the cell in the store buffer so the next minor collection
    /// conservatively keeps it (and everything it points to) alive. Used
    /// when a dependency cannot be expressed as a zone-level edge because
    /// one end is still nursery-resident.
    fn put_whole_cell(&self, cell: CellRef);

    /// The lock held while an ownerless map is cleared during sweeping.
    /// Clearing can remove store-buffer state that allocator-triggered minor
    /// collections on other threads may be consulting.
    fn sweeping_lock(&self) -> MutexGuard<'_, ()>;

    /// Register a map holding not-yet-tenured entries with the generational
    /// collector's nursery worklist.
    fn register_nursery_weak_map(
        &self,
        zone: ZoneId,
        map: MapId,
    ) -> Result<(), NurseryRegistrationError>;
}

/// The marking context of the current mark phase. One per marking thread;
/// mark state itself is owned by the collector and updated through this.
pub trait Marker {
    /// The cell's current color.
    fn cell_color(&self, cell: CellRef) -> CellColor;

    /// Mark the cell to at least `color`. Returns whether this raised the
    /// cell's color (a stale or lower target returns false).
    fn mark_cell(&mut self, cell: CellRef, color: CellColor) -> bool;
}

/// Strong tracing context for ordinary root tracing. May relocate the
/// referent under a moving collection.
pub trait Tracer {
    fn trace_edge(&mut self, edge: &mut CellRef, name: &'static str);
}

/// Weak tracing context used while sweeping.
pub trait WeakTracer {
    /// `None` if the cell did not survive this cycle; otherwise its
    /// (possibly relocated) reference.
    fn trace_weak_cell(&mut self, cell: CellRef) -> Option<CellRef>;

    /// Whether the cell survived this cycle, without forwarding it.
    fn is_live(&self, cell: CellRef) -> bool;
}

/// The collector's sweep-group graph. Zones connected by an edge are swept
/// as one unit.
pub trait SweepGroups {
    /// Require that `from` is swept no earlier than `to` by placing both in
    /// the same sweep group.
    fn add_sweep_group_edge(&mut self, from: ZoneId, to: ZoneId) -> Result<(), EdgeAllocError>;
}

/// Callback for [`crate::tracing::trace_all_mappings`]. Must not trigger a
/// collection; see the function's contract.
pub trait MappingVisitor {
    fn visit_mapping(&mut self, zone: ZoneId, map: MapId, key: CellRef, value: CellRef);
}

/// Recoverable allocation failure while recording a conditional-liveness or
/// sweep-group edge. The caller abandons the current attempt for that entry
/// or cell only; the fixpoint loop (or the next cycle) retries, so the
/// failure can cause temporary extra retention but never over-collection.
#[derive(Debug)]
pub struct EdgeAllocError;

impl From<TryReserveError> for EdgeAllocError {
    fn from(_: TryReserveError) -> Self {
        EdgeAllocError
    }
}

impl fmt::Display for EdgeAllocError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to allocate space for a liveness edge")
    }
}

impl std::error::Error for EdgeAllocError {}

/// Allocation failure while registering a map with the nursery worklist.
/// There is no safe degraded mode for this one; see [`crate::nursery`].
#[derive(Debug)]
pub struct NurseryRegistrationError;

impl fmt::Display for NurseryRegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to register a weak map with the nursery worklist")
    }
}

impl std::error::Error for NurseryRegistrationError {}
