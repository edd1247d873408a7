//! Weak-association tables and their per-cycle mark state.
//!
//! One [`WeakMap`] exists per live weak table. The map body (entries, owner
//! reference, kind) is owned by its zone's registry; the map's color lives
//! behind an [`Arc`] handle so that concurrent marking threads can raise it
//! while the zone-marking owner scans entries.

use std::cmp;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use atomic::{Atomic, Ordering};

use crate::cell::{CellColor, CellRef, ZoneId};
#[cfg(debug_assertions)]
use crate::collector::MappingVisitor;
use crate::collector::{Collector, EdgeAllocError, Marker, SweepGroups, WeakTracer};
use crate::ephemeron::EphemeronEdgeTable;

/// Stable identifier of a map within its zone's registry.
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, Debug)]
pub struct MapId(pub(crate) u32);

impl MapId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

/// System maps are few, assumed to carry cross-cutting delegates, and are
/// always scanned during sweep-group discovery. User maps are scanned only
/// when the zone's cached flags say they might need it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MapKind {
    System,
    User,
}

/// The atomically updated mark color of one weak map.
///
/// Shared through [`MapMarkHandle`]: barrier code on other threads may push
/// a map to black while the zone-marking owner is scanning its entries.
pub struct MapMarkState {
    color: Atomic<CellColor>,
}

/// A cloneable handle to a map's mark state, returned by
/// [`crate::zone::Zone::create_map`].
pub type MapMarkHandle = Arc<MapMarkState>;

impl MapMarkState {
    pub(crate) fn new(initial: CellColor) -> MapMarkHandle {
        Arc::new(MapMarkState {
            color: Atomic::new(initial),
        })
    }

    /// The map's current color.
    pub fn color(&self) -> CellColor {
        self.color.load(Ordering::SeqCst)
    }

    /// Mark the map to at least `target`. Returns whether this raised the
    /// color.
    ///
    /// We may be marking in parallel, so a compare-exchange loop handles
    /// concurrent updates. The color increases monotonically within a cycle;
    /// a black conclusion reached by one thread is never lost to a stale
    /// gray write from another. Attempting gray after black is a normal
    /// occurrence when a barrier pushes the map onto the black mark stack
    /// while it is still pending on the gray one.
    pub fn mark(&self, target: CellColor) -> bool {
        let mut current = self.color.load(Ordering::SeqCst);
        loop {
            if current >= target {
                return false;
            }
            match self
                .color
                .compare_exchange(current, target, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
    }

    pub(crate) fn set(&self, color: CellColor) {
        self.color.store(color, Ordering::SeqCst);
    }
}

/// Which kinds of keys a map currently holds. Merged into the zone's cached
/// flags when the map is swept.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct KeyFlags {
    pub has_symbol_keys: bool,
    pub has_key_delegates: bool,
}

/// One weak-association table.
///
/// The table holds non-owning key→value associations. Entry survival is
/// computed, not enforced, by the marking and sweeping operations; a key's
/// delegate is not stored but derived from the collector on demand.
pub struct WeakMap {
    pub(crate) mark: MapMarkHandle,
    /// The owning language object, when the map's lifetime is tied to an
    /// object's finalizer rather than to this engine.
    pub(crate) member_of: Option<CellRef>,
    pub(crate) kind: MapKind,
    pub(crate) has_nursery_entries: bool,
    pub(crate) entries: HashMap<CellRef, CellRef>,
}

impl WeakMap {
    pub(crate) fn new(kind: MapKind, member_of: Option<CellRef>, initial: CellColor) -> WeakMap {
        WeakMap {
            mark: MapMarkState::new(initial),
            member_of,
            kind,
            has_nursery_entries: false,
            entries: HashMap::new(),
        }
    }

    pub fn kind(&self) -> MapKind {
        self.kind
    }

    pub fn member_of(&self) -> Option<CellRef> {
        self.member_of
    }

    pub fn mark_state(&self) -> &MapMarkState {
        &self.mark
    }

    pub fn mark_handle(&self) -> MapMarkHandle {
        Arc::clone(&self.mark)
    }

    pub fn has_nursery_entries(&self) -> bool {
        self.has_nursery_entries
    }

    pub fn get(&self, key: CellRef) -> Option<CellRef> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, key: CellRef, value: CellRef) -> Option<CellRef> {
        self.entries.insert(key, value)
    }

    pub(crate) fn remove(&mut self, key: CellRef) -> Option<CellRef> {
        self.entries.remove(&key)
    }

    pub(crate) fn clear_and_compact(&mut self) {
        self.entries.clear();
        self.entries.shrink_to_fit();
    }

    /// Scan all entries, propagating liveness that is already visible and
    /// recording ephemeron edges for liveness that may become visible later
    /// in this mark phase. Returns whether any new mark occurred.
    pub(crate) fn mark_entries<C: Collector, M: Marker>(
        &self,
        edges: &mut EphemeronEdgeTable,
        heap: &C,
        marker: &mut M,
    ) -> bool {
        let map_color = self.mark.color();
        debug_assert!(map_color.is_marked());

        let mut marked_any = false;
        for (&key, &value) in &self.entries {
            let delegate = heap.delegate_of(key);

            // A marked delegate implies the key is reachable even without a
            // direct strong pointer from delegate to key.
            if let Some(delegate) = delegate {
                let implied = cmp::min(marker.cell_color(delegate), map_color);
                if implied.is_marked() && marker.mark_cell(key, implied) {
                    marked_any = true;
                }
            }

            let key_color = cmp::min(marker.cell_color(key), map_color);
            if key_color.is_marked() && marker.mark_cell(value, key_color) {
                marked_any = true;
            }

            if let Err(e) = self.record_entry_edges(map_color, key, value, delegate, edges, heap) {
                // Recoverable: the entry is revisited by a later pass or the
                // next cycle, so skipping its edges cannot over-collect.
                debug!("skipping ephemeron edges for key {}: {}", key, e);
            }
        }
        marked_any
    }

    /// Record the entry's key→value and delegate→key edges, both at the
    /// map's current color. Edges are only sourced from (and terminated at)
    /// tenured cells; a nursery-resident delegate or value degrades to a
    /// whole-cell store-buffer notice on the key, which the next minor
    /// collection honors.
    fn record_entry_edges<C: Collector>(
        &self,
        map_color: CellColor,
        key: CellRef,
        value: CellRef,
        delegate: Option<CellRef>,
        edges: &mut EphemeronEdgeTable,
        heap: &C,
    ) -> Result<(), EdgeAllocError> {
        if !heap.is_tenured(key) {
            // Nursery keys are the generational collector's problem; the map
            // is already on its worklist via the nursery bridge.
            debug_assert!(self.has_nursery_entries);
            return Ok(());
        }

        if let Some(delegate) = delegate {
            if !heap.is_tenured(delegate) {
                heap.put_whole_cell(key);
            } else {
                edges.add_edge(map_color, delegate, key)?;
            }
        }

        if !heap.is_tenured(value) {
            heap.put_whole_cell(key);
        } else {
            edges.add_edge(map_color, key, value)?;
        }
        Ok(())
    }

    /// Register sweep-group edges for keys whose delegate lives in another,
    /// currently-marking zone. Discovery only: mark state is not touched.
    pub(crate) fn find_sweep_group_edges<C: Collector, G: SweepGroups>(
        &self,
        map_zone: ZoneId,
        heap: &C,
        groups: &mut G,
    ) -> Result<(), EdgeAllocError> {
        for &key in self.entries.keys() {
            let Some(delegate) = heap.delegate_of(key) else {
                continue;
            };
            let delegate_zone = heap.zone_of(delegate);
            if delegate_zone != map_zone && heap.zone_is_marking(delegate_zone) {
                groups.add_sweep_group_edge(delegate_zone, map_zone)?;
            }
        }
        Ok(())
    }

    /// Drop entries whose key did not survive the cycle, updating surviving
    /// references for moving collections. Returns the kinds of keys the
    /// surviving entries hold, for the zone's cached flags.
    pub(crate) fn sweep_entries<C: Collector, T: WeakTracer>(
        &mut self,
        heap: &C,
        tracer: &mut T,
    ) -> KeyFlags {
        let mut flags = KeyFlags::default();
        let old = std::mem::take(&mut self.entries);
        for (key, value) in old {
            let Some(new_key) = tracer.trace_weak_cell(key) else {
                trace!("dropping dead weak map entry for key {}", key);
                continue;
            };
            let Some(new_value) = tracer.trace_weak_cell(value) else {
                debug_assert!(false, "value {} died while its key {} survived", value, key);
                continue;
            };
            flags.has_symbol_keys |= heap.is_symbol(new_key);
            flags.has_key_delegates |= heap.delegate_of(new_key).is_some();
            self.entries.insert(new_key, new_value);
        }
        flags
    }

    /// The kinds of keys currently held, recomputed from scratch.
    #[cfg(debug_assertions)]
    pub(crate) fn key_flags<C: Collector>(&self, heap: &C) -> KeyFlags {
        let mut flags = KeyFlags::default();
        for &key in self.entries.keys() {
            flags.has_symbol_keys |= heap.is_symbol(key);
            flags.has_key_delegates |= heap.delegate_of(key).is_some();
        }
        flags
    }

    #[cfg(debug_assertions)]
    pub(crate) fn visit_mappings<V: MappingVisitor>(
        &self,
        zone: ZoneId,
        id: MapId,
        visitor: &mut V,
    ) {
        for (&key, &value) in &self.entries {
            visitor.visit_mapping(zone, id, key, value);
        }
    }

    /// Post-marking consistency: every dependency this map declares must be
    /// satisfied by the final colors.
    #[cfg(debug_assertions)]
    pub(crate) fn check_marking<C: Collector, M: Marker>(&self, heap: &C, marker: &M) -> bool {
        let map_color = self.mark.color();
        let mut ok = true;
        for (&key, &value) in &self.entries {
            if let Some(delegate) = heap.delegate_of(key) {
                let implied = cmp::min(marker.cell_color(delegate), map_color);
                if implied.is_marked() && marker.cell_color(key) < implied {
                    error!(
                        "key {} is {:?}, but its delegate {} implies at least {:?}",
                        key,
                        marker.cell_color(key),
                        delegate,
                        implied
                    );
                    ok = false;
                }
            }
            let expected = cmp::min(marker.cell_color(key), map_color);
            if expected.is_marked() && marker.cell_color(value) < expected {
                error!(
                    "value {} is {:?}, but its key {} implies at least {:?}",
                    value,
                    marker.cell_color(value),
                    key,
                    expected
                );
                ok = false;
            }
        }
        ok
    }
}
