//! Mark-phase operations.
//!
//! The driving collector brackets its mark phase with [`unmark_zone`] and
//! then alternates ordinary root marking with weak-map propagation: each
//! time the marker raises a tenured cell it calls [`mark_implicit_edges`],
//! and between marking slices it calls [`mark_zone_iteratively`] (or the
//! [`mark_zone_to_fixpoint`] driver) until no zone reports progress. The
//! full-rescan fixpoint is deliberate: zones hold few maps even when maps
//! hold many entries, and it avoids a separate work-queue structure.

use std::cmp;

use crate::cell::{CellColor, CellRef};
use crate::collector::{Collector, Marker};
use crate::zone::Zone;

/// Reset every registered map to white and discard the previous cycle's
/// ephemeron edges. Idempotent; called at the start of each mark phase.
pub fn unmark_zone(zone: &mut Zone) {
    zone.ephemeron_edges.clear_and_compact();
    zone.for_all_maps(|_, map| map.mark_state().set(CellColor::White));
    zone.needs_sweep = true;
}

/// Assert the precondition [`unmark_zone`] establishes.
#[cfg(debug_assertions)]
pub fn check_zone_unmarked(zone: &Zone) {
    assert!(zone.ephemeron_edges.is_empty());
    zone.for_all_maps(|id, map| {
        assert_eq!(
            map.mark_state().color(),
            CellColor::White,
            "{} still colored before marking",
            id
        );
    });
}

/// One propagation pass: scan every already-marked map's entries, marking
/// values and delegate-implied keys that have become reachable. Returns
/// whether any new cell got marked; the caller repeats until it reports no
/// progress.
pub fn mark_zone_iteratively<C: Collector, M: Marker>(
    zone: &mut Zone,
    heap: &C,
    marker: &mut M,
) -> bool {
    debug_assert!(zone.is_marking());

    let mut marked_any = false;
    let Zone {
        maps,
        system_maps,
        user_maps,
        ephemeron_edges,
        ..
    } = zone;
    for &id in itertools::chain(&*system_maps, &*user_maps) {
        let Some(map) = maps.get(id.index()).and_then(Option::as_ref) else {
            debug_assert!(false, "registered {} has no slot", id);
            continue;
        };
        if map.mark_state().color().is_marked() && map.mark_entries(ephemeron_edges, heap, marker)
        {
            marked_any = true;
        }
    }
    marked_any
}

/// Drive [`mark_zone_iteratively`] to its fixpoint. Returns whether any
/// pass made progress.
pub fn mark_zone_to_fixpoint<C: Collector, M: Marker>(
    zone: &mut Zone,
    heap: &C,
    marker: &mut M,
) -> bool {
    let mut passes = 0usize;
    while mark_zone_iteratively(zone, heap, marker) {
        passes += 1;
        if passes == zone.fixpoint_warn_threshold {
            warn!(
                "{}: weak marking has not converged after {} passes",
                zone.id(),
                passes
            );
        }
    }
    trace!("{}: weak marking fixpoint after {} passes", zone.id(), passes);
    passes > 0
}

/// Promote the targets of the edges recorded under `cell`, transitively.
///
/// The collector's marker calls this whenever it raises a tenured cell's
/// color: a key discovered reachable through a separate root path after its
/// map was scanned still promotes the dependent value, without re-scanning
/// any map. Each target is marked to min(source color, edge color).
pub fn mark_implicit_edges<M: Marker>(zone: &Zone, marker: &mut M, cell: CellRef) {
    let mut worklist = vec![cell];
    while let Some(src) = worklist.pop() {
        let src_color = marker.cell_color(src);
        if !src_color.is_marked() {
            continue;
        }
        let Some(edges) = zone.ephemeron_edges.edges_of(src) else {
            continue;
        };
        for edge in edges {
            let target_color = cmp::min(src_color, edge.color);
            if target_color.is_marked() && marker.mark_cell(edge.target, target_color) {
                worklist.push(edge.target);
            }
        }
    }
}

/// Post-marking consistency check over every marked map in the zone.
#[cfg(debug_assertions)]
pub fn check_marking_for_zone<C: Collector, M: Marker>(
    zone: &Zone,
    heap: &C,
    marker: &M,
) -> bool {
    debug_assert!(zone.is_marking());
    let mut ok = true;
    zone.for_all_maps(|_, map| {
        if map.mark_state().color().is_marked() && !map.check_marking(heap, marker) {
            ok = false;
        }
    });
    ok
}

/// Record the colors of the zone's marked maps so a sanity collection can
/// run and then put them back.
#[cfg(feature = "sanity")]
pub fn save_zone_marked_maps(
    zone: &Zone,
    saved: &mut std::collections::HashMap<crate::weak_map::MapId, CellColor>,
) -> Result<(), crate::collector::EdgeAllocError> {
    let mut result = Ok(());
    zone.for_all_maps(|id, map| {
        let color = map.mark_state().color();
        if color.is_marked() && result.is_ok() {
            match saved.try_reserve(1) {
                Ok(()) => {
                    saved.insert(id, color);
                }
                Err(e) => result = Err(e.into()),
            }
        }
    });
    result
}

/// Restore colors captured by [`save_zone_marked_maps`]. The zone must be
/// back in its marking state with every map white.
#[cfg(feature = "sanity")]
pub fn restore_marked_maps(
    zone: &Zone,
    saved: &std::collections::HashMap<crate::weak_map::MapId, CellColor>,
) {
    debug_assert!(zone.is_marking());
    for (&id, &color) in saved {
        if let Some(map) = zone.map(id) {
            debug_assert!(!map.mark_state().color().is_marked());
            map.mark_state().set(color);
        }
    }
}
