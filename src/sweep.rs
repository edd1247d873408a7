//! Sweep-group discovery and the sweep phase.
//!
//! A zone whose maps depend on cells in another zone (a delegate in zone B
//! for a key in zone A, or a cross-zone-visible symbol key) must be swept
//! together with that zone, else one could be swept while the other still
//! needs its liveness queried. [`find_sweep_group_edges_for_zone`] reports
//! those dependencies to the collector's sweep-group graph before the global
//! sweep order is computed; [`sweep_zone`] then drops dead entries and
//! retires unreached maps.

use crate::cell::{CellColor, ZoneId};
use crate::collector::{Collector, EdgeAllocError, SweepGroups, WeakTracer};
use crate::weak_map::MapKind;
use crate::zone::Zone;

/// Report this zone's cross-zone sweep dependencies. Pure discovery: mark
/// state is never touched.
pub fn find_sweep_group_edges_for_zone<C: Collector, G: SweepGroups>(
    atoms_zone: ZoneId,
    zone: &Zone,
    heap: &C,
    groups: &mut G,
) -> Result<(), EdgeAllocError> {
    #[cfg(debug_assertions)]
    zone.check_cached_flags(heap);

    // This can mean iterating over every entry in the zone, so the cached
    // flags let us skip it entirely when no map could need it. System maps
    // are assumed to have key delegates and are always scanned; there are a
    // limited number of these.
    if zone.may_have_symbol_keys() && heap.zone_is_marking(atoms_zone) {
        groups.add_sweep_group_edge(atoms_zone, zone.id())?;
    }

    for &id in &zone.system_maps {
        let Some(map) = zone.map(id) else {
            debug_assert!(false, "registered {} has no slot", id);
            continue;
        };
        map.find_sweep_group_edges(zone.id(), heap, groups)?;
    }

    if zone.user_maps_may_have_key_delegates() {
        for &id in &zone.user_maps {
            let Some(map) = zone.map(id) else {
                debug_assert!(false, "registered {} has no slot", id);
                continue;
            };
            map.find_sweep_group_edges(zone.id(), heap, groups)?;
        }
    }

    Ok(())
}

/// Sweep every registered map in the zone.
///
/// Maps that received a mark this cycle drop the entries whose key did not
/// survive and return to white. White maps received no mark: an owned map
/// is only delisted (the owner's finalizer destroys the table), while an
/// ownerless map is destroyed now, clearing any remaining entries under the
/// collector's sweeping lock since that can remove store-buffer state other
/// threads consult.
///
/// Sweeping a zone with no maps is a no-op, and sweeping again without an
/// intervening mark phase finds nothing colored.
pub fn sweep_zone<C: Collector, T: WeakTracer>(zone: &mut Zone, heap: &C, tracer: &mut T) {
    debug_assert!(zone.is_sweeping());

    // White means dead only if a mark phase actually ran since the last
    // sweep. Without one there is no liveness information and nothing is
    // colored, so there is nothing to do.
    if !zone.needs_sweep {
        trace!("{}: no mark phase since the last sweep", zone.id);
        return;
    }
    zone.needs_sweep = false;

    // Rebuilt below from the maps that survive this pass.
    zone.may_have_symbol_keys = false;
    zone.user_maps_may_have_key_delegates = false;

    for kind in [MapKind::System, MapKind::User] {
        let ids = match kind {
            MapKind::System => zone.system_maps.clone(),
            MapKind::User => zone.user_maps.clone(),
        };
        for id in ids {
            let Some(map) = zone.maps.get(id.index()).and_then(Option::as_ref) else {
                debug_assert!(false, "registered {} has no slot", id);
                continue;
            };

            if map.mark_state().color().is_marked() {
                let flags = {
                    let Some(map) = zone.maps.get_mut(id.index()).and_then(Option::as_mut)
                    else {
                        continue;
                    };
                    let flags = map.sweep_entries(heap, tracer);
                    map.mark_state().set(CellColor::White);
                    flags
                };
                zone.may_have_symbol_keys |= flags.has_symbol_keys;
                if kind == MapKind::User {
                    zone.user_maps_may_have_key_delegates |= flags.has_key_delegates;
                }
                continue;
            }

            // The map received no mark this cycle.
            let (owner, empty) = (map.member_of(), map.is_empty());
            match owner {
                Some(owner) => {
                    // Table is destroyed when the owning object is finalized.
                    debug_assert!(!tracer.is_live(owner));
                    zone.delist(kind, id);
                    trace!("{}: delisted dead owned {}", zone.id, id);
                }
                None => {
                    if !empty {
                        let Some(map) = zone.maps.get_mut(id.index()).and_then(Option::as_mut)
                        else {
                            continue;
                        };
                        let _lock = heap.sweeping_lock();
                        map.clear_and_compact();
                    }
                    zone.delist(kind, id);
                    zone.maps[id.index()] = None;
                    zone.free_slots.push(id.0);
                    trace!("{}: destroyed unreached internal {}", zone.id, id);
                }
            }
        }
    }

    #[cfg(debug_assertions)]
    zone.for_all_maps(|id, map| {
        assert!(
            !map.mark_state().color().is_marked(),
            "{} still colored after sweeping",
            id
        );
    });
}
