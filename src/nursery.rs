//! The bridge to the generational collector.
//!
//! A map that gains an entry referencing a not-yet-tenured cell must be on
//! the nursery worklist before the next minor collection, which otherwise
//! has no way to know the map's entries need special-casing.

use crate::cell::ZoneId;
use crate::collector::Collector;
use crate::weak_map::MapId;

/// Register the map with the generational collector's nursery worklist.
///
/// Registration failure is fatal. There is no safe degraded mode: an
/// unregistered nursery-referencing map could be swept incorrectly during a
/// minor collection, so the process terminates rather than risk silently
/// dropping a live reference.
pub(crate) fn register_nursery_map<C: Collector>(heap: &C, zone: ZoneId, map: MapId) {
    if let Err(e) = heap.register_nursery_weak_map(zone, map) {
        error!(
            "{}: registering {} with the nursery worklist failed: {}",
            zone, map, e
        );
        std::process::abort();
    }
    trace!("{}: {} registered with the nursery worklist", zone, map);
}
