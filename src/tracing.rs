//! Ordinary (non-ephemeron) tracing over the registry.

#[cfg(debug_assertions)]
use crate::collector::MappingVisitor;
use crate::collector::Tracer;
use crate::zone::Zone;

/// Trace each registered map's owner reference. This participates in
/// ordinary root tracing only; entry liveness is the mark phase's business.
pub fn trace_weak_maps<T: Tracer>(zone: &mut Zone, tracer: &mut T) {
    zone.for_all_maps_mut(|_, map| {
        if let Some(owner) = map.member_of.as_mut() {
            tracer.trace_edge(owner, "memberOf");
        }
    });
}

/// Visit every association in every map of every given zone.
///
/// Debug-build inspection only, for debuggers and heap profilers. The
/// visitor callback must not trigger a garbage collection: the registries
/// are being iterated and a collection could sweep them mid-walk. This is a
/// caller contract, not something the engine can enforce.
#[cfg(debug_assertions)]
pub fn trace_all_mappings<V: MappingVisitor>(zones: &[&Zone], visitor: &mut V) {
    for zone in zones {
        zone.for_all_maps(|id, map| map.visit_mappings(zone.id(), id, visitor));
    }
}
