//! Sweep-phase behavior: dead-map retirement, the sweeping lock, cached
//! flag recomputation, and idempotence.

mod common;

use common::MockHeap;
use weakmark::cell::{CellColor, ZoneId};
use weakmark::marking;
use weakmark::sweep;
use weakmark::weak_map::MapKind;
use weakmark::zone::{GcState, Zone};

const ZONE: ZoneId = ZoneId(1);

fn begin_marking(zone: &mut Zone, heap: &MockHeap) {
    zone.set_gc_state(GcState::Marking);
    heap.set_zone_marking(ZONE, true);
    marking::unmark_zone(zone);
}

fn run_sweep(zone: &mut Zone, heap: &MockHeap) {
    zone.set_gc_state(GcState::Sweeping);
    heap.set_zone_marking(ZONE, false);
    let mut tracer = heap.weak_tracer();
    sweep::sweep_zone(zone, heap, &mut tracer);
    zone.set_gc_state(GcState::NoGc);
}

#[test]
fn sweeping_an_empty_zone_is_a_noop() {
    let heap = MockHeap::new();
    let mut zone = Zone::new(ZONE);
    begin_marking(&mut zone, &heap);
    run_sweep(&mut zone, &heap);
    assert_eq!(zone.map_count(), 0);
}

#[test]
fn unreached_internal_map_is_destroyed_under_the_lock() {
    let heap = MockHeap::new();
    let mut zone = Zone::new(ZONE);
    let (map, _mark) = zone.create_map(MapKind::User, None);
    let k = heap.add_cell(ZONE, true);
    let v = heap.add_cell(ZONE, true);
    zone.insert_entry(map, k, v, &heap);

    // Nothing marks the map this cycle: it is unreachable.
    begin_marking(&mut zone, &heap);
    run_sweep(&mut zone, &heap);

    assert_eq!(zone.map_count(), 0);
    assert!(zone.map(map).is_none());
    assert_eq!(heap.sweeping_lock_acquisitions.get(), 1);
}

#[test]
fn unreached_empty_internal_map_skips_the_lock() {
    let heap = MockHeap::new();
    let mut zone = Zone::new(ZONE);
    let (map, _mark) = zone.create_map(MapKind::User, None);

    begin_marking(&mut zone, &heap);
    run_sweep(&mut zone, &heap);

    assert!(zone.map(map).is_none());
    assert_eq!(heap.sweeping_lock_acquisitions.get(), 0);
}

#[test]
fn unreached_owned_map_waits_for_its_finalizer() {
    let heap = MockHeap::new();
    let owner = heap.add_cell(ZONE, true);
    let mut zone = Zone::new(ZONE);
    let (map, _mark) = zone.create_map(MapKind::User, Some(owner));
    let k = heap.add_cell(ZONE, true);
    let v = heap.add_cell(ZONE, true);
    zone.insert_entry(map, k, v, &heap);

    begin_marking(&mut zone, &heap);
    run_sweep(&mut zone, &heap);

    // Delisted, but the table itself is the finalizer's to destroy.
    assert_eq!(zone.map_count(), 0);
    assert!(zone.map(map).is_some());
    assert_eq!(heap.sweeping_lock_acquisitions.get(), 0);

    zone.destroy_map(map);
    assert!(zone.map(map).is_none());
}

#[test]
fn surviving_map_returns_to_white_and_stays_registered() {
    let heap = MockHeap::new();
    let mut zone = Zone::new(ZONE);
    let (map, mark) = zone.create_map(MapKind::User, None);
    let k = heap.add_cell(ZONE, true);
    let v = heap.add_cell(ZONE, true);
    zone.insert_entry(map, k, v, &heap);

    begin_marking(&mut zone, &heap);
    mark.mark(CellColor::Black);
    heap.mark(k, CellColor::Black);
    let mut marker = heap.marker();
    marking::mark_zone_to_fixpoint(&mut zone, &heap, &mut marker);
    run_sweep(&mut zone, &heap);

    assert_eq!(zone.map_count(), 1);
    assert_eq!(mark.color(), CellColor::White);
    assert_eq!(zone.get(map, k), Some(v));
}

#[test]
fn sweeping_twice_without_marking_changes_nothing() {
    let heap = MockHeap::new();
    let mut zone = Zone::new(ZONE);
    let (map, mark) = zone.create_map(MapKind::User, None);
    let k = heap.add_cell(ZONE, true);
    let v = heap.add_cell(ZONE, true);
    zone.insert_entry(map, k, v, &heap);

    begin_marking(&mut zone, &heap);
    mark.mark(CellColor::Black);
    heap.mark(k, CellColor::Black);
    let mut marker = heap.marker();
    marking::mark_zone_to_fixpoint(&mut zone, &heap, &mut marker);
    run_sweep(&mut zone, &heap);
    assert_eq!(zone.map_count(), 1);

    // No mark phase ran since; the second pass finds nothing colored and
    // must not treat the white survivor as dead.
    run_sweep(&mut zone, &heap);
    assert_eq!(zone.map_count(), 1);
    assert_eq!(zone.get(map, k), Some(v));
}

#[test]
fn cached_flags_are_rebuilt_from_survivors() {
    let heap = MockHeap::new();
    let atoms = ZoneId(0);
    let mut zone = Zone::new(ZONE);
    let (map, mark) = zone.create_map(MapKind::User, None);

    // A symbol-keyed entry sets the flag at insertion.
    let sym = heap.add_symbol(atoms);
    let v1 = heap.add_cell(ZONE, true);
    zone.insert_entry(map, sym, v1, &heap);

    let k2 = heap.add_cell(ZONE, true);
    let v2 = heap.add_cell(ZONE, true);
    let d2 = heap.add_cell(ZONE, true);
    heap.set_delegate(k2, d2);
    zone.insert_entry(map, k2, v2, &heap);

    assert!(zone.may_have_symbol_keys());
    assert!(zone.user_maps_may_have_key_delegates());

    // Only the delegate-keyed entry survives: the symbol flag must clear,
    // the delegate flag must stay.
    begin_marking(&mut zone, &heap);
    mark.mark(CellColor::Black);
    heap.mark(k2, CellColor::Black);
    let mut marker = heap.marker();
    marking::mark_zone_to_fixpoint(&mut zone, &heap, &mut marker);
    run_sweep(&mut zone, &heap);

    assert_eq!(zone.map(map).unwrap().len(), 1);
    assert!(!zone.may_have_symbol_keys());
    assert!(zone.user_maps_may_have_key_delegates());
}

#[test]
fn full_cycles_back_to_back() {
    // Two complete cycles over the same zone: the survivor of the first is
    // collected in the second once its root goes away.
    let heap = MockHeap::new();
    let mut zone = Zone::new(ZONE);
    let (map, mark) = zone.create_map(MapKind::User, None);
    let k = heap.add_cell(ZONE, true);
    let v = heap.add_cell(ZONE, true);
    zone.insert_entry(map, k, v, &heap);

    begin_marking(&mut zone, &heap);
    mark.mark(CellColor::Black);
    heap.mark(k, CellColor::Black);
    let mut marker = heap.marker();
    marking::mark_zone_to_fixpoint(&mut zone, &heap, &mut marker);
    drop(marker);
    run_sweep(&mut zone, &heap);
    assert_eq!(zone.get(map, k), Some(v));

    // Next cycle: K has no root anymore.
    heap.clear_cell_colors();
    begin_marking(&mut zone, &heap);
    mark.mark(CellColor::Black);
    let mut marker = heap.marker();
    marking::mark_zone_to_fixpoint(&mut zone, &heap, &mut marker);
    drop(marker);
    run_sweep(&mut zone, &heap);
    assert!(zone.map(map).unwrap().is_empty());
}
