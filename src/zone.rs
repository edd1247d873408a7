//! Per-zone registry of weak maps.
//!
//! A zone owns its registered maps in an arena with stable indices, split
//! into a system list and a user list, plus the zone's ephemeron edge table
//! and two cached booleans that let sweep-group discovery skip an O(maps)
//! scan when nothing in the zone could need it. The zone persists across
//! collection cycles; the edge table is cleared at the start of every mark
//! phase.
//!
//! Everything that writes the edge table takes `&mut Zone`: there is one
//! logical zone-marking owner at a time, and the borrow checker enforces it.
//! Concurrent marking helpers interact with a zone's maps only through
//! their atomic [`crate::weak_map::MapMarkState`] handles.

use crate::cell::{CellColor, CellRef, ZoneId};
use crate::collector::Collector;
use crate::ephemeron::EphemeronEdgeTable;
use crate::nursery;
use crate::util::options::Options;
use crate::weak_map::{MapId, MapKind, MapMarkHandle, WeakMap};

/// The zone's collection state, mirrored from the driving collector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GcState {
    NoGc,
    Marking,
    Sweeping,
}

pub struct Zone {
    pub(crate) id: ZoneId,
    pub(crate) gc_state: GcState,
    /// Map storage. Slots are stable for the life of a map; freed slots are
    /// reused.
    pub(crate) maps: Vec<Option<WeakMap>>,
    pub(crate) free_slots: Vec<u32>,
    /// The registry lists. A registered map is on exactly one of these,
    /// matching its kind.
    pub(crate) system_maps: Vec<MapId>,
    pub(crate) user_maps: Vec<MapId>,
    pub(crate) ephemeron_edges: EphemeronEdgeTable,
    /// Set when a mark phase has begun since the last sweep. A sweep
    /// without it has no liveness information and must not treat white maps
    /// as dead.
    pub(crate) needs_sweep: bool,
    /// Set if any registered map may have symbol keys.
    pub(crate) may_have_symbol_keys: bool,
    /// Set if any user map may have key delegates. System maps are assumed
    /// to and are always scanned.
    pub(crate) user_maps_may_have_key_delegates: bool,
    pub(crate) fixpoint_warn_threshold: usize,
}

impl Zone {
    pub fn new(id: ZoneId) -> Zone {
        Zone::with_options(id, &Options::default())
    }

    pub fn with_options(id: ZoneId, options: &Options) -> Zone {
        Zone {
            id,
            gc_state: GcState::NoGc,
            maps: Vec::with_capacity(options.map_arena_capacity),
            free_slots: Vec::new(),
            system_maps: Vec::new(),
            user_maps: Vec::new(),
            ephemeron_edges: EphemeronEdgeTable::with_capacity(options.edge_table_capacity),
            needs_sweep: false,
            may_have_symbol_keys: false,
            user_maps_may_have_key_delegates: false,
            fixpoint_warn_threshold: options.fixpoint_warn_threshold,
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn gc_state(&self) -> GcState {
        self.gc_state
    }

    /// Mirror the driving collector's phase transitions for this zone.
    pub fn set_gc_state(&mut self, state: GcState) {
        debug!("{}: {:?} -> {:?}", self.id, self.gc_state, state);
        self.gc_state = state;
    }

    pub fn is_marking(&self) -> bool {
        self.gc_state == GcState::Marking
    }

    pub fn is_sweeping(&self) -> bool {
        self.gc_state == GcState::Sweeping
    }

    /// Number of registered maps.
    pub fn map_count(&self) -> usize {
        self.system_maps.len() + self.user_maps.len()
    }

    pub fn may_have_symbol_keys(&self) -> bool {
        self.may_have_symbol_keys
    }

    pub fn user_maps_may_have_key_delegates(&self) -> bool {
        self.user_maps_may_have_key_delegates
    }

    /// Create and register a map. Returns its id and a cloneable handle to
    /// its mark state for use by barrier code on other threads.
    ///
    /// A map created while the zone is already marking starts black: it can
    /// have received no entries yet, and the object constructing it is
    /// necessarily live.
    pub fn create_map(
        &mut self,
        kind: MapKind,
        member_of: Option<CellRef>,
    ) -> (MapId, MapMarkHandle) {
        let initial = if self.is_marking() {
            CellColor::Black
        } else {
            CellColor::White
        };
        let map = WeakMap::new(kind, member_of, initial);
        let handle = map.mark_handle();

        let id = match self.free_slots.pop() {
            Some(slot) => {
                self.maps[slot as usize] = Some(map);
                MapId(slot)
            }
            None => {
                self.maps.push(Some(map));
                MapId((self.maps.len() - 1) as u32)
            }
        };
        match kind {
            MapKind::System => self.system_maps.push(id),
            MapKind::User => self.user_maps.push(id),
        }
        trace!("{}: created {} ({:?})", self.id, id, kind);
        (id, handle)
    }

    /// Destroy a map and release its entries. This is the owner-finalizer
    /// path; it also serves ownerless maps the embedder drops explicitly.
    /// Tolerates maps the sweeper already delisted.
    pub fn destroy_map(&mut self, id: MapId) {
        let Some(map) = self.maps.get_mut(id.index()).and_then(Option::take) else {
            debug_assert!(false, "{} destroyed twice", id);
            return;
        };
        self.delist(map.kind(), id);
        self.free_slots.push(id.0);
        trace!("{}: destroyed {}", self.id, id);
    }

    pub(crate) fn delist(&mut self, kind: MapKind, id: MapId) {
        let list = match kind {
            MapKind::System => &mut self.system_maps,
            MapKind::User => &mut self.user_maps,
        };
        if let Some(pos) = list.iter().position(|&m| m == id) {
            list.swap_remove(pos);
        }
    }

    pub fn map(&self, id: MapId) -> Option<&WeakMap> {
        self.maps.get(id.index()).and_then(Option::as_ref)
    }

    /// Insert an association into a map, conservatively refreshing the
    /// zone's cached key flags and registering the map with the nursery
    /// worklist on its first not-yet-tenured entry.
    ///
    /// Write-barrier duties for insertions during incremental marking stay
    /// with the embedding.
    pub fn insert_entry<C: Collector>(
        &mut self,
        id: MapId,
        key: CellRef,
        value: CellRef,
        heap: &C,
    ) -> Option<CellRef> {
        let zone_id = self.id;
        let delegate = heap.delegate_of(key);

        if heap.is_symbol(key) {
            self.may_have_symbol_keys = true;
        }
        let Some(map) = self.maps.get_mut(id.index()).and_then(Option::as_mut) else {
            debug_assert!(false, "insert into unknown {}", id);
            return None;
        };
        if map.kind() == MapKind::User && delegate.is_some() {
            self.user_maps_may_have_key_delegates = true;
        }

        let touches_nursery = !heap.is_tenured(key)
            || !heap.is_tenured(value)
            || delegate.is_some_and(|d| !heap.is_tenured(d));
        if touches_nursery && !map.has_nursery_entries {
            set_has_nursery_entries(zone_id, id, map, heap);
        }

        map.insert(key, value)
    }

    /// Remove an association. The cached flags are left set; they are
    /// rebuilt from surviving maps at the next sweep.
    pub fn remove_entry(&mut self, id: MapId, key: CellRef) -> Option<CellRef> {
        let map = self.maps.get_mut(id.index()).and_then(Option::as_mut)?;
        map.remove(key)
    }

    pub fn get(&self, id: MapId, key: CellRef) -> Option<CellRef> {
        self.map(id).and_then(|map| map.get(key))
    }

    /// Called by the generational collector once the map's nursery entries
    /// have all been evicted or tenured.
    pub fn clear_has_nursery_entries(&mut self, id: MapId) {
        if let Some(map) = self.maps.get_mut(id.index()).and_then(Option::as_mut) {
            map.has_nursery_entries = false;
        }
    }

    pub(crate) fn for_all_maps(&self, mut f: impl FnMut(MapId, &WeakMap)) {
        for &id in itertools::chain(&self.system_maps, &self.user_maps) {
            if let Some(map) = self.maps.get(id.index()).and_then(Option::as_ref) {
                f(id, map);
            } else {
                debug_assert!(false, "registered {} has no slot", id);
            }
        }
    }

    pub(crate) fn for_all_maps_mut(&mut self, mut f: impl FnMut(MapId, &mut WeakMap)) {
        for &id in itertools::chain(&self.system_maps, &self.user_maps) {
            if let Some(map) = self.maps.get_mut(id.index()).and_then(Option::as_mut) {
                f(id, map);
            } else {
                debug_assert!(false, "registered {} has no slot", id);
            }
        }
    }

    /// Validate the cached flags against what the maps actually hold.
    #[cfg(debug_assertions)]
    pub fn check_cached_flags<C: Collector>(&self, heap: &C) {
        self.for_all_maps(|id, map| {
            let flags = map.key_flags(heap);
            if flags.has_symbol_keys {
                assert!(
                    self.may_have_symbol_keys,
                    "{} holds symbol keys but {} has the flag clear",
                    id, self.id
                );
            }
            if flags.has_key_delegates && map.kind() == MapKind::User {
                assert!(
                    self.user_maps_may_have_key_delegates,
                    "user {} holds key delegates but {} has the flag clear",
                    id, self.id
                );
            }
        });
    }
}

fn set_has_nursery_entries<C: Collector>(
    zone_id: ZoneId,
    id: MapId,
    map: &mut WeakMap,
    heap: &C,
) {
    debug_assert!(!map.has_nursery_entries);
    nursery::register_nursery_map(heap, zone_id, id);
    map.has_nursery_entries = true;
}
