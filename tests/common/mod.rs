//! A mock driving collector for exercising the engine end to end.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use weakmark::cell::{CellColor, CellRef, ZoneId};
use weakmark::collector::{
    Collector, EdgeAllocError, MappingVisitor, Marker, NurseryRegistrationError, SweepGroups,
    Tracer, WeakTracer,
};
use weakmark::weak_map::MapId;

#[derive(Copy, Clone)]
pub struct CellInfo {
    pub zone: ZoneId,
    pub tenured: bool,
    pub symbol: bool,
    pub delegate: Option<CellRef>,
}

/// Heap state a real collector would own: one table of cells, one table of
/// mark colors, and the zones currently in their mark phase.
pub struct MockHeap {
    cells: RefCell<HashMap<CellRef, CellInfo>>,
    colors: RefCell<HashMap<CellRef, CellColor>>,
    marking_zones: RefCell<HashSet<ZoneId>>,
    pub store_buffer: RefCell<Vec<CellRef>>,
    pub nursery_registrations: RefCell<Vec<(ZoneId, MapId)>>,
    pub sweeping_lock_acquisitions: Cell<usize>,
    sweeping_lock: Mutex<()>,
    next_addr: Cell<usize>,
}

impl MockHeap {
    pub fn new() -> MockHeap {
        let _ = weakmark::util::logger::try_init();
        MockHeap {
            cells: RefCell::new(HashMap::new()),
            colors: RefCell::new(HashMap::new()),
            marking_zones: RefCell::new(HashSet::new()),
            store_buffer: RefCell::new(Vec::new()),
            nursery_registrations: RefCell::new(Vec::new()),
            sweeping_lock_acquisitions: Cell::new(0),
            sweeping_lock: Mutex::new(()),
            next_addr: Cell::new(0x1000),
        }
    }

    pub fn add_cell(&self, zone: ZoneId, tenured: bool) -> CellRef {
        let addr = self.next_addr.get();
        self.next_addr.set(addr + 8);
        let cell = CellRef::from_raw_address(addr).unwrap();
        self.cells.borrow_mut().insert(
            cell,
            CellInfo {
                zone,
                tenured,
                symbol: false,
                delegate: None,
            },
        );
        cell
    }

    pub fn add_symbol(&self, atoms_zone: ZoneId) -> CellRef {
        let cell = self.add_cell(atoms_zone, true);
        self.cells.borrow_mut().get_mut(&cell).unwrap().symbol = true;
        cell
    }

    pub fn set_delegate(&self, key: CellRef, delegate: CellRef) {
        self.cells.borrow_mut().get_mut(&key).unwrap().delegate = Some(delegate);
    }

    pub fn set_tenured(&self, cell: CellRef, tenured: bool) {
        self.cells.borrow_mut().get_mut(&cell).unwrap().tenured = tenured;
    }

    pub fn set_zone_marking(&self, zone: ZoneId, marking: bool) {
        if marking {
            self.marking_zones.borrow_mut().insert(zone);
        } else {
            self.marking_zones.borrow_mut().remove(&zone);
        }
    }

    pub fn color_of(&self, cell: CellRef) -> CellColor {
        self.colors
            .borrow()
            .get(&cell)
            .copied()
            .unwrap_or(CellColor::White)
    }

    /// Raise-only marking primitive, as the real marker's would be.
    pub fn mark(&self, cell: CellRef, color: CellColor) -> bool {
        let mut colors = self.colors.borrow_mut();
        let current = colors.entry(cell).or_insert(CellColor::White);
        if *current >= color {
            return false;
        }
        *current = color;
        true
    }

    pub fn clear_cell_colors(&self) {
        self.colors.borrow_mut().clear();
    }

    pub fn marker(&self) -> MockMarker<'_> {
        MockMarker { heap: self }
    }

    pub fn weak_tracer(&self) -> MockWeakTracer<'_> {
        MockWeakTracer { heap: self }
    }
}

impl Collector for MockHeap {
    fn is_tenured(&self, cell: CellRef) -> bool {
        self.cells.borrow()[&cell].tenured
    }

    fn zone_of(&self, cell: CellRef) -> ZoneId {
        self.cells.borrow()[&cell].zone
    }

    fn is_symbol(&self, cell: CellRef) -> bool {
        self.cells.borrow()[&cell].symbol
    }

    fn delegate_of(&self, key: CellRef) -> Option<CellRef> {
        self.cells.borrow()[&key].delegate
    }

    fn zone_is_marking(&self, zone: ZoneId) -> bool {
        self.marking_zones.borrow().contains(&zone)
    }

    fn put_whole_cell(&self, cell: CellRef) {
        self.store_buffer.borrow_mut().push(cell);
    }

    fn sweeping_lock(&self) -> MutexGuard<'_, ()> {
        self.sweeping_lock_acquisitions
            .set(self.sweeping_lock_acquisitions.get() + 1);
        self.sweeping_lock.lock().unwrap()
    }

    fn register_nursery_weak_map(
        &self,
        zone: ZoneId,
        map: MapId,
    ) -> Result<(), NurseryRegistrationError> {
        self.nursery_registrations.borrow_mut().push((zone, map));
        Ok(())
    }
}

pub struct MockMarker<'a> {
    heap: &'a MockHeap,
}

impl Marker for MockMarker<'_> {
    fn cell_color(&self, cell: CellRef) -> CellColor {
        self.heap.color_of(cell)
    }

    fn mark_cell(&mut self, cell: CellRef, color: CellColor) -> bool {
        self.heap.mark(cell, color)
    }
}

/// A cell survives sweeping iff it got a color this cycle. No relocation.
pub struct MockWeakTracer<'a> {
    heap: &'a MockHeap,
}

impl WeakTracer for MockWeakTracer<'_> {
    fn trace_weak_cell(&mut self, cell: CellRef) -> Option<CellRef> {
        self.heap.color_of(cell).is_marked().then_some(cell)
    }

    fn is_live(&self, cell: CellRef) -> bool {
        self.heap.color_of(cell).is_marked()
    }
}

/// Records traced owner edges.
pub struct MockTracer {
    pub traced: Vec<(CellRef, &'static str)>,
}

impl MockTracer {
    pub fn new() -> MockTracer {
        MockTracer { traced: Vec::new() }
    }
}

impl Tracer for MockTracer {
    fn trace_edge(&mut self, edge: &mut CellRef, name: &'static str) {
        self.traced.push((*edge, name));
    }
}

/// Records sweep-group edges; optionally fails every insertion.
pub struct MockSweepGroups {
    pub edges: Vec<(ZoneId, ZoneId)>,
    pub fail: bool,
}

impl MockSweepGroups {
    pub fn new() -> MockSweepGroups {
        MockSweepGroups {
            edges: Vec::new(),
            fail: false,
        }
    }
}

impl SweepGroups for MockSweepGroups {
    fn add_sweep_group_edge(&mut self, from: ZoneId, to: ZoneId) -> Result<(), EdgeAllocError> {
        if self.fail {
            return Err(EdgeAllocError);
        }
        self.edges.push((from, to));
        Ok(())
    }
}

/// Records visited mappings.
pub struct MockMappingVisitor {
    pub seen: Vec<(ZoneId, MapId, CellRef, CellRef)>,
}

impl MockMappingVisitor {
    pub fn new() -> MockMappingVisitor {
        MockMappingVisitor { seen: Vec::new() }
    }
}

impl MappingVisitor for MockMappingVisitor {
    fn visit_mapping(&mut self, zone: ZoneId, map: MapId, key: CellRef, value: CellRef) {
        self.seen.push((zone, map, key, value));
    }
}
