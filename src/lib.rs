//! Weak-map and ephemeron liveness tracking for zoned, incremental,
//! generational garbage collectors.
//!
//! A weak map holds non-owning key→value associations. An entry survives a
//! collection cycle iff its key is reachable from a root independently of
//! the map itself — directly, or through a "delegate" cell whose liveness
//! implies the key's. This crate computes exactly that, for a driving
//! collector that marks incrementally with parallel helpers and collects a
//! nursery generationally. The collector stays in charge of allocation,
//! root scanning, barriers and scheduling; it reaches this engine through
//! the per-zone operations and supplies its own heap services behind the
//! [`collector`] traits.
//!
//! Per cycle, the collector drives, in order:
//!
//! 1. [`marking::unmark_zone`] — reset map colors, discard old edges;
//! 2. root marking (external), calling [`marking::mark_implicit_edges`] as
//!    cells get marked and [`marking::mark_zone_iteratively`] between
//!    slices until no zone reports progress;
//! 3. [`sweep::find_sweep_group_edges_for_zone`] — report cross-zone
//!    dependencies, so the external sweep-group computation never splits
//!    dependent zones;
//! 4. [`sweep::sweep_zone`] — drop dead entries, retire unreached maps.
//!
//! Concurrency contract: map colors are atomic and may be raised from any
//! thread through [`weak_map::MapMarkHandle`]s; everything that writes a
//! zone's ephemeron edge table takes `&mut` [`zone::Zone`], making the
//! single zone-marking owner a compile-time guarantee.

#[macro_use]
extern crate log;

pub mod cell;
pub mod collector;
pub mod ephemeron;
pub mod marking;
mod nursery;
pub mod sweep;
pub mod tracing;
pub mod util;
pub mod weak_map;
pub mod zone;

pub use crate::cell::{CellColor, CellRef, ZoneId};
pub use crate::weak_map::{MapId, MapKind, MapMarkHandle, MapMarkState, WeakMap};
pub use crate::zone::{GcState, Zone};
