use std::fmt;
use std::num::NonZeroUsize;

use bytemuck::NoUninit;
use static_assertions::const_assert_eq;

/// A reference to a heap cell owned by the driving collector.
///
/// A collector may define its cell references differently: the address of the
/// cell, a handle into an indirection table, or anything else. Regardless, the
/// engine treats the value as an opaque non-zero word with identity. All
/// per-cell knowledge (tenure, zone, mark state, delegate) is obtained through
/// the [`crate::collector::Collector`] and [`crate::collector::Marker`]
/// traits.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq)]
pub struct CellRef(NonZeroUsize);

// A cell reference is a plain non-zero word.
unsafe impl NoUninit for CellRef {}

impl CellRef {
    /// Cast a raw address to a cell reference. Returns `None` for zero, which
    /// the engine reserves as "no cell".
    pub fn from_raw_address(addr: usize) -> Option<CellRef> {
        NonZeroUsize::new(addr).map(CellRef)
    }

    /// Cast the cell reference back to its raw address.
    pub fn to_raw_address(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifier of a collection unit (zone). Allocated by the driving
/// collector; the engine only compares and forwards these.
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq, Debug)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "zone#{}", self.0)
    }
}

/// Tri-state incremental-marking liveness marker.
///
/// The color of a cell or map increases monotonically within one mark phase:
/// White (unreached this cycle), then Gray, then Black (terminal). Updates
/// race across marking threads, so the color is always stored in an
/// [`atomic::Atomic`] and raised with a compare-exchange loop; downgrades
/// never happen.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, NoUninit)]
pub enum CellColor {
    White = 0,
    Gray = 1,
    Black = 2,
}

// The color must stay a single byte so `Atomic<CellColor>` is lock-free.
const_assert_eq!(std::mem::size_of::<CellColor>(), 1);

impl CellColor {
    /// Whether the color records a reach event this cycle (Gray or Black).
    pub fn is_marked(self) -> bool {
        self != CellColor::White
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_ref_round_trip() {
        assert!(CellRef::from_raw_address(0).is_none());
        let c = CellRef::from_raw_address(0xdead_beef).unwrap();
        assert_eq!(c.to_raw_address(), 0xdead_beef);
        assert_eq!(format!("{}", c), "0xdeadbeef");
    }

    #[test]
    fn color_order_is_white_gray_black() {
        assert!(CellColor::White < CellColor::Gray);
        assert!(CellColor::Gray < CellColor::Black);
        assert!(!CellColor::White.is_marked());
        assert!(CellColor::Gray.is_marked());
        assert!(CellColor::Black.is_marked());
    }
}
