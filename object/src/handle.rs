use core::fmt;

/// Largest handle index that still fits the 30-bit value payload.
pub const MAX_OBJECT_ID: u32 = (1 << 30) - 1;

/// An index into the heap's handle table.
///
/// Handles stay stable across collections: when the collector compacts
/// the arena it rewrites the table slot, never the handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index & MAX_OBJECT_ID)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
