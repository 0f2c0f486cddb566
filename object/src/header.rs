use bitflags::bitflags;

use crate::Value;

bitflags! {
    /// Bookkeeping bits stored in every object header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u8 {
        /// Set by the collector while marking, cleared by the sweep.
        const MARK = 1 << 0;
        const ARRAY = 1 << 1;
        const CLASS = 1 << 2;
        const METHOD = 1 << 3;
        /// Byte payload holds UTF-8 text.
        const STRING = 1 << 4;
        /// Interned string; equality is identity.
        const SYMBOL = 1 << 5;
    }
}

/// Broad shape of an object, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectKind {
    Instance = 0,
    Array,
    Class,
    Method,
    String,
    Symbol,
}

impl ObjectKind {
    pub const COUNT: usize = Self::Symbol as usize + 1;

    pub const fn flags(self) -> HeaderFlags {
        match self {
            ObjectKind::Instance => HeaderFlags::empty(),
            ObjectKind::Array => HeaderFlags::ARRAY,
            ObjectKind::Class => HeaderFlags::CLASS,
            ObjectKind::Method => HeaderFlags::METHOD,
            ObjectKind::String => HeaderFlags::STRING,
            ObjectKind::Symbol => HeaderFlags::STRING.union(HeaderFlags::SYMBOL),
        }
    }
}

/// Object header: class reference, cached hash byte and flags.
///
/// The field count is the length of the owning object's field vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub class: Value,
    /// `0` until first requested, then memoized.
    pub hash: u8,
    pub flags: HeaderFlags,
}

impl Header {
    pub fn new(class: Value, kind: ObjectKind) -> Self {
        Self {
            class,
            hash: 0,
            flags: kind.flags(),
        }
    }

    #[inline]
    pub fn has_flag(&self, flag: HeaderFlags) -> bool {
        self.flags.contains(flag)
    }

    #[inline]
    pub fn add_flag(&mut self, flag: HeaderFlags) {
        self.flags.insert(flag);
    }

    #[inline]
    pub fn remove_flag(&mut self, flag: HeaderFlags) {
        self.flags.remove(flag);
    }

    pub fn kind(&self) -> ObjectKind {
        let f = self.flags;
        if f.contains(HeaderFlags::SYMBOL) {
            ObjectKind::Symbol
        } else if f.contains(HeaderFlags::STRING) {
            ObjectKind::String
        } else if f.contains(HeaderFlags::METHOD) {
            ObjectKind::Method
        } else if f.contains(HeaderFlags::CLASS) {
            ObjectKind::Class
        } else if f.contains(HeaderFlags::ARRAY) {
            ObjectKind::Array
        } else {
            ObjectKind::Instance
        }
    }
}
