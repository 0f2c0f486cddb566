use core::fmt;

use crate::ObjectId;

/// Largest magnitude an `Int` can carry: 15 bits plus a separate sign.
pub const INT_MAX: i16 = 0x7FFF;
pub const INT_MIN: i16 = -0x7FFF;

const TAG_INT: u32 = 0b00;
const TAG_OBJECT: u32 = 0b01;
const TAG_SPECIAL: u32 = 0b10;
const TAG_MASK: u32 = 0b11;
const PAYLOAD_SHIFT: u32 = 2;
const INT_SIGN: u32 = 1 << 15;
const INT_MAGNITUDE: u32 = 0x7FFF;

/// The process-wide singletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Special {
    Nil = 0,
    True,
    False,
}

impl Special {
    pub const COUNT: usize = Self::False as usize + 1;

    pub const fn name(self) -> &'static str {
        match self {
            Special::Nil => "nil",
            Special::True => "true",
            Special::False => "false",
        }
    }
}

impl TryFrom<u8> for Special {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            0 => Ok(Special::Nil),
            1 => Ok(Special::True),
            2 => Ok(Special::False),
            other => Err(other),
        }
    }
}

/// A tagged scalar: a small integer, a heap reference, or a singleton.
///
/// Packed form (see [`Value::to_bits`]): a 2-bit tag in the low bits and a
/// 30-bit payload above it. Integers store 15 bits of magnitude and an
/// explicit sign bit, giving the range `INT_MIN..=INT_MAX`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i16),
    Object(ObjectId),
    Special(Special),
}

impl Value {
    pub const NIL: Value = Value::Special(Special::Nil);
    pub const TRUE: Value = Value::Special(Special::True);
    pub const FALSE: Value = Value::Special(Special::False);

    // ── Int ────────────────────────────────────────────────────────

    /// Narrows `n` into the integer range. Magnitudes beyond 15 bits are
    /// truncated, the sign is kept.
    #[inline]
    pub fn int(n: i32) -> Value {
        let magnitude = (n.unsigned_abs() & INT_MAGNITUDE) as i16;
        Value::Int(if n < 0 { -magnitude } else { magnitude })
    }

    /// True if `n` survives [`Value::int`] unchanged.
    #[inline]
    pub fn int_fits(n: i32) -> bool {
        (INT_MIN as i32..=INT_MAX as i32).contains(&n)
    }

    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Value::Int(_))
    }

    #[inline]
    pub const fn to_int(self) -> Option<i16> {
        match self {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    /// Integer payload, or `0` after logging an error when the tag is wrong.
    pub fn as_int(self) -> i16 {
        match self {
            Value::Int(n) => n,
            other => {
                log::error!("expected an integer, got {other:?}");
                0
            }
        }
    }

    // ── Object ─────────────────────────────────────────────────────

    #[inline]
    pub const fn object(id: ObjectId) -> Value {
        Value::Object(id)
    }

    #[inline]
    pub const fn is_object(self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub const fn to_object(self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(id),
            _ => None,
        }
    }

    /// Object handle, or handle 0 after logging an error when the tag is
    /// wrong.
    pub fn as_object_id(self) -> ObjectId {
        match self {
            Value::Object(id) => id,
            other => {
                log::error!("expected an object reference, got {other:?}");
                ObjectId::new(0)
            }
        }
    }

    // ── Special ────────────────────────────────────────────────────

    #[inline]
    pub const fn boolean(b: bool) -> Value {
        if b { Value::TRUE } else { Value::FALSE }
    }

    #[inline]
    pub const fn is_special(self) -> bool {
        matches!(self, Value::Special(_))
    }

    #[inline]
    pub const fn is_nil(self) -> bool {
        matches!(self, Value::Special(Special::Nil))
    }

    #[inline]
    pub const fn is_true(self) -> bool {
        matches!(self, Value::Special(Special::True))
    }

    #[inline]
    pub const fn is_false(self) -> bool {
        matches!(self, Value::Special(Special::False))
    }

    /// Anything other than `false` and `nil` counts as true for jumps.
    #[inline]
    pub const fn is_truthy(self) -> bool {
        !matches!(self, Value::Special(Special::False | Special::Nil))
    }

    /// Singleton code, or `Nil` after logging an error when the tag is wrong.
    pub fn as_special(self) -> Special {
        match self {
            Value::Special(s) => s,
            other => {
                log::error!("expected a special value, got {other:?}");
                Special::Nil
            }
        }
    }

    // ── Packed form ────────────────────────────────────────────────

    /// The 32-bit packed encoding. Two values are identical iff their bits
    /// are equal.
    pub fn to_bits(self) -> u32 {
        let (tag, payload) = match self {
            Value::Int(n) => {
                let sign = if n < 0 { INT_SIGN } else { 0 };
                (TAG_INT, sign | (n.unsigned_abs() as u32 & INT_MAGNITUDE))
            }
            Value::Object(id) => (TAG_OBJECT, id.index() as u32),
            Value::Special(s) => (TAG_SPECIAL, s as u32),
        };
        (payload << PAYLOAD_SHIFT) | tag
    }

    pub fn from_bits(bits: u32) -> Option<Value> {
        let payload = bits >> PAYLOAD_SHIFT;
        match bits & TAG_MASK {
            TAG_INT => {
                if payload & !(INT_SIGN | INT_MAGNITUDE) != 0 {
                    return None;
                }
                let magnitude = (payload & INT_MAGNITUDE) as i16;
                Some(Value::Int(if payload & INT_SIGN != 0 {
                    -magnitude
                } else {
                    magnitude
                }))
            }
            TAG_OBJECT => Some(Value::Object(ObjectId::new(payload))),
            TAG_SPECIAL => Special::try_from(payload as u8).ok().map(Value::Special),
            _ => None,
        }
    }

    #[inline]
    pub fn identical(self, other: Value) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NIL
    }
}

impl From<Special> for Value {
    fn from(s: Special) -> Self {
        Value::Special(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Object(id) => write!(f, "Ref({id})"),
            Value::Special(Special::Nil) => f.write_str("Nil"),
            Value::Special(Special::True) => f.write_str("True"),
            Value::Special(Special::False) => f.write_str("False"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Object(id) => write!(f, "{id}"),
            Value::Special(s) => f.write_str(s.name()),
        }
    }
}
