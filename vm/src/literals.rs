use ahash::AHashMap;
use object::{Special, Value};

/// Fixed upper bound on distinct literals, set by the 1-byte operand.
pub const LITERAL_CAPACITY: usize = 256;

/// Structural identity of a literal, used for deduplication.
///
/// Integers and specials compare by value, strings by content, symbols
/// by name (equivalent to identity since symbols are interned) and
/// arrays element-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralKey {
    Int(i16),
    Special(Special),
    String(String),
    Symbol(String),
    Array(Vec<LiteralKey>),
}

/// The literal pool shared by every compiled method.
#[derive(Debug, Default)]
pub struct LiteralPool {
    entries: Vec<Value>,
    index: AHashMap<LiteralKey, u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolFull;

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, key: &LiteralKey) -> Option<u8> {
        self.index.get(key).copied()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= LITERAL_CAPACITY
    }

    /// Adds `value` under `key` unless an equal literal is already pooled.
    pub fn insert(&mut self, key: LiteralKey, value: Value) -> Result<u8, PoolFull> {
        if let Some(idx) = self.find(&key) {
            return Ok(idx);
        }
        if self.is_full() {
            return Err(PoolFull);
        }
        let idx = self.entries.len() as u8;
        self.entries.push(value);
        self.index.insert(key, idx);
        Ok(idx)
    }

    #[inline]
    pub fn get(&self, idx: u8) -> Option<Value> {
        self.entries.get(idx as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for value in &mut self.entries {
            visitor(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_share_an_entry() {
        let mut pool = LiteralPool::new();
        let a = pool.insert(LiteralKey::Int(5), Value::int(5)).unwrap();
        let b = pool.insert(LiteralKey::String("x".into()), Value::NIL).unwrap();
        let c = pool.insert(LiteralKey::Int(5), Value::int(5)).unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn strings_and_symbols_do_not_collide() {
        let mut pool = LiteralPool::new();
        let s = pool.insert(LiteralKey::String("foo".into()), Value::int(1)).unwrap();
        let y = pool.insert(LiteralKey::Symbol("foo".into()), Value::int(2)).unwrap();
        assert_ne!(s, y);
    }

    #[test]
    fn pool_fills_up() {
        let mut pool = LiteralPool::new();
        for i in 0..LITERAL_CAPACITY {
            pool.insert(LiteralKey::Int(i as i16), Value::int(i as i32)).unwrap();
        }
        assert_eq!(pool.insert(LiteralKey::Int(-1), Value::int(-1)), Err(PoolFull));
        assert_eq!(pool.insert(LiteralKey::Int(3), Value::int(3)), Ok(3), "existing keys still resolve");
    }
}
