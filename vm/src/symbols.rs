use ahash::AHashMap;
use object::Value;

/// Interning map from text to the canonical Symbol object.
///
/// Symbols are compared by identity everywhere else, so every selector
/// and name must come through here. Allocation lives on the VM
/// ([`crate::VM::intern`]); this table only remembers the results.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: AHashMap<String, Value>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.map.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, symbol: Value) {
        self.map.insert(name.to_owned(), symbol);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for value in self.map.values_mut() {
            visitor(value);
        }
    }
}
