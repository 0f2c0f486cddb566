use ahash::AHashMap;
use object::Value;

/// Fixed upper bound on distinct global names.
pub const GLOBALS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Global {
    label: String,
    /// The name symbol, kept so the GC sees it.
    name: Value,
    value: Value,
}

/// Global slots: classes and anything a program stores under a
/// capitalised name.
///
/// Bytecode refers to a global through the literal index of its name
/// symbol; the interpreter resolves that name here at run time, so a
/// method may mention a global that is bound only later.
#[derive(Debug, Default)]
pub struct Globals {
    slots: Vec<Global>,
    index: AHashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalsFull;

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.index.get(name).map(|&i| self.slots[i].value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Binds `name`, reusing its slot if it already exists.
    pub fn set(&mut self, name: &str, symbol: Value, value: Value) -> Result<(), GlobalsFull> {
        if let Some(&i) = self.index.get(name) {
            self.slots[i].value = value;
            return Ok(());
        }
        if self.slots.len() >= GLOBALS_CAPACITY {
            return Err(GlobalsFull);
        }
        self.index.insert(name.to_owned(), self.slots.len());
        self.slots.push(Global {
            label: name.to_owned(),
            name: symbol,
            value,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.label.as_str())
    }

    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for slot in &mut self.slots {
            visitor(&mut slot.name);
            visitor(&mut slot.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_reuses_the_slot() {
        let mut globals = Globals::new();
        globals.set("Foo", Value::NIL, Value::int(1)).unwrap();
        globals.set("Foo", Value::NIL, Value::int(2)).unwrap();
        assert_eq!(globals.len(), 1);
        assert_eq!(globals.get("Foo"), Some(Value::int(2)));
        assert_eq!(globals.get("Bar"), None);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut globals = Globals::new();
        for i in 0..GLOBALS_CAPACITY {
            globals.set(&format!("G{i}"), Value::NIL, Value::NIL).unwrap();
        }
        assert_eq!(globals.set("Extra", Value::NIL, Value::NIL), Err(GlobalsFull));
        assert!(globals.set("G0", Value::NIL, Value::TRUE).is_ok(), "rebinding still works");
        assert_eq!(globals.names().next(), Some("G0"));
    }
}
