use ahash::AHashMap;
use object::{ObjectId, Value};

/// Memo of `(class, selector) -> method` results in front of the
/// superclass scan.
///
/// Entries are only valid until the next method installation; the VM
/// flushes the whole cache then.
#[derive(Debug, Default)]
pub struct MethodCache {
    entries: AHashMap<(ObjectId, ObjectId), Value>,
    hits: u64,
    misses: u64,
}

impl MethodCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, class: ObjectId, selector: ObjectId) -> Option<Value> {
        let found = self.entries.get(&(class, selector)).copied();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, class: ObjectId, selector: ObjectId, method: Value) {
        self.entries.insert((class, selector), method);
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache and lookups that missed it.
    pub fn hits_and_misses(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for method in self.entries.values_mut() {
            visitor(method);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VmSettings, VM};

    #[test]
    fn repeated_sends_hit_the_cache() {
        let mut vm = VM::new(VmSettings::default()).expect("bootstrap");
        vm.load_source("Main = ( run = ( |x| 1 to: 5 do: [:i | x := i negated ]. ^x ) )")
            .unwrap();
        vm.run_main().unwrap();
        let (hits, misses) = vm.cache.hits_and_misses();
        assert!(misses >= 1);
        assert!(hits >= 4, "later negated sends are cached: {hits} hits");
        assert!(!vm.cache.is_empty());

        vm.load_source("Other = ( f = ( ^1 ) )").unwrap();
        assert!(vm.cache.is_empty(), "installing methods flushes the cache");
    }
}
