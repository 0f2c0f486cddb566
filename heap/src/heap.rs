//! Mark-sweep-compact heap with a handle table.
//!
//! Objects live densely in an arena vector. Every object is addressed
//! through an [`ObjectId`], an index into a handle table that maps to the
//! object's current arena position. The sweep compacts survivors toward
//! the arena start and rewrites only their handle-table slots, so every
//! `Value` held by roots or by other objects stays valid across a cycle.
//!
//! This crate is decoupled from the interpreter. Consumers provide a
//! [`RootProvider`] to supply live roots at collection time.

use core::fmt;

use object::{content_hash, HeaderFlags, Object, ObjectId, ObjectInit, ObjectSpace, Value, MAX_OBJECT_ID};

// ── Public API types ──────────────────────────────────────────────────

/// Consumers implement this to provide GC roots.
///
/// Called from the allocation path whenever a collection is needed. The
/// visitor receives `&mut Value` so providers can hand out their slots
/// directly.
pub trait RootProvider {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value));
}

/// A provider with no roots, for allocations made outside execution.
pub struct NoRoots;

impl RootProvider for NoRoots {
    fn visit_roots(&mut self, _visitor: &mut dyn FnMut(&mut Value)) {}
}

// ── Heap settings ─────────────────────────────────────────────────────

/// Configuration for the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSettings {
    /// Arena capacity in 32-bit words, headers included.
    pub capacity_words: usize,
    /// Upper bound on simultaneously live objects (handle table size).
    pub max_objects: usize,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            capacity_words: 98_304, // 384 KB of 4-byte words
            max_objects: 16_384,
        }
    }
}

impl HeapSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.capacity_words == 0 || self.max_objects == 0 {
            return Err("heap sizes must be > 0");
        }
        if self.max_objects > MAX_OBJECT_ID as usize {
            return Err("max_objects exceeds the handle range");
        }
        Ok(())
    }
}

// ── GC state ──────────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    Idle = 0,
    Marking = 1,
    Sweeping = 2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: usize,
    pub last_live: usize,
    pub last_freed: usize,
    pub total_freed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Not enough room even after a full collection.
    OutOfMemory { requested: usize, free: usize },
    /// Every handle is in use even after a full collection.
    HandlesExhausted { live: usize },
    InvalidSettings(&'static str),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::OutOfMemory { requested, free } => write!(
                f,
                "out of memory: requested {requested} words, {free} free after collection"
            ),
            HeapError::HandlesExhausted { live } => {
                write!(f, "out of memory: all {live} object handles are live")
            }
            HeapError::InvalidSettings(reason) => write!(f, "invalid heap settings: {reason}"),
        }
    }
}

impl std::error::Error for HeapError {}

// ── Heap ──────────────────────────────────────────────────────────────

pub struct Heap {
    settings: HeapSettings,
    /// Live objects, densely packed.
    arena: Vec<Object>,
    /// Handle of the object at each arena position.
    owners: Vec<ObjectId>,
    /// Arena position of each handle, `None` when free.
    slots: Vec<Option<usize>>,
    free_ids: Vec<ObjectId>,
    used_words: usize,
    phase: GcPhase,
    stats: GcStats,
}

impl Heap {
    pub fn new(settings: HeapSettings) -> Result<Self, HeapError> {
        settings.validate().map_err(HeapError::InvalidSettings)?;
        Ok(Self {
            settings,
            arena: Vec::new(),
            owners: Vec::new(),
            slots: Vec::new(),
            free_ids: Vec::new(),
            used_words: 0,
            phase: GcPhase::Idle,
            stats: GcStats::default(),
        })
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn used_words(&self) -> usize {
        self.used_words
    }

    pub fn free_words(&self) -> usize {
        self.settings.capacity_words.saturating_sub(self.used_words)
    }

    pub fn live_objects(&self) -> usize {
        self.arena.len()
    }

    // ── allocation ─────────────────────────────────────────────────

    /// Allocates an object, collecting once if the arena is full.
    ///
    /// The class and initial field values in `init` are treated as roots
    /// during that collection.
    pub fn allocate(
        &mut self,
        init: ObjectInit,
        roots: &mut dyn RootProvider,
    ) -> Result<ObjectId, HeapError> {
        let words = init.size_in_words();
        if !self.has_room(words) {
            let mut pending: Vec<Value> = Vec::with_capacity(init.values.len() + 1);
            pending.push(init.class);
            pending.extend_from_slice(&init.values);
            self.collect_with(roots, &pending);

            if self.arena.len() >= self.settings.max_objects {
                return Err(HeapError::HandlesExhausted {
                    live: self.arena.len(),
                });
            }
            if !self.has_room(words) {
                return Err(HeapError::OutOfMemory {
                    requested: words,
                    free: self.free_words(),
                });
            }
        }
        Ok(self.place(Object::from_init(init), words))
    }

    #[inline]
    fn has_room(&self, words: usize) -> bool {
        self.used_words + words <= self.settings.capacity_words
            && self.arena.len() < self.settings.max_objects
    }

    fn place(&mut self, object: Object, words: usize) -> ObjectId {
        let id = self.free_ids.pop().unwrap_or_else(|| {
            self.slots.push(None);
            ObjectId::new(self.slots.len() as u32 - 1)
        });
        self.slots[id.index()] = Some(self.arena.len());
        self.arena.push(object);
        self.owners.push(id);
        self.used_words += words;
        id
    }

    // ── access ─────────────────────────────────────────────────────

    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        let index = (*self.slots.get(id.index())?)?;
        self.arena.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        let index = (*self.slots.get(id.index())?)?;
        self.arena.get_mut(index)
    }

    #[inline]
    pub fn object_mut(&mut self, value: Value) -> Option<&mut Object> {
        self.get_mut(value.to_object()?)
    }

    pub fn contains(&self, value: Value) -> bool {
        self.object(value).is_some()
    }

    /// Cached hash byte of `value`, computing and memoizing it on first use.
    pub fn hash_of(&mut self, value: Value) -> u8 {
        let id = match value {
            Value::Int(n) => return (n as u8).max(1),
            Value::Special(s) => return s as u8 + 1,
            Value::Object(id) => id,
        };
        let Some(obj) = self.get_mut(id) else {
            return 1;
        };
        if obj.header.hash == 0 {
            obj.header.hash = if obj.is_string_like() {
                content_hash(&obj.data)
            } else {
                let mixed = (id.index() as u32).wrapping_mul(0x9E37_79B1) >> 24;
                (mixed as u8).max(1)
            };
        }
        obj.header.hash
    }

    // ── collection ─────────────────────────────────────────────────

    /// Runs a full stop-the-world cycle.
    pub fn collect(&mut self, roots: &mut dyn RootProvider) {
        self.collect_with(roots, &[]);
    }

    fn collect_with(&mut self, roots: &mut dyn RootProvider, extra: &[Value]) {
        let before = self.arena.len();
        log::debug!(
            "gc: start, {} objects, {}/{} words",
            before,
            self.used_words,
            self.settings.capacity_words
        );

        self.phase = GcPhase::Marking;
        let mut worklist: Vec<ObjectId> = Vec::new();
        roots.visit_roots(&mut |value| {
            if let Value::Object(id) = *value {
                worklist.push(id);
            }
        });
        worklist.extend(extra.iter().filter_map(|v| v.to_object()));
        self.mark(worklist);

        self.phase = GcPhase::Sweeping;
        let freed = self.sweep();

        self.phase = GcPhase::Idle;
        self.stats.collections += 1;
        self.stats.last_live = self.arena.len();
        self.stats.last_freed = freed;
        self.stats.total_freed += freed;
        log::debug!(
            "gc: done, {} live, {} freed, {} words used",
            self.arena.len(),
            freed,
            self.used_words
        );
    }

    /// Depth-first marking with an explicit stack; each object is marked
    /// once, so cycles terminate.
    fn mark(&mut self, mut worklist: Vec<ObjectId>) {
        while let Some(id) = worklist.pop() {
            let Some(obj) = self.get_mut(id) else {
                continue;
            };
            if obj.is_marked() {
                continue;
            }
            obj.header.add_flag(HeaderFlags::MARK);
            worklist.extend(obj.header.class.to_object());
            worklist.extend(obj.fields.iter().filter_map(|v| v.to_object()));
        }
    }

    /// Compacts marked objects toward the arena start, rewriting their
    /// handle slots, and releases the handles of everything else.
    fn sweep(&mut self) -> usize {
        let mut write = 0;
        let mut freed = 0;
        let mut used = 0;
        for read in 0..self.arena.len() {
            if self.arena[read].is_marked() {
                self.arena[read].header.remove_flag(HeaderFlags::MARK);
                if write != read {
                    self.arena.swap(write, read);
                    self.owners.swap(write, read);
                }
                used += self.arena[write].size_in_words();
                self.slots[self.owners[write].index()] = Some(write);
                write += 1;
            } else {
                let id = self.owners[read];
                self.slots[id.index()] = None;
                self.free_ids.push(id);
                freed += 1;
            }
        }
        self.arena.truncate(write);
        self.owners.truncate(write);
        self.used_words = used;
        freed
    }
}

impl ObjectSpace for Heap {
    #[inline]
    fn object(&self, value: Value) -> Option<&Object> {
        self.get(value.to_object()?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use object::ObjectKind;

    /// A simple root provider that holds a list of values.
    struct TestRoots {
        roots: Vec<Value>,
    }

    impl TestRoots {
        fn new() -> Self {
            Self { roots: Vec::new() }
        }

        fn push(&mut self, value: Value) {
            self.roots.push(value);
        }
    }

    impl RootProvider for TestRoots {
        fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
            for root in &mut self.roots {
                visitor(root);
            }
        }
    }

    fn create_test_settings() -> HeapSettings {
        HeapSettings {
            capacity_words: 256,
            max_objects: 64,
        }
    }

    fn create_test_env() -> (Heap, TestRoots) {
        let heap = Heap::new(create_test_settings()).expect("valid settings");
        (heap, TestRoots::new())
    }

    fn tagged_instance(heap: &mut Heap, roots: &mut TestRoots, tag: i32) -> Value {
        let mut init = ObjectInit::instance(Value::NIL, 2);
        init.values = vec![Value::int(tag)];
        Value::object(heap.allocate(init, roots).expect("allocation"))
    }

    #[test]
    fn test_allocation_basic() {
        let (mut heap, mut roots) = create_test_env();
        let id = heap
            .allocate(ObjectInit::instance(Value::NIL, 3), &mut roots)
            .unwrap();
        let obj = heap.get(id).unwrap();
        assert_eq!(obj.field_count(), 3);
        assert!(obj.fields.iter().all(|v| v.is_nil()), "fields start as nil");
        assert_eq!(heap.used_words(), object::HEADER_WORDS + 3);
        assert_eq!(heap.phase(), GcPhase::Idle);
    }

    #[test]
    fn test_settings_validation() {
        let bad = HeapSettings {
            capacity_words: 0,
            max_objects: 1,
        };
        assert!(bad.validate().is_err());
        assert!(matches!(Heap::new(bad), Err(HeapError::InvalidSettings(_))));
        assert!(HeapSettings::default().validate().is_ok());
    }

    #[test]
    fn test_unreachable_objects_are_reclaimed() {
        let (mut heap, mut roots) = create_test_env();
        let all: Vec<Value> = (0..10)
            .map(|i| tagged_instance(&mut heap, &mut roots, i))
            .collect();
        for &keep in &[all[1], all[4], all[8]] {
            roots.push(keep);
        }

        heap.collect(&mut roots);

        assert_eq!(heap.live_objects(), 3, "only rooted objects survive");
        for (i, v) in all.iter().enumerate() {
            let rooted = [1, 4, 8].contains(&i);
            assert_eq!(heap.contains(*v), rooted, "object {i}");
        }
        let stats = heap.stats();
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.last_freed, 7);
    }

    #[test]
    fn test_compaction_keeps_references_valid() {
        let (mut heap, mut roots) = create_test_env();
        // Garbage first, so every survivor moves toward the arena start.
        for i in 0..5 {
            tagged_instance(&mut heap, &mut roots, 100 + i);
        }
        let child = tagged_instance(&mut heap, &mut roots, 7);
        let parent = tagged_instance(&mut heap, &mut roots, 8);
        heap.object_mut(parent).unwrap().set_field(1, child);
        roots.push(parent);

        heap.collect(&mut roots);

        let parent_obj = heap.object(parent).expect("parent survives");
        assert_eq!(parent_obj.field(0), Some(Value::int(8)));
        let child_ref = parent_obj.field(1).unwrap();
        assert_eq!(child_ref, child, "handle is unchanged by compaction");
        let child_obj = heap.object(child_ref).expect("child reachable through parent");
        assert_eq!(child_obj.field(0), Some(Value::int(7)), "child content intact");
        assert_eq!(heap.live_objects(), 2);
    }

    #[test]
    fn test_cycles_are_marked_once() {
        let (mut heap, mut roots) = create_test_env();
        let a = tagged_instance(&mut heap, &mut roots, 1);
        let b = tagged_instance(&mut heap, &mut roots, 2);
        heap.object_mut(a).unwrap().set_field(1, b);
        heap.object_mut(b).unwrap().set_field(1, a);
        roots.push(a);

        heap.collect(&mut roots);
        heap.collect(&mut roots);

        assert!(heap.contains(a) && heap.contains(b));
        assert!(!heap.object(a).unwrap().is_marked(), "mark bit is cleared");
    }

    #[test]
    fn test_allocation_triggers_collection() {
        let (mut heap, mut roots) = create_test_env();
        let keep = tagged_instance(&mut heap, &mut roots, 42);
        roots.push(keep);
        // Each instance costs 4 words; allocate far more than fits.
        for i in 0..200 {
            tagged_instance(&mut heap, &mut roots, i);
        }
        assert!(heap.stats().collections > 0, "allocation must have collected");
        assert_eq!(heap.object(keep).unwrap().field(0), Some(Value::int(42)));
    }

    #[test]
    fn test_pending_values_survive_collection() {
        let (mut heap, mut roots) = create_test_env();
        let filler = (create_test_settings().capacity_words - 4) / 4;
        let unrooted = tagged_instance(&mut heap, &mut roots, 5);
        for i in 0..filler {
            let v = tagged_instance(&mut heap, &mut roots, i as i32);
            roots.push(v);
        }
        roots.roots.truncate(roots.roots.len() - 2);

        let array = heap
            .allocate(ObjectInit::array(Value::NIL, vec![unrooted]), &mut roots)
            .expect("room after collection");
        let element = heap.get(array).unwrap().field(0).unwrap();
        assert_eq!(heap.object(element).unwrap().field(0), Some(Value::int(5)));
    }

    #[test]
    fn test_out_of_memory_after_collection() {
        let (mut heap, mut roots) = create_test_env();
        let too_big = ObjectInit::instance(Value::NIL, 1000);
        match heap.allocate(too_big, &mut roots) {
            Err(HeapError::OutOfMemory { requested, .. }) => {
                assert_eq!(requested, object::HEADER_WORDS + 1000)
            }
            other => panic!("expected out of memory, got {other:?}"),
        }
        assert_eq!(heap.stats().collections, 1, "one collection before failing");
    }

    #[test]
    fn test_freed_handles_are_reused() {
        let (mut heap, mut roots) = create_test_env();
        let garbage = tagged_instance(&mut heap, &mut roots, 1);
        heap.collect(&mut roots);
        let fresh = tagged_instance(&mut heap, &mut roots, 2);
        assert_eq!(garbage, fresh, "handle slot is recycled");
        assert_eq!(heap.object(fresh).unwrap().field(0), Some(Value::int(2)));
    }

    #[test]
    fn test_hash_is_memoized() {
        let (mut heap, mut roots) = create_test_env();
        let s = Value::object(
            heap.allocate(ObjectInit::string(Value::NIL, "abc"), &mut roots)
                .unwrap(),
        );
        assert_eq!(heap.object(s).unwrap().header.hash, 0, "unset before use");
        let h = heap.hash_of(s);
        assert_eq!(h, content_hash(b"abc"));
        assert_eq!(heap.object(s).unwrap().header.hash, h, "memoized in header");
        assert_eq!(heap.object(s).unwrap().kind(), ObjectKind::String);

        let obj = tagged_instance(&mut heap, &mut roots, 0);
        assert_ne!(heap.hash_of(obj), 0);
        assert_eq!(heap.hash_of(obj), heap.hash_of(obj));
    }
}
