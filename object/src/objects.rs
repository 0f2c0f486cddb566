use crate::header::{Header, HeaderFlags, ObjectKind};
use crate::Value;

/// Header cost of every object, in words.
pub const HEADER_WORDS: usize = 2;
const WORD_BYTES: usize = 4;

/// Field indices of a class object.
pub mod class_layout {
    pub const NAME: usize = 0;
    pub const SUPERCLASS: usize = 1;
    pub const METHODS: usize = 2;
    pub const INSTANCE_SIZE: usize = 3;
    /// Array of field-name symbols, inherited ones first.
    pub const IVAR_NAMES: usize = 4;
    pub const FIELD_COUNT: usize = 5;
}

/// Field indices of a method object. Bytecode lives in the byte payload.
pub mod method_layout {
    pub const SELECTOR: usize = 0;
    pub const HOLDER: usize = 1;
    pub const NUM_ARGS: usize = 2;
    pub const NUM_LOCALS: usize = 3;
    /// Primitive id as an `Int`, or nil.
    pub const PRIMITIVE: usize = 4;
    pub const FIELD_COUNT: usize = 5;
}

/// Field indices of strings and symbols. Text lives in the byte payload.
pub mod string_layout {
    pub const LENGTH: usize = 0;
    pub const FIELD_COUNT: usize = 1;
}

/// A heap-resident object: header, `Value` fields and an optional byte
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub header: Header,
    pub fields: Box<[Value]>,
    pub data: Box<[u8]>,
}

impl Object {
    /// Builds an object from an allocation request. Every field starts as
    /// nil.
    pub fn from_init(init: ObjectInit) -> Self {
        let mut fields = vec![Value::NIL; init.field_count].into_boxed_slice();
        for (slot, value) in fields.iter_mut().zip(init.values) {
            *slot = value;
        }
        Self {
            header: Header::new(init.class, init.kind),
            fields,
            data: init.data.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn class(&self) -> Value {
        self.header.class
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.header.kind()
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn field(&self, index: usize) -> Option<Value> {
        self.fields.get(index).copied()
    }

    /// Stores `value` at `index`; returns `false` when out of bounds.
    #[inline]
    pub fn set_field(&mut self, index: usize, value: Value) -> bool {
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Size in heap words, as accounted by the allocator.
    pub fn size_in_words(&self) -> usize {
        words_for(self.fields.len(), self.data.len())
    }

    pub fn is_marked(&self) -> bool {
        self.header.has_flag(HeaderFlags::MARK)
    }

    pub fn is_string_like(&self) -> bool {
        self.header.has_flag(HeaderFlags::STRING)
    }

    pub fn is_symbol(&self) -> bool {
        self.header.has_flag(HeaderFlags::SYMBOL)
    }

    pub fn is_class(&self) -> bool {
        self.header.has_flag(HeaderFlags::CLASS)
    }

    pub fn is_method(&self) -> bool {
        self.header.has_flag(HeaderFlags::METHOD)
    }

    pub fn is_array(&self) -> bool {
        self.header.has_flag(HeaderFlags::ARRAY)
    }

    /// Text of a string or symbol.
    pub fn as_str(&self) -> Option<&str> {
        if !self.is_string_like() {
            return None;
        }
        core::str::from_utf8(&self.data).ok()
    }

    // ── class view ─────────────────────────────────────────────────

    pub fn class_name(&self) -> Value {
        self.class_field(class_layout::NAME)
    }

    pub fn superclass(&self) -> Value {
        self.class_field(class_layout::SUPERCLASS)
    }

    pub fn methods(&self) -> Value {
        self.class_field(class_layout::METHODS)
    }

    pub fn instance_size(&self) -> usize {
        self.class_field(class_layout::INSTANCE_SIZE)
            .to_int()
            .map_or(0, |n| n.max(0) as usize)
    }

    pub fn ivar_names(&self) -> Value {
        self.class_field(class_layout::IVAR_NAMES)
    }

    fn class_field(&self, index: usize) -> Value {
        if !self.is_class() {
            return Value::NIL;
        }
        self.field(index).unwrap_or(Value::NIL)
    }

    // ── method view ────────────────────────────────────────────────

    pub fn selector(&self) -> Value {
        self.method_field(method_layout::SELECTOR)
    }

    pub fn holder(&self) -> Value {
        self.method_field(method_layout::HOLDER)
    }

    pub fn num_args(&self) -> usize {
        self.method_count(method_layout::NUM_ARGS)
    }

    pub fn num_locals(&self) -> usize {
        self.method_count(method_layout::NUM_LOCALS)
    }

    pub fn primitive(&self) -> Option<u8> {
        self.method_field(method_layout::PRIMITIVE)
            .to_int()
            .and_then(|n| u8::try_from(n).ok())
    }

    pub fn bytecode(&self) -> &[u8] {
        if self.is_method() { &self.data } else { &[] }
    }

    fn method_field(&self, index: usize) -> Value {
        if !self.is_method() {
            return Value::NIL;
        }
        self.field(index).unwrap_or(Value::NIL)
    }

    fn method_count(&self, index: usize) -> usize {
        self.method_field(index)
            .to_int()
            .map_or(0, |n| n.max(0) as usize)
    }
}

/// Allocation request handed to the heap.
#[derive(Debug, Clone)]
pub struct ObjectInit {
    pub class: Value,
    pub kind: ObjectKind,
    pub field_count: usize,
    /// Initial values for the leading fields; the rest stay nil.
    pub values: Vec<Value>,
    pub data: Vec<u8>,
}

impl ObjectInit {
    pub fn instance(class: Value, field_count: usize) -> Self {
        Self {
            class,
            kind: ObjectKind::Instance,
            field_count,
            values: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn array(class: Value, elements: Vec<Value>) -> Self {
        Self {
            class,
            kind: ObjectKind::Array,
            field_count: elements.len(),
            values: elements,
            data: Vec::new(),
        }
    }

    pub fn string(class: Value, text: &str) -> Self {
        Self::text(class, ObjectKind::String, text)
    }

    pub fn symbol(class: Value, text: &str) -> Self {
        Self::text(class, ObjectKind::Symbol, text)
    }

    fn text(class: Value, kind: ObjectKind, text: &str) -> Self {
        Self {
            class,
            kind,
            field_count: string_layout::FIELD_COUNT,
            values: vec![Value::int(text.len() as i32)],
            data: text.as_bytes().to_vec(),
        }
    }

    pub fn class(
        metaclass: Value,
        name: Value,
        superclass: Value,
        methods: Value,
        ivar_names: Value,
        instance_size: usize,
    ) -> Self {
        Self {
            class: metaclass,
            kind: ObjectKind::Class,
            field_count: class_layout::FIELD_COUNT,
            values: vec![
                name,
                superclass,
                methods,
                Value::int(instance_size as i32),
                ivar_names,
            ],
            data: Vec::new(),
        }
    }

    pub fn method(class: Value, spec: MethodSpec) -> Self {
        Self {
            class,
            kind: ObjectKind::Method,
            field_count: method_layout::FIELD_COUNT,
            values: vec![
                spec.selector,
                spec.holder,
                Value::int(spec.num_args as i32),
                Value::int(spec.num_locals as i32),
                spec.primitive.map_or(Value::NIL, |id| Value::int(id as i32)),
            ],
            data: spec.bytecode,
        }
    }

    pub fn size_in_words(&self) -> usize {
        words_for(self.field_count, self.data.len())
    }
}

/// Everything the compiler knows about a method before it is allocated.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub selector: Value,
    pub holder: Value,
    pub num_args: usize,
    pub num_locals: usize,
    pub primitive: Option<u8>,
    pub bytecode: Vec<u8>,
}

#[inline]
fn words_for(field_count: usize, data_len: usize) -> usize {
    HEADER_WORDS + field_count + data_len.div_ceil(WORD_BYTES)
}

/// `h = h * 31 + byte` over `bytes`, wrapping at 8 bits, never 0.
pub fn content_hash(bytes: &[u8]) -> u8 {
    let h = bytes
        .iter()
        .fold(0u8, |h, &b| h.wrapping_mul(31).wrapping_add(b));
    if h == 0 { 1 } else { h }
}
