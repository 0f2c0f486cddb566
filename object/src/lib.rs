mod value;
mod handle;
mod header;
mod objects;
mod special;
mod lookup;

pub use value::{Special, Value, INT_MAX, INT_MIN};
pub use handle::{ObjectId, MAX_OBJECT_ID};
pub use header::{Header, HeaderFlags, ObjectKind};
pub use objects::{
    class_layout, method_layout, string_layout,
    content_hash, MethodSpec, Object, ObjectInit, HEADER_WORDS,
};
pub use special::CoreClasses;
pub use lookup::{find_local, is_subclass_of, lookup, ObjectSpace};

#[cfg(test)]
mod tests {
    use super::*;

    // ── Value tagging ──────────────────────────────────────────────

    #[test]
    fn int_round_trip() {
        for n in [0, 1, -1, 42, -42, 1000, -1000, INT_MAX as i32, INT_MIN as i32] {
            let v = Value::int(n);
            assert!(v.is_int());
            assert!(!v.is_object());
            assert!(!v.is_special());
            assert_eq!(v.as_int() as i32, n, "round trip of {n}");
        }
    }

    #[test]
    fn int_truncates_out_of_range() {
        assert_eq!(Value::int(0x8000), Value::Int(0));
        assert_eq!(Value::int(0x8005), Value::Int(5));
        assert_eq!(Value::int(-0x8005), Value::Int(-5));
        assert!(!Value::int_fits(40000));
        assert!(Value::int_fits(-32767));
    }

    #[test]
    fn singleton_predicates_are_exclusive() {
        let checks: [(Value, [bool; 3]); 3] = [
            (Value::NIL, [true, false, false]),
            (Value::TRUE, [false, true, false]),
            (Value::FALSE, [false, false, true]),
        ];
        for (v, [nil, t, f]) in checks {
            assert_eq!(v.is_nil(), nil, "{v:?}.is_nil");
            assert_eq!(v.is_true(), t, "{v:?}.is_true");
            assert_eq!(v.is_false(), f, "{v:?}.is_false");
            assert!(v.is_special());
            assert!(!v.is_int());
            assert!(!v.is_object());
        }
    }

    #[test]
    fn bits_round_trip_and_identity() {
        let values = [
            Value::int(-7),
            Value::int(7),
            Value::object(ObjectId::new(99)),
            Value::NIL,
            Value::TRUE,
            Value::FALSE,
        ];
        for v in values {
            assert_eq!(Value::from_bits(v.to_bits()), Some(v));
        }
        assert!(Value::int(3).identical(Value::int(3)));
        assert!(!Value::int(3).identical(Value::int(-3)));
        assert!(!Value::object(ObjectId::new(1)).identical(Value::int(1)));
    }

    #[test]
    fn loud_accessors_return_defaults() {
        assert_eq!(Value::NIL.as_int(), 0);
        assert_eq!(Value::int(4).as_special(), Special::Nil);
        assert_eq!(Value::TRUE.as_object_id(), ObjectId::new(0));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::NIL.is_truthy());
        assert!(!Value::FALSE.is_truthy());
        assert!(Value::TRUE.is_truthy());
        assert!(Value::int(0).is_truthy());
    }

    #[test]
    fn value_rendering() {
        assert_eq!(format!("{}", Value::int(-12)), "-12");
        assert_eq!(format!("{:?}", Value::int(3)), "Int(3)");
        assert_eq!(format!("{}", Value::TRUE), "true");
        assert_eq!(format!("{:?}", Value::object(ObjectId::new(5))), "Ref(@5)");
    }

    // ── Objects ────────────────────────────────────────────────────

    #[test]
    fn fresh_instance_fields_are_nil() {
        let obj = Object::from_init(ObjectInit::instance(Value::NIL, 4));
        assert_eq!(obj.field_count(), 4);
        assert!(obj.fields.iter().all(|v| v.is_nil()));
        assert_eq!(obj.size_in_words(), HEADER_WORDS + 4);
    }

    #[test]
    fn string_layout_and_flags() {
        let s = Object::from_init(ObjectInit::string(Value::NIL, "hello"));
        assert_eq!(s.kind(), ObjectKind::String);
        assert_eq!(s.as_str(), Some("hello"));
        assert_eq!(s.field(string_layout::LENGTH), Some(Value::int(5)));
        assert_eq!(s.size_in_words(), HEADER_WORDS + 1 + 2);

        let sym = Object::from_init(ObjectInit::symbol(Value::NIL, "at:put:"));
        assert_eq!(sym.kind(), ObjectKind::Symbol);
        assert!(sym.is_string_like());
    }

    #[test]
    fn header_flags_toggle() {
        let mut h = Header::new(Value::NIL, ObjectKind::Array);
        assert!(h.has_flag(HeaderFlags::ARRAY));
        assert!(!h.has_flag(HeaderFlags::MARK));
        h.add_flag(HeaderFlags::MARK);
        assert!(h.has_flag(HeaderFlags::MARK));
        h.remove_flag(HeaderFlags::MARK);
        assert!(!h.has_flag(HeaderFlags::MARK));
        assert_eq!(h.kind(), ObjectKind::Array);
    }

    #[test]
    fn content_hash_is_never_zero() {
        assert_eq!(content_hash(b""), 1);
        assert_eq!(content_hash(b"a"), b'a');
        assert_eq!(content_hash(b"ab"), b'a'.wrapping_mul(31).wrapping_add(b'b'));
    }

    // ── Lookup ─────────────────────────────────────────────────────

    struct TestSpace {
        objects: Vec<Object>,
    }

    impl ObjectSpace for TestSpace {
        fn object(&self, value: Value) -> Option<&Object> {
            self.objects.get(value.to_object()?.index())
        }
    }

    impl TestSpace {
        fn add(&mut self, init: ObjectInit) -> Value {
            self.objects.push(Object::from_init(init));
            Value::object(ObjectId::new(self.objects.len() as u32 - 1))
        }

        fn symbol(&mut self, name: &str) -> Value {
            self.add(ObjectInit::symbol(Value::NIL, name))
        }

        fn class(&mut self, name: &str, superclass: Value, methods: Vec<Value>) -> Value {
            let name = self.symbol(name);
            let methods = self.add(ObjectInit::array(Value::NIL, methods));
            self.add(ObjectInit::class(Value::NIL, name, superclass, methods, Value::NIL, 0))
        }

        fn method(&mut self, selector: Value) -> Value {
            self.add(ObjectInit::method(
                Value::NIL,
                MethodSpec {
                    selector,
                    holder: Value::NIL,
                    num_args: 0,
                    num_locals: 0,
                    primitive: None,
                    bytecode: vec![],
                },
            ))
        }
    }

    #[test]
    fn lookup_walks_superclass_chain() {
        let mut space = TestSpace { objects: Vec::new() };
        let foo = space.symbol("foo");
        let bar = space.symbol("bar");
        let foo_method = space.method(foo);
        let a = space.class("A", Value::NIL, vec![foo_method]);
        let b = space.class("B", a, vec![]);
        let c = space.class("C", b, vec![]);

        assert_eq!(lookup(&space, c, foo), Some(foo_method), "inherited from A");
        assert_eq!(lookup(&space, c, bar), None, "bar is defined nowhere");
        assert_eq!(lookup(&space, a, foo), Some(foo_method));
    }

    #[test]
    fn lookup_prefers_nearest_definition() {
        let mut space = TestSpace { objects: Vec::new() };
        let foo = space.symbol("foo");
        let base_foo = space.method(foo);
        let override_foo = space.method(foo);
        let a = space.class("A", Value::NIL, vec![base_foo]);
        let b = space.class("B", a, vec![override_foo]);
        assert_eq!(lookup(&space, b, foo), Some(override_foo));
    }

    #[test]
    fn subclass_is_reflexive_and_directed() {
        let mut space = TestSpace { objects: Vec::new() };
        let a = space.class("A", Value::NIL, vec![]);
        let b = space.class("B", a, vec![]);
        let c = space.class("C", b, vec![]);
        assert!(is_subclass_of(&space, c, c));
        assert!(is_subclass_of(&space, c, a));
        assert!(!is_subclass_of(&space, a, c));
    }

    #[test]
    fn core_classes_by_name() {
        let mut core = CoreClasses::default();
        *core.by_name_mut("Integer").unwrap() = Value::object(ObjectId::new(7));
        assert_eq!(core.integer, Value::object(ObjectId::new(7)));
        assert!(core.is_core(Value::object(ObjectId::new(7))));
        assert!(core.by_name_mut("Main").is_none());
    }
}
