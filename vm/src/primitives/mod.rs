use object::Value;

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::VM;

pub mod array;
pub mod hardware;
pub mod integer;
pub mod io;
pub mod objects;
pub mod string;

/// Native operation. `args` excludes the receiver.
pub type PrimitiveFn = fn(
    &mut VM,
    &mut InterpreterState,
    Value,
    &[Value],
) -> Result<Value, RuntimeError>;

#[derive(Clone, Copy)]
pub struct PrimitiveDesc {
    pub id: u8,
    pub name: &'static str,
    /// Arguments besides the receiver; `None` accepts any number.
    pub arity: Option<u8>,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(id: u8, name: &'static str, arity: u8, func: PrimitiveFn) -> Self {
        Self {
            id,
            name,
            arity: Some(arity),
            func,
        }
    }

    pub const fn variadic(id: u8, name: &'static str, func: PrimitiveFn) -> Self {
        Self {
            id,
            name,
            arity: None,
            func,
        }
    }
}

impl std::fmt::Debug for PrimitiveDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveDesc")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

pub fn default_primitives() -> Vec<PrimitiveDesc> {
    vec![
        PrimitiveDesc::new(1, "int_add", 1, integer::int_add),
        PrimitiveDesc::new(2, "int_sub", 1, integer::int_sub),
        PrimitiveDesc::new(3, "int_mul", 1, integer::int_mul),
        PrimitiveDesc::new(4, "int_div", 1, integer::int_div),
        PrimitiveDesc::new(5, "int_mod", 1, integer::int_mod),
        PrimitiveDesc::new(6, "int_eq", 1, integer::int_eq),
        PrimitiveDesc::new(7, "int_lt", 1, integer::int_lt),
        PrimitiveDesc::new(8, "object_equal", 1, objects::object_equal),
        PrimitiveDesc::new(9, "object_class", 0, objects::object_class),
        PrimitiveDesc::new(10, "string_concat", 1, string::string_concat),
        PrimitiveDesc::new(11, "array_at", 1, array::array_at),
        PrimitiveDesc::new(12, "array_at_put", 2, array::array_at_put),
        PrimitiveDesc::new(13, "array_size", 0, array::array_size),
        PrimitiveDesc::new(14, "string_size", 0, string::string_size),
        PrimitiveDesc::new(15, "print", 0, io::print),
        PrimitiveDesc::new(16, "println", 0, io::println),
        PrimitiveDesc::new(17, "class_basic_new", 0, objects::class_basic_new),
        PrimitiveDesc::new(18, "array_new", 1, array::array_new),
        PrimitiveDesc::new(19, "object_identical", 1, objects::object_identical),
        PrimitiveDesc::new(20, "object_hash", 0, objects::object_hash),
        PrimitiveDesc::new(21, "symbol_as_string", 0, string::symbol_as_string),
        PrimitiveDesc::new(22, "string_as_symbol", 0, string::string_as_symbol),
        PrimitiveDesc::variadic(100, "clear_screen", hardware::clear_screen),
        PrimitiveDesc::variadic(101, "draw_pixel", hardware::draw_pixel),
        PrimitiveDesc::variadic(102, "read_key", hardware::read_key),
        PrimitiveDesc::variadic(103, "file_read", hardware::file_read),
        PrimitiveDesc::variadic(104, "file_write", hardware::file_write),
    ]
}

/// Primitives indexed by their numeric id.
pub struct PrimitiveTable {
    slots: Vec<Option<PrimitiveDesc>>,
}

impl PrimitiveTable {
    pub fn new(prims: Vec<PrimitiveDesc>) -> Self {
        let mut slots = vec![None; u8::MAX as usize + 1];
        for desc in prims {
            slots[desc.id as usize] = Some(desc);
        }
        Self { slots }
    }

    #[inline]
    pub fn get(&self, id: u8) -> Option<&PrimitiveDesc> {
        self.slots[id as usize].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrimitiveDesc> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PrimitiveTable {
    fn default() -> Self {
        Self::new(default_primitives())
    }
}

impl std::fmt::Debug for PrimitiveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ── helpers ──────────────────────────────────────────────────────────

/// Class name of `value`, for error messages.
pub fn describe(vm: &VM, value: Value) -> String {
    vm.class_name(vm.class_of(value))
}

pub fn type_mismatch(vm: &VM, expected: &str, got: Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_owned(),
        got: describe(vm, got),
    }
}

#[inline]
pub fn expect_int(vm: &VM, value: Value) -> Result<i16, RuntimeError> {
    value
        .to_int()
        .ok_or_else(|| type_mismatch(vm, "Integer", value))
}

#[inline]
pub fn arg(args: &[Value], index: usize) -> Result<Value, RuntimeError> {
    args.get(index).copied().ok_or(RuntimeError::StackUnderflow)
}

impl VM {
    /// Runs primitive `id` on `args`, receiver first.
    pub fn call_primitive(
        &mut self,
        state: &mut InterpreterState,
        id: u8,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let desc = *self
            .primitives
            .get(id)
            .ok_or(RuntimeError::UnknownPrimitive { id })?;
        let (&receiver, rest) = args.split_first().ok_or(RuntimeError::StackUnderflow)?;
        if let Some(arity) = desc.arity
            && rest.len() != arity as usize
        {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("{arity} arguments for {}", desc.name),
                got: format!("{} arguments", rest.len()),
            });
        }
        (desc.func)(self, state, receiver, rest)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Output, VmSettings};

    pub(crate) fn vm() -> VM {
        let mut vm = VM::new(VmSettings::default()).expect("bootstrap");
        vm.output = Output::buffer().0;
        vm
    }

    /// Calls primitive `id` with a fresh frame stack.
    pub(crate) fn call(vm: &mut VM, id: u8, args: &[Value]) -> Result<Value, RuntimeError> {
        let mut state = InterpreterState::default();
        vm.call_primitive(&mut state, id, args)
    }

    #[test]
    fn table_covers_the_numbered_ids() {
        let table = PrimitiveTable::default();
        for id in (1..=22).chain(100..=104) {
            assert!(table.get(id).is_some(), "primitive {id} is missing");
        }
        assert!(table.get(23).is_none());
        assert_eq!(table.len(), 27);
        assert_eq!(table.get(16).map(|desc| desc.name), Some("println"));
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut vm = vm();
        assert_eq!(
            call(&mut vm, 99, &[Value::NIL]),
            Err(RuntimeError::UnknownPrimitive { id: 99 })
        );
    }

    #[test]
    fn arity_is_checked() {
        let mut vm = vm();
        let err = call(&mut vm, 1, &[Value::int(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }), "{err}");
        // hardware stubs take anything
        assert_eq!(
            call(&mut vm, 101, &[Value::int(7), Value::int(1), Value::int(2)]),
            Ok(Value::int(7))
        );
    }
}
