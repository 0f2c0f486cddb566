use object::{is_subclass_of, Object, ObjectInit, ObjectKind, Value};

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::primitives::{arg, type_mismatch};
use crate::VM;

/// Strings compare by content, everything else by identity.
pub fn object_equal(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let other = arg(args, 0)?;
    if receiver.identical(other) {
        return Ok(Value::TRUE);
    }
    let is_string = |v: Value| vm.object(v).is_some_and(|o| o.kind() == ObjectKind::String);
    if !(is_string(receiver) && is_string(other)) {
        return Ok(Value::FALSE);
    }
    if vm.heap.hash_of(receiver) != vm.heap.hash_of(other) {
        return Ok(Value::FALSE);
    }
    let same = match (vm.object(receiver), vm.object(other)) {
        (Some(a), Some(b)) => a.data == b.data,
        _ => false,
    };
    Ok(Value::boolean(same))
}

pub fn object_identical(
    _vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(Value::boolean(receiver.identical(arg(args, 0)?)))
}

pub fn object_class(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(vm.class_of(receiver))
}

pub fn object_hash(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(Value::int(vm.heap.hash_of(receiver) as i32))
}

/// `Class new`: a fresh instance with every field nil. Arrays and
/// strings come out empty.
pub fn class_basic_new(
    vm: &mut VM,
    state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    if !vm.is_class(receiver) {
        return Err(type_mismatch(vm, "a class", receiver));
    }
    let core = vm.core;
    let fixed = [
        core.class,
        core.method,
        core.symbol,
        core.integer,
        core.block,
        core.nil,
        core.true_class,
        core.false_class,
    ];
    if fixed.iter().any(|c| c.identical(receiver)) {
        return Err(RuntimeError::TypeMismatch {
            expected: "an instantiable class".into(),
            got: vm.class_name(receiver),
        });
    }
    let init = if is_subclass_of(&vm.heap, receiver, core.array) {
        ObjectInit::array(receiver, Vec::new())
    } else if is_subclass_of(&vm.heap, receiver, core.string) {
        ObjectInit::string(receiver, "")
    } else {
        let size = vm.object(receiver).map_or(0, Object::instance_size);
        ObjectInit::instance(receiver, size)
    };
    Ok(vm.allocate_with(init, state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::tests::{call, vm};

    #[test]
    fn equality_of_strings_is_by_content() {
        let mut vm = vm();
        let a = vm.new_string("abc", &mut heap::NoRoots).unwrap();
        let b = vm.new_string("abc", &mut heap::NoRoots).unwrap();
        let c = vm.new_string("abd", &mut heap::NoRoots).unwrap();
        assert_eq!(call(&mut vm, 8, &[a, b]), Ok(Value::TRUE));
        assert_eq!(call(&mut vm, 8, &[a, c]), Ok(Value::FALSE));
        assert_eq!(call(&mut vm, 19, &[a, b]), Ok(Value::FALSE), "distinct objects");
        assert_eq!(call(&mut vm, 19, &[a, a]), Ok(Value::TRUE));
    }

    #[test]
    fn equality_of_other_values_is_identity() {
        let mut vm = vm();
        let sym = vm.intern("abc").unwrap();
        let text = vm.new_string("abc", &mut heap::NoRoots).unwrap();
        assert_eq!(call(&mut vm, 8, &[sym, text]), Ok(Value::FALSE));
        assert_eq!(call(&mut vm, 8, &[Value::int(3), Value::int(3)]), Ok(Value::TRUE));
        assert_eq!(call(&mut vm, 8, &[Value::NIL, Value::FALSE]), Ok(Value::FALSE));
    }

    #[test]
    fn class_of_tagged_values() {
        let mut vm = vm();
        let integer = vm.core.integer;
        let nil = vm.core.nil;
        assert_eq!(call(&mut vm, 9, &[Value::int(1)]), Ok(integer));
        assert_eq!(call(&mut vm, 9, &[Value::NIL]), Ok(nil));
    }

    #[test]
    fn hash_is_stable_and_non_zero() {
        let mut vm = vm();
        let s = vm.new_string("hash me", &mut heap::NoRoots).unwrap();
        let first = call(&mut vm, 20, &[s]).unwrap();
        assert_eq!(call(&mut vm, 20, &[s]), Ok(first));
        assert_ne!(first, Value::int(0));
    }

    #[test]
    fn basic_new() {
        let mut vm = vm();
        let point = vm
            .create_class("Point", vm.core.object, &["x".into(), "y".into()])
            .unwrap();
        let p = call(&mut vm, 17, &[point]).unwrap();
        let obj = vm.object(p).unwrap();
        assert_eq!(obj.field_count(), 2);
        assert_eq!(obj.class(), point);

        let array = vm.core.array;
        let empty = call(&mut vm, 17, &[array]).unwrap();
        assert!(vm.object(empty).unwrap().is_array());

        let integer = vm.core.integer;
        assert!(matches!(
            call(&mut vm, 17, &[integer]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            call(&mut vm, 17, &[Value::int(3)]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }
}
