use object::{is_subclass_of, ObjectInit, Value};

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::primitives::{arg, expect_int, type_mismatch};
use crate::VM;

fn expect_array(vm: &VM, value: Value) -> Result<usize, RuntimeError> {
    vm.object(value)
        .filter(|o| o.is_array())
        .map(|o| o.field_count())
        .ok_or_else(|| type_mismatch(vm, "Array", value))
}

/// Checks a 0-based index against `size`.
fn checked_index(vm: &VM, index: Value, size: usize) -> Result<usize, RuntimeError> {
    let i = expect_int(vm, index)?;
    if i < 0 || i as usize >= size {
        return Err(RuntimeError::IndexOutOfBounds {
            index: i as i64,
            size,
        });
    }
    Ok(i as usize)
}

pub fn array_at(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let size = expect_array(vm, receiver)?;
    let index = checked_index(vm, arg(args, 0)?, size)?;
    Ok(vm
        .object(receiver)
        .and_then(|o| o.field(index))
        .unwrap_or(Value::NIL))
}

/// Answers the stored value.
pub fn array_at_put(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let size = expect_array(vm, receiver)?;
    let index = checked_index(vm, arg(args, 0)?, size)?;
    let value = arg(args, 1)?;
    if let Some(array) = vm.heap.object_mut(receiver) {
        array.set_field(index, value);
    }
    Ok(value)
}

pub fn array_size(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    let size = expect_array(vm, receiver)?;
    Ok(Value::int(size as i32))
}

/// `Array new: n`, every element nil.
pub fn array_new(
    vm: &mut VM,
    state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    if !vm.is_class(receiver) || !is_subclass_of(&vm.heap, receiver, vm.core.array) {
        return Err(type_mismatch(vm, "Array or a subclass", receiver));
    }
    let n = expect_int(vm, arg(args, 0)?)?;
    if n < 0 {
        return Err(RuntimeError::TypeMismatch {
            expected: "a non-negative size".into(),
            got: n.to_string(),
        });
    }
    let init = ObjectInit::array(receiver, vec![Value::NIL; n as usize]);
    Ok(vm.allocate_with(init, state)?)
}
