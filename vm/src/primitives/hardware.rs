//! Device primitives. There is no screen, keyboard or file device behind
//! them, so each one logs the request and answers the receiver.

use object::Value;

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::VM;

fn unsupported(vm: &VM, what: &str, receiver: Value, args: &[Value]) -> Value {
    log::debug!(
        "{what} on {} with {} arguments ignored",
        vm.print_string(receiver),
        args.len()
    );
    receiver
}

pub fn clear_screen(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(unsupported(vm, "clear screen", receiver, args))
}

pub fn draw_pixel(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(unsupported(vm, "draw pixel", receiver, args))
}

pub fn read_key(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(unsupported(vm, "read key", receiver, args))
}

pub fn file_read(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(unsupported(vm, "file read", receiver, args))
}

pub fn file_write(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    Ok(unsupported(vm, "file write", receiver, args))
}
