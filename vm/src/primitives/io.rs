use object::Value;

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::VM;

fn write(vm: &VM, text: &str) {
    if let Err(err) = vm.output.write_str(text) {
        log::error!("write to program output failed: {err}");
    }
}

pub fn print(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    write(vm, &vm.print_string(receiver));
    Ok(Value::NIL)
}

pub fn println(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    let mut line = vm.print_string(receiver);
    line.push('\n');
    write(vm, &line);
    Ok(Value::NIL)
}
