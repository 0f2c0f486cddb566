use object::{ObjectInit, Value};

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::primitives::{arg, type_mismatch};
use crate::VM;

/// Copy of the text of a string or symbol.
fn text(vm: &VM, value: Value) -> Result<String, RuntimeError> {
    vm.text_of(value)
        .map(str::to_owned)
        .ok_or_else(|| type_mismatch(vm, "String", value))
}

pub fn string_concat(
    vm: &mut VM,
    state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let mut joined = text(vm, receiver)?;
    joined.push_str(&text(vm, arg(args, 0)?)?);
    let class = vm.core.string;
    Ok(vm.allocate_with(ObjectInit::string(class, &joined), state)?)
}

/// Length in bytes.
pub fn string_size(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    let len = vm
        .text_of(receiver)
        .map(str::len)
        .ok_or_else(|| type_mismatch(vm, "String", receiver))?;
    Ok(Value::int(len as i32))
}

pub fn symbol_as_string(
    vm: &mut VM,
    state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    if !vm.object(receiver).is_some_and(|o| o.is_symbol()) {
        return Err(type_mismatch(vm, "Symbol", receiver));
    }
    let text = text(vm, receiver)?;
    Ok(vm.new_string(&text, state)?)
}

pub fn string_as_symbol(
    vm: &mut VM,
    state: &mut InterpreterState,
    receiver: Value,
    _args: &[Value],
) -> Result<Value, RuntimeError> {
    let text = text(vm, receiver)?;
    Ok(vm.intern_with(&text, state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::tests::{call, vm};

    #[test]
    fn concat_allocates_a_new_string() {
        let mut vm = vm();
        let a = vm.new_string("foo", &mut heap::NoRoots).unwrap();
        let b = vm.new_string("bar", &mut heap::NoRoots).unwrap();
        let joined = call(&mut vm, 10, &[a, b]).unwrap();
        assert_eq!(vm.text_of(joined), Some("foobar"));
        assert_eq!(vm.text_of(a), Some("foo"), "operands are untouched");
        assert_eq!(vm.class_of(joined), vm.core.string);
    }

    #[test]
    fn concat_accepts_symbols_and_rejects_integers() {
        let mut vm = vm();
        let a = vm.new_string("x", &mut heap::NoRoots).unwrap();
        let sym = vm.intern("y").unwrap();
        let joined = call(&mut vm, 10, &[a, sym]).unwrap();
        assert_eq!(vm.text_of(joined), Some("xy"));
        assert!(matches!(
            call(&mut vm, 10, &[a, Value::int(1)]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn size_counts_bytes() {
        let mut vm = vm();
        let s = vm.new_string("hello", &mut heap::NoRoots).unwrap();
        assert_eq!(call(&mut vm, 14, &[s]), Ok(Value::int(5)));
        let empty = vm.new_string("", &mut heap::NoRoots).unwrap();
        assert_eq!(call(&mut vm, 14, &[empty]), Ok(Value::int(0)));
    }

    #[test]
    fn symbol_conversions() {
        let mut vm = vm();
        let s = vm.new_string("walk", &mut heap::NoRoots).unwrap();
        let sym = call(&mut vm, 22, &[s]).unwrap();
        assert_eq!(sym, vm.intern("walk").unwrap(), "symbols are canonical");
        let back = call(&mut vm, 21, &[sym]).unwrap();
        assert_ne!(back, sym);
        assert_eq!(vm.text_of(back), Some("walk"));
        assert!(matches!(
            call(&mut vm, 21, &[s]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }
}
