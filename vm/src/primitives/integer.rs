use object::Value;

use crate::interpreter::{InterpreterState, RuntimeError};
use crate::primitives::{arg, expect_int};
use crate::VM;

fn operands(vm: &VM, receiver: Value, args: &[Value]) -> Result<(i32, i32), RuntimeError> {
    let a = expect_int(vm, receiver)?;
    let b = expect_int(vm, arg(args, 0)?)?;
    Ok((a as i32, b as i32))
}

pub fn int_add(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(vm, receiver, args)?;
    Ok(Value::int(a + b))
}

pub fn int_sub(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(vm, receiver, args)?;
    Ok(Value::int(a - b))
}

pub fn int_mul(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(vm, receiver, args)?;
    Ok(Value::int(a * b))
}

/// Truncates toward zero.
pub fn int_div(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(vm, receiver, args)?;
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::int(a / b))
}

/// Remainder with the sign of the receiver.
pub fn int_mod(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(vm, receiver, args)?;
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::int(a % b))
}

/// Anything that is not an integer is simply unequal.
pub fn int_eq(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let a = expect_int(vm, receiver)?;
    Ok(Value::boolean(arg(args, 0)?.to_int() == Some(a)))
}

pub fn int_lt(
    vm: &mut VM,
    _state: &mut InterpreterState,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(vm, receiver, args)?;
    Ok(Value::boolean(a < b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::tests::{call, vm};

    fn int(n: i32) -> Value {
        Value::int(n)
    }

    #[test]
    fn arithmetic() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, 1, &[int(2), int(3)]), Ok(int(5)));
        assert_eq!(call(&mut vm, 2, &[int(2), int(3)]), Ok(int(-1)));
        assert_eq!(call(&mut vm, 3, &[int(-4), int(3)]), Ok(int(-12)));
        assert_eq!(call(&mut vm, 4, &[int(-7), int(2)]), Ok(int(-3)), "truncating");
        assert_eq!(call(&mut vm, 5, &[int(-7), int(2)]), Ok(int(-1)));
    }

    #[test]
    fn overflow_truncates_to_fifteen_bits() {
        let mut vm = vm();
        assert_eq!(
            call(&mut vm, 1, &[int(object::INT_MAX as i32), int(1)]),
            Ok(int(0))
        );
    }

    #[test]
    fn division_by_zero() {
        let mut vm = vm();
        assert_eq!(
            call(&mut vm, 4, &[int(1), int(0)]),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            call(&mut vm, 5, &[int(1), int(0)]),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn comparisons() {
        let mut vm = vm();
        assert_eq!(call(&mut vm, 6, &[int(4), int(4)]), Ok(Value::TRUE));
        assert_eq!(call(&mut vm, 6, &[int(4), Value::NIL]), Ok(Value::FALSE));
        assert_eq!(call(&mut vm, 7, &[int(-1), int(0)]), Ok(Value::TRUE));
        assert_eq!(call(&mut vm, 7, &[int(0), int(0)]), Ok(Value::FALSE));
    }

    #[test]
    fn non_integer_operand() {
        let mut vm = vm();
        let err = call(&mut vm, 1, &[int(1), Value::TRUE]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                expected: "Integer".into(),
                got: "True".into()
            }
        );
    }
}
