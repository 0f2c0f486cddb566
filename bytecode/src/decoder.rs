use core::fmt;

use crate::instruction::Instruction;
use crate::op::Op;

/// Malformed bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode { byte: u8, offset: usize },
    Truncated { op: Op, offset: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownOpcode { byte, offset } => {
                write!(f, "unknown opcode 0x{byte:02x} at offset {offset}")
            }
            DecodeError::Truncated { op, offset } => {
                write!(f, "truncated {op:?} at offset {offset}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes one instruction at `pc`, returning it with the offset of the
/// next instruction.
pub fn decode_at(bytes: &[u8], pc: usize) -> Result<(Instruction, usize), DecodeError> {
    let byte = *bytes.get(pc).ok_or(DecodeError::UnknownOpcode { byte: 0, offset: pc })?;
    let op = Op::try_from(byte).map_err(|byte| DecodeError::UnknownOpcode { byte, offset: pc })?;
    let next = pc + 1 + op.operand_bytes();
    let operands = bytes
        .get(pc + 1..next)
        .ok_or(DecodeError::Truncated { op, offset: pc })?;

    let a = operands.first().copied().unwrap_or(0);
    let b = operands.get(1).copied().unwrap_or(0);
    let target = u16::from_be_bytes([a, b]);

    let instr = match op {
        Op::PushLocal => Instruction::PushLocal { idx: a },
        Op::PushArgument => Instruction::PushArgument { idx: a },
        Op::PushField => Instruction::PushField { idx: a },
        Op::PushConstant => Instruction::PushConstant { lit: a },
        Op::PushGlobal => Instruction::PushGlobal { lit: a },
        Op::PushSpecial => Instruction::PushSpecial { special: a },
        Op::PushSelf => Instruction::PushSelf,
        Op::Pop => Instruction::Pop,
        Op::Dup => Instruction::Dup,
        Op::StoreLocal => Instruction::StoreLocal { idx: a },
        Op::StoreArgument => Instruction::StoreArgument { idx: a },
        Op::StoreField => Instruction::StoreField { idx: a },
        Op::StoreGlobal => Instruction::StoreGlobal { lit: a },
        Op::Send => Instruction::Send { selector: a, argc: b },
        Op::SuperSend => Instruction::SuperSend { selector: a, argc: b },
        Op::Return => Instruction::Return,
        Op::ReturnNonLocal => Instruction::ReturnNonLocal,
        Op::Jump => Instruction::Jump { target },
        Op::JumpIfTrue => Instruction::JumpIfTrue { target },
        Op::JumpIfFalse => Instruction::JumpIfFalse { target },
        Op::CallPrimitive => Instruction::CallPrimitive { id: a, arity: b },
    };
    Ok((instr, next))
}

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Malformed input yields one `Err` item and then ends the iteration.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    /// Current byte offset in the stream.
    #[inline]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.failed || self.pos >= self.bytes.len()
    }

    pub fn decode_next(&mut self) -> Option<Result<Instruction, DecodeError>> {
        if self.is_at_end() {
            return None;
        }
        match decode_at(self.bytes, self.pos) {
            Ok((instr, next)) => {
                self.pos = next;
                Some(Ok(instr))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}

/// One line per instruction, prefixed with its offset.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut decoder = BytecodeDecoder::new(bytes);
    loop {
        let offset = decoder.offset();
        match decoder.decode_next() {
            Some(Ok(instr)) => out.push_str(&format!("{offset:4}  {instr}\n")),
            Some(Err(err)) => out.push_str(&format!("{offset:4}  <{err}>\n")),
            None => break,
        }
    }
    out
}
