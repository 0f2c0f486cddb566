/// Bytecode opcodes.
///
/// Slot operands are one byte. Jump targets are absolute big-endian
/// 16-bit offsets into the method's bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Push a method local.
    /// Operands: `idx:u8`
    PushLocal = 0x00,

    /// Push a method argument.
    /// Operands: `idx:u8`
    PushArgument,

    /// Push a field of the receiver.
    /// Operands: `idx:u8`
    PushField,

    /// Push a literal-pool entry.
    /// Operands: `lit:u8`
    PushConstant,

    /// Push the global named by a literal-pool symbol.
    /// Operands: `lit:u8`
    PushGlobal,

    /// Push nil, true or false.
    /// Operands: `special:u8`
    PushSpecial,

    /// Push the receiver.
    PushSelf,

    /// Discard the top of stack.
    Pop,

    /// Duplicate the top of stack.
    Dup,

    /// Store the top of stack into a local, leaving it on the stack.
    /// Operands: `idx:u8`
    StoreLocal,

    /// Store the top of stack into an argument slot, leaving it on the stack.
    /// Operands: `idx:u8`
    StoreArgument,

    /// Store the top of stack into a receiver field, leaving it on the stack.
    /// Operands: `idx:u8`
    StoreField,

    /// Bind the global named by a literal-pool symbol to the top of stack,
    /// leaving it on the stack.
    /// Operands: `lit:u8`
    StoreGlobal,

    /// Send a message. Pops `argc` arguments and the receiver.
    /// Operands: `selector_lit:u8`, `argc:u8`
    Send,

    /// Send starting lookup at the superclass of the method's holder.
    /// Operands: `selector_lit:u8`, `argc:u8`
    SuperSend,

    /// Return the top of stack to the sender.
    Return,

    /// Return from the home method of a block. Not executable.
    ReturnNonLocal,

    /// Unconditional jump.
    /// Operands: `target:u16` (big-endian)
    Jump,

    /// Pop; jump unless the value is false or nil.
    /// Operands: `target:u16` (big-endian)
    JumpIfTrue,

    /// Pop; jump if the value is false or nil.
    /// Operands: `target:u16` (big-endian)
    JumpIfFalse,

    /// Pop `arity` values (receiver first) and run a primitive on them.
    /// Operands: `id:u8`, `arity:u8`
    CallPrimitive,
}

impl Op {
    pub const COUNT: usize = Self::CallPrimitive as usize + 1;

    /// Number of operand bytes following the opcode.
    pub const fn operand_bytes(self) -> usize {
        match self {
            Op::PushSelf | Op::Pop | Op::Dup | Op::Return | Op::ReturnNonLocal => 0,
            Op::PushLocal
            | Op::PushArgument
            | Op::PushField
            | Op::PushConstant
            | Op::PushGlobal
            | Op::PushSpecial
            | Op::StoreLocal
            | Op::StoreArgument
            | Op::StoreField
            | Op::StoreGlobal => 1,
            Op::Send
            | Op::SuperSend
            | Op::Jump
            | Op::JumpIfTrue
            | Op::JumpIfFalse
            | Op::CallPrimitive => 2,
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        const OPS: [Op; Op::COUNT] = [
            Op::PushLocal,
            Op::PushArgument,
            Op::PushField,
            Op::PushConstant,
            Op::PushGlobal,
            Op::PushSpecial,
            Op::PushSelf,
            Op::Pop,
            Op::Dup,
            Op::StoreLocal,
            Op::StoreArgument,
            Op::StoreField,
            Op::StoreGlobal,
            Op::Send,
            Op::SuperSend,
            Op::Return,
            Op::ReturnNonLocal,
            Op::Jump,
            Op::JumpIfTrue,
            Op::JumpIfFalse,
            Op::CallPrimitive,
        ];
        OPS.get(byte as usize).copied().ok_or(byte)
    }
}
