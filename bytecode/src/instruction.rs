use core::fmt;

/// A decoded instruction with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PushLocal { idx: u8 },
    PushArgument { idx: u8 },
    PushField { idx: u8 },
    PushConstant { lit: u8 },
    PushGlobal { lit: u8 },
    PushSpecial { special: u8 },
    PushSelf,
    Pop,
    Dup,
    StoreLocal { idx: u8 },
    StoreArgument { idx: u8 },
    StoreField { idx: u8 },
    StoreGlobal { lit: u8 },
    Send { selector: u8, argc: u8 },
    SuperSend { selector: u8, argc: u8 },
    Return,
    ReturnNonLocal,
    Jump { target: u16 },
    JumpIfTrue { target: u16 },
    JumpIfFalse { target: u16 },
    CallPrimitive { id: u8, arity: u8 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushLocal { idx } => write!(f, "PushLocal l{idx}"),
            Self::PushArgument { idx } => write!(f, "PushArgument a{idx}"),
            Self::PushField { idx } => write!(f, "PushField f{idx}"),
            Self::PushConstant { lit } => write!(f, "PushConstant #{lit}"),
            Self::PushGlobal { lit } => write!(f, "PushGlobal #{lit}"),
            Self::PushSpecial { special } => {
                let name = match special {
                    0 => "nil",
                    1 => "true",
                    2 => "false",
                    _ => "?",
                };
                write!(f, "PushSpecial {name}")
            }
            Self::PushSelf => write!(f, "PushSelf"),
            Self::Pop => write!(f, "Pop"),
            Self::Dup => write!(f, "Dup"),
            Self::StoreLocal { idx } => write!(f, "StoreLocal l{idx}"),
            Self::StoreArgument { idx } => write!(f, "StoreArgument a{idx}"),
            Self::StoreField { idx } => write!(f, "StoreField f{idx}"),
            Self::StoreGlobal { lit } => write!(f, "StoreGlobal #{lit}"),
            Self::Send { selector, argc } => write!(f, "Send #{selector} {argc}"),
            Self::SuperSend { selector, argc } => write!(f, "SuperSend #{selector} {argc}"),
            Self::Return => write!(f, "Return"),
            Self::ReturnNonLocal => write!(f, "ReturnNonLocal"),
            Self::Jump { target } => write!(f, "Jump @{target}"),
            Self::JumpIfTrue { target } => write!(f, "JumpIfTrue @{target}"),
            Self::JumpIfFalse { target } => write!(f, "JumpIfFalse @{target}"),
            Self::CallPrimitive { id, arity } => write!(f, "CallPrimitive {id} {arity}"),
        }
    }
}
