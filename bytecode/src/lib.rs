mod op;
mod instruction;
mod builder;
mod decoder;

pub use op::Op;
pub use instruction::Instruction;
pub use builder::{BytecodeBuilder, Label, MAX_CODE_LEN};
pub use decoder::{decode_at, disassemble, BytecodeDecoder, DecodeError};

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .collect::<Result<_, _>>()
            .expect("well-formed bytecode")
    }

    #[test]
    fn primitive_method_shape() {
        let mut b = BytecodeBuilder::new();
        b.push_self();
        b.push_argument(0);
        b.call_primitive(1, 2);
        b.ret();

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::PushSelf,
            Instruction::PushArgument { idx: 0 },
            Instruction::CallPrimitive { id: 1, arity: 2 },
            Instruction::Return,
        ]);
        assert_eq!(b.current_offset(), 7);
    }

    #[test]
    fn stores_and_sends() {
        let mut b = BytecodeBuilder::new();
        b.push_constant(3);
        b.store_field(1);
        b.store_local(0);
        b.store_global(9);
        b.pop();
        b.push_global(9);
        b.dup();
        b.send(4, 0);
        b.super_send(5, 1);
        b.push_special(2);
        b.ret_non_local();

        assert_eq!(decode_all(&b.into_bytes()), vec![
            Instruction::PushConstant { lit: 3 },
            Instruction::StoreField { idx: 1 },
            Instruction::StoreLocal { idx: 0 },
            Instruction::StoreGlobal { lit: 9 },
            Instruction::Pop,
            Instruction::PushGlobal { lit: 9 },
            Instruction::Dup,
            Instruction::Send { selector: 4, argc: 0 },
            Instruction::SuperSend { selector: 5, argc: 1 },
            Instruction::PushSpecial { special: 2 },
            Instruction::ReturnNonLocal,
        ]);
    }

    #[test]
    fn forward_jump_targets_are_absolute() {
        let mut b = BytecodeBuilder::new();
        b.push_self(); // 0
        let skip = b.jump_if_false(); // 1..4
        b.push_local(0); // 4..6
        b.pop(); // 6
        b.bind(skip);
        b.ret(); // 7

        let bytes = b.into_bytes();
        assert_eq!(&bytes[1..4], &[Op::JumpIfFalse as u8, 0x00, 0x07]);
        assert_eq!(decode_all(&bytes)[1], Instruction::JumpIfFalse { target: 7 });
    }

    #[test]
    fn backward_jump() {
        let mut b = BytecodeBuilder::new();
        let top = b.current_offset();
        b.push_self();
        let exit = b.jump_if_true();
        b.jump_back(top);
        b.bind(exit);
        b.ret();

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::PushSelf,
            Instruction::JumpIfTrue { target: 7 },
            Instruction::Jump { target: 0 },
            Instruction::Return,
        ]);
    }

    #[test]
    fn big_endian_targets() {
        let bytes = [Op::Jump as u8, 0x01, 0x02];
        let (instr, next) = decode_at(&bytes, 0).unwrap();
        assert_eq!(instr, Instruction::Jump { target: 0x0102 });
        assert_eq!(next, 3);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let bytes = [Op::PushSelf as u8, 0xEE];
        let mut decoder = BytecodeDecoder::new(&bytes);
        assert_eq!(decoder.next(), Some(Ok(Instruction::PushSelf)));
        assert_eq!(
            decoder.next(),
            Some(Err(DecodeError::UnknownOpcode { byte: 0xEE, offset: 1 }))
        );
        assert_eq!(decoder.next(), None, "iteration stops after an error");
    }

    #[test]
    fn truncated_operands_are_an_error() {
        let bytes = [Op::Send as u8, 3];
        assert_eq!(
            decode_at(&bytes, 0),
            Err(DecodeError::Truncated { op: Op::Send, offset: 0 })
        );
    }

    #[test]
    fn op_byte_round_trip() {
        for byte in 0..Op::COUNT as u8 {
            let op = Op::try_from(byte).expect("contiguous opcodes");
            assert_eq!(op as u8, byte);
        }
        assert_eq!(Op::try_from(Op::COUNT as u8), Err(Op::COUNT as u8));
    }

    #[test]
    fn disassembly_lists_offsets() {
        let mut b = BytecodeBuilder::new();
        b.push_constant(0);
        b.send(1, 1);
        b.ret();
        let text = disassemble(b.as_bytes());
        assert_eq!(text, "   0  PushConstant #0\n   2  Send #1 1\n   5  Return\n");
    }
}
