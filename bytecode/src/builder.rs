use crate::op::Op;

/// Largest addressable bytecode offset for jumps.
pub const MAX_CODE_LEN: usize = u16::MAX as usize;

/// A forward jump whose target has not yet been resolved.
///
/// Created by [`BytecodeBuilder::jump`], [`BytecodeBuilder::jump_if_true`],
/// and [`BytecodeBuilder::jump_if_false`]. Resolve it with
/// [`BytecodeBuilder::bind`].
#[derive(Debug)]
#[must_use = "an unbound label leaves a jump to offset 0"]
pub struct Label {
    /// Position of the u16 target bytes in the buffer.
    target_pos: usize,
}

/// Builds a method's bytecode byte sequence.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    /// True once the code no longer fits absolute 16-bit jump targets.
    pub fn is_too_long(&self) -> bool {
        self.buf.len() > MAX_CODE_LEN
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn emit_op_u8(&mut self, op: Op, operand: u8) {
        self.buf.extend_from_slice(&[op as u8, operand]);
    }

    fn emit_target(&mut self, target: usize) {
        let target = target.min(MAX_CODE_LEN) as u16;
        self.buf.extend_from_slice(&target.to_be_bytes());
    }

    // ── push / pop ─────────────────────────────────────────────────

    /// `PushLocal <idx>`
    pub fn push_local(&mut self, idx: u8) {
        self.emit_op_u8(Op::PushLocal, idx);
    }

    /// `PushArgument <idx>`
    pub fn push_argument(&mut self, idx: u8) {
        self.emit_op_u8(Op::PushArgument, idx);
    }

    /// `PushField <idx>`
    pub fn push_field(&mut self, idx: u8) {
        self.emit_op_u8(Op::PushField, idx);
    }

    /// `PushConstant <lit>`
    pub fn push_constant(&mut self, lit: u8) {
        self.emit_op_u8(Op::PushConstant, lit);
    }

    /// `PushGlobal <lit>`: `lit` indexes the name symbol.
    pub fn push_global(&mut self, lit: u8) {
        self.emit_op_u8(Op::PushGlobal, lit);
    }

    /// `PushSpecial <code>`: 0 nil, 1 true, 2 false.
    pub fn push_special(&mut self, code: u8) {
        self.emit_op_u8(Op::PushSpecial, code);
    }

    pub fn push_self(&mut self) {
        self.emit_op(Op::PushSelf);
    }

    pub fn pop(&mut self) {
        self.emit_op(Op::Pop);
    }

    pub fn dup(&mut self) {
        self.emit_op(Op::Dup);
    }

    // ── stores ─────────────────────────────────────────────────────

    pub fn store_local(&mut self, idx: u8) {
        self.emit_op_u8(Op::StoreLocal, idx);
    }

    pub fn store_argument(&mut self, idx: u8) {
        self.emit_op_u8(Op::StoreArgument, idx);
    }

    pub fn store_field(&mut self, idx: u8) {
        self.emit_op_u8(Op::StoreField, idx);
    }

    pub fn store_global(&mut self, lit: u8) {
        self.emit_op_u8(Op::StoreGlobal, lit);
    }

    // ── sends / returns ────────────────────────────────────────────

    /// `Send <selector_lit> <argc>`
    pub fn send(&mut self, selector: u8, argc: u8) {
        self.buf.extend_from_slice(&[Op::Send as u8, selector, argc]);
    }

    /// `SuperSend <selector_lit> <argc>`
    pub fn super_send(&mut self, selector: u8, argc: u8) {
        self.buf
            .extend_from_slice(&[Op::SuperSend as u8, selector, argc]);
    }

    pub fn ret(&mut self) {
        self.emit_op(Op::Return);
    }

    pub fn ret_non_local(&mut self) {
        self.emit_op(Op::ReturnNonLocal);
    }

    /// `CallPrimitive <id> <arity>`; `arity` counts the receiver.
    pub fn call_primitive(&mut self, id: u8, arity: u8) {
        self.buf
            .extend_from_slice(&[Op::CallPrimitive as u8, id, arity]);
    }

    // ── jumps ──────────────────────────────────────────────────────

    /// Emit an unconditional forward jump. Returns a [`Label`].
    pub fn jump(&mut self) -> Label {
        self.emit_jump_placeholder(Op::Jump)
    }

    /// Emit a forward jump taken unless the popped value is false or nil.
    pub fn jump_if_true(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpIfTrue)
    }

    /// Emit a forward jump taken when the popped value is false or nil.
    pub fn jump_if_false(&mut self) -> Label {
        self.emit_jump_placeholder(Op::JumpIfFalse)
    }

    /// Bind a forward jump label to the current position.
    pub fn bind(&mut self, label: Label) {
        let target = self.buf.len().min(MAX_CODE_LEN) as u16;
        self.buf[label.target_pos..label.target_pos + 2].copy_from_slice(&target.to_be_bytes());
    }

    /// Emit an unconditional backward jump to `target` (a byte offset
    /// obtained from [`current_offset`](Self::current_offset)).
    pub fn jump_back(&mut self, target: usize) {
        self.emit_op(Op::Jump);
        self.emit_target(target);
    }

    fn emit_jump_placeholder(&mut self, op: Op) -> Label {
        self.emit_op(op);
        let target_pos = self.buf.len();
        self.emit_target(0);
        Label { target_pos }
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
