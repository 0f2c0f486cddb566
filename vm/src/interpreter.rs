use std::fmt;

use bytecode::{decode_at, Instruction};
use heap::{HeapError, RootProvider};
use object::{Object, ObjectInit, Special, Value};

use crate::{Recovery, VmError, VM};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    // fatal
    StackOverflow { depth: usize },
    StackUnderflow,
    OutOfMemory(HeapError),
    InvalidBytecode(String),
    // recoverable
    MessageNotUnderstood { class: String, selector: String },
    IndexOutOfBounds { index: i64, size: usize },
    TypeMismatch { expected: String, got: String },
    UnknownPrimitive { id: u8 },
    NonLocalReturn,
    UndefinedGlobal { name: String },
    DivisionByZero,
}

impl RuntimeError {
    /// Fatal errors always end execution; the rest may be recovered.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::StackOverflow { .. }
                | RuntimeError::StackUnderflow
                | RuntimeError::OutOfMemory(_)
                | RuntimeError::InvalidBytecode(_)
        )
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow { depth } => write!(f, "stack overflow at depth {depth}"),
            RuntimeError::StackUnderflow => write!(f, "operand stack underflow"),
            RuntimeError::OutOfMemory(err) => write!(f, "out of memory: {err}"),
            RuntimeError::InvalidBytecode(msg) => write!(f, "invalid bytecode: {msg}"),
            RuntimeError::MessageNotUnderstood { class, selector } => {
                write!(f, "{class} does not understand #{selector}")
            }
            RuntimeError::IndexOutOfBounds { index, size } => {
                write!(f, "index {index} is out of bounds for size {size}")
            }
            RuntimeError::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            RuntimeError::UnknownPrimitive { id } => write!(f, "unknown primitive {id}"),
            RuntimeError::NonLocalReturn => write!(f, "non-local return is not supported"),
            RuntimeError::UndefinedGlobal { name } => write!(f, "undefined global {name}"),
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<HeapError> for RuntimeError {
    fn from(err: HeapError) -> Self {
        RuntimeError::OutOfMemory(err)
    }
}

/// Active call chain at the point of an error, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backtrace {
    /// `Class>>selector @ offset`
    pub entries: Vec<String>,
    /// Frames beyond the configured depth.
    pub omitted: usize,
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "  at {entry}")?;
        }
        if self.omitted > 0 {
            writeln!(f, "  ... {} more", self.omitted)?;
        }
        Ok(())
    }
}

/// A recoverable error that execution continued past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDiagnostic {
    pub error: RuntimeError,
    pub trace: Backtrace,
}

/// One method activation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub method: Value,
    pub receiver: Value,
    pub args: Vec<Value>,
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
    /// Next instruction.
    pub pc: usize,
    /// Start of the instruction being executed.
    pub ip: usize,
}

impl Frame {
    fn new(method: Value, receiver: Value, args: Vec<Value>, num_locals: usize) -> Self {
        Self {
            method,
            receiver,
            args,
            locals: vec![Value::NIL; num_locals],
            stack: Vec::new(),
            pc: 0,
            ip: 0,
        }
    }

    #[inline]
    fn push(&mut self, value: Value, limit: usize) -> Result<(), RuntimeError> {
        if self.stack.len() >= limit {
            return Err(RuntimeError::StackOverflow {
                depth: self.stack.len(),
            });
        }
        self.stack.push(value);
        Ok(())
    }

    #[inline]
    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Removes the top `n` values, oldest first.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let len = self.stack.len();
        if len < n {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.stack.split_off(len - n))
    }
}

/// The frame stack. Sender links are implicit in the order.
#[derive(Debug, Default)]
pub struct InterpreterState {
    pub frames: Vec<Frame>,
}

impl InterpreterState {
    fn top(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)
    }
}

impl RootProvider for InterpreterState {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for frame in self.frames.iter_mut() {
            visitor(&mut frame.method);
            visitor(&mut frame.receiver);
            for value in frame
                .args
                .iter_mut()
                .chain(frame.locals.iter_mut())
                .chain(frame.stack.iter_mut())
            {
                visitor(value);
            }
        }
    }
}

enum Flow {
    Continue,
    Finished(Value),
}

fn invalid(message: impl Into<String>) -> RuntimeError {
    RuntimeError::InvalidBytecode(message.into())
}

impl VM {
    /// Instantiates `Main` and runs its `run` method.
    pub fn run_main(&mut self) -> Result<Value, VmError> {
        let class = self
            .globals
            .get("Main")
            .filter(|&c| self.is_class(c))
            .ok_or_else(|| VmError::MissingEntry("class Main".into()))?;
        let run = self.intern("run")?;
        let method = self
            .find_method(class, run)
            .ok_or_else(|| VmError::MissingEntry("method Main>>run".into()))?;
        if self.object(method).map_or(0, Object::num_args) != 0 {
            return Err(VmError::MissingEntry("Main>>run must not take arguments".into()));
        }
        let size = self.object(class).map_or(0, Object::instance_size);
        let receiver = self.allocate(ObjectInit::instance(class, size))?;
        self.execute(receiver, method, Vec::new())
    }

    /// Sends `selector` to `receiver` from outside any running method.
    pub fn send_message(
        &mut self,
        receiver: Value,
        selector: &str,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        let mark = self.scratch.len();
        self.scratch.push(receiver);
        self.scratch.extend_from_slice(&args);
        let symbol = self.intern(selector);
        self.scratch.truncate(mark);
        let symbol = symbol?;

        let class = self.class_of(receiver);
        let Some(method) = self.find_method(class, symbol) else {
            return Err(VmError::Runtime {
                error: RuntimeError::MessageNotUnderstood {
                    class: self.class_name(class),
                    selector: selector.to_owned(),
                },
                trace: Backtrace::default(),
            });
        };
        self.execute(receiver, method, args)
    }

    /// Runs `method` on `receiver` to completion.
    pub fn execute(
        &mut self,
        receiver: Value,
        method: Value,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        let mut state = InterpreterState::default();
        self.activate(&mut state, method, receiver, args)
            .map_err(|error| VmError::Runtime {
                error,
                trace: Backtrace::default(),
            })?;
        self.interpret(&mut state)
    }

    fn interpret(&mut self, state: &mut InterpreterState) -> Result<Value, VmError> {
        loop {
            match self.step(state) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Finished(value)) => return Ok(value),
                Err(error) => {
                    let trace = self.backtrace(state);
                    if error.is_fatal() || self.settings.recovery == Recovery::Abort {
                        log::error!("{error}");
                        return Err(VmError::Runtime { error, trace });
                    }
                    self.report(error, trace);
                    // The failed instruction consumed its operands; nil
                    // stands in for its result.
                    let limit = self.settings.stack_size;
                    let pushed = state
                        .top()
                        .and_then(|frame| frame.push(Value::NIL, limit));
                    if let Err(error) = pushed {
                        let trace = self.backtrace(state);
                        return Err(VmError::Runtime { error, trace });
                    }
                }
            }
        }
    }

    fn report(&mut self, error: RuntimeError, trace: Backtrace) {
        log::error!("{error}");
        if let Err(err) = self.errors.write_str(&format!("error: {error}\n{trace}")) {
            log::warn!("could not write diagnostic: {err}");
        }
        self.diagnostics.push(RuntimeDiagnostic { error, trace });
    }

    pub fn backtrace(&self, state: &InterpreterState) -> Backtrace {
        let depth = self.settings.trace_depth;
        let entries = state
            .frames
            .iter()
            .rev()
            .take(depth)
            .map(|frame| {
                let method = self.object(frame.method);
                let holder = method.map_or(Value::NIL, Object::holder);
                let selector = method
                    .and_then(|m| self.text_of(m.selector()))
                    .unwrap_or("?");
                format!("{}>>{} @ {}", self.class_name(holder), selector, frame.ip)
            })
            .collect();
        Backtrace {
            entries,
            omitted: state.frames.len().saturating_sub(depth),
        }
    }

    fn activate(
        &mut self,
        state: &mut InterpreterState,
        method: Value,
        receiver: Value,
        args: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        if state.frames.len() >= self.settings.max_frames {
            return Err(RuntimeError::StackOverflow {
                depth: state.frames.len(),
            });
        }
        let obj = self
            .object(method)
            .filter(|m| m.is_method())
            .ok_or_else(|| invalid("send target is not a method"))?;
        if obj.num_args() != args.len() {
            return Err(invalid(format!(
                "method expects {} arguments, got {}",
                obj.num_args(),
                args.len()
            )));
        }
        let frame = Frame::new(method, receiver, args, obj.num_locals());
        state.frames.push(frame);
        Ok(())
    }

    fn literal(&self, index: u8) -> Result<Value, RuntimeError> {
        self.literals
            .get(index)
            .ok_or_else(|| invalid(format!("literal {index} is out of range")))
    }

    /// Name symbol and text of the global at literal `index`.
    fn global_name(&self, index: u8) -> Result<(Value, &str), RuntimeError> {
        let symbol = self.literal(index)?;
        let name = self
            .text_of(symbol)
            .ok_or_else(|| invalid(format!("literal {index} is not a global name")))?;
        Ok((symbol, name))
    }

    fn step(&mut self, state: &mut InterpreterState) -> Result<Flow, RuntimeError> {
        let limit = self.settings.stack_size;
        let frame = state.top()?;
        let code = self
            .object(frame.method)
            .map(Object::bytecode)
            .ok_or_else(|| invalid("frame has no method"))?;
        let (instruction, next) =
            decode_at(code, frame.pc).map_err(|err| invalid(err.to_string()))?;
        frame.ip = frame.pc;
        frame.pc = next;

        match instruction {
            Instruction::PushLocal { idx } => {
                let value = *frame
                    .locals
                    .get(idx as usize)
                    .ok_or_else(|| invalid(format!("no local {idx}")))?;
                frame.push(value, limit)?;
            }
            Instruction::PushArgument { idx } => {
                let value = *frame
                    .args
                    .get(idx as usize)
                    .ok_or_else(|| invalid(format!("no argument {idx}")))?;
                frame.push(value, limit)?;
            }
            Instruction::PushField { idx } => {
                let receiver = self.object(frame.receiver);
                let value = receiver.and_then(|obj| obj.field(idx as usize));
                match value {
                    Some(value) => frame.push(value, limit)?,
                    None => {
                        return Err(RuntimeError::IndexOutOfBounds {
                            index: idx as i64,
                            size: receiver.map_or(0, Object::field_count),
                        });
                    }
                }
            }
            Instruction::PushConstant { lit } => {
                let value = self.literal(lit)?;
                frame.push(value, limit)?;
            }
            Instruction::PushGlobal { lit } => {
                let (_, name) = self.global_name(lit)?;
                let value = self
                    .globals
                    .get(name)
                    .ok_or_else(|| RuntimeError::UndefinedGlobal {
                        name: name.to_owned(),
                    })?;
                frame.push(value, limit)?;
            }
            Instruction::PushSpecial { special } => {
                let special = Special::try_from(special)
                    .map_err(|code| invalid(format!("unknown special {code}")))?;
                frame.push(Value::from(special), limit)?;
            }
            Instruction::PushSelf => {
                let receiver = frame.receiver;
                frame.push(receiver, limit)?;
            }
            Instruction::Pop => {
                frame.pop()?;
            }
            Instruction::Dup => {
                let top = *frame.stack.last().ok_or(RuntimeError::StackUnderflow)?;
                frame.push(top, limit)?;
            }
            Instruction::StoreLocal { idx } => {
                let value = frame.pop()?;
                let slot = frame
                    .locals
                    .get_mut(idx as usize)
                    .ok_or_else(|| invalid(format!("no local {idx}")))?;
                *slot = value;
                frame.push(value, limit)?;
            }
            Instruction::StoreArgument { idx } => {
                let value = frame.pop()?;
                let slot = frame
                    .args
                    .get_mut(idx as usize)
                    .ok_or_else(|| invalid(format!("no argument {idx}")))?;
                *slot = value;
                frame.push(value, limit)?;
            }
            Instruction::StoreField { idx } => {
                let value = frame.pop()?;
                let receiver = frame.receiver;
                let stored = self
                    .heap
                    .object_mut(receiver)
                    .is_some_and(|obj| obj.set_field(idx as usize, value));
                if !stored {
                    return Err(RuntimeError::IndexOutOfBounds {
                        index: idx as i64,
                        size: self.object(receiver).map_or(0, Object::field_count),
                    });
                }
                frame.push(value, limit)?;
            }
            Instruction::StoreGlobal { lit } => {
                let value = frame.pop()?;
                let (symbol, name) = self.global_name(lit)?;
                let name = name.to_owned();
                self.globals
                    .set(&name, symbol, value)
                    .map_err(|_| invalid(format!("no global slot for {name}")))?;
                frame.push(value, limit)?;
            }
            Instruction::Send { selector, argc } => {
                let selector = self.literal(selector)?;
                let args = frame.pop_n(argc as usize)?;
                let receiver = frame.pop()?;
                let class = self.class_of(receiver);
                self.dispatch(state, receiver, class, selector, args)?;
            }
            Instruction::SuperSend { selector, argc } => {
                let selector = self.literal(selector)?;
                let args = frame.pop_n(argc as usize)?;
                let receiver = frame.pop()?;
                let holder = self.object(frame.method).map_or(Value::NIL, Object::holder);
                let superclass = self.object(holder).map_or(Value::NIL, Object::superclass);
                self.dispatch(state, receiver, superclass, selector, args)?;
            }
            Instruction::Return => {
                let value = frame.pop()?;
                state.frames.pop();
                match state.frames.last_mut() {
                    None => return Ok(Flow::Finished(value)),
                    Some(sender) => sender.push(value, limit)?,
                }
            }
            Instruction::ReturnNonLocal => {
                frame.pop()?;
                return Err(RuntimeError::NonLocalReturn);
            }
            Instruction::Jump { target } => frame.pc = target as usize,
            Instruction::JumpIfTrue { target } => {
                if frame.pop()?.is_truthy() {
                    frame.pc = target as usize;
                }
            }
            Instruction::JumpIfFalse { target } => {
                if !frame.pop()?.is_truthy() {
                    frame.pc = target as usize;
                }
            }
            Instruction::CallPrimitive { id, arity } => {
                let n = arity as usize;
                let len = frame.stack.len();
                if len < n {
                    return Err(RuntimeError::StackUnderflow);
                }
                // Arguments stay on the stack, and so stay rooted, while
                // the primitive runs.
                let args = frame.stack[len - n..].to_vec();
                let result = self.call_primitive(state, id, &args);
                let frame = state.top()?;
                frame.stack.truncate(len - n);
                let value = result?;
                frame.push(value, limit)?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Looks `selector` up starting at `class` and activates the result.
    fn dispatch(
        &mut self,
        state: &mut InterpreterState,
        receiver: Value,
        class: Value,
        selector: Value,
        args: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        log::trace!(
            "send #{} to {}",
            self.text_of(selector).unwrap_or("?"),
            self.print_string(receiver)
        );
        let Some(method) = self.find_method(class, selector) else {
            let class = if class.is_nil() {
                "nil superclass".to_owned()
            } else {
                self.class_name(class)
            };
            return Err(RuntimeError::MessageNotUnderstood {
                class,
                selector: self.text_of(selector).unwrap_or("?").to_owned(),
            });
        };
        self.activate(state, method, receiver, args)
    }
}
