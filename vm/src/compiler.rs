//! AST to bytecode.
//!
//! One [`MethodCompiler`] per method resolves names against its scopes
//! (inlined-block locals, method locals, arguments, fields, globals),
//! interns literals into the VM-wide pool and emits bytecode through a
//! [`BytecodeBuilder`]. Control-flow messages whose arguments are block
//! literals are inlined as jumps; every other block literal is rejected.
//!
//! Diagnostics never stop compilation. Errors fail the load once every
//! class has been compiled; warnings are only recorded.

use std::fmt;

use bytecode::BytecodeBuilder;
use heap::HeapError;
use object::{MethodSpec, ObjectInit, Special, Value, INT_MAX};
use parser::ast::{ClassDef, Expr, ExprKind, Literal, MethodBody, MethodDef};
use parser::Span;

use crate::literals::LiteralKey;
use crate::VM;

const BLOCK_ERROR: &str =
    "block literals are only supported as arguments of inlined control-flow messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// `Class` or `Class>>selector`.
    pub location: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {} at {}",
            self.severity, self.location, self.message, self.span
        )
    }
}

impl std::error::Error for CompileError {}

fn diagnostic(
    severity: Severity,
    location: &str,
    message: impl Into<String>,
    span: Span,
) -> CompileError {
    CompileError {
        severity,
        message: message.into(),
        span,
        location: location.to_owned(),
    }
}

/// Narrows a source integer the way `Value::int` does: 15 bits of
/// magnitude, sign kept.
fn truncate_int(n: i64) -> i16 {
    let magnitude = (n.unsigned_abs() & INT_MAX as u64) as i16;
    if n < 0 { -magnitude } else { magnitude }
}

fn literal_key(literal: &Literal) -> LiteralKey {
    match literal {
        Literal::Integer(n) => LiteralKey::Int(truncate_int(*n)),
        Literal::String(s) => LiteralKey::String(s.clone()),
        Literal::Symbol(s) => LiteralKey::Symbol(s.clone()),
        Literal::Array(items) => LiteralKey::Array(items.iter().map(literal_key).collect()),
        Literal::Nil => LiteralKey::Special(Special::Nil),
        Literal::True => LiteralKey::Special(Special::True),
        Literal::False => LiteralKey::Special(Special::False),
    }
}

// ── classes ───────────────────────────────────────────────────────────

/// Defines (or, in the prelude, reopens) each class and installs its
/// methods. Only heap exhaustion aborts; everything else is reported
/// into `diagnostics`.
pub fn load_classes(
    vm: &mut VM,
    classes: &[ClassDef],
    diagnostics: &mut Vec<CompileError>,
) -> Result<Vec<Value>, HeapError> {
    let mut loaded = Vec::with_capacity(classes.len());
    for def in classes {
        if let Some(class) = define_class(vm, def, diagnostics)? {
            loaded.push(class);
        }
    }
    Ok(loaded)
}

fn define_class(
    vm: &mut VM,
    def: &ClassDef,
    diagnostics: &mut Vec<CompileError>,
) -> Result<Option<Value>, HeapError> {
    let error = |message: String, span: Span| diagnostic(Severity::Error, &def.name, message, span);

    let class = match vm.globals.get(&def.name) {
        Some(existing) if vm.loading_prelude && vm.core.is_core(existing) => {
            if !def.instance_vars.is_empty() {
                diagnostics.push(error(
                    format!("cannot add instance variables to core class {}", def.name),
                    def.name_span,
                ));
            }
            existing
        }
        Some(_) => {
            diagnostics.push(error(format!("{} is already defined", def.name), def.name_span));
            return Ok(None);
        }
        None => {
            let superclass = match &def.superclass {
                Some((name, span)) => match vm.globals.get(name).filter(|&c| vm.is_class(c)) {
                    Some(class) => class,
                    None => {
                        diagnostics.push(error(format!("unknown superclass {name}"), *span));
                        return Ok(None);
                    }
                },
                None => vm.core.object,
            };

            let mut fields = vm.field_names(superclass);
            for ivar in &def.instance_vars {
                if fields.contains(ivar) {
                    diagnostics.push(error(
                        format!("instance variable {ivar} is already defined"),
                        def.name_span,
                    ));
                } else {
                    fields.push(ivar.clone());
                }
            }
            if fields.len() > u8::MAX as usize {
                diagnostics.push(error(
                    format!("{} has more than 255 instance variables", def.name),
                    def.name_span,
                ));
                return Ok(None);
            }

            let class = vm.create_class(&def.name, superclass, &fields)?;
            let Some(symbol) = vm.symbols.get(&def.name) else {
                return Ok(None);
            };
            if vm.globals.set(&def.name, symbol, class).is_err() {
                diagnostics.push(error("globals table is full".into(), def.name_span));
                return Ok(None);
            }
            class
        }
    };

    let fields = vm.field_names(class);
    for method in &def.methods {
        let location = format!("{}>>{}", def.name, method.selector);
        let compiled = MethodCompiler::new(vm, &location, &fields, diagnostics).compile(method)?;
        if let Some(mut spec) = compiled {
            spec.holder = class;
            let method = vm.allocate(ObjectInit::method(vm.core.method, spec))?;
            vm.install_method(class, method)?;
        }
    }
    log::debug!("loaded class {} ({} methods)", def.name, def.methods.len());
    Ok(Some(class))
}

// ── methods ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Variable {
    Local(u8),
    Argument(u8),
    Field(u8),
    Global,
}

pub struct MethodCompiler<'a> {
    vm: &'a mut VM,
    location: &'a str,
    fields: &'a [String],
    diagnostics: &'a mut Vec<CompileError>,
    args: Vec<String>,
    /// Slot names; declared locals first, then hidden block slots.
    locals: Vec<String>,
    declared_locals: usize,
    /// Inlined block scopes, innermost last.
    scopes: Vec<Vec<(String, u8)>>,
    /// Cascade receiver already on the stack for the message being
    /// compiled. Consumed by the first node that matches it.
    stacked: Option<StackedReceiver>,
    code: BytecodeBuilder,
}

struct StackedReceiver {
    expr: Expr,
    /// Leave a copy behind for the messages still to come.
    keep: bool,
}

impl<'a> MethodCompiler<'a> {
    pub fn new(
        vm: &'a mut VM,
        location: &'a str,
        fields: &'a [String],
        diagnostics: &'a mut Vec<CompileError>,
    ) -> Self {
        Self {
            vm,
            location,
            fields,
            diagnostics,
            args: Vec::new(),
            locals: Vec::new(),
            declared_locals: 0,
            scopes: Vec::new(),
            stacked: None,
            code: BytecodeBuilder::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(diagnostic(Severity::Error, self.location, message, span));
    }

    fn warn(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(diagnostic(Severity::Warning, self.location, message, span));
    }

    /// Compiles `def` into a method description. The holder is left nil
    /// for the caller to fill in. `None` means the method could not be
    /// represented at all (an error has been recorded).
    pub fn compile(mut self, def: &MethodDef) -> Result<Option<MethodSpec>, HeapError> {
        let selector = self.vm.intern(&def.selector)?;
        if def.params.len() > u8::MAX as usize - 1 {
            self.error("too many arguments", def.span);
            return Ok(None);
        }
        self.args = def.params.clone();
        self.check_duplicates(&def.params, def.span);

        let primitive = match &def.body {
            MethodBody::Primitive { id, span } => {
                let Ok(id) = u8::try_from(*id) else {
                    self.error(format!("primitive id {id} is out of range"), *span);
                    return Ok(None);
                };
                if self.vm.primitives.get(id).is_none() {
                    self.warn(format!("unknown primitive {id}"), *span);
                }
                self.code.push_self();
                for i in 0..self.args.len() {
                    self.code.push_argument(i as u8);
                }
                self.code.call_primitive(id, self.args.len() as u8 + 1);
                self.code.ret();
                Some(id)
            }
            MethodBody::Code { locals, statements } => {
                let mut names = def.params.clone();
                names.extend(locals.iter().cloned());
                self.check_duplicates(&names, def.span);
                self.locals = locals.clone();
                self.declared_locals = locals.len();
                self.body(statements)?;
                None
            }
        };

        if self.code.is_too_long() {
            self.error("method body is too long", def.span);
            return Ok(None);
        }
        if self.locals.len() > u8::MAX as usize {
            self.error("too many temporaries", def.span);
            return Ok(None);
        }
        Ok(Some(MethodSpec {
            selector,
            holder: Value::NIL,
            num_args: self.args.len(),
            num_locals: self.locals.len(),
            primitive,
            bytecode: self.code.into_bytes(),
        }))
    }

    fn check_duplicates(&mut self, names: &[String], span: Span) {
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                self.error(format!("duplicate name {name}"), span);
            }
        }
    }

    /// Statement sequence of a method: every value but the last is
    /// popped, and a body without a trailing `^` answers `self`.
    fn body(&mut self, statements: &[Expr]) -> Result<(), HeapError> {
        let Some((last, init)) = statements.split_last() else {
            self.code.push_self();
            self.code.ret();
            return Ok(());
        };
        for stmt in init {
            self.expr(stmt)?;
            self.code.pop();
        }
        self.expr(last)?;
        if !last.is_return() {
            self.code.pop();
            self.code.push_self();
            self.code.ret();
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), HeapError> {
        if self.stacked.as_ref().is_some_and(|s| s.expr == *expr) {
            if self.stacked.take().is_some_and(|s| s.keep) {
                self.code.dup();
            }
            return Ok(());
        }
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal(literal, expr.span)?,
            ExprKind::SelfRef => self.code.push_self(),
            ExprKind::SuperRef => {
                self.error("super can only receive a message", expr.span);
                self.code.push_self();
            }
            ExprKind::Ident(name) => self.load(name, expr.span)?,
            ExprKind::UnaryMessage { .. }
            | ExprKind::BinaryMessage { .. }
            | ExprKind::KeywordMessage { .. } => self.send(expr)?,
            ExprKind::Cascade { messages } => self.cascade(messages)?,
            ExprKind::Block { .. } => {
                self.error(BLOCK_ERROR, expr.span);
                self.code.push_special(Special::Nil as u8);
            }
            ExprKind::Return(value) => {
                self.expr(value)?;
                self.code.ret();
            }
            ExprKind::Assignment {
                target,
                target_span,
                value,
            } => {
                self.expr(value)?;
                self.store(target, *target_span)?;
            }
        }
        Ok(())
    }

    /// Evaluates the shared receiver once, then sends every message to
    /// it. Each message but the last works on a `Dup` and has its result
    /// popped; the last one consumes the receiver.
    fn cascade(&mut self, messages: &[Expr]) -> Result<(), HeapError> {
        let Some((receiver, _, _)) = messages.first().and_then(Expr::as_send) else {
            return Ok(());
        };
        let receiver = receiver.clone();
        if matches!(receiver.kind, ExprKind::SuperRef) {
            // every part re-pushes self and stays a super send
            for (i, message) in messages.iter().enumerate() {
                if i > 0 {
                    self.code.pop();
                }
                self.expr(message)?;
            }
            return Ok(());
        }

        self.expr(&receiver)?;
        let last = messages.len() - 1;
        for (i, message) in messages.iter().enumerate() {
            self.stacked = Some(StackedReceiver {
                expr: receiver.clone(),
                keep: i < last,
            });
            self.expr(message)?;
            self.stacked = None;
            if i < last {
                self.code.pop();
            }
        }
        Ok(())
    }

    // ── literals ───────────────────────────────────────────────────

    fn literal(&mut self, literal: &Literal, span: Span) -> Result<(), HeapError> {
        match literal {
            Literal::Nil => self.code.push_special(Special::Nil as u8),
            Literal::True => self.code.push_special(Special::True as u8),
            Literal::False => self.code.push_special(Special::False as u8),
            _ => match self.constant(literal, span)? {
                Some(index) => self.code.push_constant(index),
                None => self.code.push_special(Special::Nil as u8),
            },
        }
        Ok(())
    }

    /// Pool index of `literal`, adding it if no equal literal is pooled.
    /// `None` after reporting a full pool.
    fn constant(&mut self, literal: &Literal, span: Span) -> Result<Option<u8>, HeapError> {
        self.check_range(literal, span);
        let key = literal_key(literal);
        if let Some(index) = self.vm.literals.find(&key) {
            return Ok(Some(index));
        }
        if self.vm.literals.is_full() {
            self.error("literal pool is full", span);
            return Ok(None);
        }
        let value = self.materialize(literal)?;
        Ok(self.vm.literals.insert(key, value).ok())
    }

    fn check_range(&mut self, literal: &Literal, span: Span) {
        match literal {
            Literal::Integer(n) if !(-(INT_MAX as i64)..=INT_MAX as i64).contains(n) => {
                self.warn(
                    format!("integer literal {n} is out of range, truncated to {}", truncate_int(*n)),
                    span,
                );
            }
            Literal::Array(items) => {
                for item in items {
                    self.check_range(item, span);
                }
            }
            _ => {}
        }
    }

    fn materialize(&mut self, literal: &Literal) -> Result<Value, HeapError> {
        match literal {
            Literal::Integer(n) => Ok(Value::Int(truncate_int(*n))),
            Literal::String(s) => self.vm.new_string(s, &mut heap::NoRoots),
            Literal::Symbol(s) => self.vm.intern(s),
            Literal::Nil => Ok(Value::NIL),
            Literal::True => Ok(Value::TRUE),
            Literal::False => Ok(Value::FALSE),
            Literal::Array(items) => {
                let mark = self.vm.scratch.len();
                let array = self.materialize_array(items);
                self.vm.scratch.truncate(mark);
                array
            }
        }
    }

    fn materialize_array(&mut self, items: &[Literal]) -> Result<Value, HeapError> {
        let mark = self.vm.scratch.len();
        for item in items {
            let value = self.materialize(item)?;
            self.vm.scratch.push(value);
        }
        let elements = self.vm.scratch[mark..].to_vec();
        self.vm.allocate(ObjectInit::array(self.vm.core.array, elements))
    }

    fn symbol(&mut self, name: &str, span: Span) -> Result<Option<u8>, HeapError> {
        self.constant(&Literal::Symbol(name.to_owned()), span)
    }

    // ── variables ──────────────────────────────────────────────────

    fn resolve(&self, name: &str) -> Variable {
        for scope in self.scopes.iter().rev() {
            if let Some(&(_, slot)) = scope.iter().rev().find(|(n, _)| n == name) {
                return Variable::Local(slot);
            }
        }
        if let Some(i) = self.locals[..self.declared_locals].iter().position(|n| n == name) {
            return Variable::Local(i as u8);
        }
        if let Some(i) = self.args.iter().position(|n| n == name) {
            return Variable::Argument(i as u8);
        }
        if let Some(i) = self.fields.iter().position(|n| n == name) {
            return Variable::Field(i as u8);
        }
        Variable::Global
    }

    /// Literal index of a global's name. Lowercase names that reach the
    /// globals are probably typos, so they warn.
    fn global(&mut self, name: &str, span: Span) -> Result<Option<u8>, HeapError> {
        if name.starts_with(|c: char| c.is_ascii_lowercase()) {
            self.warn(format!("undefined variable {name}, resolving as a global"), span);
        }
        self.symbol(name, span)
    }

    fn load(&mut self, name: &str, span: Span) -> Result<(), HeapError> {
        match self.resolve(name) {
            Variable::Local(i) => self.code.push_local(i),
            Variable::Argument(i) => self.code.push_argument(i),
            Variable::Field(i) => self.code.push_field(i),
            Variable::Global => match self.global(name, span)? {
                Some(lit) => self.code.push_global(lit),
                None => self.code.push_special(Special::Nil as u8),
            },
        }
        Ok(())
    }

    fn store(&mut self, name: &str, span: Span) -> Result<(), HeapError> {
        match self.resolve(name) {
            Variable::Local(i) => self.code.store_local(i),
            Variable::Argument(i) => self.code.store_argument(i),
            Variable::Field(i) => self.code.store_field(i),
            Variable::Global => {
                let Some(lit) = self.global(name, span)? else {
                    return Ok(());
                };
                // Reserve the slot now so the store cannot fail later.
                if !self.vm.globals.contains(name) {
                    let symbol = self.vm.intern(name)?;
                    if self.vm.globals.set(name, symbol, Value::NIL).is_err() {
                        self.error("globals table is full", span);
                        return Ok(());
                    }
                }
                self.code.store_global(lit);
            }
        }
        Ok(())
    }

    /// A fresh local slot invisible to source names outside its scope.
    fn hidden_local(&mut self, name: &str, span: Span) -> u8 {
        if self.locals.len() >= u8::MAX as usize {
            self.error("too many temporaries", span);
            return 0;
        }
        self.locals.push(name.to_owned());
        (self.locals.len() - 1) as u8
    }

    // ── sends ──────────────────────────────────────────────────────

    fn send(&mut self, expr: &Expr) -> Result<(), HeapError> {
        let Some((receiver, selector, args)) = expr.as_send() else {
            return Ok(());
        };
        if self.inline(receiver, &selector, &args, expr.span)? {
            return Ok(());
        }

        let is_super = matches!(receiver.kind, ExprKind::SuperRef);
        if is_super {
            self.code.push_self();
        } else {
            self.expr(receiver)?;
        }
        for arg in &args {
            self.expr(arg)?;
        }
        let argc = args.len() as u8;
        match self.symbol(&selector, expr.span)? {
            Some(sel) if is_super => self.code.super_send(sel, argc),
            Some(sel) => self.code.send(sel, argc),
            None => {
                for _ in 0..=argc {
                    self.code.pop();
                }
                self.code.push_special(Special::Nil as u8);
            }
        }
        Ok(())
    }

    /// Selector literal for sends the compiler emits itself. On a full
    /// pool the error is recorded and the load fails, so the index is
    /// never executed.
    fn known_selector(&mut self, name: &str, span: Span) -> Result<u8, HeapError> {
        Ok(self.symbol(name, span)?.unwrap_or(0))
    }

    fn one(&mut self, span: Span) -> Result<u8, HeapError> {
        Ok(self.constant(&Literal::Integer(1), span)?.unwrap_or(0))
    }

    /// Compiles control-flow messages with literal block arguments as
    /// jumps. Returns false when `selector` is an ordinary send.
    fn inline(
        &mut self,
        receiver: &Expr,
        selector: &str,
        args: &[&Expr],
        span: Span,
    ) -> Result<bool, HeapError> {
        fn block(expr: &Expr, arity: usize) -> bool {
            matches!(&expr.kind, ExprKind::Block { params, .. } if params.len() == arity)
        }
        const NIL: u8 = Special::Nil as u8;

        match (selector, args) {
            ("ifTrue:", [then]) if block(then, 0) => {
                self.expr(receiver)?;
                let skip = self.code.jump_if_false();
                self.inline_block(then, &[])?;
                let end = self.code.jump();
                self.code.bind(skip);
                self.code.push_special(NIL);
                self.code.bind(end);
            }
            ("ifFalse:", [otherwise]) if block(otherwise, 0) => {
                self.expr(receiver)?;
                let skip = self.code.jump_if_true();
                self.inline_block(otherwise, &[])?;
                let end = self.code.jump();
                self.code.bind(skip);
                self.code.push_special(NIL);
                self.code.bind(end);
            }
            ("ifTrue:ifFalse:", [first, second]) | ("ifFalse:ifTrue:", [first, second])
                if block(first, 0) && block(second, 0) =>
            {
                self.expr(receiver)?;
                let skip = if selector == "ifTrue:ifFalse:" {
                    self.code.jump_if_false()
                } else {
                    self.code.jump_if_true()
                };
                self.inline_block(first, &[])?;
                let end = self.code.jump();
                self.code.bind(skip);
                self.inline_block(second, &[])?;
                self.code.bind(end);
            }
            ("and:", [rest]) if block(rest, 0) => {
                self.expr(receiver)?;
                let short = self.code.jump_if_false();
                self.inline_block(rest, &[])?;
                let end = self.code.jump();
                self.code.bind(short);
                self.code.push_special(Special::False as u8);
                self.code.bind(end);
            }
            ("or:", [rest]) if block(rest, 0) => {
                self.expr(receiver)?;
                let short = self.code.jump_if_true();
                self.inline_block(rest, &[])?;
                let end = self.code.jump();
                self.code.bind(short);
                self.code.push_special(Special::True as u8);
                self.code.bind(end);
            }
            ("whileTrue:", [body]) | ("whileFalse:", [body])
                if block(receiver, 0) && block(body, 0) =>
            {
                let top = self.code.current_offset();
                self.inline_block(receiver, &[])?;
                let exit = if selector == "whileTrue:" {
                    self.code.jump_if_false()
                } else {
                    self.code.jump_if_true()
                };
                self.inline_block(body, &[])?;
                self.code.pop();
                self.code.jump_back(top);
                self.code.bind(exit);
                self.code.push_special(NIL);
            }
            ("timesRepeat:", [body]) if block(body, 0) => {
                let count = self.hidden_local("(count)", span);
                let greater = self.known_selector(">", span)?;
                let minus = self.known_selector("-", span)?;
                let one = self.one(span)?;

                self.expr(receiver)?;
                self.code.store_local(count);
                self.code.pop();
                let top = self.code.current_offset();
                self.code.push_local(count);
                self.literal(&Literal::Integer(0), span)?;
                self.code.send(greater, 1);
                let exit = self.code.jump_if_false();
                self.inline_block(body, &[])?;
                self.code.pop();
                self.code.push_local(count);
                self.code.push_constant(one);
                self.code.send(minus, 1);
                self.code.store_local(count);
                self.code.pop();
                self.code.jump_back(top);
                self.code.bind(exit);
                self.code.push_special(NIL);
            }
            ("to:do:", [limit, body]) if block(body, 1) => {
                let ExprKind::Block { params, .. } = &body.kind else {
                    return Ok(false);
                };
                let index = self.hidden_local(&params[0], span);
                let bound = self.hidden_local("(limit)", span);
                let at_most = self.known_selector("<=", span)?;
                let plus = self.known_selector("+", span)?;
                let one = self.one(span)?;

                self.expr(receiver)?;
                self.code.store_local(index);
                self.code.pop();
                self.expr(limit)?;
                self.code.store_local(bound);
                self.code.pop();
                let top = self.code.current_offset();
                self.code.push_local(index);
                self.code.push_local(bound);
                self.code.send(at_most, 1);
                let exit = self.code.jump_if_false();
                self.inline_block(body, &[index])?;
                self.code.pop();
                self.code.push_local(index);
                self.code.push_constant(one);
                self.code.send(plus, 1);
                self.code.store_local(index);
                self.code.pop();
                self.code.jump_back(top);
                self.code.bind(exit);
                self.code.push_special(NIL);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Emits the body of an inlined block, leaving its value on the
    /// stack. `bound` holds the slots already assigned to its parameters.
    fn inline_block(&mut self, block: &Expr, bound: &[u8]) -> Result<(), HeapError> {
        let ExprKind::Block {
            params,
            locals,
            body,
        } = &block.kind
        else {
            return self.expr(block);
        };

        let mut scope: Vec<(String, u8)> = params.iter().cloned().zip(bound.iter().copied()).collect();
        for name in locals {
            let slot = self.hidden_local(name, block.span);
            // Block temporaries start out nil on every entry.
            self.code.push_special(Special::Nil as u8);
            self.code.store_local(slot);
            self.code.pop();
            scope.push((name.clone(), slot));
        }
        self.scopes.push(scope);

        let result = self.block_statements(body);
        self.scopes.pop();
        result
    }

    fn block_statements(&mut self, body: &[Expr]) -> Result<(), HeapError> {
        let Some((last, init)) = body.split_last() else {
            self.code.push_special(Special::Nil as u8);
            return Ok(());
        };
        for stmt in init {
            self.expr(stmt)?;
            self.code.pop();
        }
        self.expr(last)
    }
}
