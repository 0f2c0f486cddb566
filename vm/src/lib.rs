//! Runtime for the poplar language.
//!
//! ```text
//!  source ──▶ parser ──▶ compiler ──▶ Method objects ──▶ interpreter
//!                            │                              │
//!                            ▼                              ▼
//!               symbols / literals / globals  ◀──────▶   heap (GC)
//! ```
//!
//! A [`VM`] owns the heap and every table the compiler and interpreter
//! share. Construction bootstraps the core classes and loads the
//! embedded prelude; after that, [`VM::load_source`] installs user
//! classes and [`VM::run_main`] executes `Main>>run`.

pub mod bootstrap;
pub mod compiler;
pub mod dispatch;
pub mod globals;
pub mod interpreter;
pub mod literals;
pub mod output;
pub mod primitives;
pub mod symbols;

use std::fmt;

use heap::{Heap, HeapError, HeapSettings, NoRoots, RootProvider};
use object::{class_layout, CoreClasses, Object, ObjectInit, ObjectSpace, Value};
use parser::ast::ClassDef;
use parser::ParseError;

pub use compiler::{CompileError, Severity};
pub use dispatch::MethodCache;
pub use globals::Globals;
pub use interpreter::{Backtrace, InterpreterState, RuntimeDiagnostic, RuntimeError};
pub use literals::LiteralPool;
pub use output::Output;
pub use primitives::PrimitiveTable;
pub use symbols::SymbolTable;

/// What the interpreter does after a recoverable runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recovery {
    /// Report it, record it, and continue with nil as the result.
    #[default]
    Continue,
    /// Stop execution with the error.
    Abort,
}

#[derive(Debug, Clone)]
pub struct VmSettings {
    pub heap: HeapSettings,
    /// Maximum number of live activations.
    pub max_frames: usize,
    /// Operand stack slots per activation.
    pub stack_size: usize,
    /// Frames shown in a backtrace.
    pub trace_depth: usize,
    pub recovery: Recovery,
}

impl Default for VmSettings {
    fn default() -> Self {
        Self {
            heap: HeapSettings::default(),
            max_frames: 64,
            stack_size: 256,
            trace_depth: 10,
            recovery: Recovery::Continue,
        }
    }
}

impl VmSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        self.heap.validate()?;
        if self.max_frames == 0 {
            return Err("max_frames must be > 0");
        }
        if self.stack_size == 0 {
            return Err("stack_size must be > 0");
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum VmError {
    Io(std::io::Error),
    Parse(Vec<ParseError>),
    Compile(Vec<CompileError>),
    /// No `Main` class, or no zero-argument `run` on it.
    MissingEntry(String),
    Runtime {
        error: RuntimeError,
        trace: Backtrace,
    },
    Heap(HeapError),
    InvalidSettings(&'static str),
}

impl VmError {
    /// Runtime errors end the process differently from load errors.
    pub fn is_runtime(&self) -> bool {
        matches!(self, VmError::Runtime { .. } | VmError::Heap(_))
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Io(err) => write!(f, "io error: {err}"),
            VmError::Parse(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "parse error: {err}")?;
                }
                Ok(())
            }
            VmError::Compile(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
            VmError::MissingEntry(what) => write!(f, "missing entry point: {what}"),
            VmError::Runtime { error, trace } => write!(f, "error: {error}\n{trace}"),
            VmError::Heap(err) => write!(f, "heap error: {err}"),
            VmError::InvalidSettings(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VmError::Io(err) => Some(err),
            VmError::Heap(err) => Some(err),
            VmError::Runtime { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VmError {
    fn from(err: std::io::Error) -> Self {
        VmError::Io(err)
    }
}

impl From<HeapError> for VmError {
    fn from(err: HeapError) -> Self {
        VmError::Heap(err)
    }
}

/// The runtime: heap, shared tables and output channels.
pub struct VM {
    pub heap: Heap,
    pub settings: VmSettings,
    pub core: CoreClasses,
    pub symbols: SymbolTable,
    pub globals: Globals,
    pub literals: LiteralPool,
    pub cache: MethodCache,
    pub primitives: PrimitiveTable,
    /// Values under construction that must survive an allocation.
    pub scratch: Vec<Value>,
    /// Program output (`print`, `println`).
    pub output: Output,
    /// Runtime error reports.
    pub errors: Output,
    /// Recoverable runtime errors seen so far.
    pub diagnostics: Vec<RuntimeDiagnostic>,
    /// Compile warnings from every load.
    pub warnings: Vec<CompileError>,
    /// Set while the prelude loads; allows reopening core classes.
    pub(crate) loading_prelude: bool,
}

/// Split borrow of every VM-owned root, plus whatever the caller adds
/// (usually the interpreter's frames).
pub(crate) struct VmRoots<'a> {
    core: &'a mut CoreClasses,
    symbols: &'a mut SymbolTable,
    globals: &'a mut Globals,
    literals: &'a mut LiteralPool,
    cache: &'a mut MethodCache,
    scratch: &'a mut Vec<Value>,
    extra: &'a mut dyn RootProvider,
}

impl RootProvider for VmRoots<'_> {
    fn visit_roots(&mut self, visitor: &mut dyn FnMut(&mut Value)) {
        for class in self.core.all_mut() {
            visitor(class);
        }
        self.symbols.visit_mut(visitor);
        self.globals.visit_mut(visitor);
        self.literals.visit_mut(visitor);
        self.cache.visit_mut(visitor);
        for value in self.scratch.iter_mut() {
            visitor(value);
        }
        self.extra.visit_roots(visitor);
    }
}

impl VM {
    /// Creates a VM with the core classes and the prelude loaded.
    pub fn new(settings: VmSettings) -> Result<Self, VmError> {
        settings.validate().map_err(VmError::InvalidSettings)?;
        let heap = Heap::new(settings.heap)?;
        let mut vm = VM {
            heap,
            settings,
            core: CoreClasses::default(),
            symbols: SymbolTable::new(),
            globals: Globals::new(),
            literals: LiteralPool::new(),
            cache: MethodCache::new(),
            primitives: PrimitiveTable::default(),
            scratch: Vec::new(),
            output: Output::Stdout,
            errors: Output::Stderr,
            diagnostics: Vec::new(),
            warnings: Vec::new(),
            loading_prelude: false,
        };
        bootstrap::bootstrap(&mut vm)?;
        Ok(vm)
    }

    // ── allocation ─────────────────────────────────────────────────

    /// Allocates with only the VM's own tables as roots.
    pub fn allocate(&mut self, init: ObjectInit) -> Result<Value, HeapError> {
        self.allocate_with(init, &mut NoRoots)
    }

    /// Allocates with the VM's tables and `extra` as roots.
    pub fn allocate_with(
        &mut self,
        init: ObjectInit,
        extra: &mut dyn RootProvider,
    ) -> Result<Value, HeapError> {
        let VM {
            heap,
            core,
            symbols,
            globals,
            literals,
            cache,
            scratch,
            ..
        } = self;
        let mut roots = VmRoots {
            core,
            symbols,
            globals,
            literals,
            cache,
            scratch,
            extra,
        };
        heap.allocate(init, &mut roots).map(Value::object)
    }

    pub fn collect_garbage(&mut self, extra: &mut dyn RootProvider) {
        let VM {
            heap,
            core,
            symbols,
            globals,
            literals,
            cache,
            scratch,
            ..
        } = self;
        let mut roots = VmRoots {
            core,
            symbols,
            globals,
            literals,
            cache,
            scratch,
            extra,
        };
        heap.collect(&mut roots);
    }

    pub fn intern(&mut self, name: &str) -> Result<Value, HeapError> {
        self.intern_with(name, &mut NoRoots)
    }

    /// Canonical symbol for `name`, allocating it on first use.
    pub fn intern_with(
        &mut self,
        name: &str,
        extra: &mut dyn RootProvider,
    ) -> Result<Value, HeapError> {
        if let Some(symbol) = self.symbols.get(name) {
            return Ok(symbol);
        }
        let symbol = self.allocate_with(ObjectInit::symbol(self.core.symbol, name), extra)?;
        self.symbols.insert(name, symbol);
        Ok(symbol)
    }

    pub fn new_string(
        &mut self,
        text: &str,
        extra: &mut dyn RootProvider,
    ) -> Result<Value, HeapError> {
        self.allocate_with(ObjectInit::string(self.core.string, text), extra)
    }

    /// Creates a class whose instances have one field per entry of
    /// `fields` (inherited names first).
    pub fn create_class(
        &mut self,
        name: &str,
        superclass: Value,
        fields: &[String],
    ) -> Result<Value, HeapError> {
        let mark = self.scratch.len();
        let result = self.build_class(name, superclass, fields);
        self.scratch.truncate(mark);
        result
    }

    fn build_class(
        &mut self,
        name: &str,
        superclass: Value,
        fields: &[String],
    ) -> Result<Value, HeapError> {
        let name_symbol = self.intern(name)?;
        let mut field_symbols = Vec::with_capacity(fields.len());
        for field in fields {
            field_symbols.push(self.intern(field)?);
        }
        let ivars = self.allocate(ObjectInit::array(self.core.array, field_symbols))?;
        self.scratch.push(ivars);
        let methods = self.allocate(ObjectInit::array(self.core.array, Vec::new()))?;
        self.scratch.push(methods);
        self.allocate(ObjectInit::class(
            self.core.class,
            name_symbol,
            superclass,
            methods,
            ivars,
            fields.len(),
        ))
    }

    // ── object views ───────────────────────────────────────────────

    #[inline]
    pub fn object(&self, value: Value) -> Option<&Object> {
        self.heap.object(value)
    }

    pub fn is_class(&self, value: Value) -> bool {
        self.object(value).is_some_and(Object::is_class)
    }

    /// Text of a string or symbol.
    pub fn text_of(&self, value: Value) -> Option<&str> {
        self.object(value)?.as_str()
    }

    /// Class of any value; integers and the singletons have implicit
    /// classes.
    pub fn class_of(&self, value: Value) -> Value {
        match value {
            Value::Int(_) => self.core.integer,
            Value::Special(object::Special::Nil) => self.core.nil,
            Value::Special(object::Special::True) => self.core.true_class,
            Value::Special(object::Special::False) => self.core.false_class,
            Value::Object(_) => self.object(value).map_or(Value::NIL, Object::class),
        }
    }

    pub fn class_name(&self, class: Value) -> String {
        self.object(class)
            .and_then(|c| self.text_of(c.class_name()))
            .unwrap_or("?")
            .to_owned()
    }

    /// Field names of `class`, inherited ones first.
    pub fn field_names(&self, class: Value) -> Vec<String> {
        let Some(ivars) = self.object(class).map(Object::ivar_names) else {
            return Vec::new();
        };
        let Some(array) = self.object(ivars) else {
            return Vec::new();
        };
        array
            .fields
            .iter()
            .map(|&name| self.text_of(name).unwrap_or("?").to_owned())
            .collect()
    }

    /// Text written by `print`: strings and symbols as their text,
    /// classes by name, other objects as `a ClassName`.
    pub fn print_string(&self, value: Value) -> String {
        match value {
            Value::Int(n) => n.to_string(),
            Value::Special(s) => s.name().to_owned(),
            Value::Object(id) => match self.object(value) {
                Some(obj) if obj.is_string_like() => obj.as_str().unwrap_or_default().to_owned(),
                Some(obj) if obj.is_class() => self.class_name(value),
                Some(obj) => format!("a {}", self.class_name(obj.class())),
                None => format!("<dangling {id}>"),
            },
        }
    }

    // ── methods ────────────────────────────────────────────────────

    /// Method lookup through the cache, falling back to the superclass
    /// scan.
    pub fn find_method(&mut self, class: Value, selector: Value) -> Option<Value> {
        let (Some(class_id), Some(selector_id)) = (class.to_object(), selector.to_object()) else {
            return None;
        };
        if let Some(method) = self.cache.get(class_id, selector_id) {
            return Some(method);
        }
        let method = object::lookup(&self.heap, class, selector)?;
        self.cache.insert(class_id, selector_id, method);
        Some(method)
    }

    /// Adds `method` to `class`, replacing a method with the same
    /// selector. The method array is copied, never grown in place.
    pub fn install_method(&mut self, class: Value, method: Value) -> Result<(), HeapError> {
        let Some(selector) = self.object(method).map(Object::selector) else {
            return Ok(());
        };
        let Some(old) = self.object(class).map(Object::methods) else {
            return Ok(());
        };
        let mut entries: Vec<Value> = self
            .object(old)
            .map(|array| array.fields.to_vec())
            .unwrap_or_default();
        let existing = entries
            .iter()
            .position(|&m| self.object(m).is_some_and(|m| m.selector().identical(selector)));
        match existing {
            Some(i) => entries[i] = method,
            None => entries.push(method),
        }

        self.scratch.push(method);
        let copied = self.allocate(ObjectInit::array(self.core.array, entries));
        self.scratch.pop();
        let copied = copied?;

        if let Some(class_obj) = self.heap.object_mut(class) {
            class_obj.set_field(class_layout::METHODS, copied);
        }
        self.cache.flush();
        log::debug!(
            "installed {}>>{}",
            self.class_name(class),
            self.text_of(selector).unwrap_or("?")
        );
        Ok(())
    }

    // ── loading ────────────────────────────────────────────────────

    /// Parses and compiles every class in `source`, in order.
    pub fn load_source(&mut self, source: &str) -> Result<Vec<Value>, VmError> {
        let parsed = parser::parse_source(source);
        if !parsed.is_ok() {
            return Err(VmError::Parse(parsed.errors));
        }
        self.load_classes(&parsed.classes)
    }

    /// Compiles already-parsed classes. Warnings are logged and kept in
    /// `self.warnings`; any error fails the load once all classes are
    /// compiled.
    pub fn load_classes(&mut self, classes: &[ClassDef]) -> Result<Vec<Value>, VmError> {
        let mut diagnostics = Vec::new();
        let loaded = compiler::load_classes(self, classes, &mut diagnostics)?;
        let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
            .into_iter()
            .partition(|d| d.severity == Severity::Error);
        for warning in warnings {
            log::warn!("{warning}");
            self.warnings.push(warning);
        }
        if !errors.is_empty() {
            return Err(VmError::Compile(errors));
        }
        Ok(loaded)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> VM {
        VM::new(VmSettings::default()).expect("bootstrap")
    }

    #[test]
    fn core_classes_are_bound_globally() {
        let vm = vm();
        for name in CoreClasses::NAMES {
            let class = vm.global(name).unwrap_or_else(|| panic!("{name} is bound"));
            assert!(vm.is_class(class), "{name} is a class");
            assert_eq!(vm.class_name(class), name);
            assert_eq!(vm.class_of(class), vm.core.class, "{name}'s class is Class");
        }
    }

    #[test]
    fn implicit_classes() {
        let vm = vm();
        assert_eq!(vm.class_of(Value::int(3)), vm.core.integer);
        assert_eq!(vm.class_of(Value::NIL), vm.core.nil);
        assert_eq!(vm.class_of(Value::TRUE), vm.core.true_class);
        assert_eq!(vm.class_of(Value::FALSE), vm.core.false_class);
    }

    #[test]
    fn symbols_are_interned() {
        let mut vm = vm();
        let a = vm.intern("fooBar:").unwrap();
        let b = vm.intern("fooBar:").unwrap();
        assert!(a.identical(b));
        assert_eq!(vm.class_of(a), vm.core.symbol);
        assert_eq!(vm.text_of(a), Some("fooBar:"));
    }

    #[test]
    fn prelude_methods_resolve_through_the_chain() {
        let mut vm = vm();
        let println = vm.intern("println").unwrap();
        let plus = vm.intern("+").unwrap();
        assert!(vm.find_method(vm.core.integer, plus).is_some());
        assert!(vm.find_method(vm.core.integer, println).is_some(), "inherited from Object");
        assert!(vm.find_method(vm.core.symbol, vm.symbols.get("size").unwrap()).is_some(), "Symbol < String");
        assert!(vm.find_method(vm.core.object, plus).is_none());
    }

    #[test]
    fn install_replaces_same_selector_and_flushes_cache() {
        let mut vm = vm();
        vm.load_source("Foo = ( bar = ( ^1 ) )").unwrap();
        let foo = vm.global("Foo").unwrap();
        let bar = vm.intern("bar").unwrap();
        let first = vm.find_method(foo, bar).unwrap();
        assert!(!vm.cache.is_empty());

        let methods_before = vm.object(foo).unwrap().methods();
        let replacement = vm
            .allocate(ObjectInit::method(
                vm.core.method,
                object::MethodSpec {
                    selector: bar,
                    holder: foo,
                    num_args: 0,
                    num_locals: 0,
                    primitive: None,
                    bytecode: vec![],
                },
            ))
            .unwrap();
        vm.install_method(foo, replacement).unwrap();

        assert!(vm.cache.is_empty(), "install flushes the cache");
        let methods_after = vm.object(foo).unwrap().methods();
        assert_ne!(methods_before, methods_after, "method array is copied");
        assert_eq!(vm.object(methods_after).unwrap().field_count(), 1);
        let found = vm.find_method(foo, bar).unwrap();
        assert_ne!(found, first);
        assert_eq!(found, replacement);
    }

    #[test]
    fn print_strings() {
        let mut vm = vm();
        let s = vm.new_string("hi", &mut NoRoots).unwrap();
        assert_eq!(vm.print_string(s), "hi");
        assert_eq!(vm.print_string(Value::int(-4)), "-4");
        assert_eq!(vm.print_string(Value::NIL), "nil");
        assert_eq!(vm.print_string(vm.core.integer), "Integer");
        let arr = vm.allocate(ObjectInit::array(vm.core.array, vec![])).unwrap();
        assert_eq!(vm.print_string(arr), "a Array");
    }

    #[test]
    fn tables_survive_collection() {
        let mut vm = vm();
        let sym = vm.intern("survivor").unwrap();
        vm.collect_garbage(&mut NoRoots);
        let before = vm.heap.live_objects();
        let _garbage = vm.allocate(ObjectInit::instance(vm.core.object, 3)).unwrap();
        vm.collect_garbage(&mut NoRoots);
        assert_eq!(vm.heap.live_objects(), before, "only the unrooted instance is freed");
        assert_eq!(vm.text_of(sym), Some("survivor"));
        let integer = vm.global("Integer").unwrap();
        assert_eq!(vm.class_name(integer), "Integer");
    }

    #[test]
    fn settings_are_validated() {
        let settings = VmSettings {
            max_frames: 0,
            ..VmSettings::default()
        };
        assert!(matches!(VM::new(settings), Err(VmError::InvalidSettings(_))));
    }
}
