//! Core class creation and the built-in prelude.
//!
//! Bootstrap order matters: class shells come first so that symbols,
//! arrays and the `Class` class exist before anything refers to them.

use object::{class_layout, CoreClasses, ObjectInit, Value};

use crate::{VmError, VM};

/// Prelude source, compiled into every VM.
pub const PRELUDE: &str = include_str!("core.som");

/// Superclass of each core class; `None` marks the root.
const HIERARCHY: [(&str, Option<&str>); 11] = [
    ("Object", None),
    ("Class", Some("Object")),
    ("Method", Some("Object")),
    ("Array", Some("Object")),
    ("String", Some("Object")),
    ("Symbol", Some("String")),
    ("Integer", Some("Object")),
    ("Block", Some("Object")),
    ("Nil", Some("Object")),
    ("True", Some("Object")),
    ("False", Some("Object")),
];

fn core_class(core: &CoreClasses, name: &str) -> Value {
    CoreClasses::NAMES
        .iter()
        .position(|n| *n == name)
        .map_or(Value::NIL, |i| core.all()[i])
}

pub fn bootstrap(vm: &mut VM) -> Result<(), VmError> {
    for name in CoreClasses::NAMES {
        let shell = vm.allocate(ObjectInit::class(
            Value::NIL,
            Value::NIL,
            Value::NIL,
            Value::NIL,
            Value::NIL,
            0,
        ))?;
        if let Some(slot) = vm.core.by_name_mut(name) {
            *slot = shell;
        }
    }

    // Every class is an instance of Class, Class included.
    let metaclass = vm.core.class;
    for class in vm.core.all() {
        if let Some(obj) = vm.heap.object_mut(class) {
            obj.header.class = metaclass;
        }
    }

    let empty = vm.allocate(ObjectInit::array(vm.core.array, Vec::new()))?;
    vm.scratch.push(empty);
    let wired = wire_core_classes(vm, empty);
    vm.scratch.pop();
    wired?;

    vm.loading_prelude = true;
    let loaded = vm.load_source(PRELUDE);
    vm.loading_prelude = false;
    loaded?;

    log::debug!(
        "bootstrap: {} globals, {} symbols, {} live objects",
        vm.globals.len(),
        vm.symbols.len(),
        vm.heap.live_objects()
    );
    Ok(())
}

/// Names, superclass links and empty method tables; binds each class
/// under its name. The shared `empty` array is never mutated since
/// method installation copies.
fn wire_core_classes(vm: &mut VM, empty: Value) -> Result<(), VmError> {
    for (name, superclass) in HIERARCHY {
        let class = core_class(&vm.core, name);
        let superclass = superclass.map_or(Value::NIL, |s| core_class(&vm.core, s));
        let symbol = vm.intern(name)?;
        if let Some(obj) = vm.heap.object_mut(class) {
            obj.set_field(class_layout::NAME, symbol);
            obj.set_field(class_layout::SUPERCLASS, superclass);
            obj.set_field(class_layout::METHODS, empty);
            obj.set_field(class_layout::IVAR_NAMES, empty);
            obj.set_field(class_layout::INSTANCE_SIZE, Value::int(0));
        }
        vm.globals
            .set(name, symbol, class)
            .map_err(|_| VmError::MissingEntry(format!("no global slot for {name}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VmSettings;
    use object::is_subclass_of;

    #[test]
    fn hierarchy_is_wired() {
        let vm = VM::new(VmSettings::default()).unwrap();
        let object = vm.core.object;
        assert!(vm.object(object).unwrap().superclass().is_nil(), "Object is the root");
        for class in vm.core.all() {
            assert!(is_subclass_of(&vm.heap, class, object));
        }
        assert!(is_subclass_of(&vm.heap, vm.core.symbol, vm.core.string));
        assert!(!is_subclass_of(&vm.heap, vm.core.string, vm.core.symbol));
    }

    #[test]
    fn prelude_loads_without_warnings() {
        let vm = VM::new(VmSettings::default()).unwrap();
        assert!(vm.warnings.is_empty(), "{:?}", vm.warnings);
        assert!(!vm.literals.is_empty());
    }
}
