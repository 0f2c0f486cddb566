use crate::{Object, Value};

/// Read access to the objects behind handles.
pub trait ObjectSpace {
    fn object(&self, value: Value) -> Option<&Object>;
}

/// Walks the superclass chain of `class` looking for `selector`.
///
/// Each class's method array is scanned linearly and selectors compare by
/// identity. Returns the method, or `None` once the root is passed.
pub fn lookup<S: ObjectSpace + ?Sized>(space: &S, class: Value, selector: Value) -> Option<Value> {
    let mut current = class;
    while let Some(cls) = space.object(current).filter(|o| o.is_class()) {
        if let Some(method) = find_local(space, cls, selector) {
            return Some(method);
        }
        current = cls.superclass();
    }
    None
}

/// Method defined directly on `class`, ignoring superclasses.
pub fn find_local<S: ObjectSpace + ?Sized>(space: &S, class: &Object, selector: Value) -> Option<Value> {
    let methods = space.object(class.methods())?;
    methods.fields.iter().copied().find(|&m| {
        space
            .object(m)
            .is_some_and(|method| method.selector().identical(selector))
    })
}

/// Reflexive: every class is a subclass of itself.
pub fn is_subclass_of<S: ObjectSpace + ?Sized>(space: &S, class: Value, ancestor: Value) -> bool {
    let mut current = class;
    loop {
        if current.identical(ancestor) {
            return true;
        }
        match space.object(current).filter(|o| o.is_class()) {
            Some(cls) => current = cls.superclass(),
            None => return false,
        }
    }
}
