use crate::Value;

/// The bootstrap classes the VM needs by identity.
///
/// **Classes are not allocated here.** The VM allocates them during
/// bootstrap and stores the references; until then every entry is nil.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreClasses {
    /// Root of the hierarchy; its superclass is nil.
    pub object: Value,

    /// Class of every class object, itself included.
    pub class: Value,

    pub method: Value,
    pub array: Value,
    pub string: Value,

    /// Subclass of `String`.
    pub symbol: Value,

    /// Implicit class of tagged integers.
    pub integer: Value,

    /// Reserved for block objects; nothing instantiates it yet.
    pub block: Value,

    // ── implicit classes of the singletons ─────────────────────────
    pub nil: Value,
    pub true_class: Value,
    pub false_class: Value,
}

impl CoreClasses {
    /// Global names, in bootstrap order.
    pub const NAMES: [&'static str; 11] = [
        "Object", "Class", "Method", "Array", "String", "Symbol", "Integer", "Block", "Nil",
        "True", "False",
    ];

    pub fn all(&self) -> [Value; 11] {
        [
            self.object,
            self.class,
            self.method,
            self.array,
            self.string,
            self.symbol,
            self.integer,
            self.block,
            self.nil,
            self.true_class,
            self.false_class,
        ]
    }

    pub fn all_mut(&mut self) -> [&mut Value; 11] {
        [
            &mut self.object,
            &mut self.class,
            &mut self.method,
            &mut self.array,
            &mut self.string,
            &mut self.symbol,
            &mut self.integer,
            &mut self.block,
            &mut self.nil,
            &mut self.true_class,
            &mut self.false_class,
        ]
    }

    /// Entry for a global name, if it names a core class.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Value> {
        let index = Self::NAMES.iter().position(|n| *n == name)?;
        self.all_mut().into_iter().nth(index)
    }

    pub fn is_core(&self, class: Value) -> bool {
        self.all().iter().any(|c| c.identical(class))
    }
}
