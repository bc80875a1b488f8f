use super::cell::*;
use super::memory::*;
use super::module::*;
use super::wire::*;

use typed_arena::Arena;

use std::cell::RefCell;

/// A top-level container/owner object for a netlist design.
///
/// A `Context` owns every [`Module`], [`Wire`], [`Cell`] and [`Memory`] in a design, and provides an API for creating [`Module`] objects.
///
/// # Examples
///
/// ```
/// use rtlsmv::*;
///
/// let c = Context::new();
///
/// let m = c.module("top");
/// m.connect(m.output("out", 1), m.input("in", 1));
/// ```
#[must_use]
pub struct Context<'a> {
    pub(super) module_arena: Arena<Module<'a>>,
    pub(super) wire_arena: Arena<Wire<'a>>,
    pub(super) cell_arena: Arena<Cell<'a>>,
    pub(super) memory_arena: Arena<Memory<'a>>,

    pub(super) modules: RefCell<Vec<&'a Module<'a>>>,
}

impl<'a> Context<'a> {
    /// Creates a new, empty `Context`.
    pub fn new() -> Context<'a> {
        Context {
            module_arena: Arena::new(),
            wire_arena: Arena::new(),
            cell_arena: Arena::new(),
            memory_arena: Arena::new(),

            modules: RefCell::new(Vec::new()),
        }
    }

    /// Creates a new [`Module`] called `name` in this `Context`.
    ///
    /// # Panics
    ///
    /// Panics if a [`Module`] with the same `name` already exists in this `Context`.
    ///
    /// # Examples
    ///
    /// The following example panics by creating a `Module` with the same `name` as a previously-created `Module` in the same `Context`:
    ///
    /// ```should_panic
    /// use rtlsmv::*;
    ///
    /// let c = Context::new();
    ///
    /// let _ = c.module("a"); // Unique name, OK
    /// let _ = c.module("b"); // Unique name, OK
    ///
    /// let _ = c.module("a"); // Non-unique name, panic!
    /// ```
    pub fn module(&'a self, name: impl Into<String>) -> &'a Module<'a> {
        let name = name.into();
        if self.module_by_name(&name).is_some() {
            panic!("A module called \"{}\" already exists in this context.", name);
        }
        let module = self.module_arena.alloc(Module::new(self, name));
        self.modules.borrow_mut().push(module);
        module
    }

    /// All modules, in creation order.
    pub fn modules(&self) -> Vec<&'a Module<'a>> {
        self.modules.borrow().clone()
    }

    pub fn module_by_name(&self, name: &str) -> Option<&'a Module<'a>> {
        self.modules
            .borrow()
            .iter()
            .copied()
            .find(|m| m.name() == name)
    }
}

impl<'a> Default for Context<'a> {
    fn default() -> Self {
        Context::new()
    }
}
