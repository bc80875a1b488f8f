use super::constant::*;
use super::module::*;

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;

/// A named bit-vector net in a [`Module`], created by [`Module::input`], [`Module::output`] or [`Module::wire`].
///
/// Wires are compared and hashed by identity.
#[must_use]
pub struct Wire<'a> {
    pub(crate) module: &'a Module<'a>,

    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) index: usize,

    pub(crate) port_input: bool,
    pub(crate) port_output: bool,
    /// 1-based position in the port list, or 0 for non-port wires.
    pub(crate) port_id: u32,

    pub(crate) init: RefCell<Option<Const>>,
}

impl<'a> Wire<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn module(&self) -> &'a Module<'a> {
        self.module
    }

    pub fn is_input(&self) -> bool {
        self.port_input
    }

    pub fn is_output(&self) -> bool {
        self.port_output
    }

    pub fn is_port(&self) -> bool {
        self.port_id != 0
    }

    /// Internal (tool-generated) names start with `$`.
    pub fn is_public(&self) -> bool {
        !self.name.starts_with('$')
    }

    /// Sets the `init` attribute of this wire, which becomes part of the initial-state predicate when the wire is a register output.
    ///
    /// # Panics
    ///
    /// Panics if `value`'s width doesn't match this wire's width.
    pub fn set_init(&self, value: Const) {
        if value.width() != self.width {
            panic!("Attempted to set an init value of {} bit(s) on wire \"{}\" in module \"{}\", but this wire has {} bit(s).", value.width(), self.name, self.module.name, self.width);
        }
        *self.init.borrow_mut() = Some(value);
    }

    pub fn init(&self) -> Option<Const> {
        self.init.borrow().clone()
    }
}

impl<'a> fmt::Debug for Wire<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wire({}, {})", self.name, self.width)
    }
}

impl<'a> Eq for &'a Wire<'a> {}

impl<'a> Hash for &'a Wire<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(*self as *const _ as usize)
    }
}

impl<'a> PartialEq for &'a Wire<'a> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(*self, *other)
    }
}
