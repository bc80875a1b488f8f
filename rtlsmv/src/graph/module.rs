use super::cell::*;
use super::context::*;
use super::memory::*;
use super::sig::*;
use super::wire::*;

use std::cell::RefCell;
use std::ptr;

/// A netlist module: wires, cells, memories and the connections between them, created by the [`Context`]::[`module`] method.
///
/// Wires, cells and memories are kept in creation order. Emitters that need a stable order sort by name.
///
/// # Examples
///
/// ```
/// use rtlsmv::*;
///
/// let c = Context::new();
///
/// let m = c.module("counter");
/// let clk = m.input("clk", 1);
/// let q = m.output("q", 8);
/// let d = m.wire("$add$y", 8);
/// m.add_cell(
///     "$add$1",
///     CellKind::Binary {
///         op: BinaryOp::Add,
///         a: q.into(),
///         b: Const::from_u64(1, 8).into(),
///         a_signed: false,
///         b_signed: false,
///         y: d.into(),
///     },
/// );
/// m.add_cell(
///     "$dff$2",
///     CellKind::Dff {
///         clk: clk.into(),
///         clk_polarity: true,
///         d: d.into(),
///         q: q.into(),
///     },
/// );
/// ```
///
/// [`module`]: ./struct.Context.html#method.module
#[must_use]
pub struct Module<'a> {
    context: &'a Context<'a>,

    pub(crate) name: String,

    pub(crate) wires: RefCell<Vec<&'a Wire<'a>>>,
    pub(crate) cells: RefCell<Vec<&'a Cell<'a>>>,
    pub(crate) memories: RefCell<Vec<&'a Memory<'a>>>,
    pub(crate) connections: RefCell<Vec<(SigSpec<'a>, SigSpec<'a>)>>,
    pub(crate) processes: RefCell<Vec<String>>,

    pub(crate) top: RefCell<bool>,
    pub(crate) blackbox: RefCell<bool>,
    next_port_id: RefCell<u32>,
}

impl<'a> Module<'a> {
    pub(super) fn new(context: &'a Context<'a>, name: String) -> Module<'a> {
        Module {
            context,

            name,

            wires: RefCell::new(Vec::new()),
            cells: RefCell::new(Vec::new()),
            memories: RefCell::new(Vec::new()),
            connections: RefCell::new(Vec::new()),
            processes: RefCell::new(Vec::new()),

            top: RefCell::new(false),
            blackbox: RefCell::new(false),
            next_port_id: RefCell::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates an input port [`Wire`] called `name` with `width` bits.
    ///
    /// Ports are numbered in creation order, inputs and outputs sharing one sequence.
    ///
    /// # Panics
    ///
    /// Panics if a wire with the same `name` already exists in this `Module`, or if `width` is 0.
    pub fn input(&'a self, name: impl Into<String>, width: u32) -> &'a Wire<'a> {
        self.port(name, width, true, false)
    }

    /// Creates an output port [`Wire`] called `name` with `width` bits.
    ///
    /// # Panics
    ///
    /// Panics if a wire with the same `name` already exists in this `Module`, or if `width` is 0.
    pub fn output(&'a self, name: impl Into<String>, width: u32) -> &'a Wire<'a> {
        self.port(name, width, false, true)
    }

    /// Creates a port [`Wire`] with explicit direction flags. A wire with both flags set is an inout port.
    pub fn port(
        &'a self,
        name: impl Into<String>,
        width: u32,
        input: bool,
        output: bool,
    ) -> &'a Wire<'a> {
        let port_id = if input || output {
            let mut next_port_id = self.next_port_id.borrow_mut();
            let port_id = *next_port_id;
            *next_port_id += 1;
            port_id
        } else {
            0
        };
        self.alloc_wire(name.into(), width, input, output, port_id)
    }

    /// Creates an internal (non-port) [`Wire`] called `name` with `width` bits.
    ///
    /// # Panics
    ///
    /// Panics if a wire with the same `name` already exists in this `Module`, or if `width` is 0.
    pub fn wire(&'a self, name: impl Into<String>, width: u32) -> &'a Wire<'a> {
        self.alloc_wire(name.into(), width, false, false, 0)
    }

    fn alloc_wire(
        &'a self,
        name: String,
        width: u32,
        port_input: bool,
        port_output: bool,
        port_id: u32,
    ) -> &'a Wire<'a> {
        if width == 0 {
            panic!(
                "Cannot create wire \"{}\" in module \"{}\" with 0 bit(s).",
                name, self.name
            );
        }
        if self.wire_by_name(&name).is_some() {
            panic!(
                "A wire called \"{}\" already exists in module \"{}\".",
                name, self.name
            );
        }
        let index = self.wires.borrow().len();
        let wire = self.context.wire_arena.alloc(Wire {
            module: self,

            name,
            width,
            index,

            port_input,
            port_output,
            port_id,

            init: RefCell::new(None),
        });
        self.wires.borrow_mut().push(wire);
        wire
    }

    /// Declares a [`Memory`] called `name` holding `size` words of `width` bits, addressed starting at `start_offset`.
    ///
    /// # Panics
    ///
    /// Panics if a memory with the same `name` already exists in this `Module`, or if `width` or `size` is 0.
    pub fn memory(
        &'a self,
        name: impl Into<String>,
        width: u32,
        size: u32,
        start_offset: i64,
    ) -> &'a Memory<'a> {
        let name = name.into();
        if width == 0 || size == 0 {
            panic!(
                "Cannot create memory \"{}\" in module \"{}\" with {} word(s) of {} bit(s).",
                name, self.name, size, width
            );
        }
        if self.memory_by_name(&name).is_some() {
            panic!(
                "A memory called \"{}\" already exists in module \"{}\".",
                name, self.name
            );
        }
        let memory = self.context.memory_arena.alloc(Memory {
            module: self,

            name,
            width,
            size,
            start_offset,
        });
        self.memories.borrow_mut().push(memory);
        memory
    }

    /// Adds a [`Cell`] called `name` to this `Module`.
    ///
    /// # Panics
    ///
    /// Panics if a cell with the same `name` already exists in this `Module`.
    pub fn add_cell(&'a self, name: impl Into<String>, kind: CellKind<'a>) -> &'a Cell<'a> {
        let name = name.into();
        if self.cell_by_name(&name).is_some() {
            panic!(
                "A cell called \"{}\" already exists in module \"{}\".",
                name, self.name
            );
        }
        let cell = self.context.cell_arena.alloc(Cell {
            module: self,

            name,
            kind,
        });
        self.cells.borrow_mut().push(cell);
        cell
    }

    /// Connects `lhs` to `rhs`, making every bit of `lhs` an alias of the corresponding bit of `rhs`.
    ///
    /// # Panics
    ///
    /// Panics if `lhs` and `rhs` have different widths.
    pub fn connect(&self, lhs: impl Into<SigSpec<'a>>, rhs: impl Into<SigSpec<'a>>) {
        let lhs = lhs.into();
        let rhs = rhs.into();
        if lhs.width() != rhs.width() {
            panic!(
                "Attempted to connect \"{}\" ({} bit(s)) to \"{}\" ({} bit(s)) in module \"{}\", but their widths differ.",
                lhs,
                lhs.width(),
                rhs,
                rhs.width(),
                self.name
            );
        }
        self.connections.borrow_mut().push((lhs, rhs));
    }

    /// Records a behavioral process. Processes must be lowered to cells before a module can be dumped.
    pub fn add_process(&self, name: impl Into<String>) {
        self.processes.borrow_mut().push(name.into());
    }

    pub fn set_top(&self, top: bool) {
        *self.top.borrow_mut() = top;
    }

    pub fn is_top(&self) -> bool {
        *self.top.borrow()
    }

    /// Marks this module as an external cell library entry with no body to dump.
    pub fn set_blackbox(&self, blackbox: bool) {
        *self.blackbox.borrow_mut() = blackbox;
    }

    pub fn is_blackbox(&self) -> bool {
        *self.blackbox.borrow()
    }

    pub fn wires(&self) -> Vec<&'a Wire<'a>> {
        self.wires.borrow().clone()
    }

    pub fn cells(&self) -> Vec<&'a Cell<'a>> {
        self.cells.borrow().clone()
    }

    pub fn memories(&self) -> Vec<&'a Memory<'a>> {
        self.memories.borrow().clone()
    }

    pub fn connections(&self) -> Vec<(SigSpec<'a>, SigSpec<'a>)> {
        self.connections.borrow().clone()
    }

    pub fn processes(&self) -> Vec<String> {
        self.processes.borrow().clone()
    }

    pub fn wire_by_name(&self, name: &str) -> Option<&'a Wire<'a>> {
        self.wires.borrow().iter().copied().find(|w| w.name == name)
    }

    pub fn cell_by_name(&self, name: &str) -> Option<&'a Cell<'a>> {
        self.cells.borrow().iter().copied().find(|c| c.name == name)
    }

    pub fn memory_by_name(&self, name: &str) -> Option<&'a Memory<'a>> {
        self.memories
            .borrow()
            .iter()
            .copied()
            .find(|m| m.name == name)
    }

    /// Removes `cell` from this module's cell list. The cell's storage stays owned by the [`Context`].
    pub fn remove_cell(&self, cell: &'a Cell<'a>) {
        self.cells.borrow_mut().retain(|c| !ptr::eq(*c, cell));
    }

    pub fn remove_memory(&self, memory: &'a Memory<'a>) {
        self.memories.borrow_mut().retain(|m| !ptr::eq(*m, memory));
    }
}
