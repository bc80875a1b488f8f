use super::constant::*;
use super::module::*;
use super::sig::*;

use std::hash::{Hash, Hasher};
use std::ptr;

/// A primitive cell instance in a [`Module`], created by [`Module::add_cell`].
///
/// Cells are compared and hashed by identity.
#[must_use]
pub struct Cell<'a> {
    pub(crate) module: &'a Module<'a>,

    pub(crate) name: String,
    pub(crate) kind: CellKind<'a>,
}

impl<'a> Cell<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CellKind<'a> {
        &self.kind
    }

    pub fn module(&self) -> &'a Module<'a> {
        self.module
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// The port that carries this cell's value, or `None` for cells that only have side effects.
    pub fn output(&self) -> Option<&SigSpec<'a>> {
        self.kind.output()
    }
}

impl<'a> Eq for &'a Cell<'a> {}

impl<'a> Hash for &'a Cell<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(*self as *const _ as usize)
    }
}

impl<'a> PartialEq for &'a Cell<'a> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(*self, *other)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    ReduceAnd,
    ReduceOr,
    ReduceXor,
    ReduceXnor,
    ReduceBool,
    LogicNot,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Xnor,
    Lt,
    Le,
    Eq,
    Ne,
    Eqx,
    Nex,
    Ge,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Eqx
                | BinaryOp::Nex
                | BinaryOp::Ge
                | BinaryOp::Gt
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Xnor
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShiftOp {
    Shr,
    Shl,
    Sshr,
    Sshl,
    Shift,
    Shiftx,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicOp {
    And,
    Or,
}

/// A `$memrd` read port.
#[derive(Clone, Debug)]
pub struct MemRd<'a> {
    pub memid: String,
    pub abits: u32,
    pub clk: SigSpec<'a>,
    pub clk_enable: bool,
    pub clk_polarity: bool,
    pub transparent: bool,
    pub addr: SigSpec<'a>,
    pub data: SigSpec<'a>,
}

/// A `$memwr` write port. `en` is a per-bit write enable as wide as `data`.
#[derive(Clone, Debug)]
pub struct MemWr<'a> {
    pub memid: String,
    pub abits: u32,
    pub clk: SigSpec<'a>,
    pub clk_enable: bool,
    pub clk_polarity: bool,
    pub priority: i64,
    pub addr: SigSpec<'a>,
    pub data: SigSpec<'a>,
    pub en: SigSpec<'a>,
}

/// A `$meminit` row initializer.
#[derive(Clone, Debug)]
pub struct MemInit<'a> {
    pub memid: String,
    pub abits: u32,
    pub priority: i64,
    pub addr: SigSpec<'a>,
    pub data: SigSpec<'a>,
}

/// A generic multi-port `$mem` cell, as produced by memory collection.
///
/// Per-port signals are concatenated with port 0 in the least significant position.
#[derive(Clone, Debug)]
pub struct MemCell<'a> {
    pub memid: String,
    pub width: u32,
    pub offset: i64,
    pub size: u32,
    pub abits: u32,
    pub init: Const,

    pub wr_ports: u32,
    pub wr_clk_enable: Const,
    pub wr_clk_polarity: Const,
    pub wr_clk: SigSpec<'a>,
    pub wr_addr: SigSpec<'a>,
    pub wr_data: SigSpec<'a>,
    pub wr_en: SigSpec<'a>,

    pub rd_ports: u32,
    pub rd_clk_enable: Const,
    pub rd_clk_polarity: Const,
    pub rd_transparent: Const,
    pub rd_clk: SigSpec<'a>,
    pub rd_addr: SigSpec<'a>,
    pub rd_data: SigSpec<'a>,
}

/// The closed set of primitive cell kinds, each carrying the ports and parameters it needs.
///
/// Operand widths are the widths of the connected signals; signedness is carried explicitly.
#[derive(Clone, Debug)]
pub enum CellKind<'a> {
    Unary {
        op: UnaryOp,
        a: SigSpec<'a>,
        a_signed: bool,
        y: SigSpec<'a>,
    },
    Binary {
        op: BinaryOp,
        a: SigSpec<'a>,
        b: SigSpec<'a>,
        a_signed: bool,
        b_signed: bool,
        y: SigSpec<'a>,
    },
    Shift {
        op: ShiftOp,
        a: SigSpec<'a>,
        b: SigSpec<'a>,
        a_signed: bool,
        b_signed: bool,
        y: SigSpec<'a>,
    },
    Logic {
        op: LogicOp,
        a: SigSpec<'a>,
        b: SigSpec<'a>,
        y: SigSpec<'a>,
    },
    /// `y = s ? b : a`
    Mux {
        a: SigSpec<'a>,
        b: SigSpec<'a>,
        s: SigSpec<'a>,
        y: SigSpec<'a>,
    },
    /// Priority multiplexer: `b` holds `s.width()` cases of `a.width()` bits each.
    Pmux {
        a: SigSpec<'a>,
        b: SigSpec<'a>,
        s: SigSpec<'a>,
        y: SigSpec<'a>,
    },
    Slice {
        a: SigSpec<'a>,
        offset: u32,
        y: SigSpec<'a>,
    },
    /// `y = {b, a}`
    Concat {
        a: SigSpec<'a>,
        b: SigSpec<'a>,
        y: SigSpec<'a>,
    },
    Dff {
        clk: SigSpec<'a>,
        clk_polarity: bool,
        d: SigSpec<'a>,
        q: SigSpec<'a>,
    },
    Adff {
        clk: SigSpec<'a>,
        clk_polarity: bool,
        arst: SigSpec<'a>,
        arst_polarity: bool,
        arst_value: Const,
        d: SigSpec<'a>,
        q: SigSpec<'a>,
    },
    Dffsr {
        clk: SigSpec<'a>,
        clk_polarity: bool,
        set: SigSpec<'a>,
        set_polarity: bool,
        clr: SigSpec<'a>,
        clr_polarity: bool,
        d: SigSpec<'a>,
        q: SigSpec<'a>,
    },
    Dlatch {
        en: SigSpec<'a>,
        en_polarity: bool,
        d: SigSpec<'a>,
        q: SigSpec<'a>,
    },
    MemRd(MemRd<'a>),
    MemWr(MemWr<'a>),
    MemInit(MemInit<'a>),
    Mem(Box<MemCell<'a>>),
    Assert {
        a: SigSpec<'a>,
        en: SigSpec<'a>,
    },
}

impl<'a> CellKind<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            CellKind::Unary { op, .. } => match op {
                UnaryOp::Not => "$not",
                UnaryOp::Neg => "$neg",
                UnaryOp::Pos => "$pos",
                UnaryOp::ReduceAnd => "$reduce_and",
                UnaryOp::ReduceOr => "$reduce_or",
                UnaryOp::ReduceXor => "$reduce_xor",
                UnaryOp::ReduceXnor => "$reduce_xnor",
                UnaryOp::ReduceBool => "$reduce_bool",
                UnaryOp::LogicNot => "$logic_not",
            },
            CellKind::Binary { op, .. } => match op {
                BinaryOp::And => "$and",
                BinaryOp::Or => "$or",
                BinaryOp::Xor => "$xor",
                BinaryOp::Xnor => "$xnor",
                BinaryOp::Lt => "$lt",
                BinaryOp::Le => "$le",
                BinaryOp::Eq => "$eq",
                BinaryOp::Ne => "$ne",
                BinaryOp::Eqx => "$eqx",
                BinaryOp::Nex => "$nex",
                BinaryOp::Ge => "$ge",
                BinaryOp::Gt => "$gt",
                BinaryOp::Add => "$add",
                BinaryOp::Sub => "$sub",
                BinaryOp::Mul => "$mul",
                BinaryOp::Div => "$div",
                BinaryOp::Mod => "$mod",
            },
            CellKind::Shift { op, .. } => match op {
                ShiftOp::Shr => "$shr",
                ShiftOp::Shl => "$shl",
                ShiftOp::Sshr => "$sshr",
                ShiftOp::Sshl => "$sshl",
                ShiftOp::Shift => "$shift",
                ShiftOp::Shiftx => "$shiftx",
            },
            CellKind::Logic { op, .. } => match op {
                LogicOp::And => "$logic_and",
                LogicOp::Or => "$logic_or",
            },
            CellKind::Mux { .. } => "$mux",
            CellKind::Pmux { .. } => "$pmux",
            CellKind::Slice { .. } => "$slice",
            CellKind::Concat { .. } => "$concat",
            CellKind::Dff { .. } => "$dff",
            CellKind::Adff { .. } => "$adff",
            CellKind::Dffsr { .. } => "$dffsr",
            CellKind::Dlatch { .. } => "$dlatch",
            CellKind::MemRd(_) => "$memrd",
            CellKind::MemWr(_) => "$memwr",
            CellKind::MemInit(_) => "$meminit",
            CellKind::Mem(_) => "$mem",
            CellKind::Assert { .. } => "$assert",
        }
    }

    pub fn output(&self) -> Option<&SigSpec<'a>> {
        match self {
            CellKind::Unary { y, .. }
            | CellKind::Binary { y, .. }
            | CellKind::Shift { y, .. }
            | CellKind::Logic { y, .. }
            | CellKind::Mux { y, .. }
            | CellKind::Pmux { y, .. }
            | CellKind::Slice { y, .. }
            | CellKind::Concat { y, .. } => Some(y),
            CellKind::Dff { q, .. }
            | CellKind::Adff { q, .. }
            | CellKind::Dffsr { q, .. }
            | CellKind::Dlatch { q, .. } => Some(q),
            CellKind::MemRd(rd) => Some(&rd.data),
            CellKind::Mem(mem) => Some(&mem.rd_data),
            CellKind::MemWr(_) | CellKind::MemInit(_) | CellKind::Assert { .. } => None,
        }
    }

    pub fn is_register(&self) -> bool {
        matches!(
            self,
            CellKind::Dff { .. } | CellKind::Adff { .. } | CellKind::Dffsr { .. } | CellKind::Dlatch { .. }
        )
    }

    /// The name of the memory this cell accesses, if any.
    pub fn memid(&self) -> Option<&str> {
        match self {
            CellKind::MemRd(rd) => Some(&rd.memid),
            CellKind::MemWr(wr) => Some(&wr.memid),
            CellKind::MemInit(init) => Some(&init.memid),
            CellKind::Mem(mem) => Some(&mem.memid),
            _ => None,
        }
    }
}
