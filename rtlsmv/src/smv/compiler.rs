use super::ir::*;
use super::producers::*;

use crate::error::*;
use crate::graph;

use tracing::{debug, trace};

use std::collections::{BTreeMap, HashMap};

enum CellState {
    InProgress,
    Done(Option<Value>),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Conversion {
    Word1,
    Bool,
    NonZero,
    Resize(u32),
}

#[derive(Clone, Copy)]
enum RegisterReset<'s, 'a> {
    None,
    Async {
        arst: &'s graph::SigSpec<'a>,
        polarity: bool,
        value: &'s graph::Const,
    },
    SetClear {
        set: &'s graph::SigSpec<'a>,
        set_polarity: bool,
        clr: &'s graph::SigSpec<'a>,
        clr_polarity: bool,
    },
}

/// Memoized translation of one module's signals and cells into numbered definitions.
pub(crate) struct Compiler<'a> {
    module: &'a graph::Module<'a>,
    sigmap: graph::SigMap<'a>,
    producers: ProducerIndex<'a>,

    state_vars: HashMap<&'a graph::Wire<'a>, Value>,
    cell_values: HashMap<&'a graph::Cell<'a>, CellState>,
    signal_values: HashMap<graph::SigSpec<'a>, Value>,
    conversions: HashMap<(Expr, Conversion), Value>,
    pending_writes: BTreeMap<String, Vec<(Expr, Expr)>>,

    pub assignments: AssignmentContext,
}

impl<'a> Compiler<'a> {
    pub fn new(
        module: &'a graph::Module<'a>,
        sigmap: graph::SigMap<'a>,
        producers: ProducerIndex<'a>,
    ) -> Compiler<'a> {
        Compiler {
            module,
            sigmap,
            producers,

            state_vars: HashMap::new(),
            cell_values: HashMap::new(),
            signal_values: HashMap::new(),
            conversions: HashMap::new(),
            pending_writes: BTreeMap::new(),

            assignments: AssignmentContext::new(),
        }
    }

    fn consistency(&self, message: impl Into<String>) -> Error {
        Error::consistency(self.module.name(), message)
    }

    /// Registers `wire` as a declared state variable and returns its value.
    pub fn declare_state_var(&mut self, wire: &'a graph::Wire<'a>) -> Value {
        let value = Value {
            expr: Expr::Ref {
                name: quoted_name(wire.name()),
            },
            domain: Domain::for_context(wire.width(), false),
        };
        self.state_vars.insert(wire, value.clone());
        value
    }

    pub fn state_var(&self, wire: &'a graph::Wire<'a>) -> Option<&Value> {
        self.state_vars.get(&wire)
    }

    pub fn is_register_wire(&self, wire: &'a graph::Wire<'a>) -> bool {
        self.producers.is_register_wire(wire)
    }

    pub fn temp(&mut self, expr: Expr, domain: Domain) -> Value {
        Value {
            expr: self.assignments.gen_temp(expr),
            domain,
        }
    }

    fn convert(&mut self, value: Value, conversion: Conversion) -> Value {
        let key = (value.expr.clone(), conversion);
        if let Some(converted) = self.conversions.get(&key) {
            return converted.clone();
        }
        let width = value.width();
        let source = Box::new(value.expr);
        let (expr, domain) = match conversion {
            Conversion::Word1 => (Expr::Word1 { source }, Domain::Word(1)),
            Conversion::Bool => (Expr::ToBool { source }, Domain::Boolean),
            Conversion::NonZero => (
                Expr::BinOp {
                    lhs: source,
                    rhs: Box::new(Expr::zero(width)),
                    op: BinOp::NotEqual,
                },
                Domain::Boolean,
            ),
            Conversion::Resize(bit_width) => (Expr::Resize { source, bit_width }, Domain::Word(bit_width)),
        };
        let converted = self.temp(expr, domain);
        self.conversions.insert(key, converted.clone());
        converted
    }

    pub fn to_word(&mut self, value: Value) -> Value {
        match value.domain {
            Domain::Boolean => self.convert(value, Conversion::Word1),
            Domain::Word(_) => value,
        }
    }

    /// Converts to a predicate; words wider than 1 bit become a non-zero test.
    pub fn to_bool(&mut self, value: Value) -> Value {
        match value.domain {
            Domain::Boolean => value,
            Domain::Word(1) => self.convert(value, Conversion::Bool),
            Domain::Word(_) => self.convert(value, Conversion::NonZero),
        }
    }

    fn coerce(&mut self, value: Value, bv: bool) -> Value {
        if value.width() != 1 {
            return value;
        }
        if bv {
            self.to_word(value)
        } else {
            self.to_bool(value)
        }
    }

    fn resize(&mut self, value: Value, bit_width: u32) -> Value {
        let value = self.to_word(value);
        if value.width() == bit_width {
            return value;
        }
        self.convert(value, Conversion::Resize(bit_width))
    }

    fn slice(&mut self, value: Value, range_high: u32, range_low: u32) -> Value {
        let value = self.to_word(value);
        if range_low == 0 && range_high + 1 == value.width() {
            return value;
        }
        let width = range_high - range_low + 1;
        if let Expr::Constant { value } = &value.expr {
            return Value {
                expr: Expr::from_constant(&value.extract(range_low, width)),
                domain: Domain::Word(width),
            };
        }
        self.temp(
            Expr::Bits {
                source: Box::new(value.expr),
                range_high,
                range_low,
            },
            Domain::Word(width),
        )
    }

    /// Concatenates `parts`, least significant first.
    fn concat(&mut self, parts: Vec<Value>) -> Option<Value> {
        if parts.len() == 1 {
            return parts.into_iter().next();
        }
        let mut ret: Option<Value> = None;
        for part in parts {
            let part = self.to_word(part);
            ret = Some(match ret {
                None => part,
                Some(low) => {
                    let width = low.width() + part.width();
                    self.temp(
                        Expr::Concat {
                            lhs: Box::new(part.expr),
                            rhs: Box::new(low.expr),
                        },
                        Domain::Word(width),
                    )
                }
            });
        }
        ret
    }

    /// Left-folded conjunction; `TRUE` when `values` is empty.
    pub fn conjunction(&mut self, values: Vec<Value>) -> Value {
        let mut ret: Option<Value> = None;
        for value in values {
            ret = Some(match ret {
                None => value,
                Some(acc) => self.temp(Expr::bin_op(acc.expr, BinOp::BitAnd, value.expr), Domain::Boolean),
            });
        }
        ret.unwrap_or(Value {
            expr: Expr::Bool { value: true },
            domain: Domain::Boolean,
        })
    }

    /// Emits `sig` as a value of `expected_width` bits.
    ///
    /// A 1-bit result is coerced to a word if `bv` is set and to a boolean otherwise; wider results are always words.
    pub fn emit_signal(
        &mut self,
        sig: &graph::SigSpec<'a>,
        expected_width: u32,
        bv: bool,
    ) -> Result<Value> {
        if expected_width == 0 {
            return Err(self.consistency(format!("zero-width use of signal `{}`", sig)));
        }
        let sig = self.sigmap.apply(sig);
        if sig.is_empty() {
            let zero = Value {
                expr: Expr::zero(expected_width),
                domain: Domain::Word(expected_width),
            };
            return Ok(self.coerce(zero, bv));
        }

        let value = match self.signal_values.get(&sig) {
            Some(value) => value.clone(),
            None => {
                trace!(signal = %sig, "emitting signal");
                let value = if sig.is_chunk() {
                    self.emit_chunk(&sig.chunks()[0], bv)?
                } else {
                    let mut parts = Vec::new();
                    for chunk in sig.chunks() {
                        parts.push(self.emit_chunk(chunk, true)?);
                    }
                    self.concat(parts)
                        .ok_or_else(|| self.consistency(format!("signal `{}` has no chunks", sig)))?
                };
                self.signal_values.insert(sig.clone(), value.clone());
                value
            }
        };

        let value = if value.width() != expected_width {
            self.resize(value, expected_width)
        } else {
            value
        };
        Ok(if expected_width == 1 {
            self.coerce(value, bv)
        } else {
            value
        })
    }

    fn emit_chunk(&mut self, chunk: &graph::SigChunk<'a>, bv: bool) -> Result<Value> {
        match *chunk {
            graph::SigChunk::Const(ref value) => Ok(Value {
                expr: Expr::from_constant(value),
                domain: Domain::Word(value.width()),
            }),
            graph::SigChunk::Wire {
                wire,
                offset,
                width,
            } => {
                if chunk.is_whole_wire() {
                    return self.emit_wire(wire, bv);
                }
                match self.state_vars.get(&wire).cloned() {
                    Some(value) => Ok(self.slice(value, offset + width - 1, offset)),
                    None => self.emit_wire_range(wire, offset, width, true),
                }
            }
        }
    }

    /// Emits a whole wire: its declared name if it's a state variable, otherwise the values of its drivers.
    pub fn emit_wire(&mut self, wire: &'a graph::Wire<'a>, bv: bool) -> Result<Value> {
        if let Some(value) = self.state_vars.get(&wire) {
            return Ok(value.clone());
        }
        if let Some(value) = self.signal_values.get(&graph::SigSpec::from(wire)) {
            return Ok(value.clone());
        }
        self.emit_wire_range(wire, 0, wire.width(), bv)
    }

    fn emit_wire_range(
        &mut self,
        wire: &'a graph::Wire<'a>,
        offset: u32,
        width: u32,
        bv: bool,
    ) -> Result<Value> {
        trace!(wire = wire.name(), offset, width, "emitting derived wire");
        let end = offset + width;
        let producers = self.producers.get(wire).to_vec();
        if producers.is_empty() {
            return Err(self.consistency(format!("wire `{}` has no driver", wire.name())));
        }

        let mut parts = Vec::new();
        let mut covered = offset;
        for producer in producers
            .iter()
            .filter(|p| p.wire_offset < end && p.wire_offset + p.width > offset)
        {
            if let Some(CellState::InProgress) = self.cell_values.get(&producer.cell) {
                trace!(cell = producer.cell.name(), "skipping cell being compiled");
                continue;
            }
            let low = offset.max(producer.wire_offset);
            let high = end.min(producer.wire_offset + producer.width);
            if low != covered {
                break;
            }

            let value = self.emit_cell(producer.cell, bv)?;
            let start = producer.output_offset + (low - producer.wire_offset);
            let part = if start == 0 && high - low == value.width() {
                value
            } else {
                self.slice(value, start + (high - low) - 1, start)
            };
            parts.push(part);
            covered = high;
        }
        if covered != end {
            return Err(self.consistency(format!(
                "bit {} of wire `{}` is undriven or part of a combinational loop",
                covered,
                wire.name()
            )));
        }

        let value = self
            .concat(parts)
            .ok_or_else(|| self.consistency(format!("wire `{}` has no driven bits", wire.name())))?;
        if offset == 0 && width == wire.width() {
            self.signal_values.insert(graph::SigSpec::from(wire), value.clone());
        }
        Ok(value)
    }

    /// Compiles `cell` once, returning its value if it has one.
    pub fn visit_cell(&mut self, cell: &'a graph::Cell<'a>, bv: bool) -> Result<Option<Value>> {
        match self.cell_values.get(&cell) {
            Some(CellState::Done(value)) => return Ok(value.clone()),
            Some(CellState::InProgress) => {
                return Err(self.consistency(format!(
                    "combinational loop through cell `{}`",
                    cell.name()
                )))
            }
            None => (),
        }

        debug!(cell = cell.name(), kind = cell.type_name(), "compiling cell");
        self.cell_values.insert(cell, CellState::InProgress);
        let value = self.compile_cell(cell, bv)?;
        self.cell_values.insert(cell, CellState::Done(value.clone()));
        Ok(value)
    }

    pub fn emit_cell(&mut self, cell: &'a graph::Cell<'a>, bv: bool) -> Result<Value> {
        self.visit_cell(cell, bv)?.ok_or_else(|| {
            self.consistency(format!(
                "cell `{}` of type `{}` has no value",
                cell.name(),
                cell.type_name()
            ))
        })
    }

    fn compile_cell(&mut self, cell: &'a graph::Cell<'a>, bv: bool) -> Result<Option<Value>> {
        let value = match cell.kind() {
            graph::CellKind::Unary { op, a, a_signed, y } => self.compile_unary(*op, a, *a_signed, y.width(), bv)?,
            graph::CellKind::Binary {
                op,
                a,
                b,
                a_signed,
                b_signed,
                y,
            } => {
                if a_signed != b_signed {
                    return Err(self.consistency(format!(
                        "cell `{}` of type `{}` mixes signed and unsigned operands",
                        cell.name(),
                        cell.type_name()
                    )));
                }
                self.compile_binary(*op, a, b, *a_signed, y.width(), bv)?
            }
            graph::CellKind::Shift {
                op,
                a,
                b,
                a_signed,
                y,
                ..
            } => self.compile_shift(*op, a, b, *a_signed, y.width(), bv)?,
            graph::CellKind::Logic { op, a, b, y } => {
                let lhs = self.emit_predicate(a)?;
                let rhs = self.emit_predicate(b)?;
                let op = match op {
                    graph::LogicOp::And => BinOp::BitAnd,
                    graph::LogicOp::Or => BinOp::BitOr,
                };
                let value = self.temp(Expr::bin_op(lhs.expr, op, rhs.expr), Domain::Boolean);
                self.fit_predicate(value, y.width())
            }
            graph::CellKind::Mux { a, b, s, y } => {
                let width = y.width();
                let bv = bv || width > 1;
                let when_false = self.emit_signal(a, width, bv)?;
                let when_true = self.emit_signal(b, width, bv)?;
                let cond = self.emit_signal(s, 1, false)?;
                self.temp(
                    Expr::Ternary {
                        cond: Box::new(cond.expr),
                        when_true: Box::new(when_true.expr),
                        when_false: Box::new(when_false.expr),
                    },
                    Domain::for_context(width, bv),
                )
            }
            graph::CellKind::Pmux { a, b, s, y } => {
                let width = y.width();
                let bv = bv || width > 1;
                let mut ret = self.emit_signal(a, width, bv)?;
                // Lowest select bit ends up outermost, so it wins
                for i in (0..s.width()).rev() {
                    let case = self.emit_signal(&b.extract(i * width, width), width, bv)?;
                    let cond = self.emit_signal(&s.extract(i, 1), 1, false)?;
                    ret = self.temp(
                        Expr::Case {
                            cond: Box::new(cond.expr),
                            when_true: Box::new(case.expr),
                            when_false: Box::new(ret.expr),
                        },
                        Domain::for_context(width, bv),
                    );
                }
                ret
            }
            graph::CellKind::Slice { a, offset, y } => {
                if offset + y.width() > a.width() {
                    return Err(self.consistency(format!(
                        "slice cell `{}` selects bits {}..{} of a {}-bit input",
                        cell.name(),
                        offset,
                        offset + y.width(),
                        a.width()
                    )));
                }
                let source = self.emit_signal(a, a.width(), true)?;
                self.slice(source, offset + y.width() - 1, *offset)
            }
            graph::CellKind::Concat { a, b, .. } => {
                let mut parts = Vec::new();
                for sig in [a, b].iter().filter(|sig| !sig.is_empty()) {
                    parts.push(self.emit_signal(sig, sig.width(), true)?);
                }
                self.concat(parts)
                    .ok_or_else(|| self.consistency(format!("concat cell `{}` has no inputs", cell.name())))?
            }
            graph::CellKind::Dff {
                clk,
                clk_polarity,
                d,
                q,
            } => self.compile_register(cell, clk, *clk_polarity, d, q, RegisterReset::None)?,
            graph::CellKind::Adff {
                clk,
                clk_polarity,
                arst,
                arst_polarity,
                arst_value,
                d,
                q,
            } => self.compile_register(
                cell,
                clk,
                *clk_polarity,
                d,
                q,
                RegisterReset::Async {
                    arst,
                    polarity: *arst_polarity,
                    value: arst_value,
                },
            )?,
            graph::CellKind::Dffsr {
                clk,
                clk_polarity,
                set,
                set_polarity,
                clr,
                clr_polarity,
                d,
                q,
            } => self.compile_register(
                cell,
                clk,
                *clk_polarity,
                d,
                q,
                RegisterReset::SetClear {
                    set,
                    set_polarity: *set_polarity,
                    clr,
                    clr_polarity: *clr_polarity,
                },
            )?,
            graph::CellKind::Dlatch {
                en,
                en_polarity,
                d,
                q,
            } => self.compile_register(cell, en, *en_polarity, d, q, RegisterReset::None)?,
            graph::CellKind::MemRd(rd) => {
                let memory = self.memory(cell, &rd.memid)?;
                let address = self.emit_address(&rd.addr, memory)?;
                let value = self.temp(
                    Expr::Read {
                        memory: Box::new(memory_ref(memory)),
                        address: Box::new(address.expr),
                    },
                    Domain::Word(memory.width()),
                );
                self.resize(value, rd.data.width())
            }
            graph::CellKind::MemWr(wr) => {
                self.compile_memwr(cell, wr)?;
                return Ok(None);
            }
            graph::CellKind::MemInit(init) => {
                let memory = self.memory(cell, &init.memid)?;
                let width = memory.width();
                let words = (init.data.width() / width).max(1);
                let base = self.emit_address(&init.addr, memory)?;
                let mut equations = Vec::new();
                for i in 0..words {
                    let address = if i == 0 {
                        base.clone()
                    } else {
                        let abits = memory.address_bits();
                        self.temp(
                            Expr::bin_op(
                                base.expr.clone(),
                                BinOp::Add,
                                Expr::from_constant(&graph::Const::from_u64(i as u64, abits)),
                            ),
                            Domain::Word(abits),
                        )
                    };
                    let row = self.emit_signal(&init.data.extract(i * width, width), width, true)?;
                    equations.push(self.temp(
                        Expr::bin_op(
                            Expr::Read {
                                memory: Box::new(memory_ref(memory)),
                                address: Box::new(address.expr),
                            },
                            BinOp::Equal,
                            row.expr,
                        ),
                        Domain::Boolean,
                    ));
                }
                self.conjunction(equations)
            }
            graph::CellKind::Assert { a, en } => {
                let a = self.emit_signal(a, 1, false)?;
                let en = self.emit_signal(en, 1, false)?;
                self.temp(Expr::bin_op(en.expr, BinOp::Implies, a.expr), Domain::Boolean)
            }
            graph::CellKind::Mem(_) => {
                return Err(Error::unsupported(
                    self.module.name(),
                    format!("cell `{}` of type `$mem` (dump the design before memory collection)", cell.name()),
                ));
            }
        };

        Ok(Some(value))
    }

    /// Emits `sig` as an operand of `width` bits, sign-extending it if `signed`.
    fn emit_operand(&mut self, sig: &graph::SigSpec<'a>, width: u32, signed: bool) -> Result<Value> {
        if !signed || sig.width() == 0 || sig.width() >= width {
            return self.emit_signal(sig, width, true);
        }
        let value = self.emit_signal(sig, sig.width(), true)?;
        Ok(self.temp(
            Expr::Unsigned {
                source: Box::new(Expr::Resize {
                    source: Box::new(Expr::Signed {
                        source: Box::new(value.expr),
                    }),
                    bit_width: width,
                }),
            },
            Domain::Word(width),
        ))
    }

    /// Emits `sig` as a predicate that holds when any bit is set.
    fn emit_predicate(&mut self, sig: &graph::SigSpec<'a>) -> Result<Value> {
        if sig.width() <= 1 {
            return self.emit_signal(sig, 1, false);
        }
        let value = self.emit_signal(sig, sig.width(), true)?;
        Ok(self.to_bool(value))
    }

    /// Zero-extends a predicate to a cell output wider than 1 bit.
    fn fit_predicate(&mut self, value: Value, y_width: u32) -> Value {
        if y_width <= 1 {
            value
        } else {
            self.resize(value, y_width)
        }
    }

    fn compile_unary(
        &mut self,
        op: graph::UnaryOp,
        a: &graph::SigSpec<'a>,
        a_signed: bool,
        y_width: u32,
        bv: bool,
    ) -> Result<Value> {
        let width = a.width();
        let value = match op {
            graph::UnaryOp::Not | graph::UnaryOp::Neg | graph::UnaryOp::Pos => {
                if bv || y_width > 1 {
                    let source = self.emit_operand(a, y_width, a_signed)?;
                    return Ok(match op {
                        graph::UnaryOp::Not => self.temp(Expr::un_op(UnOp::Not, source.expr), Domain::Word(y_width)),
                        graph::UnaryOp::Neg => self.temp(Expr::un_op(UnOp::Neg, source.expr), Domain::Word(y_width)),
                        _ => source,
                    });
                }
                // Negation is the identity on a single bit
                let source = self.emit_signal(a, 1, false)?;
                return Ok(match op {
                    graph::UnaryOp::Not => self.temp(Expr::un_op(UnOp::Not, source.expr), Domain::Boolean),
                    _ => source,
                });
            }
            graph::UnaryOp::ReduceAnd => {
                if width <= 1 {
                    self.emit_predicate(a)?
                } else {
                    let source = self.emit_signal(a, width, true)?;
                    self.temp(Expr::bin_op(source.expr, BinOp::Equal, Expr::ones(width)), Domain::Boolean)
                }
            }
            graph::UnaryOp::ReduceOr | graph::UnaryOp::ReduceBool => self.emit_predicate(a)?,
            graph::UnaryOp::LogicNot => {
                let source = self.emit_predicate(a)?;
                self.temp(Expr::un_op(UnOp::Not, source.expr), Domain::Boolean)
            }
            graph::UnaryOp::ReduceXor | graph::UnaryOp::ReduceXnor => {
                let width = width.max(1);
                let source = self.emit_signal(a, width, true)?;
                let mut ret = self.slice(source.clone(), width - 1, width - 1);
                for i in (0..width - 1).rev() {
                    let bit = self.slice(source.clone(), i, i);
                    ret = self.temp(Expr::bin_op(ret.expr, BinOp::BitXor, bit.expr), Domain::Word(1));
                }
                let ret = self.to_bool(ret);
                if op == graph::UnaryOp::ReduceXnor {
                    self.temp(Expr::un_op(UnOp::Not, ret.expr), Domain::Boolean)
                } else {
                    ret
                }
            }
        };
        Ok(self.fit_predicate(value, y_width))
    }

    fn compile_binary(
        &mut self,
        op: graph::BinaryOp,
        a: &graph::SigSpec<'a>,
        b: &graph::SigSpec<'a>,
        signed: bool,
        y_width: u32,
        bv: bool,
    ) -> Result<Value> {
        let ir_op = binary_op(op);

        if op.is_bitwise() && !bv && y_width == 1 {
            let lhs = self.emit_signal(a, 1, false)?;
            let rhs = self.emit_signal(b, 1, false)?;
            return Ok(self.temp(Expr::bin_op(lhs.expr, ir_op, rhs.expr), Domain::Boolean));
        }

        let width = a.width().max(b.width()).max(y_width);
        let lhs = self.emit_operand(a, width, signed)?;
        let rhs = self.emit_operand(b, width, signed)?;

        if op.is_relational() {
            let ordered = !matches!(
                op,
                graph::BinaryOp::Eq | graph::BinaryOp::Ne | graph::BinaryOp::Eqx | graph::BinaryOp::Nex
            );
            let expr = if signed && ordered {
                Expr::bin_op(
                    Expr::Signed {
                        source: Box::new(lhs.expr),
                    },
                    ir_op,
                    Expr::Signed {
                        source: Box::new(rhs.expr),
                    },
                )
            } else {
                Expr::bin_op(lhs.expr, ir_op, rhs.expr)
            };
            let value = self.temp(expr, Domain::Boolean);
            return Ok(self.fit_predicate(value, y_width));
        }

        let expr = if signed && matches!(op, graph::BinaryOp::Div | graph::BinaryOp::Mod) {
            Expr::Unsigned {
                source: Box::new(Expr::bin_op(
                    Expr::Signed {
                        source: Box::new(lhs.expr),
                    },
                    ir_op,
                    Expr::Signed {
                        source: Box::new(rhs.expr),
                    },
                )),
            }
        } else {
            Expr::bin_op(lhs.expr, ir_op, rhs.expr)
        };
        let value = self.temp(expr, Domain::Word(width));
        let value = self.resize(value, y_width);
        Ok(self.coerce(value, bv))
    }

    fn compile_shift(
        &mut self,
        op: graph::ShiftOp,
        a: &graph::SigSpec<'a>,
        b: &graph::SigSpec<'a>,
        a_signed: bool,
        y_width: u32,
        bv: bool,
    ) -> Result<Value> {
        let arithmetic = a_signed && matches!(op, graph::ShiftOp::Sshr | graph::ShiftOp::Sshl);
        let width = a.width().max(y_width);
        let lhs = self.emit_operand(a, width, arithmetic)?;
        let rhs = self.emit_signal(b, b.width().max(1), true)?;

        let expr = match op {
            graph::ShiftOp::Shl | graph::ShiftOp::Sshl => Expr::bin_op(lhs.expr, BinOp::Shl, rhs.expr),
            graph::ShiftOp::Sshr if arithmetic => Expr::Unsigned {
                source: Box::new(Expr::bin_op(
                    Expr::Signed {
                        source: Box::new(lhs.expr),
                    },
                    BinOp::Shr,
                    rhs.expr,
                )),
            },
            _ => Expr::bin_op(lhs.expr, BinOp::Shr, rhs.expr),
        };
        let value = self.temp(expr, Domain::Word(width));
        let value = self.resize(value, y_width);
        Ok(self.coerce(value, bv))
    }

    fn compile_register(
        &mut self,
        cell: &'a graph::Cell<'a>,
        edge: &graph::SigSpec<'a>,
        edge_polarity: bool,
        d: &graph::SigSpec<'a>,
        q: &graph::SigSpec<'a>,
        reset: RegisterReset<'_, 'a>,
    ) -> Result<Value> {
        let edge = self.emit_polarized(edge, edge_polarity)?;
        let arst = match reset {
            RegisterReset::Async { arst, polarity, .. } => Some(self.emit_polarized(arst, polarity)?),
            _ => None,
        };

        let q = self.sigmap.apply(q);
        let mut equations = Vec::new();
        let mut offset = 0;
        for chunk in q.chunks() {
            let wire = match *chunk {
                graph::SigChunk::Wire { wire, .. } if chunk.is_whole_wire() => wire,
                _ => {
                    return Err(self.consistency(format!(
                        "output `{}` of register `{}` does not cover whole wires",
                        q,
                        cell.name()
                    )))
                }
            };
            let reg = self.state_vars.get(&wire).cloned().ok_or_else(|| {
                self.consistency(format!(
                    "output `{}` of register `{}` is not a state variable",
                    wire.name(),
                    cell.name()
                ))
            })?;
            let width = wire.width();
            let bv = reg.domain.is_word();

            let mut data = self.emit_signal(&d.extract(offset, width), width, bv)?;
            if let RegisterReset::SetClear {
                set,
                set_polarity,
                clr,
                clr_polarity,
            } = reset
            {
                let set = self.emit_signal(&set.extract(offset, width), width, bv)?;
                let set = if set_polarity {
                    set
                } else {
                    self.temp(Expr::un_op(UnOp::Not, set.expr), reg.domain)
                };
                let clr = self.emit_signal(&clr.extract(offset, width), width, bv)?;
                let keep = if clr_polarity {
                    self.temp(Expr::un_op(UnOp::Not, clr.expr), reg.domain)
                } else {
                    clr
                };
                // Clear wins over set
                let with_set = self.temp(Expr::bin_op(data.expr, BinOp::BitOr, set.expr), reg.domain);
                data = self.temp(Expr::bin_op(with_set.expr, BinOp::BitAnd, keep.expr), reg.domain);
            }

            let mut next = self.temp(
                Expr::Ternary {
                    cond: Box::new(edge.expr.clone()),
                    when_true: Box::new(data.expr),
                    when_false: Box::new(reg.expr.clone()),
                },
                reg.domain,
            );
            if let (Some(arst), RegisterReset::Async { value, .. }) = (&arst, &reset) {
                let value = value.extract(offset, width);
                let value = if bv {
                    Expr::from_constant(&value)
                } else {
                    Expr::Bool {
                        value: value.as_bool(),
                    }
                };
                next = self.temp(
                    Expr::Ternary {
                        cond: Box::new(arst.expr.clone()),
                        when_true: Box::new(value),
                        when_false: Box::new(next.expr),
                    },
                    reg.domain,
                );
            }

            equations.push(self.temp(
                Expr::bin_op(
                    Expr::Next {
                        source: Box::new(reg.expr),
                    },
                    BinOp::Equal,
                    next.expr,
                ),
                Domain::Boolean,
            ));
            offset += width;
        }

        Ok(self.conjunction(equations))
    }

    fn compile_memwr(&mut self, cell: &'a graph::Cell<'a>, wr: &graph::MemWr<'a>) -> Result<()> {
        let memory = self.memory(cell, &wr.memid)?;
        let width = memory.width();

        let edge = self.emit_polarized(&wr.clk, wr.clk_polarity)?;
        let address = self.emit_address(&wr.addr, memory)?;

        let en_bits = self.sigmap.apply(&wr.en).bits();
        let (enable, data) = if en_bits.windows(2).all(|pair| pair[0] == pair[1]) {
            let enable = self.emit_signal(&wr.en.extract(0, 1), 1, false)?;
            (enable, self.emit_signal(&wr.data, width, true)?)
        } else {
            // Per-bit enables merge the new data into the current row
            let en = self.emit_signal(&wr.en, width, true)?;
            let enable = self.to_bool(en.clone());
            let data = self.emit_signal(&wr.data, width, true)?;
            let current = self.temp(
                Expr::Read {
                    memory: Box::new(memory_ref(memory)),
                    address: Box::new(address.expr.clone()),
                },
                Domain::Word(width),
            );
            let not_en = self.temp(Expr::un_op(UnOp::Not, en.expr.clone()), Domain::Word(width));
            let kept = self.temp(Expr::bin_op(current.expr, BinOp::BitAnd, not_en.expr), Domain::Word(width));
            let written = self.temp(Expr::bin_op(data.expr, BinOp::BitAnd, en.expr), Domain::Word(width));
            let merged = self.temp(Expr::bin_op(kept.expr, BinOp::BitOr, written.expr), Domain::Word(width));
            (enable, merged)
        };

        let active = self.temp(Expr::bin_op(edge.expr, BinOp::BitAnd, enable.expr), Domain::Boolean);
        let updated = self.assignments.gen_temp(Expr::Write {
            memory: Box::new(memory_ref(memory)),
            address: Box::new(address.expr),
            data: Box::new(data.expr),
        });
        self.pending_writes
            .entry(memory.name().to_string())
            .or_default()
            .push((active.expr, updated));

        Ok(())
    }

    /// Builds `next(mem) = ...` from the writes registered so far; later writes take precedence.
    pub fn memory_next(&mut self, memory: &'a graph::Memory<'a>) -> Value {
        let mem = memory_ref(memory);
        let writes = self.pending_writes.remove(memory.name()).unwrap_or_default();

        let mut next = mem.clone();
        for (cond, updated) in writes {
            next = self.assignments.gen_temp(Expr::Case {
                cond: Box::new(cond),
                when_true: Box::new(updated),
                when_false: Box::new(next),
            });
        }

        self.temp(
            Expr::bin_op(Expr::Next { source: Box::new(mem) }, BinOp::Equal, next),
            Domain::Boolean,
        )
    }

    fn emit_polarized(&mut self, sig: &graph::SigSpec<'a>, polarity: bool) -> Result<Value> {
        let value = self.emit_signal(sig, 1, false)?;
        Ok(if polarity {
            value
        } else {
            self.temp(Expr::un_op(UnOp::Not, value.expr), Domain::Boolean)
        })
    }

    fn emit_address(&mut self, sig: &graph::SigSpec<'a>, memory: &'a graph::Memory<'a>) -> Result<Value> {
        let abits = memory.address_bits();
        let address = self.emit_signal(sig, abits, true)?;
        if memory.start_offset() == 0 {
            return Ok(address);
        }
        // Negative offsets wrap, turning the subtraction into an addition
        let offset = graph::Const::from_u64(memory.start_offset() as u64, abits);
        Ok(self.temp(
            Expr::bin_op(address.expr, BinOp::Sub, Expr::from_constant(&offset)),
            Domain::Word(abits),
        ))
    }

    fn memory(&self, cell: &'a graph::Cell<'a>, memid: &str) -> Result<&'a graph::Memory<'a>> {
        self.module.memory_by_name(memid).ok_or_else(|| {
            self.consistency(format!(
                "cell `{}` refers to undeclared memory `{}`",
                cell.name(),
                memid
            ))
        })
    }
}

fn memory_ref(memory: &graph::Memory<'_>) -> Expr {
    Expr::Ref {
        name: quoted_name(memory.name()),
    }
}

fn binary_op(op: graph::BinaryOp) -> BinOp {
    match op {
        graph::BinaryOp::And => BinOp::BitAnd,
        graph::BinaryOp::Or => BinOp::BitOr,
        graph::BinaryOp::Xor => BinOp::BitXor,
        graph::BinaryOp::Xnor => BinOp::BitXnor,
        graph::BinaryOp::Lt => BinOp::LessThan,
        graph::BinaryOp::Le => BinOp::LessThanEqual,
        graph::BinaryOp::Eq | graph::BinaryOp::Eqx => BinOp::Equal,
        graph::BinaryOp::Ne | graph::BinaryOp::Nex => BinOp::NotEqual,
        graph::BinaryOp::Ge => BinOp::GreaterThanEqual,
        graph::BinaryOp::Gt => BinOp::GreaterThan,
        graph::BinaryOp::Add => BinOp::Add,
        graph::BinaryOp::Sub => BinOp::Sub,
        graph::BinaryOp::Mul => BinOp::Mul,
        graph::BinaryOp::Div => BinOp::Div,
        graph::BinaryOp::Mod => BinOp::Mod,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::code_writer;
    use crate::*;

    fn compiler<'a>(m: &'a Module<'a>) -> Compiler<'a> {
        let sigmap = SigMap::new(m);
        let producers = ProducerIndex::new(m, &sigmap, &m.cells()).unwrap();
        let mut compiler = Compiler::new(m, sigmap, producers);
        for wire in m.wires() {
            if wire.is_input() || compiler.is_register_wire(wire) {
                compiler.declare_state_var(wire);
            }
        }
        compiler
    }

    fn defines(compiler: &Compiler<'_>) -> String {
        let mut w = code_writer::CodeWriter::new(Vec::new());
        compiler.assignments.write(&mut w).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    fn define(text: &str, value: &Value) -> String {
        let prefix = format!("{} := ", value.expr.render());
        text.lines()
            .find(|line| line.starts_with(&prefix))
            .map(|line| line[prefix.len()..].trim_end_matches(';').to_string())
            .unwrap_or_else(|| panic!("{} is not defined in:\n{}", prefix, text))
    }

    fn binary<'a>(m: &'a Module<'a>, name: &str, op: BinaryOp, a: &'a Wire<'a>, b: &'a Wire<'a>, y: &'a Wire<'a>) -> &'a Cell<'a> {
        m.add_cell(
            name,
            CellKind::Binary {
                op,
                a: a.into(),
                b: b.into(),
                a_signed: false,
                b_signed: false,
                y: y.into(),
            },
        )
    }

    #[test]
    fn signals_and_cells_are_emitted_once() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 4);
        let b = m.input("b", 4);
        let y = m.wire("y", 4);
        let t = m.wire("t", 4);
        m.connect(t, y);
        let cell = binary(m, "$and$1", BinaryOp::And, a, b, y);

        let mut compiler = compiler(m);

        let first = compiler.emit_signal(&y.into(), 4, true).unwrap();
        let count = compiler.assignments.len();
        assert_eq!(count, 1);

        let second = compiler.emit_signal(&t.into(), 4, true).unwrap();
        let third = compiler.emit_cell(cell, true).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(compiler.assignments.len(), count);
        assert_eq!(define(&defines(&compiler), &first), "\"a\" & \"b\"");
    }

    #[test]
    fn coercions_are_emitted_once() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 1);

        let mut compiler = compiler(m);

        let first = compiler.emit_signal(&a.into(), 1, true).unwrap();
        let count = compiler.assignments.len();
        let second = compiler.emit_signal(&a.into(), 1, true).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.domain, Domain::Word(1));
        assert_eq!(compiler.assignments.len(), count);
        assert_eq!(define(&defines(&compiler), &first), "word1(\"a\")");
    }

    #[test]
    fn predicates_are_boolean() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 4);
        let b = m.input("b", 4);
        let eq = m.wire("eq", 1);
        let lt = m.wire("lt", 8);
        let and = m.wire("and", 1);
        let red = m.wire("red", 1);
        let eq_cell = binary(m, "$eq$1", BinaryOp::Eq, a, b, eq);
        let lt_cell = binary(m, "$lt$2", BinaryOp::Lt, a, b, lt);
        let and_cell = m.add_cell(
            "$logic_and$3",
            CellKind::Logic {
                op: LogicOp::And,
                a: a.into(),
                b: b.into(),
                y: and.into(),
            },
        );
        let red_cell = m.add_cell(
            "$reduce_and$4",
            CellKind::Unary {
                op: UnaryOp::ReduceAnd,
                a: a.into(),
                a_signed: false,
                y: red.into(),
            },
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(eq_cell, true).unwrap();
        assert_eq!(value.domain, Domain::Boolean);
        let value = compiler.emit_cell(and_cell, true).unwrap();
        assert_eq!(value.domain, Domain::Boolean);
        let value = compiler.emit_cell(red_cell, true).unwrap();
        assert_eq!(value.domain, Domain::Boolean);
        assert_eq!(define(&defines(&compiler), &value), "\"a\" = 0ub4_1111");

        // Wider outputs are zero-extended words
        let value = compiler.emit_cell(lt_cell, false).unwrap();
        assert_eq!(value.domain, Domain::Word(8));

        // A boolean consumed in a word context is lifted
        let value = compiler.emit_signal(&eq.into(), 1, true).unwrap();
        assert_eq!(value.domain, Domain::Word(1));
        assert!(define(&defines(&compiler), &value).starts_with("word1("));
    }

    #[test]
    fn arithmetic_is_resized_to_output_width() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 4);
        let b = m.input("b", 4);
        let wide = m.wire("wide", 8);
        let narrow = m.wire("narrow", 2);
        let exact = m.wire("exact", 4);
        let wide_cell = binary(m, "$add$1", BinaryOp::Add, a, b, wide);
        let narrow_cell = binary(m, "$mul$2", BinaryOp::Mul, a, b, narrow);
        let exact_cell = binary(m, "$sub$3", BinaryOp::Sub, a, b, exact);

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(wide_cell, true).unwrap();
        assert_eq!(value.domain, Domain::Word(8));
        assert_eq!(define(&defines(&compiler), &value), "__expr1 + __expr2");

        let value = compiler.emit_cell(narrow_cell, true).unwrap();
        assert_eq!(value.domain, Domain::Word(2));
        assert!(define(&defines(&compiler), &value).starts_with("resize("));

        let value = compiler.emit_cell(exact_cell, true).unwrap();
        assert_eq!(value.domain, Domain::Word(4));
        assert_eq!(define(&defines(&compiler), &value), "\"a\" - \"b\"");
    }

    #[test]
    fn signed_operands_are_sign_extended() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 2);
        let b = m.input("b", 4);
        let y = m.wire("y", 1);
        let cell = m.add_cell(
            "$lt$1",
            CellKind::Binary {
                op: BinaryOp::Lt,
                a: a.into(),
                b: b.into(),
                a_signed: true,
                b_signed: true,
                y: y.into(),
            },
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(cell, false).unwrap();
        let text = defines(&compiler);
        assert!(text.contains("__expr1 := unsigned(resize(signed(\"a\"), 4));"));
        assert_eq!(define(&text, &value), "signed(__expr1) < signed(\"b\")");
    }

    #[test]
    fn mixed_signedness_is_rejected() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 2);
        let b = m.input("b", 2);
        let y = m.wire("y", 2);
        let cell = m.add_cell(
            "$add$1",
            CellKind::Binary {
                op: BinaryOp::Add,
                a: a.into(),
                b: b.into(),
                a_signed: true,
                b_signed: false,
                y: y.into(),
            },
        );

        let mut compiler = compiler(m);

        assert!(matches!(
            compiler.emit_cell(cell, true),
            Err(Error::InternalConsistency { .. })
        ));
    }

    #[test]
    fn wires_assembled_from_several_cells() {
        let c = Context::new();

        let m = c.module("A");
        let i = m.input("i", 1);
        let w = m.wire("w", 2);
        // w[0] = !w[1], w[1] = i
        m.add_cell(
            "$not$1",
            CellKind::Unary {
                op: UnaryOp::Not,
                a: SigSpec::from_wire_slice(w, 1, 1),
                a_signed: false,
                y: SigSpec::from_wire_slice(w, 0, 1),
            },
        );
        m.add_cell(
            "$pos$2",
            CellKind::Unary {
                op: UnaryOp::Pos,
                a: i.into(),
                a_signed: false,
                y: SigSpec::from_wire_slice(w, 1, 1),
            },
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_signal(&w.into(), 2, true).unwrap();
        assert_eq!(value.domain, Domain::Word(2));
        assert!(define(&defines(&compiler), &value).contains(" :: "));
    }

    #[test]
    fn combinational_loops_are_reported() {
        let c = Context::new();

        let m = c.module("A");
        let w = m.wire("w", 1);
        m.add_cell(
            "$not$1",
            CellKind::Unary {
                op: UnaryOp::Not,
                a: w.into(),
                a_signed: false,
                y: w.into(),
            },
        );

        let mut compiler = compiler(m);

        assert!(matches!(
            compiler.emit_signal(&w.into(), 1, false),
            Err(Error::InternalConsistency { .. })
        ));
    }

    #[test]
    fn undriven_wires_are_reported() {
        let c = Context::new();

        let m = c.module("A");
        let w = m.wire("w", 3);

        let mut compiler = compiler(m);

        match compiler.emit_signal(&w.into(), 3, true) {
            Err(Error::InternalConsistency { message, .. }) => assert!(message.contains("`w`")),
            _ => panic!("expected an internal consistency error"),
        }
    }

    #[test]
    fn one_equation_per_register_chunk() {
        let c = Context::new();

        let m = c.module("A");
        let clk = m.input("clk", 1);
        let d = m.input("d", 3);
        let r1 = m.wire("r1", 2);
        let r2 = m.wire("r2", 1);
        let mut q = SigSpec::from(r1);
        q.append(&r2.into());
        let cell = m.add_cell(
            "$dff$1",
            CellKind::Dff {
                clk: clk.into(),
                clk_polarity: false,
                d: d.into(),
                q,
            },
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(cell, false).unwrap();
        assert_eq!(value.domain, Domain::Boolean);
        let text = defines(&compiler);
        assert_eq!(text.matches("next(").count(), 2);
        assert!(text.contains(":= !\"clk\";"));
        assert!(text.contains("next(\"r1\") = "));
        assert!(text.contains("next(\"r2\") = "));
    }

    #[test]
    fn async_reset_on_boolean_register() {
        let c = Context::new();

        let m = c.module("A");
        let clk = m.input("clk", 1);
        let rst = m.input("rst", 1);
        let d = m.input("d", 1);
        let q = m.wire("q", 1);
        let cell = m.add_cell(
            "$adff$1",
            CellKind::Adff {
                clk: clk.into(),
                clk_polarity: true,
                arst: rst.into(),
                arst_polarity: true,
                arst_value: Const::from_u64(1, 1),
                d: d.into(),
                q: q.into(),
            },
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(cell, false).unwrap();
        let text = defines(&compiler);
        assert!(text.contains("__expr1 := (\"clk\" ? \"d\" : \"q\");"));
        assert!(text.contains("__expr2 := (\"rst\" ? TRUE : __expr1);"));
        assert_eq!(define(&text, &value), "next(\"q\") = __expr2");
    }

    #[test]
    fn pmux_lowest_select_is_outermost() {
        let c = Context::new();

        let m = c.module("A");
        let a = m.input("a", 2);
        let b = m.input("b", 4);
        let s = m.input("s", 2);
        let y = m.wire("y", 2);
        let cell = m.add_cell(
            "$pmux$1",
            CellKind::Pmux {
                a: a.into(),
                b: b.into(),
                s: s.into(),
                y: y.into(),
            },
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(cell, true).unwrap();
        let text = defines(&compiler);
        assert!(text.contains(":= \"b\"[1:0];"));
        assert!(text.contains(":= \"b\"[3:2];"));
        let outer = define(&text, &value);
        assert!(outer.starts_with("(case "));
        let cond = outer["(case ".len()..].split(' ').next().unwrap();
        let cond = define(&text, &Value {
            expr: Expr::Ref { name: cond.into() },
            domain: Domain::Boolean,
        });
        assert!(cond.starts_with("bool("));
        let bit = cond["bool(".len()..].trim_end_matches(')');
        let bit = define(&text, &Value {
            expr: Expr::Ref { name: bit.into() },
            domain: Domain::Word(1),
        });
        assert_eq!(bit, "\"s\"[0:0]");
    }

    #[test]
    fn memory_writes_fold_in_registration_order() {
        let c = Context::new();

        let m = c.module("A");
        let clk = m.input("clk", 1);
        let en = m.input("en", 1);
        let mem = m.memory("\\mem", 4, 4, 0);
        for (i, name) in ["$memwr$1", "$memwr$2"].iter().enumerate() {
            m.add_cell(
                *name,
                CellKind::MemWr(MemWr {
                    memid: "\\mem".into(),
                    abits: 2,
                    clk: clk.into(),
                    clk_enable: true,
                    clk_polarity: true,
                    priority: i as i64,
                    addr: Const::from_u64(i as u64, 2).into(),
                    data: Const::from_u64(i as u64 + 5, 4).into(),
                    en: SigSpec::from_bits(vec![SigBit::Wire { wire: en, offset: 0 }; 4]),
                }),
            );
        }

        let mut compiler = compiler(m);
        for cell in m.cells() {
            assert!(compiler.visit_cell(cell, true).unwrap().is_none());
        }

        let value = compiler.memory_next(mem);
        let text = defines(&compiler);
        let first = text.find("WRITE(\"mem\", 0ub2_00, 0ub4_0101)").unwrap();
        let second = text.find("WRITE(\"mem\", 0ub2_01, 0ub4_0110)").unwrap();
        assert!(first < second);
        let outer = define(&text, &value);
        let outer = outer.trim_start_matches("next(\"mem\") = ");
        let outer = define(&text, &Value {
            expr: Expr::Ref { name: outer.into() },
            domain: Domain::Word(4),
        });
        // The later write is tested first and falls back to the earlier one
        assert!(outer.starts_with("(case "));
        let inner = outer.rsplit("TRUE : ").next().unwrap().trim_end_matches("; esac)");
        let inner = define(&text, &Value {
            expr: Expr::Ref { name: inner.into() },
            domain: Domain::Word(4),
        });
        assert!(inner.ends_with("TRUE : \"mem\"; esac)"));
    }

    #[test]
    fn memory_addresses_are_offset() {
        let c = Context::new();

        let m = c.module("A");
        let addr = m.input("addr", 3);
        let data = m.wire("data", 8);
        let _ = m.memory("\\mem", 8, 4, 4);
        let cell = m.add_cell(
            "$memrd$1",
            CellKind::MemRd(MemRd {
                memid: "\\mem".into(),
                abits: 3,
                clk: Const::from_u64(0, 1).into(),
                clk_enable: false,
                clk_polarity: true,
                transparent: false,
                addr: addr.into(),
                data: data.into(),
            }),
        );

        let mut compiler = compiler(m);

        let value = compiler.emit_cell(cell, true).unwrap();
        assert_eq!(value.domain, Domain::Word(8));
        let text = defines(&compiler);
        assert!(text.contains("__expr1 := resize(\"addr\", 2);"));
        assert!(text.contains("__expr2 := __expr1 - 0ub2_00;"));
        assert_eq!(define(&text, &value), "READ(\"mem\", __expr2)");
    }
}
