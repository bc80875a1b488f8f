use crate::code_writer;
use crate::graph;

use std::io::Write;

/// The sort of an emitted value.
///
/// A 1-bit word is distinct from a boolean; converting between them needs an explicit `word1`/`bool`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Domain {
    Boolean,
    Word(u32),
}

impl Domain {
    /// The domain a value of `width` bits takes in a word (`bv`) or predicate context.
    pub fn for_context(width: u32, bv: bool) -> Domain {
        if bv || width > 1 {
            Domain::Word(width)
        } else {
            Domain::Boolean
        }
    }

    pub fn is_word(self) -> bool {
        matches!(self, Domain::Word(_))
    }

    pub fn width(self) -> u32 {
        match self {
            Domain::Boolean => 1,
            Domain::Word(width) => width,
        }
    }
}

/// An emitted value: an atomic expression (a name or a literal) and its domain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Value {
    pub expr: Expr,
    pub domain: Domain,
}

impl Value {
    pub fn width(&self) -> u32 {
        self.domain.width()
    }
}

/// The numbered definitions of one module, in emission order.
pub struct AssignmentContext {
    assignments: Vec<Assignment>,
    local_count: u32,
}

impl AssignmentContext {
    pub fn new() -> AssignmentContext {
        AssignmentContext {
            assignments: Vec::new(),
            local_count: 0,
        }
    }

    pub fn gen_temp(&mut self, expr: Expr) -> Expr {
        match expr {
            // Names and literals are already atomic
            Expr::Ref { .. } | Expr::Constant { .. } | Expr::Bool { .. } => expr,
            _ => {
                self.local_count += 1;
                let name = format!("__expr{}", self.local_count);

                self.assignments.push(Assignment {
                    target_name: name.clone(),
                    expr,
                });

                Expr::Ref { name }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn write<W: Write>(&self, w: &mut code_writer::CodeWriter<W>) -> Result<(), code_writer::Error> {
        for assignment in self.assignments.iter() {
            assignment.write(w)?;
        }

        Ok(())
    }
}

pub struct Assignment {
    pub target_name: String,
    pub expr: Expr,
}

impl Assignment {
    fn write<W: Write>(&self, w: &mut code_writer::CodeWriter<W>) -> Result<(), code_writer::Error> {
        w.append_indent()?;
        w.append(&format!("{} := ", self.target_name))?;
        self.expr.write(w)?;
        w.append(";")?;
        w.append_newline()?;

        Ok(())
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Expr {
    BinOp {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        op: BinOp,
    },
    Bits {
        source: Box<Expr>,
        range_high: u32,
        range_low: u32,
    },
    Bool {
        value: bool,
    },
    Case {
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    /// `lhs :: rhs`, with `lhs` most significant.
    Concat {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Constant {
        value: graph::Const,
    },
    Next {
        source: Box<Expr>,
    },
    Read {
        memory: Box<Expr>,
        address: Box<Expr>,
    },
    Ref {
        name: String,
    },
    Resize {
        source: Box<Expr>,
        bit_width: u32,
    },
    Signed {
        source: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    ToBool {
        source: Box<Expr>,
    },
    UnOp {
        source: Box<Expr>,
        op: UnOp,
    },
    Unsigned {
        source: Box<Expr>,
    },
    Word1 {
        source: Box<Expr>,
    },
    Write {
        memory: Box<Expr>,
        address: Box<Expr>,
        data: Box<Expr>,
    },
}

impl Expr {
    pub fn from_constant(value: &graph::Const) -> Expr {
        Expr::Constant {
            value: value.clone(),
        }
    }

    pub fn zero(bit_width: u32) -> Expr {
        Expr::from_constant(&graph::Const::from_u64(0, bit_width))
    }

    pub fn ones(bit_width: u32) -> Expr {
        Expr::from_constant(&graph::Const::new(vec![graph::State::S1; bit_width as usize]))
    }

    pub fn bin_op(lhs: Expr, op: BinOp, rhs: Expr) -> Expr {
        Expr::BinOp {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            op,
        }
    }

    pub fn un_op(op: UnOp, source: Expr) -> Expr {
        Expr::UnOp {
            source: Box::new(source),
            op,
        }
    }

    pub fn write<W: Write>(&self, w: &mut code_writer::CodeWriter<W>) -> Result<(), code_writer::Error> {
        match self {
            Expr::BinOp { lhs, rhs, op } => {
                lhs.write(w)?;
                w.append(&format!(
                    " {} ",
                    match op {
                        BinOp::Add => "+",
                        BinOp::BitAnd => "&",
                        BinOp::BitOr => "|",
                        BinOp::BitXor => "xor",
                        BinOp::BitXnor => "xnor",
                        BinOp::Div => "/",
                        BinOp::Equal => "=",
                        BinOp::NotEqual => "!=",
                        BinOp::LessThan => "<",
                        BinOp::LessThanEqual => "<=",
                        BinOp::GreaterThan => ">",
                        BinOp::GreaterThanEqual => ">=",
                        BinOp::Implies => "->",
                        BinOp::Mod => "mod",
                        BinOp::Mul => "*",
                        BinOp::Shl => "<<",
                        BinOp::Shr => ">>",
                        BinOp::Sub => "-",
                    }
                ))?;
                rhs.write(w)?;
            }
            Expr::Bits {
                source,
                range_high,
                range_low,
            } => {
                source.write(w)?;
                w.append(&format!("[{}:{}]", range_high, range_low))?;
            }
            Expr::Bool { value } => {
                w.append(if *value { "TRUE" } else { "FALSE" })?;
            }
            Expr::Case {
                cond,
                when_true,
                when_false,
            } => {
                w.append("(case ")?;
                cond.write(w)?;
                w.append(" : ")?;
                when_true.write(w)?;
                w.append("; TRUE : ")?;
                when_false.write(w)?;
                w.append("; esac)")?;
            }
            Expr::Concat { lhs, rhs } => {
                lhs.write(w)?;
                w.append(" :: ")?;
                rhs.write(w)?;
            }
            Expr::Constant { value } => {
                // Undefined bits have no word representation; they're written as 0
                let bits = value
                    .bits
                    .iter()
                    .rev()
                    .map(|&b| if b == graph::State::S1 { '1' } else { '0' })
                    .collect::<String>();
                w.append(&format!("0ub{}_{}", value.width(), bits))?;
            }
            Expr::Next { source } => {
                w.append("next(")?;
                source.write(w)?;
                w.append(")")?;
            }
            Expr::Read { memory, address } => {
                w.append("READ(")?;
                memory.write(w)?;
                w.append(", ")?;
                address.write(w)?;
                w.append(")")?;
            }
            Expr::Ref { name } => {
                w.append(name)?;
            }
            Expr::Resize { source, bit_width } => {
                w.append("resize(")?;
                source.write(w)?;
                w.append(&format!(", {})", bit_width))?;
            }
            Expr::Signed { source } => {
                w.append("signed(")?;
                source.write(w)?;
                w.append(")")?;
            }
            Expr::Ternary {
                cond,
                when_true,
                when_false,
            } => {
                w.append("(")?;
                cond.write(w)?;
                w.append(" ? ")?;
                when_true.write(w)?;
                w.append(" : ")?;
                when_false.write(w)?;
                w.append(")")?;
            }
            Expr::ToBool { source } => {
                w.append("bool(")?;
                source.write(w)?;
                w.append(")")?;
            }
            Expr::UnOp { source, op } => {
                w.append(match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                })?;
                source.write(w)?;
            }
            Expr::Unsigned { source } => {
                w.append("unsigned(")?;
                source.write(w)?;
                w.append(")")?;
            }
            Expr::Word1 { source } => {
                w.append("word1(")?;
                source.write(w)?;
                w.append(")")?;
            }
            Expr::Write {
                memory,
                address,
                data,
            } => {
                w.append("WRITE(")?;
                memory.write(w)?;
                w.append(", ")?;
                address.write(w)?;
                w.append(", ")?;
                data.write(w)?;
                w.append(")")?;
            }
        }

        Ok(())
    }

    /// Renders this expression on its own, for diagnostics and tests.
    pub fn render(&self) -> String {
        let mut w = code_writer::CodeWriter::new(Vec::new());
        // Writing to a Vec can't fail and nothing here unindents
        let _ = self.write(&mut w);
        String::from_utf8_lossy(&w.into_inner()).into_owned()
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinOp {
    Add,
    BitAnd,
    BitOr,
    BitXor,
    BitXnor,
    Div,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Implies,
    Mod,
    Mul,
    Shl,
    Shr,
    Sub,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Renders a netlist name as a quoted identifier.
///
/// A leading `\` (public name marker) is dropped, and characters the model syntax can't carry inside quotes are replaced by `?`.
pub fn quoted_name(name: &str) -> String {
    let name = name.strip_prefix('\\').unwrap_or(name);
    let name = name
        .chars()
        .map(|c| match c {
            '#' | '=' | '"' => '?',
            c => c,
        })
        .collect::<String>();
    format!("\"{}\"", name)
}

/// Renders a netlist name as a bare `MODULE` identifier.
pub fn module_name(name: &str) -> String {
    let name = name.strip_prefix('\\').unwrap_or(name);
    let mut ret = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    if ret.is_empty() || ret.starts_with(|c: char| c.is_ascii_digit()) {
        ret.insert(0, '_');
    }
    ret
}
