//! SMV model generation.
//!
//! Each module becomes one `MODULE` with its inputs as `IVAR`s, register outputs and memories as `VAR`s, every intermediate value as a numbered `DEFINE`, and `INIT`, `TRANS` and `INVARSPEC` predicates built from those definitions.

mod compiler;
mod ir;
mod producers;
mod validation;

use compiler::*;
use ir::*;
use producers::*;
use validation::*;

use crate::code_writer;
use crate::error::*;
use crate::graph;

use tracing::{debug, info};

use std::collections::HashMap;
use std::io::Write;

const HEADER_RULE: &str =
    "------------------------------------------------------------------------------------------------";

/// Controls which modules [`generate_design`] dumps and how.
#[derive(Clone, Debug)]
pub struct Options {
    /// Module to dump first, as `main`. When `None`, a module with its `top` flag set is used if there is one.
    pub top: Option<String>,
    /// Write a comment banner naming the generator.
    pub header: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            top: None,
            header: true,
        }
    }
}

/// Writes `m` as `MODULE main`.
///
/// Nothing is written if `m` can't be translated.
///
/// # Examples
///
/// ```
/// use rtlsmv::*;
///
/// let c = Context::new();
///
/// let m = c.module("inverter");
/// let clk = m.input("clk", 1);
/// let q = m.output("q", 1);
/// let d = m.wire("d", 1);
/// m.add_cell(
///     "$not$1",
///     CellKind::Unary {
///         op: UnaryOp::Not,
///         a: q.into(),
///         a_signed: false,
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
///
/// let mut out = Vec::new();
/// smv::generate(m, &mut out)?;
/// let out = String::from_utf8(out).unwrap();
/// assert!(out.starts_with("MODULE main\n"));
/// assert!(out.contains("next(\"q\") = __expr"));
/// # Ok::<(), rtlsmv::Error>(())
/// ```
pub fn generate<'a, W: Write>(m: &'a graph::Module<'a>, w: W) -> Result<()> {
    let mut w = code_writer::CodeWriter::new(w);
    dump_module(m, "main", &mut w)
}

/// Writes every non-black-box module of `c`, the top module first.
///
/// The top module, or a lone module, is named `main`; others are named after their netlist names.
pub fn generate_design<'a, W: Write>(c: &'a graph::Context<'a>, options: &Options, w: W) -> Result<()> {
    let modules = c
        .modules()
        .into_iter()
        .filter(|m| !m.is_blackbox())
        .collect::<Vec<_>>();

    let top = match options.top {
        Some(ref name) => {
            let top = modules
                .iter()
                .copied()
                .find(|m| m.name() == name || m.name().strip_prefix('\\') == Some(name.as_str()))
                .ok_or_else(|| Error::TopModuleNotFound(name.clone()))?;
            Some(top)
        }
        None => modules.iter().copied().find(|m| m.is_top()),
    };

    let mut w = code_writer::CodeWriter::new(w);

    if options.header {
        w.append_line(&format!("-- Generated by rtlsmv {}", env!("CARGO_PKG_VERSION")))?;
        w.append_line(HEADER_RULE)?;
    }

    if let Some(top) = top {
        dump_module(top, "main", &mut w)?;
    }
    for &m in modules.iter() {
        if top.map_or(false, |top| std::ptr::eq(top, m)) {
            continue;
        }
        let name = if top.is_none() && modules.len() == 1 {
            "main".to_string()
        } else {
            module_name(m.name())
        };
        dump_module(m, &name, &mut w)?;
    }

    Ok(())
}

struct Declaration {
    name: String,
    ty: String,
}

fn var_type(domain: Domain) -> String {
    match domain {
        Domain::Boolean => "boolean".into(),
        Domain::Word(width) => format!("word[{}]", width),
    }
}

fn dump_module<'a, W: Write>(
    m: &'a graph::Module<'a>,
    smv_name: &str,
    w: &mut code_writer::CodeWriter<W>,
) -> Result<()> {
    info!(module = m.name(), smv_name, "dumping module");
    validate_module(m)?;

    debug!("indexing cell outputs");
    let sigmap = graph::SigMap::new(m);
    let mut cells = m.cells();
    cells.sort_by(|a, b| a.name().cmp(b.name()));
    let producers = ProducerIndex::new(m, &sigmap, &cells)?;

    let wires = m.wires();

    // `init` may sit on any name of a register's nets
    let mut inits = HashMap::new();
    for &wire in wires.iter() {
        if let Some(value) = wire.init() {
            inits.entry(sigmap.apply(&wire.into())).or_insert(value);
        }
    }

    let mut compiler = Compiler::new(m, sigmap, producers);

    let mut inputs = wires.iter().copied().filter(|w| w.is_input()).collect::<Vec<_>>();
    inputs.sort_by_key(|w| w.port_id);
    let mut ivars = Vec::new();
    for &wire in inputs.iter() {
        let value = compiler.declare_state_var(wire);
        ivars.push(Declaration {
            name: quoted_name(wire.name()),
            ty: var_type(value.domain),
        });
    }

    let mut registers = wires
        .iter()
        .copied()
        .filter(|&w| !w.is_input() && compiler.is_register_wire(w))
        .collect::<Vec<_>>();
    registers.sort_by(|a, b| a.name().cmp(b.name()));
    let mut vars = Vec::new();
    for &wire in registers.iter() {
        let value = compiler.declare_state_var(wire);
        vars.push(Declaration {
            name: quoted_name(wire.name()),
            ty: var_type(value.domain),
        });
    }

    let mut memories = m.memories();
    memories.sort_by(|a, b| a.name().cmp(b.name()));
    for memory in memories.iter() {
        vars.push(Declaration {
            name: quoted_name(memory.name()),
            ty: format!("array word[{}] of word[{}]", memory.address_bits(), memory.width()),
        });
    }

    let mut rendered = HashMap::new();
    let declared = inputs
        .iter()
        .chain(registers.iter())
        .map(|w| w.name())
        .chain(memories.iter().map(|memory| memory.name()));
    for name in declared {
        let quoted = quoted_name(name);
        if let Some(other) = rendered.insert(quoted.clone(), name) {
            return Err(Error::consistency(
                m.name(),
                format!("`{}` and `{}` both render as {}", other, name, quoted),
            ));
        }
    }

    debug!("building initial-state predicate");
    let mut init = Vec::new();
    for &wire in registers.iter() {
        let value = match inits.get(&graph::SigSpec::from(wire)) {
            Some(value) => value.resized(wire.width()),
            _ => continue,
        };
        let reg = match compiler.state_var(wire) {
            Some(reg) => reg.clone(),
            _ => continue,
        };
        let value = match reg.domain {
            Domain::Boolean => Expr::Bool {
                value: value.as_bool(),
            },
            Domain::Word(_) => Expr::from_constant(&value),
        };
        init.push(compiler.temp(Expr::bin_op(reg.expr, BinOp::Equal, value), Domain::Boolean));
    }
    let mut meminits = cells
        .iter()
        .copied()
        .filter_map(|cell| match cell.kind() {
            graph::CellKind::MemInit(meminit) => Some((meminit.priority, cell)),
            _ => None,
        })
        .collect::<Vec<_>>();
    meminits.sort_by_key(|&(priority, _)| priority);
    for (_, cell) in meminits {
        init.push(compiler.emit_cell(cell, false)?);
    }
    let init = compiler.conjunction(init);

    debug!("building transition predicate");
    let mut trans = Vec::new();
    for &cell in cells.iter().filter(|cell| cell.kind().is_register()) {
        trans.push(compiler.emit_cell(cell, false)?);
    }
    let mut memwrs = cells
        .iter()
        .copied()
        .filter_map(|cell| match cell.kind() {
            graph::CellKind::MemWr(memwr) => Some((memwr.priority, cell)),
            _ => None,
        })
        .collect::<Vec<_>>();
    memwrs.sort_by_key(|&(priority, _)| priority);
    for (_, cell) in memwrs {
        compiler.visit_cell(cell, true)?;
    }
    for &memory in memories.iter() {
        trans.push(compiler.memory_next(memory));
    }
    let trans = compiler.conjunction(trans);

    debug!("collecting assertions");
    let mut invarspecs = Vec::new();
    for &cell in cells.iter() {
        if let graph::CellKind::Assert { .. } = cell.kind() {
            invarspecs.push(compiler.emit_cell(cell, false)?);
        }
    }

    info!(
        module = m.name(),
        definitions = compiler.assignments.len(),
        "module translated"
    );

    w.append_line(&format!("MODULE {}", smv_name))?;
    write_declarations(w, "IVAR", &ivars)?;
    write_declarations(w, "VAR", &vars)?;
    if !compiler.assignments.is_empty() {
        w.append_newline()?;
        w.append_line("DEFINE")?;
        w.indent();
        compiler.assignments.write(w)?;
        w.unindent()?;
    }

    w.append_newline()?;
    w.append_line(&format!("INIT {};", init.expr.render()))?;
    w.append_line(&format!("TRANS {};", trans.expr.render()))?;
    for invarspec in invarspecs.iter() {
        w.append_line(&format!("INVARSPEC {};", invarspec.expr.render()))?;
    }
    w.append_newline()?;

    Ok(())
}

fn write_declarations<W: Write>(
    w: &mut code_writer::CodeWriter<W>,
    section: &str,
    declarations: &[Declaration],
) -> Result<()> {
    if declarations.is_empty() {
        return Ok(());
    }

    w.append_newline()?;
    w.append_line(section)?;
    w.indent();
    for declaration in declarations.iter() {
        w.append_line(&format!("{} : {};", declaration.name, declaration.ty))?;
    }
    w.unindent()?;

    Ok(())
}
