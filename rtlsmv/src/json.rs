//! Reading netlists in the JSON format written by Yosys' `write_json`.
//!
//! Every module in the file is added to a [`Context`]. Ports keep their order in the file, each net name becomes a [`Wire`], and nets that appear under several names are connected together.
//!
//! [`Context`]: ../struct.Context.html
//! [`Wire`]: ../struct.Wire.html

use crate::error::*;
use crate::graph::*;

use serde::Deserialize;
use tracing::{debug, info};

use std::collections::{BTreeMap, HashMap};
use std::convert::TryFrom;
use std::io;

#[derive(Debug, Deserialize)]
struct Netlist {
    #[serde(default)]
    modules: BTreeMap<String, NetlistModule>,
}

#[derive(Debug, Deserialize)]
struct NetlistModule {
    #[serde(default)]
    attributes: HashMap<String, Param>,
    // Kept as a map that preserves file order, since port order is significant
    #[serde(default)]
    ports: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    cells: BTreeMap<String, NetlistCell>,
    #[serde(default)]
    memories: BTreeMap<String, NetlistMemory>,
    #[serde(default)]
    netnames: BTreeMap<String, NetlistNet>,
}

#[derive(Debug, Deserialize)]
struct NetlistPort {
    direction: String,
    bits: Vec<Bit>,
}

#[derive(Debug, Deserialize)]
struct NetlistCell {
    #[serde(rename = "type")]
    cell_type: String,
    #[serde(default)]
    parameters: HashMap<String, Param>,
    #[serde(default)]
    connections: HashMap<String, Vec<Bit>>,
}

#[derive(Debug, Deserialize)]
struct NetlistMemory {
    width: u32,
    size: u32,
    #[serde(default)]
    start_offset: i64,
}

#[derive(Debug, Deserialize)]
struct NetlistNet {
    bits: Vec<Bit>,
    #[serde(default)]
    attributes: HashMap<String, Param>,
}

/// A net number or one of the constants `"0"`, `"1"`, `"x"` and `"z"`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Bit {
    Net(u64),
    Const(String),
}

/// Parameter and attribute values are MSB-first bit strings, plain strings, or (with `-compat-int`) integers.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Param {
    Int(i64),
    Str(String),
}

impl Param {
    fn to_const(&self) -> Option<Const> {
        match self {
            Param::Int(value) => Some(Const::from_u64(*value as u64, 32)),
            Param::Str(s) => Const::from_bit_str(s),
        }
    }

    fn as_bool(&self) -> bool {
        self.to_const().map_or(false, |value| value.as_bool())
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Param::Int(value) => Some(*value),
            Param::Str(_) => {
                let value = self.to_const()?;
                let raw = value.as_u64()?;
                let width = value.width();
                if width > 0 && width < 64 && value.bits[width as usize - 1] == State::S1 {
                    Some(raw as i64 - (1i64 << width))
                } else {
                    Some(raw as i64)
                }
            }
        }
    }

    fn as_string(&self) -> String {
        match self {
            Param::Int(value) => value.to_string(),
            // Strings that would read as bit strings carry a trailing space
            Param::Str(s) => match s.strip_suffix(' ') {
                Some(stripped) if Const::from_bit_str(stripped).is_some() => stripped.to_string(),
                _ => s.clone(),
            },
        }
    }
}

/// Memory names are referenced with their public-name marker but listed without it.
fn memory_name(memid: &str) -> String {
    memid.strip_prefix('\\').unwrap_or(memid).to_string()
}

/// Reads every module of a `write_json` netlist from `r` into `c`.
pub fn read<'a, R: io::Read>(c: &'a Context<'a>, r: R) -> Result<()> {
    let netlist: Netlist = serde_json::from_reader(r)?;

    for (name, module) in netlist.modules.iter() {
        if c.module_by_name(name).is_some() {
            return Err(Error::Netlist(format!("module `{}` is defined more than once", name)));
        }
        build_module(c, name, module)?;
    }

    Ok(())
}

/// Like [`read`], from a string.
///
/// # Examples
///
/// ```
/// use rtlsmv::*;
///
/// let c = Context::new();
/// json::read_str(&c, r#"{ "modules": { "top": { "ports": { "a": { "direction": "input", "bits": [2] } } } } }"#)?;
///
/// let top = c.module_by_name("top").unwrap();
/// assert!(top.wire_by_name("a").unwrap().is_input());
/// # Ok::<(), rtlsmv::Error>(())
/// ```
///
/// [`read`]: ./fn.read.html
pub fn read_str<'a>(c: &'a Context<'a>, s: &str) -> Result<()> {
    read(c, s.as_bytes())
}

struct ModuleBuilder<'a> {
    m: &'a Module<'a>,
    nets: HashMap<u64, SigBit<'a>>,
}

impl<'a> ModuleBuilder<'a> {
    fn error(&self, message: impl AsRef<str>) -> Error {
        Error::Netlist(format!("module `{}`: {}", self.m.name(), message.as_ref()))
    }

    fn bit(&mut self, bit: &Bit) -> Result<SigBit<'a>> {
        match bit {
            Bit::Net(id) => {
                if let Some(&bit) = self.nets.get(id) {
                    return Ok(bit);
                }
                // Nets without a name still need a home
                let wire = self.m.wire(format!("$json$net${}", id), 1);
                let bit = SigBit::Wire { wire, offset: 0 };
                self.nets.insert(*id, bit);
                Ok(bit)
            }
            Bit::Const(s) => {
                let mut chars = s.chars();
                match (chars.next().and_then(State::from_char), chars.next()) {
                    (Some(state), None) => Ok(SigBit::Const(state)),
                    _ => Err(self.error(format!("invalid bit `{}`", s))),
                }
            }
        }
    }

    fn sig(&mut self, bits: &[Bit]) -> Result<SigSpec<'a>> {
        let mut ret = Vec::with_capacity(bits.len());
        for bit in bits.iter() {
            ret.push(self.bit(bit)?);
        }
        Ok(SigSpec::from_bits(ret))
    }

    /// Makes `wire` a name for `bits`, connecting it to any earlier name of the same nets.
    fn bind(&mut self, wire: &'a Wire<'a>, bits: &[Bit]) -> Result<()> {
        for (offset, bit) in bits.iter().enumerate() {
            let this = SigBit::Wire {
                wire,
                offset: offset as u32,
            };
            match bit {
                Bit::Net(id) => match self.nets.get(id) {
                    Some(&other) => self.m.connect(this, other),
                    None => {
                        self.nets.insert(*id, this);
                    }
                },
                Bit::Const(_) => {
                    let value = self.bit(bit)?;
                    self.m.connect(this, value);
                }
            }
        }

        Ok(())
    }
}

fn build_module<'a>(c: &'a Context<'a>, name: &str, json: &NetlistModule) -> Result<()> {
    info!(module = name, "reading module");

    let m = c.module(name);
    m.set_top(json.attributes.get("top").map_or(false, Param::as_bool));
    m.set_blackbox(
        json.attributes.get("blackbox").map_or(false, Param::as_bool)
            || json.attributes.get("whitebox").map_or(false, Param::as_bool),
    );

    let mut builder = ModuleBuilder {
        m,
        nets: HashMap::new(),
    };

    let mut ports = HashMap::new();
    for (port_name, port) in json.ports.iter() {
        let port: NetlistPort = serde_json::from_value(port.clone())?;
        let (input, output) = match port.direction.as_str() {
            "input" => (true, false),
            "output" => (false, true),
            "inout" => (true, true),
            direction => {
                return Err(builder.error(format!(
                    "port `{}` has unknown direction `{}`",
                    port_name, direction
                )))
            }
        };
        if port.bits.is_empty() {
            return Err(builder.error(format!("port `{}` has no bits", port_name)));
        }
        let wire = m.port(port_name.clone(), port.bits.len() as u32, input, output);
        builder.bind(wire, &port.bits)?;
        ports.insert(port_name.as_str(), wire);
    }

    for (net_name, net) in json.netnames.iter() {
        let wire = match ports.get(net_name.as_str()) {
            Some(&wire) => wire,
            None => {
                if net.bits.is_empty() {
                    debug!(wire = net_name.as_str(), "skipping zero-width net");
                    continue;
                }
                let wire = m.wire(net_name.clone(), net.bits.len() as u32);
                builder.bind(wire, &net.bits)?;
                wire
            }
        };
        if let Some(init) = net.attributes.get("init") {
            let init = init
                .to_const()
                .ok_or_else(|| builder.error(format!("invalid init value on wire `{}`", net_name)))?;
            wire.set_init(init.resized(wire.width()));
        }
    }

    for (memory_name, memory) in json.memories.iter() {
        if memory.width == 0 || memory.size == 0 {
            return Err(builder.error(format!("memory `{}` is empty", memory_name)));
        }
        let _ = m.memory(memory_name.clone(), memory.width, memory.size, memory.start_offset);
    }

    for (cell_name, cell) in json.cells.iter() {
        debug!(cell = cell_name.as_str(), kind = cell.cell_type.as_str(), "reading cell");
        let kind = CellReader {
            builder: &mut builder,
            name: cell_name,
            cell,
        }
        .read()?;
        let _ = m.add_cell(cell_name.clone(), kind);
    }

    Ok(())
}

struct CellReader<'r, 'a> {
    builder: &'r mut ModuleBuilder<'a>,
    name: &'r str,
    cell: &'r NetlistCell,
}

impl<'r, 'a> CellReader<'r, 'a> {
    fn error(&self, message: impl AsRef<str>) -> Error {
        self.builder
            .error(format!("cell `{}` {}", self.name, message.as_ref()))
    }

    fn port(&mut self, port: &str) -> Result<SigSpec<'a>> {
        let cell = self.cell;
        let bits = cell
            .connections
            .get(port)
            .ok_or_else(|| self.error(format!("has no `{}` port", port)))?;
        self.builder.sig(bits)
    }

    fn param(&self, name: &str) -> Result<&'r Param> {
        let cell = self.cell;
        cell.parameters
            .get(name)
            .ok_or_else(|| self.error(format!("has no `{}` parameter", name)))
    }

    fn param_const(&self, name: &str) -> Result<Const> {
        self.param(name)?
            .to_const()
            .ok_or_else(|| self.error(format!("has a non-constant `{}` parameter", name)))
    }

    fn param_bool(&self, name: &str) -> Result<bool> {
        Ok(self.param_const(name)?.as_bool())
    }

    fn param_i64(&self, name: &str) -> Result<i64> {
        self.param(name)?
            .as_i64()
            .ok_or_else(|| self.error(format!("has an invalid `{}` parameter", name)))
    }

    fn param_u32(&self, name: &str) -> Result<u32> {
        let value = self.param_i64(name)?;
        u32::try_from(value).map_err(|_| self.error(format!("has an out-of-range `{}` parameter", name)))
    }

    fn memid(&self) -> Result<String> {
        Ok(memory_name(&self.param("MEMID")?.as_string()))
    }

    fn read(mut self) -> Result<CellKind<'a>> {
        let cell = self.cell;
        let cell_type = cell.cell_type.as_str();

        if let Some(op) = unary_op(cell_type) {
            return Ok(CellKind::Unary {
                op,
                a: self.port("A")?,
                a_signed: self.param_bool("A_SIGNED")?,
                y: self.port("Y")?,
            });
        }
        if let Some(op) = binary_op(cell_type) {
            return Ok(CellKind::Binary {
                op,
                a: self.port("A")?,
                b: self.port("B")?,
                a_signed: self.param_bool("A_SIGNED")?,
                b_signed: self.param_bool("B_SIGNED")?,
                y: self.port("Y")?,
            });
        }
        if let Some(op) = shift_op(cell_type) {
            return Ok(CellKind::Shift {
                op,
                a: self.port("A")?,
                b: self.port("B")?,
                a_signed: self.param_bool("A_SIGNED")?,
                b_signed: self.param_bool("B_SIGNED")?,
                y: self.port("Y")?,
            });
        }

        Ok(match cell_type {
            "$logic_and" | "$logic_or" => CellKind::Logic {
                op: if cell_type == "$logic_and" {
                    LogicOp::And
                } else {
                    LogicOp::Or
                },
                a: self.port("A")?,
                b: self.port("B")?,
                y: self.port("Y")?,
            },
            "$mux" => CellKind::Mux {
                a: self.port("A")?,
                b: self.port("B")?,
                s: self.port("S")?,
                y: self.port("Y")?,
            },
            "$pmux" => CellKind::Pmux {
                a: self.port("A")?,
                b: self.port("B")?,
                s: self.port("S")?,
                y: self.port("Y")?,
            },
            "$slice" => CellKind::Slice {
                a: self.port("A")?,
                offset: self.param_u32("OFFSET")?,
                y: self.port("Y")?,
            },
            "$concat" => CellKind::Concat {
                a: self.port("A")?,
                b: self.port("B")?,
                y: self.port("Y")?,
            },
            "$dff" => CellKind::Dff {
                clk: self.port("CLK")?,
                clk_polarity: self.param_bool("CLK_POLARITY")?,
                d: self.port("D")?,
                q: self.port("Q")?,
            },
            "$adff" => CellKind::Adff {
                clk: self.port("CLK")?,
                clk_polarity: self.param_bool("CLK_POLARITY")?,
                arst: self.port("ARST")?,
                arst_polarity: self.param_bool("ARST_POLARITY")?,
                arst_value: self.param_const("ARST_VALUE")?,
                d: self.port("D")?,
                q: self.port("Q")?,
            },
            "$dffsr" => CellKind::Dffsr {
                clk: self.port("CLK")?,
                clk_polarity: self.param_bool("CLK_POLARITY")?,
                set: self.port("SET")?,
                set_polarity: self.param_bool("SET_POLARITY")?,
                clr: self.port("CLR")?,
                clr_polarity: self.param_bool("CLR_POLARITY")?,
                d: self.port("D")?,
                q: self.port("Q")?,
            },
            "$dlatch" => CellKind::Dlatch {
                en: self.port("EN")?,
                en_polarity: self.param_bool("EN_POLARITY")?,
                d: self.port("D")?,
                q: self.port("Q")?,
            },
            "$memrd" => CellKind::MemRd(MemRd {
                memid: self.memid()?,
                abits: self.param_u32("ABITS")?,
                clk: self.port("CLK")?,
                clk_enable: self.param_bool("CLK_ENABLE")?,
                clk_polarity: self.param_bool("CLK_POLARITY")?,
                transparent: self.param_bool("TRANSPARENT")?,
                addr: self.port("ADDR")?,
                data: self.port("DATA")?,
            }),
            "$memwr" => CellKind::MemWr(MemWr {
                memid: self.memid()?,
                abits: self.param_u32("ABITS")?,
                clk: self.port("CLK")?,
                clk_enable: self.param_bool("CLK_ENABLE")?,
                clk_polarity: self.param_bool("CLK_POLARITY")?,
                priority: self.param_i64("PRIORITY")?,
                addr: self.port("ADDR")?,
                data: self.port("DATA")?,
                en: self.port("EN")?,
            }),
            "$meminit" => CellKind::MemInit(MemInit {
                memid: self.memid()?,
                abits: self.param_u32("ABITS")?,
                priority: self.param_i64("PRIORITY")?,
                addr: self.port("ADDR")?,
                data: self.port("DATA")?,
            }),
            "$mem" => CellKind::Mem(Box::new(MemCell {
                memid: self.memid()?,
                width: self.param_u32("WIDTH")?,
                offset: self.param_i64("OFFSET")?,
                size: self.param_u32("SIZE")?,
                abits: self.param_u32("ABITS")?,
                init: self.param_const("INIT")?,

                wr_ports: self.param_u32("WR_PORTS")?,
                wr_clk_enable: self.param_const("WR_CLK_ENABLE")?,
                wr_clk_polarity: self.param_const("WR_CLK_POLARITY")?,
                wr_clk: self.port("WR_CLK")?,
                wr_addr: self.port("WR_ADDR")?,
                wr_data: self.port("WR_DATA")?,
                wr_en: self.port("WR_EN")?,

                rd_ports: self.param_u32("RD_PORTS")?,
                rd_clk_enable: self.param_const("RD_CLK_ENABLE")?,
                rd_clk_polarity: self.param_const("RD_CLK_POLARITY")?,
                rd_transparent: self.param_const("RD_TRANSPARENT")?,
                rd_clk: self.port("RD_CLK")?,
                rd_addr: self.port("RD_ADDR")?,
                rd_data: self.port("RD_DATA")?,
            })),
            "$assert" => CellKind::Assert {
                a: self.port("A")?,
                en: self.port("EN")?,
            },
            _ => {
                return Err(Error::unsupported(
                    self.builder.m.name(),
                    format!("cell `{}` of type `{}`", self.name, cell_type),
                ))
            }
        })
    }
}

fn unary_op(cell_type: &str) -> Option<UnaryOp> {
    Some(match cell_type {
        "$not" => UnaryOp::Not,
        "$neg" => UnaryOp::Neg,
        "$pos" => UnaryOp::Pos,
        "$reduce_and" => UnaryOp::ReduceAnd,
        "$reduce_or" => UnaryOp::ReduceOr,
        "$reduce_xor" => UnaryOp::ReduceXor,
        "$reduce_xnor" => UnaryOp::ReduceXnor,
        "$reduce_bool" => UnaryOp::ReduceBool,
        "$logic_not" => UnaryOp::LogicNot,
        _ => return None,
    })
}

fn binary_op(cell_type: &str) -> Option<BinaryOp> {
    Some(match cell_type {
        "$and" => BinaryOp::And,
        "$or" => BinaryOp::Or,
        "$xor" => BinaryOp::Xor,
        "$xnor" => BinaryOp::Xnor,
        "$lt" => BinaryOp::Lt,
        "$le" => BinaryOp::Le,
        "$eq" => BinaryOp::Eq,
        "$ne" => BinaryOp::Ne,
        "$eqx" => BinaryOp::Eqx,
        "$nex" => BinaryOp::Nex,
        "$ge" => BinaryOp::Ge,
        "$gt" => BinaryOp::Gt,
        "$add" => BinaryOp::Add,
        "$sub" => BinaryOp::Sub,
        "$mul" => BinaryOp::Mul,
        "$div" => BinaryOp::Div,
        "$mod" => BinaryOp::Mod,
        _ => return None,
    })
}

fn shift_op(cell_type: &str) -> Option<ShiftOp> {
    Some(match cell_type {
        "$shr" => ShiftOp::Shr,
        "$shl" => ShiftOp::Shl,
        "$sshr" => ShiftOp::Sshr,
        "$sshl" => ShiftOp::Sshl,
        "$shift" => ShiftOp::Shift,
        "$shiftx" => ShiftOp::Shiftx,
        _ => return None,
    })
}
