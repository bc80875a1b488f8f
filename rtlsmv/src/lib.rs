//! Translates word-level RTL netlists into [SMV](https://nusmv.fbk.eu/) transition-system models.
//!
//! rtlsmv holds a netlist in a [`Context`] of [`Module`]s, each made of [`Wire`]s, [`Cell`]s and [`Memory`]s.
//! Netlists can be built through the API directly or [read](json/fn.read.html) from the JSON written by Yosys' `write_json`, and are then [dumped](smv/fn.generate_design.html) as one SMV `MODULE` per netlist module, ready for a model checker such as nuXmv.
//!
//! The translation is syntax-directed: inputs become `IVAR`s, register outputs and memories become state `VAR`s, every intermediate value becomes a numbered `DEFINE`, and clocked cells contribute equations to the module's `TRANS` predicate.
//! Constructs without a translation are reported as an [`Error`] and nothing is written for the offending module.
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! rtlsmv = "0.1"
//! ```
//!
//! # Examples
//!
//! ```rust
//! use rtlsmv::*;
//!
//! // Create a context, which will contain our module(s)
//! let c = Context::new();
//!
//! // Describe a 1-bit toggle register
//! let m = c.module("toggle");
//! let clk = m.input("clk", 1);
//! let q = m.output("q", 1);
//! let d = m.wire("$not$q", 1);
//! m.add_cell("$not$1", CellKind::Unary { op: UnaryOp::Not, a: q.into(), a_signed: false, y: d.into() });
//! m.add_cell("$dff$2", CellKind::Dff { clk: clk.into(), clk_polarity: true, d: d.into(), q: q.into() });
//! q.set_init(Const::from_u64(0, 1));
//!
//! // Generate the SMV model
//! smv::generate_design(&c, &smv::Options::default(), std::io::stdout())?;
//! # Ok::<(), rtlsmv::Error>(())
//! ```
//!
//! [`Context`]: ./struct.Context.html
//! [`Module`]: ./struct.Module.html
//! [`Wire`]: ./struct.Wire.html
//! [`Cell`]: ./struct.Cell.html
//! [`Memory`]: ./struct.Memory.html
//! [`Error`]: ./enum.Error.html

// Must be kept up-to-date with version in Cargo.toml
#![doc(html_root_url = "https://docs.rs/rtlsmv/0.1.0")]

mod code_writer;
mod error;
mod graph;
pub mod json;
pub mod passes;
pub mod smv;

pub use error::{Error, Result};
pub use graph::*;
