//! Netlist transformations.

mod memory_collect;

pub use memory_collect::*;
