use crate::error::*;
use crate::graph;

use std::collections::{HashMap, HashSet};

/// One cell output chunk driving a contiguous range of a wire.
#[derive(Clone, Copy)]
pub(crate) struct Producer<'a> {
    pub cell: &'a graph::Cell<'a>,
    /// First driven bit of the wire.
    pub wire_offset: u32,
    pub width: u32,
    /// Position of the first driven bit within the cell's output.
    pub output_offset: u32,
}

/// Maps each wire to the cells driving it, ordered by the driven bit range.
pub(crate) struct ProducerIndex<'a> {
    producers: HashMap<&'a graph::Wire<'a>, Vec<Producer<'a>>>,
    register_wires: HashSet<&'a graph::Wire<'a>>,
}

impl<'a> ProducerIndex<'a> {
    pub fn new(
        m: &'a graph::Module<'a>,
        sigmap: &graph::SigMap<'a>,
        cells: &[&'a graph::Cell<'a>],
    ) -> Result<ProducerIndex<'a>> {
        let mut producers = HashMap::<_, Vec<Producer<'a>>>::new();
        let mut register_wires = HashSet::new();

        for &cell in cells.iter() {
            let output = match cell.output() {
                Some(output) => sigmap.apply(output),
                _ => continue,
            };
            let is_register = cell.kind().is_register();

            let mut output_offset = 0;
            for chunk in output.chunks() {
                if let graph::SigChunk::Wire {
                    wire,
                    offset,
                    width,
                } = *chunk
                {
                    producers.entry(wire).or_default().push(Producer {
                        cell,
                        wire_offset: offset,
                        width,
                        output_offset,
                    });
                    if is_register {
                        register_wires.insert(wire);
                    }
                }
                output_offset += chunk.width();
            }
        }

        for (wire, list) in producers.iter_mut() {
            list.sort_by_key(|p| p.wire_offset);
            for pair in list.windows(2) {
                if pair[0].wire_offset + pair[0].width > pair[1].wire_offset {
                    return Err(Error::consistency(
                        m.name(),
                        format!(
                            "wire `{}` is driven by both `{}` and `{}`",
                            wire.name(),
                            pair[0].cell.name(),
                            pair[1].cell.name()
                        ),
                    ));
                }
            }
        }

        Ok(ProducerIndex {
            producers,
            register_wires,
        })
    }

    pub fn get(&self, wire: &'a graph::Wire<'a>) -> &[Producer<'a>] {
        self.producers.get(&wire).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Returns `true` if `wire` is (partly) driven by a register or latch output.
    pub fn is_register_wire(&self, wire: &'a graph::Wire<'a>) -> bool {
        self.register_wires.contains(&wire)
    }
}
