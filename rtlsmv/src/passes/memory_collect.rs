use crate::error::*;
use crate::graph::*;

use tracing::{debug, info, warn};

use std::cmp::Ordering;

/// Replaces the `$memrd`, `$memwr` and `$meminit` cells of every memory in `m` with one multi-port `$mem` cell per memory, then removes the memories.
///
/// Write ports are ordered by ascending priority and read ports by name, and each port's signals are zero-extended to the memory's address and data widths.
/// Constant `$meminit` rows are folded into the cell's `init` value; memories without any cells are removed without replacement.
pub fn memory_collect<'a>(m: &'a Module<'a>) -> Result<()> {
    let mut memories = m.memories();
    memories.sort_by(|a, b| a.name().cmp(b.name()));

    for memory in memories {
        collect_memory(m, memory)?;
        m.remove_memory(memory);
    }

    Ok(())
}

fn priority(cell: &Cell<'_>) -> i64 {
    match cell.kind() {
        CellKind::MemWr(wr) => wr.priority,
        CellKind::MemInit(init) => init.priority,
        _ => 0,
    }
}

fn port_order(a: &Cell<'_>, b: &Cell<'_>) -> Ordering {
    match (a.kind(), b.kind()) {
        (CellKind::MemRd(_), CellKind::MemRd(_)) => a.name().cmp(b.name()),
        (CellKind::MemRd(_), _) => Ordering::Greater,
        (_, CellKind::MemRd(_)) => Ordering::Less,
        _ => priority(a).cmp(&priority(b)),
    }
}

fn resized<'a>(mut sig: SigSpec<'a>, width: u32) -> SigSpec<'a> {
    sig.extend_u0(width);
    sig
}

fn flags(bits: Vec<State>) -> Const {
    if bits.is_empty() {
        Const::from_u64(0, 1)
    } else {
        Const::new(bits)
    }
}

fn collect_memory<'a>(m: &'a Module<'a>, memory: &'a Memory<'a>) -> Result<()> {
    info!(module = m.name(), memory = memory.name(), "collecting memory ports");

    let mut cells = m
        .cells()
        .into_iter()
        .filter(|cell| match cell.kind() {
            CellKind::MemRd(_) | CellKind::MemWr(_) | CellKind::MemInit(_) => {
                cell.kind().memid() == Some(memory.name())
            }
            _ => false,
        })
        .collect::<Vec<_>>();
    if cells.is_empty() {
        debug!(memory = memory.name(), "no cells found, removing memory");
        return Ok(());
    }
    cells.sort_by(|a, b| port_order(a, b));

    let abits = cells
        .iter()
        .map(|cell| match cell.kind() {
            CellKind::MemRd(rd) => rd.abits,
            CellKind::MemWr(wr) => wr.abits,
            CellKind::MemInit(init) => init.abits,
            _ => 0,
        })
        .max()
        .unwrap_or(0);
    let width = memory.width();
    let sigmap = SigMap::new(m);

    let mut init = Const::new(vec![State::Sx; (memory.size() * width) as usize]);

    let mut wr_ports = 0;
    let mut wr_clk_enable = Vec::new();
    let mut wr_clk_polarity = Vec::new();
    let mut wr_clk = SigSpec::new();
    let mut wr_addr = SigSpec::new();
    let mut wr_data = SigSpec::new();
    let mut wr_en = SigSpec::new();

    let mut rd_ports = 0;
    let mut rd_clk_enable = Vec::new();
    let mut rd_clk_polarity = Vec::new();
    let mut rd_transparent = Vec::new();
    let mut rd_clk = SigSpec::new();
    let mut rd_addr = SigSpec::new();
    let mut rd_data = SigSpec::new();

    for &cell in cells.iter() {
        debug!(cell = cell.name(), kind = cell.type_name(), "collecting port");

        match cell.kind() {
            CellKind::MemInit(meminit) => {
                let addr = sigmap.apply(&meminit.addr).as_const().ok_or_else(|| {
                    Error::unsupported(
                        m.name(),
                        format!(
                            "non-constant address `{}` in memory initialization `{}`",
                            meminit.addr,
                            cell.name()
                        ),
                    )
                })?;
                let data = sigmap.apply(&meminit.data).as_const().ok_or_else(|| {
                    Error::unsupported(
                        m.name(),
                        format!(
                            "non-constant data `{}` in memory initialization `{}`",
                            meminit.data,
                            cell.name()
                        ),
                    )
                })?;
                let addr = addr.as_u64().ok_or_else(|| {
                    Error::unsupported(
                        m.name(),
                        format!("undefined address `{}` in memory initialization `{}`", addr, cell.name()),
                    )
                })? as i64;

                let offset = (addr - memory.start_offset()) * width as i64;
                if offset < 0 || offset + data.width() as i64 > init.width() as i64 {
                    warn!(
                        cell = cell.name(),
                        address = addr,
                        "memory initialization is out of bounds"
                    );
                }
                for (i, &bit) in data.bits.iter().enumerate() {
                    let position = offset + i as i64;
                    if position >= 0 && (position as usize) < init.bits.len() {
                        init.bits[position as usize] = bit;
                    }
                }
            }
            CellKind::MemWr(wr) => {
                wr_clk.append(&resized(sigmap.apply(&wr.clk), 1));
                wr_clk_enable.push(State::from(wr.clk_enable));
                wr_clk_polarity.push(State::from(wr.clk_polarity));
                wr_addr.append(&resized(sigmap.apply(&wr.addr), abits));
                wr_data.append(&resized(sigmap.apply(&wr.data), width));
                wr_en.append(&resized(sigmap.apply(&wr.en), width));
                wr_ports += 1;
            }
            CellKind::MemRd(rd) => {
                rd_clk.append(&resized(sigmap.apply(&rd.clk), 1));
                rd_clk_enable.push(State::from(rd.clk_enable));
                rd_clk_polarity.push(State::from(rd.clk_polarity));
                rd_transparent.push(State::from(rd.transparent));
                rd_addr.append(&resized(sigmap.apply(&rd.addr), abits));
                rd_data.append(&resized(sigmap.apply(&rd.data), width));
                rd_ports += 1;
            }
            _ => (),
        }
    }

    // Trailing undefined words carry nothing
    while init.bits.len() > 1 && init.bits[init.bits.len() - 1] == State::Sx && init.bits[init.bits.len() - 2] == State::Sx {
        init.bits.pop();
    }

    let mut index = 1;
    let name = loop {
        let name = format!("$mem${}${}", memory.name(), index);
        if m.cell_by_name(&name).is_none() {
            break name;
        }
        index += 1;
    };
    debug!(cell = name.as_str(), wr_ports, rd_ports, "creating $mem cell");

    m.add_cell(
        name,
        CellKind::Mem(Box::new(MemCell {
            memid: memory.name().to_string(),
            width,
            offset: memory.start_offset(),
            size: memory.size(),
            abits,
            init,

            wr_ports,
            wr_clk_enable: flags(wr_clk_enable),
            wr_clk_polarity: flags(wr_clk_polarity),
            wr_clk,
            wr_addr,
            wr_data,
            wr_en,

            rd_ports,
            rd_clk_enable: flags(rd_clk_enable),
            rd_clk_polarity: flags(rd_clk_polarity),
            rd_transparent: flags(rd_transparent),
            rd_clk,
            rd_addr,
            rd_data,
        })),
    );

    for cell in cells {
        m.remove_cell(cell);
    }

    Ok(())
}
