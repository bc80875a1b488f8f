use crate::error::*;
use crate::graph;

const MEMORY_DFF_REMEDY: &str = "memory_dff -wr_only";

/// Rejects constructs the dumper has no translation for before anything is emitted.
pub fn validate_module<'a>(m: &'a graph::Module<'a>) -> Result<()> {
    if let Some(process) = m.processes().first() {
        return Err(Error::unsupported(
            m.name(),
            format!("process `{}` (run `proc` first)", process),
        ));
    }

    for cell in m.cells() {
        match cell.kind() {
            graph::CellKind::Mem(_) => {
                return Err(Error::unsupported(
                    m.name(),
                    format!(
                        "cell `{}` of type `$mem` (dump the design before memory collection)",
                        cell.name()
                    ),
                ));
            }
            graph::CellKind::MemRd(rd) if rd.clk_enable => {
                return Err(memory_configuration(
                    m,
                    cell,
                    "is a $memrd cell with a built-in read register",
                ));
            }
            graph::CellKind::MemWr(wr) if !wr.clk_enable => {
                return Err(memory_configuration(
                    m,
                    cell,
                    "is a $memwr cell without a built-in write register",
                ));
            }
            _ => (),
        }
    }

    Ok(())
}

fn memory_configuration<'a>(m: &'a graph::Module<'a>, cell: &'a graph::Cell<'a>, reason: &str) -> Error {
    Error::UnsupportedMemoryConfiguration {
        module: m.name().to_string(),
        cell: cell.name().to_string(),
        reason: reason.into(),
        remedy: MEMORY_DFF_REMEDY.into(),
    }
}
