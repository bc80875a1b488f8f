use anyhow::{Context as _, Result};
use clap::Parser;
use rtlsmv::{json, smv, Context};
use tracing::info;

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Translate a Yosys JSON netlist into an SMV model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Netlist written by `write_json`
    input: PathBuf,

    /// Model file to write (defaults to stdout)
    output: Option<PathBuf>,

    /// Module to dump as `main`
    #[arg(long, value_name = "NAME")]
    top: Option<String>,

    /// Don't write the generator banner
    #[arg(long)]
    no_header: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(io::stderr)
        .init();

    let input = fs::File::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;
    let c = Context::new();
    json::read(&c, io::BufReader::new(input))
        .with_context(|| format!("Failed to read netlist {}", cli.input.display()))?;
    info!(modules = c.modules().len(), "netlist loaded");

    let options = smv::Options {
        top: cli.top,
        header: !cli.no_header,
    };

    let mut w: Box<dyn Write> = match cli.output {
        Some(ref path) => Box::new(BufWriter::new(
            fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    smv::generate_design(&c, &options, &mut w).context("Failed to generate SMV model")?;
    w.flush().context("Failed to write SMV model")?;

    Ok(())
}
