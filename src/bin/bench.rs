//! Time a command repeatedly and write one elapsed-seconds line per run,
//! ready for `ministat`:
//!
//! ```text
//! bench -o before.txt out/bin/ld.lld @response.txt
//! # ...rebuild with some change...
//! bench -o after.txt out/bin/ld.lld @response.txt
//! ministat before.txt after.txt
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use syncbot_tools::bench::{self, DEFAULT_REPETITIONS};

#[derive(Parser)]
#[command(name = "bench", version, about = "Time a command; one line of seconds per run")]
struct Cli {
    /// Number of timed repetitions (after one warm-up run)
    #[arg(short = 'n', default_value_t = DEFAULT_REPETITIONS)]
    n: usize,

    /// Write timing output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Command to time, optionally preceded by `--`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    cmd: Vec<String>,
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    bench::run(&cli.cmd, cli.n, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
