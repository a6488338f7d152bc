//! Summarize the newest build of every platform in a sync bot log dir.
//!
//! Expects `<buildlog_dir>/<platform>/N.txt` plus optional `N.meta.json`,
//! e.g. after `rsync -az bot:buildlog . && annotate buildlog`.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use syncbot_tools::discover;
use syncbot_tools::display;

#[derive(Parser)]
#[command(name = "annotate", version, about = "Print pass/fail of the newest build per platform")]
struct Cli {
    /// Directory with one subdirectory of build logs per platform
    buildlog_dir: PathBuf,

    /// Append build number, start time, duration, failing step and log path
    #[arg(long)]
    details: bool,

    /// Print the parsed newest build of each platform as JSON
    #[arg(long)]
    json: bool,
}

fn run(cli: Cli) -> Result<()> {
    let summaries = discover::platform_summaries(&cli.buildlog_dir)?;

    if cli.json {
        println!("{}", display::format_json(&summaries));
    } else {
        print!("{}", display::format_summary(&summaries, cli.details));
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprint!("{}", err);
            process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
