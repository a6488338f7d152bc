use std::io::Write;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::debug;

pub const DEFAULT_REPETITIONS: usize = 5;

/// Drop one leading `--` so `bench -o out.txt -- cmd --flag` works.
pub fn strip_separator(cmd: &[String]) -> &[String] {
    match cmd.split_first() {
        Some((first, rest)) if first == "--" => rest,
        _ => cmd,
    }
}

fn run_once(program: &str, args: &[String]) -> Result<Duration> {
    let start = Instant::now();
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run '{}'", program))?;
    let elapsed = start.elapsed();
    // Only the time matters; a failing command is still measured.
    debug!("'{}' exited with {} after {:?}", program, status, elapsed);
    Ok(elapsed)
}

/// Run `cmd` once to warm up, then `repetitions` more times, writing each
/// run's wall-clock seconds to `out` as its own line.
///
/// The child inherits stdin/stdout/stderr.
pub fn run(cmd: &[String], repetitions: usize, out: &mut dyn Write) -> Result<Vec<Duration>> {
    let cmd = strip_separator(cmd);
    let Some((program, args)) = cmd.split_first() else {
        bail!("No command given to benchmark");
    };

    run_once(program, args)?;

    let mut times = Vec::with_capacity(repetitions);
    for _ in 0..repetitions {
        let elapsed = run_once(program, args)?;
        writeln!(out, "{}", elapsed.as_secs_f64())?;
        out.flush()?;
        times.push(elapsed);
    }

    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn separator_stripped_once() {
        let cmd = args(&["--", "ls", "-l"]);
        assert_eq!(strip_separator(&cmd), &cmd[1..]);

        let cmd = args(&["--", "--", "x"]);
        assert_eq!(strip_separator(&cmd), &cmd[1..]);
    }

    #[test]
    fn no_separator_unchanged() {
        let cmd = args(&["ls", "--"]);
        assert_eq!(strip_separator(&cmd), &cmd[..]);
        assert!(strip_separator(&[]).is_empty());
    }

    #[test]
    fn empty_command_is_error() {
        let mut out = Vec::new();
        assert!(run(&[], 2, &mut out).is_err());
        assert!(run(&args(&["--"]), 2, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn missing_program_is_error() {
        let mut out = Vec::new();
        let cmd = args(&["syncbot-tools-no-such-program-xyz"]);
        assert!(run(&cmd, 1, &mut out).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn writes_one_line_per_repetition() {
        let mut out = Vec::new();
        let times = run(&args(&["true"]), 3, &mut out).unwrap();
        assert_eq!(times.len(), 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<f64> = text.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|&t| t >= 0.0));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_still_timed() {
        let mut out = Vec::new();
        let times = run(&args(&["false"]), 2, &mut out).unwrap();
        assert_eq!(times.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn zero_repetitions_only_warms_up() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let counter = tmp.path().join("count");
        let script = format!("echo run >> '{}'", counter.display());
        let mut out = Vec::new();
        let times = run(&args(&["sh", "-c", &script]), 0, &mut out).unwrap();
        assert!(times.is_empty());
        assert!(out.is_empty());
        assert_eq!(std::fs::read_to_string(&counter).unwrap().lines().count(), 1);
    }
}
