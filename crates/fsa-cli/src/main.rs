#![forbid(unsafe_code)]
//! Audit a filesystem metadata report and print every inconsistency found.
//!
//! Diagnostic lines go to stdout; logging and errors go to stderr so the
//! transcript stays byte-comparable. Exit status is 0 after a completed
//! audit regardless of how many findings it produced, and non-zero only for
//! a usage error or an unreadable/malformed report.

use anyhow::{Context, Result};
use std::env;
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let program = args.first().map_or("fsa-cli", String::as_str);
        eprintln!("usage: {program} FILE");
        std::process::exit(1);
    }

    if let Err(error) = run(Path::new(&args[1])) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run(report: &Path) -> Result<()> {
    let snapshot = fsa_report::load_snapshot(report)
        .with_context(|| format!("failed to load metadata report {}", report.display()))?;

    let mut stdout = io::stdout().lock();
    for finding in fsa_audit::run_audit(&snapshot) {
        writeln!(stdout, "{finding}")?;
    }
    Ok(())
}
