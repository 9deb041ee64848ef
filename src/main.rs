//! Command-line interface for binlog-parse
//!
//! # Usage Examples
//!
//! ## Single event
//! ```bash
//! # Dump the event starting at byte 4208
//! binlog-parse --file mysql-bin.000003 --offset 4208
//!
//! # Same, and stop once the following event is reached
//! binlog-parse --file mysql-bin.000003 --log-position 4208 --stop-at-next
//! ```
//!
//! ## Whole file
//! ```bash
//! # Name row columns from a mysqldump and print per-table statistics
//! binlog-parse --file mysql-bin.000003 --all \
//!   --schema sbtest-schema.sql --show-stats
//!
//! # One JSON object per changed row
//! binlog-parse --file mysql-bin.000003 --all --schema schema.json --format json
//!
//! # Start positions of every event
//! binlog-parse --file mysql-bin.000003 --list-positions
//! ```

use std::io::{self, BufWriter, Write};

use binlog_parse::parse::run;
use binlog_parse::ParseOpts;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let opts = ParseOpts::parse();

    // Initialize tracing
    let default_level = if opts.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = run(&opts, &mut out);
    out.flush()?;

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
