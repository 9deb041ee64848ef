//! binlog-parse library
//!
//! Decodes MySQL binary log files into readable events, optionally naming
//! row values from a schema dump and collecting per-table statistics.
//!
//! # Modules
//!
//! - [`validate`] - binlog file checks before decoding
//! - [`reader`] - event decoding and position-based event selection
//! - [`dump`] - text and JSON rendering of decoded events
//! - [`parse`] - the parse and list-positions runs driven by the CLI
//!
//! Schema handling lives in the `binlog_schema` crate and statistics in
//! `binlog_stats`.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub mod dump;
pub mod parse;
pub mod reader;
pub mod validate;

/// Output format for row-change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable event dumps
    #[default]
    Text,
    /// One JSON object per changed row; other events are not printed
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "binlog-parse")]
#[command(about = "Decode MySQL binary logs into readable events and per-table statistics")]
#[command(long_about = None)]
pub struct ParseOpts {
    /// Binlog file to parse
    #[arg(long, value_name = "PATH", env = "BINLOG_PARSE_FILE")]
    pub file: PathBuf,

    /// Start position of the event to show
    #[arg(long)]
    pub offset: Option<u64>,

    /// Log position to start from (used when --offset is not given)
    #[arg(long, alias = "logPosition")]
    pub log_position: Option<u64>,

    /// Parse the entire binlog file
    #[arg(long)]
    pub all: bool,

    /// List all log positions in the binlog
    #[arg(long, alias = "listPositions")]
    pub list_positions: bool,

    /// Stop at the event following the target position
    #[arg(long, alias = "stopAtNext")]
    pub stop_at_next: bool,

    /// Show operation statistics by database and table instead of event dumps
    #[arg(long, alias = "showStats", env = "BINLOG_PARSE_SHOW_STATS")]
    pub show_stats: bool,

    /// Show event boundaries, the schema summary and schema hits
    #[arg(long, env = "BINLOG_PARSE_VERBOSE")]
    pub verbose: bool,

    /// MySQL schema dump (SQL or JSON) used to name row columns
    #[arg(long, value_name = "PATH", env = "BINLOG_PARSE_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Output format for row events
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
