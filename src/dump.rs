//! Rendering of decoded events.

use std::io::{self, Write};

use binlog_schema::{Fields, RowChangeProjection};

use crate::reader::{EventBody, EventHeader, Selection, TableMapInfo};
use crate::OutputFormat;

/// Name of a MySQL column type code as shown in table map dumps.
pub fn column_type_name(code: u8) -> Option<&'static str> {
    let name = match code {
        1 => "TINYINT",
        2 => "SMALLINT",
        3 => "INT",
        4 => "FLOAT",
        5 => "DOUBLE",
        6 => "NULL",
        7 => "TIMESTAMP",
        8 => "BIGINT",
        9 => "MEDIUMINT",
        10 => "DATE",
        11 => "TIME",
        12 => "DATETIME",
        13 => "YEAR",
        15 => "VARCHAR",
        16 => "BIT",
        17 => "TIMESTAMP2",
        18 => "DATETIME2",
        19 => "TIME2",
        245 => "JSON",
        246 => "DECIMAL",
        247 => "ENUM",
        248 => "SET",
        249 => "TINY_BLOB",
        250 => "MEDIUM_BLOB",
        251 => "LONG_BLOB",
        252 => "BLOB",
        253 => "VAR_STRING",
        254 => "STRING",
        255 => "GEOMETRY",
        _ => return None,
    };
    Some(name)
}

fn format_timestamp(timestamp: u32) -> String {
    chrono::DateTime::from_timestamp(i64::from(timestamp), 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Start, size and end of an event relative to the selected start position.
pub fn write_boundaries<W: Write>(
    out: &mut W,
    header: &EventHeader,
    selection: Selection,
) -> io::Result<()> {
    writeln!(out, "\nEvent boundaries:")?;
    writeln!(out, "  Start position: {}", header.start_position())?;
    writeln!(out, "  Size: {} bytes", header.event_size)?;
    writeln!(
        out,
        "  End position: {} (where next event starts)",
        header.end_position()
    )?;
    match selection {
        Selection::All => writeln!(
            out,
            "  (Reading entire binlog starting from position {})",
            selection.start_position()
        ),
        Selection::At(target) => writeln!(out, "  (Target position: {target})"),
    }
}

pub fn write_header<W: Write>(out: &mut W, header: &EventHeader) -> io::Result<()> {
    writeln!(out, "=== {} ===", header.event_type_name)?;
    writeln!(out, "Date: {}", format_timestamp(header.timestamp))?;
    writeln!(out, "Log position: {}", header.log_position)?;
    writeln!(out, "Event size: {}", header.event_size)
}

/// Dump a non-row event.
pub fn write_event<W: Write>(out: &mut W, header: &EventHeader, body: &EventBody) -> io::Result<()> {
    if let EventBody::TableMap(info) = body {
        return write_table_map(out, info);
    }

    write_header(out, header)?;
    match body {
        EventBody::FormatDescription { server_version } => {
            writeln!(out, "Server version: {server_version}")?;
        }
        EventBody::Query {
            schema,
            query,
            execution_time,
            error_code,
        } => {
            writeln!(out, "Schema: {schema}")?;
            writeln!(out, "Execution time: {execution_time}")?;
            writeln!(out, "Error code: {error_code}")?;
            writeln!(out, "Query: {query}")?;
        }
        EventBody::Rotate { next_log, position } => {
            writeln!(out, "Next log name: {next_log}")?;
            writeln!(out, "Position: {position}")?;
        }
        EventBody::Gtid { gtid } => writeln!(out, "GTID_NEXT: {gtid}")?,
        EventBody::Rows(rows) => {
            writeln!(
                out,
                "Table: {}.{} (table id {})",
                rows.database, rows.table, rows.table_id
            )?;
            writeln!(
                out,
                "{} {} row(s)",
                rows.change.operation(),
                rows.change.row_count()
            )?;
        }
        EventBody::Other(detail) => writeln!(out, "{detail}")?,
        EventBody::TableMap(_) => {}
    }
    writeln!(out)
}

pub fn write_table_map<W: Write>(out: &mut W, info: &TableMapInfo) -> io::Result<()> {
    writeln!(out, "=== TableMapEvent ===")?;
    writeln!(out, "Schema: {}", info.database)?;
    writeln!(out, "Table: {}", info.table)?;
    writeln!(out, "Column count: {}", info.columns.len())?;

    writeln!(out, "\nColumns:")?;
    for (idx, column) in info.columns.iter().enumerate() {
        let type_name = match column.type_code {
            Some(code) => column_type_name(code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("TYPE_{code}")),
            None => "TYPE_UNKNOWN".to_string(),
        };
        let nullable = if column.nullable { "YES" } else { "NO" };
        writeln!(out, "  [{idx}] {type_name:<12} nullable={nullable}")?;
    }
    writeln!(out, "\nTable ID: {}", info.table_id)?;
    writeln!(out)
}

/// Dump the projected rows of a rows event.
pub fn write_rows<W: Write>(
    out: &mut W,
    header: &EventHeader,
    table_id: u64,
    projections: &[RowChangeProjection<String>],
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        for projection in projections {
            serde_json::to_writer(&mut *out, projection)?;
            writeln!(out)?;
        }
        return Ok(());
    }

    write_header(out, header)?;
    if let Some(first) = projections.first() {
        writeln!(
            out,
            "Table: {}.{} (table id {table_id})",
            first.database, first.table
        )?;
    }
    for projection in projections {
        writeln!(
            out,
            "{} {}.{}",
            projection.operation, projection.database, projection.table
        )?;
        match &projection.previous_fields {
            Some(previous) => {
                writeln!(out, "  before:")?;
                write_fields(out, previous, "    ")?;
                writeln!(out, "  after:")?;
                write_fields(out, &projection.fields, "    ")?;
            }
            None => write_fields(out, &projection.fields, "  ")?,
        }
    }
    writeln!(out)
}

fn write_fields<W: Write>(out: &mut W, fields: &Fields<String>, indent: &str) -> io::Result<()> {
    for (name, value) in fields.iter() {
        writeln!(out, "{indent}{name} = {value}")?;
    }
    Ok(())
}
