//! Parse runs driven by the CLI.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use binlog_schema::{project_change_with, RowProjector, SchemaRegistry};
use binlog_stats::Statistics;

use crate::dump;
use crate::reader::{BinlogReader, Decision, EventBody, EventHeader, PositionFilter, Selection};
use crate::validate::validate_binlog_file;
use crate::{OutputFormat, ParseOpts};

/// Run the tool with the given options, writing the dump to `out`.
pub fn run<W: Write>(opts: &ParseOpts, out: &mut W) -> anyhow::Result<()> {
    validate_binlog_file(&opts.file)?;

    if opts.list_positions {
        return list_positions(&opts.file, out);
    }

    let selection = Selection::resolve(opts.all, opts.offset, opts.log_position)?;
    tracing::info!(
        "Parsing {} from position {}",
        opts.file.display(),
        selection.start_position()
    );

    let registry = match &opts.schema {
        Some(path) => {
            let registry =
                SchemaRegistry::from_path(path).context("Error loading schema file")?;
            if opts.verbose {
                writeln!(out, "{}", registry.summary())?;
            }
            Some(registry)
        }
        None => None,
    };
    let projector = registry
        .as_ref()
        .map(RowProjector::new)
        .unwrap_or_default();

    let mut stats = Statistics::new();
    let outcome = process_events(opts, selection, &projector, &mut stats, out);

    if opts.show_stats {
        write_statistics(opts.format, &stats, registry.as_ref(), out)?;
    }
    outcome
}

/// Print the log position of every event in the file.
pub fn list_positions<W: Write>(path: &Path, out: &mut W) -> anyhow::Result<()> {
    let mut reader = BinlogReader::open(path)?;
    while let Some(event) = reader.next_event()? {
        let header = EventHeader::from_event(&event);
        writeln!(out, "Log position: {}", header.log_position)?;
    }
    Ok(())
}

fn process_events<W: Write>(
    opts: &ParseOpts,
    selection: Selection,
    projector: &RowProjector<'_>,
    stats: &mut Statistics,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut reader = BinlogReader::open(&opts.file)?;
    let mut filter = PositionFilter::new(selection, opts.stop_at_next);
    let dump_events = !opts.show_stats;
    let text = opts.format == OutputFormat::Text;

    while let Some(event) = reader.next_event()? {
        let header = EventHeader::from_event(&event);
        match filter.decide(&header) {
            Decision::Skip => continue,
            Decision::Stop => {
                writeln!(
                    out,
                    "found next event at position {}",
                    header.start_position()
                )?;
                break;
            }
            Decision::Process => {}
        }

        stats.record_event_type(header.event_type);
        if opts.verbose && dump_events && text {
            dump::write_boundaries(out, &header, selection)?;
        }

        let body = reader
            .decode(&event)
            .with_context(|| format!("Error at log position {}", header.start_position()))?;

        match body {
            EventBody::Rows(rows) => {
                let operation = rows.change.operation();
                stats.record_operation(
                    &rows.database,
                    &rows.table,
                    operation,
                    rows.change.row_count(),
                );

                let definition = projector.resolve(&rows.database, &rows.table);
                if let Some(definition) = definition {
                    tracing::debug!(
                        "Found schema for {}.{} with {} columns",
                        rows.database,
                        rows.table,
                        definition.columns.len()
                    );
                    if opts.verbose && dump_events && text {
                        writeln!(
                            out,
                            "Found schema for {}.{} with {} columns",
                            rows.database,
                            rows.table,
                            definition.columns.len()
                        )?;
                    }
                }

                if dump_events {
                    let projections =
                        project_change_with(definition, &rows.database, &rows.table, rows.change);
                    dump::write_rows(out, &header, rows.table_id, &projections, opts.format)?;
                }
            }
            other => {
                if dump_events && text {
                    dump::write_event(out, &header, &other)?;
                }
            }
        }
    }

    if let Selection::At(target) = selection {
        if !filter.found() {
            tracing::warn!("No event starts at position {target}");
        }
    }
    Ok(())
}

fn write_statistics<W: Write>(
    format: OutputFormat,
    stats: &Statistics,
    registry: Option<&SchemaRegistry>,
    out: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            write!(out, "{stats}")?;
            if let Some(registry) = registry {
                write!(out, "{}", registry.render_miss_report())?;
            }
        }
        OutputFormat::Json => {
            let misses = registry.map(SchemaRegistry::miss_report).unwrap_or_default();
            let report = serde_json::json!({
                "statistics": stats,
                "schema_misses": misses,
            });
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binlog_schema::Operation;

    #[test]
    fn test_json_statistics_include_misses() {
        let mut registry = SchemaRegistry::new();
        registry
            .load("USE app;\nCREATE TABLE users (id INT);\n".as_bytes())
            .unwrap();
        assert!(registry.lookup("app", "orders").is_none());

        let mut stats = Statistics::new();
        stats.record_event_type(30);
        stats.record_operation("app", "orders", Operation::Insert, 2);

        let mut out = Vec::new();
        write_statistics(OutputFormat::Json, &stats, Some(&registry), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["statistics"]["total_events"], 1);
        assert_eq!(
            value["statistics"]["tables"]["app"]["orders"]["operations"]["INSERT"]["row_count"],
            2
        );
        assert_eq!(value["schema_misses"][0]["count"], 1);
        assert_eq!(value["schema_misses"][0]["key"]["table"], "orders");
    }

    #[test]
    fn test_text_statistics_append_miss_report() {
        let registry = SchemaRegistry::new();
        assert!(registry.lookup("app", "ghost").is_none());

        let mut out = Vec::new();
        write_statistics(OutputFormat::Text, &Statistics::new(), Some(&registry), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Parsing Statistics:"));
        assert!(text.contains("Schema warnings:"));
        assert!(text.contains("  app.ghost: 1 lookups\n"));
    }
}
