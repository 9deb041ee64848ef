//! Operation statistics for binlog-parse.
//!
//! Counts processed events by type and row operations by database, table and
//! operation, and renders the end-of-run report.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use binlog_schema::Operation;
use serde::Serialize;

/// Count of events and affected rows for one operation on one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub row_count: u64,
}

impl OperationStats {
    fn average_rows(&self) -> f64 {
        average(self.row_count, self.count)
    }
}

/// Per-operation counters of a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub operations: BTreeMap<Operation, OperationStats>,
}

/// Statistics collected over one run.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub event_counts: BTreeMap<u8, u64>,
    pub total_events: u64,
    /// database -> table -> counters
    pub tables: BTreeMap<String, BTreeMap<String, TableStats>>,
    #[serde(skip)]
    start_time: Instant,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            event_counts: BTreeMap::new(),
            total_events: 0,
            tables: BTreeMap::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record_event_type(&mut self, event_type: u8) {
        *self.event_counts.entry(event_type).or_insert(0) += 1;
        self.total_events += 1;
    }

    pub fn record_operation(
        &mut self,
        database: &str,
        table: &str,
        operation: Operation,
        row_count: usize,
    ) {
        tracing::trace!("{operation} on {database}.{table}: {row_count} rows");
        let stats = self
            .tables
            .entry(database.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default()
            .operations
            .entry(operation)
            .or_default();
        stats.count += 1;
        stats.row_count += row_count as u64;
    }

    pub fn get(&self, database: &str, table: &str, operation: Operation) -> Option<OperationStats> {
        self.tables
            .get(database)?
            .get(table)?
            .operations
            .get(&operation)
            .copied()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Render the report using the time elapsed since creation.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Render the report for a given run duration.
    pub fn render_with_elapsed(&self, elapsed: Duration) -> String {
        self.report(elapsed).to_string()
    }

    pub fn report(&self, elapsed: Duration) -> StatisticsReport<'_> {
        StatisticsReport {
            stats: self,
            elapsed,
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.report(self.elapsed()))
    }
}

/// End-of-run report over a fixed duration.
pub struct StatisticsReport<'a> {
    stats: &'a Statistics,
    elapsed: Duration,
}

impl fmt::Display for StatisticsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        let secs = self.elapsed.as_secs_f64();

        writeln!(f, "\nParsing Statistics:")?;
        writeln!(
            f,
            "Total Events: {} ({:.2} events/sec)",
            stats.total_events,
            rate(stats.total_events, secs)
        )?;
        writeln!(f, "Duration: {:?}", self.elapsed)?;

        if !stats.event_counts.is_empty() {
            writeln!(f, "\nEvent Type Breakdown:")?;
            for (event_type, count) in &stats.event_counts {
                writeln!(f, "- Type {event_type}: {count}")?;
            }
        }

        if stats.tables.is_empty() {
            return Ok(());
        }

        writeln!(f, "\nOperation Statistics:")?;
        writeln!(f, "====================")?;

        let mut total_ops = 0u64;
        let mut total_rows = 0u64;

        for (database, tables) in &stats.tables {
            writeln!(f, "\nDatabase: {database}")?;
            writeln!(f, "{}", "-".repeat(database.len() + 10))?;

            for (table, table_stats) in tables {
                writeln!(f, "\nTable: {table}")?;

                let mut operations: Vec<_> = table_stats.operations.iter().collect();
                operations.sort_by_key(|(op, _)| op.as_str());

                for (op, op_stats) in operations {
                    writeln!(
                        f,
                        "  {:<7}: {} operations affecting {} rows (avg {:.1} rows/op)",
                        op.as_str(),
                        op_stats.count,
                        op_stats.row_count,
                        op_stats.average_rows()
                    )?;
                    total_ops += op_stats.count;
                    total_rows += op_stats.row_count;
                }
            }
        }

        writeln!(f, "\nSummary:")?;
        writeln!(f, "--------")?;
        writeln!(f, "Total operations: {total_ops}")?;
        writeln!(f, "Total rows affected: {total_rows}")?;
        writeln!(
            f,
            "Average rows per operation: {:.1}",
            average(total_rows, total_ops)
        )?;
        writeln!(f, "Operations per second: {:.2}", rate(total_ops, secs))
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

fn rate(count: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation_accumulates() {
        let mut stats = Statistics::new();
        stats.record_operation("sbtest", "sbtest1", Operation::Insert, 3);
        stats.record_operation("sbtest", "sbtest1", Operation::Insert, 1);
        stats.record_operation("sbtest", "sbtest1", Operation::Update, 2);

        assert_eq!(
            stats.get("sbtest", "sbtest1", Operation::Insert),
            Some(OperationStats {
                count: 2,
                row_count: 4
            })
        );
        assert_eq!(
            stats.get("sbtest", "sbtest1", Operation::Update).map(|s| s.row_count),
            Some(2)
        );
        assert_eq!(stats.get("sbtest", "sbtest1", Operation::Delete), None);
    }

    #[test]
    fn test_record_event_type() {
        let mut stats = Statistics::new();
        stats.record_event_type(30);
        stats.record_event_type(30);
        stats.record_event_type(2);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.event_counts.get(&30), Some(&2));
    }

    #[test]
    fn test_render_is_sorted_and_deterministic() {
        let mut stats = Statistics::new();
        stats.record_event_type(19);
        stats.record_event_type(2);
        stats.record_operation("zeta", "t", Operation::Delete, 1);
        stats.record_operation("alpha", "orders", Operation::Update, 2);
        stats.record_operation("alpha", "orders", Operation::Insert, 4);
        stats.record_operation("alpha", "items", Operation::Insert, 1);

        let report = stats.render_with_elapsed(Duration::from_secs(2));

        let expected_tail = "\
Operation Statistics:
====================

Database: alpha
---------------

Table: items
  INSERT : 1 operations affecting 1 rows (avg 1.0 rows/op)

Table: orders
  INSERT : 1 operations affecting 4 rows (avg 4.0 rows/op)
  UPDATE : 1 operations affecting 2 rows (avg 2.0 rows/op)

Database: zeta
--------------

Table: t
  DELETE : 1 operations affecting 1 rows (avg 1.0 rows/op)

Summary:
--------
Total operations: 4
Total rows affected: 8
Average rows per operation: 2.0
Operations per second: 2.00
";
        assert!(report.ends_with(expected_tail), "{report}");
        assert!(report.contains("Total Events: 2 (1.00 events/sec)\n"));
        assert!(report.contains("- Type 2: 1\n- Type 19: 1\n"));
    }

    #[test]
    fn test_display_matches_report() {
        let mut stats = Statistics::new();
        stats.record_event_type(30);
        stats.record_operation("app", "users", Operation::Delete, 0);

        let report = stats.report(Duration::from_secs(1)).to_string();
        assert_eq!(report, stats.render_with_elapsed(Duration::from_secs(1)));
        assert!(report.contains("  DELETE : 1 operations affecting 0 rows (avg 0.0 rows/op)\n"));

        let rendered = stats.render();
        assert!(rendered.starts_with("\nParsing Statistics:\nTotal Events: 1 ("));
        assert!(rendered.contains("Total rows affected: 0\n"));
    }

    #[test]
    fn test_render_without_operations() {
        let stats = Statistics::new();
        let report = stats.render_with_elapsed(Duration::ZERO);
        assert!(report.contains("Total Events: 0 (0.00 events/sec)"));
        assert!(!report.contains("Operation Statistics"));
    }
}
