//! In-memory table catalog built from a schema dump.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::columns::parse_column_definitions;
use crate::ddl::CreateTableStatements;
use crate::error::LoadError;
use crate::table::{SchemaDocument, TableDefinition, TableKey};

/// Catalog of table definitions keyed by database and table name.
///
/// The catalog is filled by [`SchemaRegistry::load`] and is read-only
/// afterwards. Lookups that find nothing are counted per `(database, table)`;
/// that counter is the only state mutated after loading and is safe to
/// update from several threads through a shared reference.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tables: BTreeMap<String, BTreeMap<String, TableDefinition>>,
    misses: Mutex<HashMap<TableKey, u64>>,
}

/// Number of failed lookups for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissEntry {
    pub key: TableKey,
    pub count: u64,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a schema file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let mut registry = Self::new();
        registry.load_from_path(path)?;
        Ok(registry)
    }

    /// Load a schema file into this registry.
    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.load(BufReader::new(file))?;
        tracing::info!(
            "Loaded {} tables across {} databases from {}",
            self.table_count(),
            self.tables.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a schema source.
    ///
    /// The source is first parsed as a JSON schema document; if that fails it
    /// is read as a SQL dump. A table defined twice keeps its last definition.
    pub fn load<R: Read>(&mut self, mut source: R) -> Result<(), LoadError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let text = String::from_utf8_lossy(&bytes);

        match serde_json::from_str::<SchemaDocument>(&text) {
            Ok(document) => {
                tracing::debug!(
                    "Reading schema as JSON document with {} tables",
                    document.tables.len()
                );
                for table in document.tables {
                    self.register(table);
                }
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Schema source is not a JSON document ({e}), reading it as SQL");
                self.load_sql(text.as_bytes())
            }
        }
    }

    fn load_sql<R: BufRead>(&mut self, reader: R) -> Result<(), LoadError> {
        for statement in CreateTableStatements::new(reader) {
            let statement = statement?;
            let columns = parse_column_definitions(&statement.columns_clause);
            if columns.is_empty() {
                tracing::debug!(
                    "No columns recognized for {}.{}",
                    statement.database,
                    statement.table
                );
            }
            self.register(TableDefinition::new(
                statement.database,
                statement.table,
                columns,
            ));
        }
        Ok(())
    }

    fn register(&mut self, table: TableDefinition) {
        let previous = self
            .tables
            .entry(table.database.clone())
            .or_default()
            .insert(table.name.clone(), table);
        if let Some(previous) = previous {
            tracing::debug!("Replacing earlier definition of {}", previous.key());
        }
    }

    /// Find a table by exact database and table name.
    ///
    /// A miss is recorded against the requested key and `None` is returned.
    pub fn lookup(&self, database: &str, table: &str) -> Option<&TableDefinition> {
        let found = self.tables.get(database).and_then(|t| t.get(table));
        if found.is_none() {
            let mut misses = self.misses.lock().unwrap_or_else(PoisonError::into_inner);
            *misses.entry(TableKey::new(database, table)).or_insert(0) += 1;
        }
        found
    }

    /// Failed lookups, most frequent first, ties ordered by the rendered
    /// `database.table` key.
    pub fn miss_report(&self) -> Vec<MissEntry> {
        let misses = self.misses.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report: Vec<MissEntry> = misses
            .iter()
            .map(|(key, count)| MissEntry {
                key: key.clone(),
                count: *count,
            })
            .collect();
        report.sort_by_cached_key(|entry| (Reverse(entry.count), entry.key.to_string()));
        report
    }

    /// Text form of [`SchemaRegistry::miss_report`]; empty when nothing missed.
    pub fn render_miss_report(&self) -> String {
        let report = self.miss_report();
        if report.is_empty() {
            return String::new();
        }

        let mut out = format!(
            "\nSchema warnings:\n================\n{} table(s) referenced in the binlog were not found in the schema:\n",
            report.len()
        );
        for entry in report {
            out.push_str(&format!("  {}: {} lookups\n", entry.key, entry.count));
        }
        out
    }

    /// Databases, tables and column counts currently in the catalog.
    pub fn summary(&self) -> SchemaSummary {
        SchemaSummary {
            databases: self
                .tables
                .iter()
                .map(|(name, tables)| DatabaseSummary {
                    name: name.clone(),
                    tables: tables
                        .values()
                        .map(|t| TableSummary {
                            name: t.name.clone(),
                            column_count: t.columns.len(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table_count() == 0
    }
}

/// Read-only overview of a registry, ordered by database then table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    pub databases: Vec<DatabaseSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub column_count: usize,
}

impl SchemaSummary {
    pub fn database_count(&self) -> usize {
        self.databases.len()
    }

    pub fn table_count(&self) -> usize {
        self.databases.iter().map(|d| d.tables.len()).sum()
    }
}

impl fmt::Display for SchemaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Schema summary: {} database(s), {} table(s)",
            self.database_count(),
            self.table_count()
        )?;
        for database in &self.databases {
            let name = if database.name.is_empty() {
                "(no database)"
            } else {
                database.name.as_str()
            };
            writeln!(f, "Database: {name}")?;
            for table in &database.tables {
                writeln!(f, "  {} ({} columns)", table.name, table.column_count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnDefinition;

    fn registry_from(text: &str) -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.load(text.as_bytes()).unwrap();
        registry
    }

    #[test]
    fn test_json_document_is_preferred() {
        let registry = registry_from(
            r#"{"tables": [{"name": "sbtest1", "schema": "sbtest", "columns": [
                {"name": "id", "type": "INT", "nullable": false},
                {"name": "k", "type": "INT"},
                {"name": "c", "type": "CHAR(120)"},
                {"name": "pad", "type": "CHAR(60)"}]}]}"#,
        );
        let table = registry.lookup("sbtest", "sbtest1").unwrap();
        assert_eq!(table.column_names(), vec!["id", "k", "c", "pad"]);
        assert_eq!(table.columns[0], ColumnDefinition::new("id", "INT", false));
        assert!(!table.columns[1].nullable);
    }

    #[test]
    fn test_sql_fallback() {
        let registry = registry_from("USE shop;\nCREATE TABLE orders (id INT NOT NULL, note TEXT);\n");
        let table = registry.lookup("shop", "orders").unwrap();
        assert_eq!(table.column_names(), vec!["id", "note"]);
        assert_eq!(table.database, "shop");
    }

    #[test]
    fn test_empty_source_is_not_an_error() {
        let registry = registry_from("");
        assert!(registry.is_empty());
        let registry = registry_from("-- nothing here\nSET x = 1;\n");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = registry_from("USE Shop;\nCREATE TABLE Orders (id INT);\n");
        assert!(registry.lookup("Shop", "Orders").is_some());
        assert!(registry.lookup("shop", "orders").is_none());
        assert!(registry.lookup("Shop", "`Orders`").is_none());
    }

    #[test]
    fn test_later_definition_wins() {
        let registry =
            registry_from("CREATE TABLE t (a INT);\nCREATE TABLE t (a INT, b INT);\n");
        assert_eq!(registry.table_count(), 1);
        assert_eq!(registry.lookup("", "t").unwrap().columns.len(), 2);
    }

    #[test]
    fn test_miss_report_ordering() {
        let registry = SchemaRegistry::new();
        registry.lookup("b", "x");
        registry.lookup("a", "y");
        registry.lookup("a", "z");
        registry.lookup("a", "z");

        let report = registry.miss_report();
        assert_eq!(
            report,
            vec![
                MissEntry { key: TableKey::new("a", "z"), count: 2 },
                MissEntry { key: TableKey::new("a", "y"), count: 1 },
                MissEntry { key: TableKey::new("b", "x"), count: 1 },
            ]
        );
        assert!(registry.render_miss_report().contains("  a.z: 2 lookups\n"));
    }

    #[test]
    fn test_miss_report_ties_follow_rendered_key() {
        let registry = SchemaRegistry::new();
        registry.lookup("a", "t");
        registry.lookup("a-b", "t");

        let keys: Vec<String> = registry
            .miss_report()
            .iter()
            .map(|entry| entry.key.to_string())
            .collect();
        assert_eq!(keys, vec!["a-b.t", "a.t"]);
    }

    #[test]
    fn test_hits_are_not_counted() {
        let registry = registry_from("CREATE TABLE t (a INT);\n");
        registry.lookup("", "t");
        assert!(registry.miss_report().is_empty());
        assert_eq!(registry.render_miss_report(), "");
    }

    #[test]
    fn test_summary() {
        let registry = registry_from(
            "USE a;\nCREATE TABLE t1 (x INT, y INT);\nCREATE TABLE t2 (x INT);\nUSE b;\nCREATE TABLE t3 (PRIMARY KEY (x));\n",
        );
        let summary = registry.summary();
        assert_eq!(summary.database_count(), 2);
        assert_eq!(summary.table_count(), 3);
        assert_eq!(summary.databases[0].tables[0].column_count, 2);
        assert_eq!(summary.databases[1].tables[0].column_count, 0);

        let text = summary.to_string();
        assert!(text.starts_with("Schema summary: 2 database(s), 3 table(s)\n"));
        assert!(text.contains("Database: b\n  t3 (0 columns)\n"));
    }
}
