//! Table and column definitions held by the schema registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single column of a table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column name, unique within its table
    pub name: String,

    /// Declared SQL type, upper-cased (e.g. `VARCHAR(10)`)
    #[serde(rename = "type", default)]
    pub declared_type: String,

    /// Whether the column accepts NULL
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable,
        }
    }
}

/// A table with its columns in physical order.
///
/// Row images in the binlog carry values positionally, so `columns[i]` names
/// the i-th value of every row of this table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name
    pub name: String,

    /// Database the table belongs to (empty when unknown)
    #[serde(rename = "schema", default)]
    pub database: String,

    /// Columns in physical order
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            columns,
        }
    }

    /// Column names in physical order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn key(&self) -> TableKey {
        TableKey::new(&self.database, &self.name)
    }
}

/// `(database, table)` pair identifying a table.
///
/// Orders by database, then table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableKey {
    pub database: String,
    pub table: String,
}

impl TableKey {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// The structured schema document format:
/// `{"tables": [{"name", "schema", "columns": [{"name", "type", "nullable"}]}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub tables: Vec<TableDefinition>,
}
