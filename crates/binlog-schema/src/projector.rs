//! Projection of positional row images onto column names.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::registry::SchemaRegistry;
use crate::table::TableDefinition;

/// Kind of row change carried by a binlog rows event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded rows of one row-change event.
///
/// Each row is the list of column values in physical column order.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange<V> {
    Insert(Vec<Vec<V>>),
    /// `(before, after)` image pairs
    Update(Vec<(Vec<V>, Vec<V>)>),
    Delete(Vec<Vec<V>>),
}

impl<V> RowChange<V> {
    pub fn operation(&self) -> Operation {
        match self {
            RowChange::Insert(_) => Operation::Insert,
            RowChange::Update(_) => Operation::Update,
            RowChange::Delete(_) => Operation::Delete,
        }
    }

    /// Number of affected rows. An update pair counts once.
    pub fn row_count(&self) -> usize {
        match self {
            RowChange::Insert(rows) | RowChange::Delete(rows) => rows.len(),
            RowChange::Update(pairs) => pairs.len(),
        }
    }
}

/// Named values of one row image, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields<V> {
    entries: Vec<(String, V)>,
}

impl<V> Fields<V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_entries(self) -> Vec<(String, V)> {
        self.entries
    }
}

impl<V: Serialize> Serialize for Fields<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One row change with named fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowChangeProjection<V> {
    pub operation: Operation,
    pub database: String,
    pub table: String,
    /// Whether column names came from the schema rather than `col_<i>`
    pub schema_resolved: bool,
    /// Row image after the change, or the deleted row for deletes
    pub fields: Fields<V>,
    /// Row image before an update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_fields: Option<Fields<V>>,
}

/// Names row values using a schema registry.
///
/// Without a registry every table falls back to positional `col_<i>` names
/// and nothing is recorded as a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowProjector<'r> {
    registry: Option<&'r SchemaRegistry>,
}

impl<'r> RowProjector<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    pub fn without_schema() -> Self {
        Self { registry: None }
    }

    /// Look the table up once; a miss is counted by the registry.
    pub fn resolve(&self, database: &str, table: &str) -> Option<&'r TableDefinition> {
        self.registry
            .and_then(|registry| registry.lookup(database, table))
    }

    /// Project a single row image (and the previous image of an update).
    pub fn project<V>(
        &self,
        database: &str,
        table: &str,
        operation: Operation,
        row: Vec<V>,
        previous: Option<Vec<V>>,
    ) -> RowChangeProjection<V> {
        let definition = self.resolve(database, table);
        project_row(definition, database, table, operation, row, previous)
    }

    /// Project every row of an event with a single table lookup.
    pub fn project_change<V>(
        &self,
        database: &str,
        table: &str,
        change: RowChange<V>,
    ) -> Vec<RowChangeProjection<V>> {
        let definition = self.resolve(database, table);
        project_change_with(definition, database, table, change)
    }
}

/// Project every row of an event against an already resolved definition.
pub fn project_change_with<V>(
    definition: Option<&TableDefinition>,
    database: &str,
    table: &str,
    change: RowChange<V>,
) -> Vec<RowChangeProjection<V>> {
    let operation = change.operation();
    match change {
        RowChange::Insert(rows) | RowChange::Delete(rows) => rows
            .into_iter()
            .map(|row| project_row(definition, database, table, operation, row, None))
            .collect(),
        RowChange::Update(pairs) => pairs
            .into_iter()
            .map(|(before, after)| {
                project_row(definition, database, table, operation, after, Some(before))
            })
            .collect(),
    }
}

fn project_row<V>(
    definition: Option<&TableDefinition>,
    database: &str,
    table: &str,
    operation: Operation,
    row: Vec<V>,
    previous: Option<Vec<V>>,
) -> RowChangeProjection<V> {
    RowChangeProjection {
        operation,
        database: database.to_string(),
        table: table.to_string(),
        schema_resolved: definition.is_some(),
        fields: name_values(definition, row),
        previous_fields: previous.map(|values| name_values(definition, values)),
    }
}

/// Pair values with column names. Values past the last known column are
/// dropped; without a definition values are named `col_0`, `col_1`, ...
fn name_values<V>(definition: Option<&TableDefinition>, values: Vec<V>) -> Fields<V> {
    let entries = match definition {
        Some(definition) => {
            if values.len() > definition.columns.len() {
                tracing::trace!(
                    "Dropping {} values beyond the known columns of {}",
                    values.len() - definition.columns.len(),
                    definition.key()
                );
            }
            definition
                .columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.name.clone(), value))
                .collect()
        }
        None => values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| (format!("col_{idx}"), value))
            .collect(),
    };
    Fields { entries }
}
