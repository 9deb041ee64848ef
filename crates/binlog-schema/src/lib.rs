//! Schema registry and row projection for binlog-parse.
//!
//! Binlog row events carry column values by position only. This crate turns
//! a schema dump into a catalog of tables and uses it to give those values
//! their column names:
//!
//! - [`ddl`] - extracts `CREATE TABLE` statements from a SQL dump
//! - [`columns`] - splits a table body into ordered column definitions
//! - [`SchemaRegistry`] - `(database, table)` catalog that counts lookup misses
//! - [`RowProjector`] - maps row images onto named [`Fields`]
//!
//! # Example
//!
//! ```rust
//! use binlog_schema::{Operation, RowProjector, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! registry
//!     .load("USE shop;\nCREATE TABLE orders (id INT NOT NULL, total DECIMAL(10,2));\n".as_bytes())
//!     .unwrap();
//!
//! let projection = RowProjector::new(&registry).project(
//!     "shop",
//!     "orders",
//!     Operation::Insert,
//!     vec!["1", "9.99"],
//!     None,
//! );
//! assert_eq!(projection.fields.get("total"), Some(&"9.99"));
//! ```

pub mod columns;
pub mod ddl;
mod error;
mod projector;
mod registry;
mod table;

pub use error::LoadError;
pub use projector::{
    project_change_with, Fields, Operation, RowChange, RowChangeProjection, RowProjector,
};
pub use registry::{DatabaseSummary, MissEntry, SchemaRegistry, SchemaSummary, TableSummary};
pub use table::{ColumnDefinition, SchemaDocument, TableDefinition, TableKey};
