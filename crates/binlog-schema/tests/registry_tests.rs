//! Integration tests for loading schema files and projecting rows.

use std::io::Write;

use binlog_schema::{LoadError, Operation, RowChange, RowProjector, SchemaRegistry, TableKey};
use tempfile::NamedTempFile;

const SBTEST_DUMP: &str = r#"-- MySQL dump 10.13  Distrib 8.0.36, for Linux (x86_64)
--
-- Host: localhost    Database: sbtest
-- ------------------------------------------------------

/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET NAMES utf8mb4 */;

CREATE DATABASE /*!32312 IF NOT EXISTS*/ `sbtest` /*!40100 DEFAULT CHARACTER SET utf8mb4 */;

USE `sbtest`;

--
-- Table structure for table `sbtest1`
--

DROP TABLE IF EXISTS `sbtest1`;
/*!40101 SET @saved_cs_client     = @@character_set_client */;
CREATE TABLE `sbtest1` (
  `id` int NOT NULL AUTO_INCREMENT,
  `k` int NOT NULL DEFAULT '0',
  `c` char(120) NOT NULL DEFAULT '',
  `pad` char(60) NOT NULL DEFAULT '',
  PRIMARY KEY (`id`),
  KEY `k_1` (`k`)
) ENGINE=InnoDB AUTO_INCREMENT=10001 DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_0900_ai_ci;
/*!40101 SET character_set_client = @saved_cs_client */;

--
-- Table structure for table `prices`
--

CREATE TABLE `prices` (
  `sku` varchar(32) NOT NULL,
  `amount` decimal(10,2) DEFAULT NULL,
  `currency` enum('EUR','USD') NOT NULL,
  `note` varchar(64) DEFAULT 'n/a, see docs',
  UNIQUE KEY `sku_currency` (`sku`,`currency`),
  CONSTRAINT `prices_chk` CHECK ((`amount` >= 0))
) ENGINE=InnoDB;

LOCK TABLES `sbtest1` WRITE;
INSERT INTO `sbtest1` VALUES (1,4993,'83868641912-28773972837','67847967377-48000963322');
UNLOCK TABLES;
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_mysqldump_file_registers_tables_under_use_database() {
    let file = write_temp(SBTEST_DUMP);
    let registry = SchemaRegistry::from_path(file.path()).unwrap();

    let sbtest1 = registry.lookup("sbtest", "sbtest1").unwrap();
    assert_eq!(sbtest1.column_names(), vec!["id", "k", "c", "pad"]);
    assert!(sbtest1.columns.iter().all(|c| !c.nullable));
    assert_eq!(sbtest1.columns[2].declared_type, "CHAR(120)");

    let prices = registry.lookup("sbtest", "prices").unwrap();
    assert_eq!(prices.column_names(), vec!["sku", "amount", "currency", "note"]);
    assert_eq!(prices.columns[1].declared_type, "DECIMAL(10,2)");
    assert!(prices.columns[1].nullable);
    assert!(!prices.columns[2].nullable);

    assert!(registry.lookup("", "sbtest1").is_none());
    assert_eq!(registry.summary().table_count(), 2);
}

#[test]
fn test_json_schema_file_round_trip() {
    let file = write_temp(
        r#"{
  "tables": [
    {
      "name": "sbtest1",
      "schema": "sbtest",
      "columns": [
        {"name": "id", "type": "INT", "nullable": false},
        {"name": "k", "type": "INT", "nullable": false},
        {"name": "c", "type": "CHAR(120)", "nullable": false},
        {"name": "pad", "type": "CHAR(60)", "nullable": false}
      ]
    }
  ]
}"#,
    );
    let registry = SchemaRegistry::from_path(file.path()).unwrap();

    let table = registry.lookup("sbtest", "sbtest1").unwrap();
    assert_eq!(table.column_names(), vec!["id", "k", "c", "pad"]);
}

#[test]
fn test_missing_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.sql");

    let err = SchemaRegistry::from_path(&missing).unwrap_err();
    assert!(matches!(err, LoadError::Open { .. }));
    assert!(err.to_string().contains("missing.sql"));
}

#[test]
fn test_concurrent_misses_are_all_counted() {
    let registry = SchemaRegistry::new();
    let threads = 8;
    let per_thread = 250;

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..per_thread {
                    assert!(registry.lookup("app", "ghost").is_none());
                }
            });
        }
    });

    let report = registry.miss_report();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].key, TableKey::new("app", "ghost"));
    assert_eq!(report[0].count, threads * per_thread);
}

#[test]
fn test_projection_against_loaded_dump() {
    let file = write_temp(SBTEST_DUMP);
    let registry = SchemaRegistry::from_path(file.path()).unwrap();
    let projector = RowProjector::new(&registry);

    let inserts = projector.project_change(
        "sbtest",
        "sbtest1",
        RowChange::Insert(vec![vec!["1", "4993", "'c'", "'pad'"]]),
    );
    assert_eq!(inserts[0].operation, Operation::Insert);
    assert_eq!(
        inserts[0].fields.names().collect::<Vec<_>>(),
        vec!["id", "k", "c", "pad"]
    );

    let unknown = projector.project_change(
        "sbtest",
        "sbtest2",
        RowChange::Delete(vec![vec!["1", "2", "3"]]),
    );
    assert_eq!(
        unknown[0].fields.names().collect::<Vec<_>>(),
        vec!["col_0", "col_1", "col_2"]
    );

    let report = registry.miss_report();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].key.to_string(), "sbtest.sbtest2");
}
