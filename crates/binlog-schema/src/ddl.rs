//! `CREATE TABLE` extraction from SQL dumps.
//!
//! This is a line-oriented scanner for the subset of MySQL DDL that
//! `mysqldump` emits, not a SQL parser:
//!
//! - Blank lines and lines starting with `--` or `/*` are ignored.
//! - `USE <db>;` sets the database for the tables that follow.
//! - Other lines accumulate into a statement until a line ends with `;`.
//!   A `;` inside a string literal at the end of a line also ends the
//!   statement.
//! - Completed statements containing `CREATE TABLE` are matched; anything
//!   the matcher does not understand is skipped without registering a table.

use std::io::{self, BufRead};

use crate::columns::QuoteTracker;

/// A matched `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableStatement {
    /// Database from a qualified name or the active `USE`, possibly empty
    pub database: String,
    pub table: String,
    /// Text between the outermost parentheses of the statement
    pub columns_clause: String,
}

/// Iterator over the `CREATE TABLE` statements of a SQL text stream.
pub struct CreateTableStatements<R> {
    lines: io::Lines<R>,
    current_database: String,
    buffer: String,
}

impl<R: BufRead> CreateTableStatements<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            current_database: String::new(),
            buffer: String::new(),
        }
    }

    /// Database selected by the most recent `USE` statement.
    pub fn current_database(&self) -> &str {
        &self.current_database
    }

    /// Feed one line. Returns a completed statement, if this line completed one.
    fn push_line(&mut self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") || trimmed.starts_with("/*") {
            return None;
        }

        if let Some(database) = parse_use(trimmed) {
            tracing::trace!("Switching schema context to '{database}'");
            self.current_database = database;
            return None;
        }

        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(trimmed);

        if line.ends_with(';') {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }
}

impl<R: BufRead> Iterator for CreateTableStatements<R> {
    type Item = io::Result<CreateTableStatement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };

            let Some(statement) = self.push_line(&line) else {
                continue;
            };

            if !contains_ignore_ascii_case(&statement, "CREATE TABLE") {
                continue;
            }

            match parse_create_table(&statement, &self.current_database) {
                Some(parsed) => return Some(Ok(parsed)),
                None => {
                    tracing::debug!("Skipping unrecognized CREATE TABLE statement: {statement}");
                }
            }
        }
    }
}

/// Recognize `USE <db>` and return the database name without quoting.
fn parse_use(line: &str) -> Option<String> {
    let prefix = line.get(..4)?;
    if !prefix.eq_ignore_ascii_case("USE ") {
        return None;
    }
    let name = line[4..]
        .trim()
        .trim_end_matches(';')
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'');
    Some(name.to_string())
}

/// Match a complete `CREATE TABLE [IF NOT EXISTS] [db.]name ( ... ) ...;`
/// statement.
pub fn parse_create_table(statement: &str, current_database: &str) -> Option<CreateTableStatement> {
    let start = find_ignore_ascii_case(statement, "CREATE TABLE")?;
    let mut rest = statement[start + "CREATE TABLE".len()..].trim_start();

    if rest
        .get(..13)
        .is_some_and(|p| p.eq_ignore_ascii_case("IF NOT EXISTS"))
    {
        rest = rest[13..].trim_start();
    }

    let (first, after_first) = parse_identifier(rest)?;
    let (database, table, rest) = match after_first.strip_prefix('.') {
        Some(qualified) => {
            let (second, after_second) = parse_identifier(qualified)?;
            (first, second, after_second)
        }
        None => (current_database.to_string(), first, after_first),
    };

    let body = rest.trim_start().strip_prefix('(')?;
    let end = matching_paren(body)?;

    Some(CreateTableStatement {
        database,
        table,
        columns_clause: body[..end].to_string(),
    })
}

/// Parse a possibly backtick-quoted identifier at the start of `input`.
fn parse_identifier(input: &str) -> Option<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('`') {
        let end = quoted.find('`')?;
        return Some((quoted[..end].to_string(), &quoted[end + 1..]));
    }
    let end = input
        .find(|c: char| c.is_whitespace() || c == '(' || c == '.' || c == ';')
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let name = input[..end].trim_matches('"');
    Some((name.to_string(), &input[end..]))
}

/// Byte offset of the `)` that closes an already-consumed `(`.
fn matching_paren(body: &str) -> Option<usize> {
    let mut quotes = QuoteTracker::default();
    let mut depth = 0usize;

    for (idx, ch) in body.char_indices() {
        if quotes.consume(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(idx),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_uppercase().find(&needle.to_ascii_uppercase())
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    find_ignore_ascii_case(haystack, needle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(sql: &str) -> Vec<CreateTableStatement> {
        CreateTableStatements::new(sql.as_bytes())
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_multiline_statement_with_use_context() {
        let sql = "\
-- MySQL dump
/*!40101 SET NAMES utf8mb4 */;

USE `sbtest`;
CREATE TABLE `sbtest1` (
  `id` int NOT NULL AUTO_INCREMENT,
  `k` int NOT NULL DEFAULT '0',
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
";
        let statements = extract(sql);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].database, "sbtest");
        assert_eq!(statements[0].table, "sbtest1");
        assert_eq!(
            statements[0].columns_clause,
            " `id` int NOT NULL AUTO_INCREMENT, `k` int NOT NULL DEFAULT '0', PRIMARY KEY (`id`) "
        );
    }

    #[test]
    fn test_outer_parenthesis_is_matched_not_the_first_close() {
        let stmt = parse_create_table("CREATE TABLE t (a DECIMAL(10,2), b CHAR(3));", "").unwrap();
        assert_eq!(stmt.columns_clause, "a DECIMAL(10,2), b CHAR(3)");
    }

    #[test]
    fn test_paren_inside_string_default() {
        let stmt = parse_create_table("CREATE TABLE t (a CHAR(3) DEFAULT ')', b INT);", "").unwrap();
        assert_eq!(stmt.columns_clause, "a CHAR(3) DEFAULT ')', b INT");
    }

    #[test]
    fn test_qualified_name_overrides_use() {
        let stmt =
            parse_create_table("create table if not exists `shop`.`orders` (id int);", "other")
                .unwrap();
        assert_eq!(stmt.database, "shop");
        assert_eq!(stmt.table, "orders");
    }

    #[test]
    fn test_use_value_is_trimmed() {
        assert_eq!(parse_use("USE  `app` ;"), Some("app".to_string()));
        assert_eq!(parse_use("use app;"), Some("app".to_string()));
        assert_eq!(parse_use("USER x;"), None);
    }

    #[test]
    fn test_statement_completes_only_on_trailing_semicolon() {
        // The trailing space keeps the statement open until the next `;` line.
        let sql = "CREATE TABLE a (x INT); \nCREATE TABLE b (y INT);\n";
        let statements = extract(sql);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].table, "a");
    }

    #[test]
    fn test_unmatched_statements_are_skipped() {
        let sql = "CREATE TABLE t2 LIKE t1;\nCREATE TABLE broken (a INT;\nINSERT INTO t VALUES (1);\nCREATE TABLE ok (a INT);\n";
        let statements = extract(sql);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].table, "ok");
        assert_eq!(statements[0].database, "");
    }
}
