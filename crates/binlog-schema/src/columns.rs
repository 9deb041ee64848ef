//! Column clause parsing for `CREATE TABLE` bodies.
//!
//! The input is the text between the outermost parentheses of a
//! `CREATE TABLE` statement. It is split into clauses on top-level commas
//! and every clause that is not an index/key/constraint declaration becomes
//! a [`ColumnDefinition`], in clause order.
//!
//! Clauses that yield no column name are dropped. Dropping shifts the
//! positions of every later column, so a malformed dump can misalign row
//! values with column names.

use crate::table::ColumnDefinition;

/// Leading keywords of clauses that declare keys, indexes or constraints
/// rather than columns.
const NON_COLUMN_KEYWORDS: &[&str] = &[
    "PRIMARY",
    "KEY",
    "INDEX",
    "CONSTRAINT",
    "FULLTEXT",
    "SPATIAL",
    "FOREIGN",
    "CHECK",
];

/// Split a clause list on commas that sit outside parentheses and quotes.
///
/// `DECIMAL(10,2)`, `ENUM('a,b')` and `DEFAULT 'x,y'` stay in one piece.
pub fn split_clauses(body: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut quotes = QuoteTracker::default();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, ch) in body.char_indices() {
        if quotes.consume(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                clauses.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    clauses.push(&body[start..]);

    clauses
}

/// Tracks whether a character scan is inside a quoted section.
#[derive(Debug, Default)]
pub(crate) struct QuoteTracker {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteTracker {
    /// Returns true when `ch` belongs to a quoted section, delimiters included.
    pub(crate) fn consume(&mut self, ch: char) -> bool {
        if let Some(open) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' && open != '`' {
                self.escaped = true;
            } else if ch == open {
                self.quote = None;
            }
            return true;
        }
        if matches!(ch, '\'' | '"' | '`') {
            self.quote = Some(ch);
            return true;
        }
        false
    }
}

/// Parse the body of a `CREATE TABLE` statement into ordered column definitions.
pub fn parse_column_definitions(body: &str) -> Vec<ColumnDefinition> {
    split_clauses(body)
        .into_iter()
        .filter_map(|clause| {
            let column = parse_column_clause(clause);
            if column.is_none() && !clause.trim().is_empty() {
                tracing::trace!("Clause is not a column definition: {}", clause.trim());
            }
            column
        })
        .collect()
}

/// Parse a single clause. Returns `None` for key/constraint clauses and for
/// clauses without a usable column name.
pub fn parse_column_clause(clause: &str) -> Option<ColumnDefinition> {
    let clause = clause.trim();
    if clause.is_empty() {
        tracing::debug!("Dropping empty column clause");
        return None;
    }

    let (name, quoted, rest) = split_identifier(clause);
    if name.is_empty() {
        tracing::debug!("Dropping column clause without a name: {clause}");
        return None;
    }

    // A quoted identifier is always a column, even when it spells a keyword.
    if !quoted && is_non_column_clause(name, rest) {
        return None;
    }

    Some(ColumnDefinition {
        name: name.to_string(),
        declared_type: leading_type(rest).to_uppercase(),
        nullable: !clause.to_uppercase().contains("NOT NULL"),
    })
}

fn is_non_column_clause(first: &str, rest: &str) -> bool {
    let first = first.to_uppercase();
    if NON_COLUMN_KEYWORDS.contains(&first.as_str()) {
        return true;
    }
    if first == "UNIQUE" {
        let next = rest.trim_start();
        let next_word: String = next
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();
        return next_word == "KEY" || next_word == "INDEX" || next.starts_with('(');
    }
    false
}

/// Split the leading identifier off a clause.
///
/// Returns the identifier without its delimiters, whether it was quoted, and
/// the remaining text.
fn split_identifier(clause: &str) -> (&str, bool, &str) {
    let mut chars = clause.char_indices();
    match chars.next() {
        Some((_, open @ ('`' | '"' | '\''))) => match clause[1..].find(open) {
            Some(end) => (&clause[1..end + 1], true, &clause[end + 2..]),
            None => (clause[1..].trim(), true, ""),
        },
        Some(_) => {
            let end = clause
                .find(char::is_whitespace)
                .unwrap_or(clause.len());
            (&clause[..end], false, &clause[end..])
        }
        None => ("", false, ""),
    }
}

/// The type expression at the start of a column clause remainder, including
/// any parenthesized arguments (`varchar(10)`, `enum('a b','c')`).
fn leading_type(rest: &str) -> &str {
    let rest = rest.trim_start();
    let mut quotes = QuoteTracker::default();
    let mut depth = 0usize;

    for (idx, ch) in rest.char_indices() {
        if quotes.consume(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => return &rest[..idx],
            _ => {}
        }
    }
    rest
}
