//! Bind-variable handling: IN-list expansion and dialect rebinding.
//!
//! Statements are assembled with `?` markers. A list argument bound to a
//! single `?` is expanded into one marker per element, then the statement is
//! rebound to the backend's placeholder syntax.

use registry_core::{Dialect, QueryError, RegistryResult, SqlValue};

/// Placeholder syntax of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindStyle {
    /// `?` markers (SQLite).
    Question,
    /// `$1, $2, ...` markers (PostgreSQL).
    Dollar,
}

impl From<Dialect> for BindStyle {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres => BindStyle::Dollar,
            Dialect::Sqlite => BindStyle::Question,
        }
    }
}

/// Argument for one `?` marker before expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum BindArg {
    Scalar(SqlValue),
    List(Vec<SqlValue>),
}

impl BindArg {
    pub fn into_values(self) -> Vec<SqlValue> {
        match self {
            BindArg::Scalar(value) => vec![value],
            BindArg::List(values) => values,
        }
    }
}

impl From<SqlValue> for BindArg {
    fn from(value: SqlValue) -> Self {
        BindArg::Scalar(value)
    }
}

impl From<&str> for BindArg {
    fn from(value: &str) -> Self {
        BindArg::Scalar(SqlValue::from(value))
    }
}

impl From<String> for BindArg {
    fn from(value: String) -> Self {
        BindArg::Scalar(SqlValue::from(value))
    }
}

/// Byte offsets of every `?` marker outside single-quoted literals.
fn placeholder_positions(query: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut in_literal = false;
    for (i, c) in query.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => positions.push(i),
            _ => {}
        }
    }
    positions
}

/// Expand list arguments into one marker per element and flatten the
/// argument list to match.
pub fn expand_in(query: &str, args: Vec<BindArg>) -> RegistryResult<(String, Vec<SqlValue>)> {
    let positions = placeholder_positions(query);
    if positions.len() != args.len() {
        return Err(QueryError::ArgumentMismatch {
            placeholders: positions.len(),
            args: args.len(),
        }
        .into());
    }

    let mut expanded = String::with_capacity(query.len());
    let mut flat = Vec::with_capacity(args.len());
    let mut last = 0;
    for (pos, arg) in positions.into_iter().zip(args) {
        expanded.push_str(&query[last..pos]);
        match arg {
            BindArg::Scalar(value) => {
                expanded.push('?');
                flat.push(value);
            }
            BindArg::List(values) => {
                if values.is_empty() {
                    return Err(QueryError::EmptyInList.into());
                }
                expanded.push_str(&vec!["?"; values.len()].join(", "));
                flat.extend(values);
            }
        }
        last = pos + 1;
    }
    expanded.push_str(&query[last..]);
    Ok((expanded, flat))
}

/// Rewrite `?` markers into the backend's placeholder syntax.
pub fn rebind(style: BindStyle, query: &str) -> String {
    match style {
        BindStyle::Question => query.to_string(),
        BindStyle::Dollar => {
            let mut rebound = String::with_capacity(query.len() + 8);
            let mut last = 0;
            for (n, pos) in placeholder_positions(query).into_iter().enumerate() {
                rebound.push_str(&query[last..pos]);
                rebound.push('$');
                rebound.push_str(&(n + 1).to_string());
                last = pos + 1;
            }
            rebound.push_str(&query[last..]);
            rebound
        }
    }
}
