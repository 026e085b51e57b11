//! The execution primitive every statement goes through.

use crate::bind::BindStyle;
use async_trait::async_trait;
use registry_core::{RegistryResult, SqlValue};

/// One fetched row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Text value of `column`; `None` when absent, null or not text.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    pub fn columns(&self) -> &[(String, SqlValue)] {
        &self.columns
    }
}

/// Runs statements against a relational backend.
///
/// Implementations borrow a caller-owned connection or transaction for the
/// duration of one call and never retry.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Placeholder syntax statements must be rebound to.
    fn bind_style(&self) -> BindStyle;

    /// Run a statement and report the number of affected rows.
    async fn exec(&self, sql: &str, args: &[SqlValue]) -> RegistryResult<u64>;

    /// Run a query and fetch every row.
    async fn query(&self, sql: &str, args: &[SqlValue]) -> RegistryResult<Vec<Row>>;
}

/// Run a mutating statement. Zero affected rows is not an error.
pub async fn execute(executor: &dyn Executor, sql: &str, args: &[SqlValue]) -> RegistryResult<u64> {
    tracing::debug!("Executing query {}", sql);
    let affected = executor.exec(sql, args).await?;
    if affected == 0 {
        tracing::debug!(query = sql, "Statement affected no rows");
    }
    Ok(affected)
}

/// Run a query.
pub async fn fetch(executor: &dyn Executor, sql: &str, args: &[SqlValue]) -> RegistryResult<Vec<Row>> {
    tracing::debug!("Executing query {}", sql);
    executor.query(sql, args).await
}
