//! SQLite executor.
//!
//! rusqlite is synchronous, so every call hops onto the blocking pool and
//! holds the connection lock for the duration of one statement.

use crate::bind::BindStyle;
use crate::executor::{Executor, Row};
use async_trait::async_trait;
use registry_core::{RegistryResult, SqlValue, StorageError};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::spawn_blocking;

/// Executor over a single shared SQLite connection.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    /// Private in-memory database, gone when the last clone is dropped.
    pub async fn open_in_memory() -> RegistryResult<Self> {
        let conn = spawn_blocking(Connection::open_in_memory)
            .await
            .map_err(join_error)?
            .map_err(connect_error)?;
        Self::from_connection(conn)
    }

    pub async fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref().to_owned();
        let conn = spawn_blocking(move || Connection::open(path))
            .await
            .map_err(join_error)?
            .map_err(connect_error)?;
        Self::from_connection(conn)
    }

    /// Wrap an open connection. Enables foreign keys so label rows follow
    /// their owner on delete.
    pub fn from_connection(conn: Connection) -> RegistryResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(connect_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, func: F) -> RegistryResult<T>
    where
        F: FnOnce(&Connection) -> RegistryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            func(&guard)
        })
        .await
        .map_err(join_error)?
    }
}

fn join_error(err: tokio::task::JoinError) -> StorageError {
    StorageError::ConnectionUnavailable {
        reason: format!("sqlite join error: {}", err),
    }
}

fn connect_error(err: rusqlite::Error) -> StorageError {
    StorageError::ConnectionUnavailable {
        reason: err.to_string(),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn exec_error(statement: &str, err: rusqlite::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    if is_unique_violation(&err) {
        return StorageError::UniqueViolation {
            statement: statement.to_string(),
            reason: err.to_string(),
        };
    }
    StorageError::ExecutionFailed {
        statement: statement.to_string(),
        reason: err.to_string(),
    }
}

fn query_error(statement: &str, err: rusqlite::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    StorageError::QueryFailed {
        statement: statement.to_string(),
        reason: err.to_string(),
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(ts) => Value::Text(ts.to_rfc3339()),
    }
}

fn is_boolean(decl_type: Option<&str>) -> bool {
    decl_type.is_some_and(|ty| ty.eq_ignore_ascii_case("BOOLEAN"))
}

/// Column value; integers in `BOOLEAN` columns come back as booleans.
fn from_sqlite(value: ValueRef<'_>, boolean: bool) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) if boolean => SqlValue::Bool(i != 0),
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Text(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    fn bind_style(&self) -> BindStyle {
        BindStyle::Question
    }

    async fn exec(&self, sql: &str, args: &[SqlValue]) -> RegistryResult<u64> {
        let sql = sql.to_string();
        let params: Vec<Value> = args.iter().map(to_sqlite).collect();
        self.with_conn(move |conn| {
            let affected = conn
                .execute(&sql, params_from_iter(params))
                .map_err(|err| exec_error(&sql, err))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> RegistryResult<Vec<Row>> {
        let sql = sql.to_string();
        let params: Vec<Value> = args.iter().map(to_sqlite).collect();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(|err| query_error(&sql, err))?;
            let columns: Vec<(String, bool)> = stmt
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), is_boolean(c.decl_type())))
                .collect();
            let rows = stmt
                .query_map(params_from_iter(params), |row| {
                    let mut values = Vec::with_capacity(columns.len());
                    for (i, (name, boolean)) in columns.iter().enumerate() {
                        values.push((name.clone(), from_sqlite(row.get_ref(i)?, *boolean)));
                    }
                    Ok(Row::new(values))
                })
                .map_err(|err| query_error(&sql, err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| query_error(&sql, err))?;
            Ok(rows)
        })
        .await
    }
}
