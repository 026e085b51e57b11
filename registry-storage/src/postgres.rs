//! PostgreSQL connection pool and executor.
//!
//! Criteria values arrive as text. Each parameter is coerced to the type
//! the server inferred for its placeholder before binding, so the same
//! compiled statement works against integer, boolean and timestamp columns.

use crate::bind::BindStyle;
use crate::executor::{Executor, Row};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_postgres::{Config, GenericClient, ManagerConfig, Pool, RecyclingMethod, Runtime};
use registry_core::{parse_bool, QueryError, RegistryError, RegistryResult, SqlValue, StorageError};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// PostgreSQL connection pool configuration.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout for a pooled connection
    pub timeout: Duration,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "registry".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl PgConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("REGISTRY_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("REGISTRY_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("REGISTRY_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("REGISTRY_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("REGISTRY_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("REGISTRY_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("REGISTRY_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    fn pool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = deadpool_postgres::PoolConfig::new(self.max_size);
        pool.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool);
        cfg
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened until the first checkout.
    pub fn create_pool(&self) -> RegistryResult<Pool> {
        let pool = self
            .pool_config()
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::ConnectionUnavailable {
                reason: format!("Failed to create pool: {}", e),
            })?;
        Ok(pool)
    }
}

/// Check a connection out of `pool`.
pub async fn checkout(pool: &Pool) -> RegistryResult<deadpool_postgres::Object> {
    pool.get().await.map_err(|err| {
        tracing::error!("Connection pool error: {:?}", err);
        let reason = match err {
            deadpool_postgres::PoolError::Timeout(_) => "connection pool exhausted".to_string(),
            deadpool_postgres::PoolError::Closed => "connection pool is closed".to_string(),
            other => other.to_string(),
        };
        StorageError::ConnectionUnavailable { reason }.into()
    })
}

// ============================================================================
// PARAMETER AND ROW CONVERSION
// ============================================================================

type Param = Box<dyn ToSql + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

fn invalid(value: &str, ty: &Type) -> QueryError {
    QueryError::InvalidValue {
        value: value.to_string(),
        expected: ty.name().to_string(),
    }
}

fn null_for(ty: &Type) -> Param {
    if *ty == Type::INT8 {
        Box::new(None::<i64>)
    } else if *ty == Type::INT4 {
        Box::new(None::<i32>)
    } else if *ty == Type::INT2 {
        Box::new(None::<i16>)
    } else if *ty == Type::BOOL {
        Box::new(None::<bool>)
    } else if *ty == Type::TIMESTAMPTZ {
        Box::new(None::<DateTime<Utc>>)
    } else if *ty == Type::TIMESTAMP {
        Box::new(None::<NaiveDateTime>)
    } else if *ty == Type::FLOAT8 {
        Box::new(None::<f64>)
    } else {
        Box::new(None::<String>)
    }
}

fn text_for(value: &str, ty: &Type) -> Result<Param, QueryError> {
    let param: Param = if *ty == Type::INT8 {
        Box::new(value.parse::<i64>().map_err(|_| invalid(value, ty))?)
    } else if *ty == Type::INT4 {
        Box::new(value.parse::<i32>().map_err(|_| invalid(value, ty))?)
    } else if *ty == Type::INT2 {
        Box::new(value.parse::<i16>().map_err(|_| invalid(value, ty))?)
    } else if *ty == Type::BOOL {
        Box::new(parse_bool(value).ok_or_else(|| invalid(value, ty))?)
    } else if *ty == Type::FLOAT8 {
        Box::new(value.parse::<f64>().map_err(|_| invalid(value, ty))?)
    } else if *ty == Type::TIMESTAMPTZ {
        let ts = DateTime::parse_from_rfc3339(value).map_err(|_| invalid(value, ty))?;
        Box::new(ts.with_timezone(&Utc))
    } else if *ty == Type::TIMESTAMP {
        let ts = DateTime::parse_from_rfc3339(value).map_err(|_| invalid(value, ty))?;
        Box::new(ts.naive_utc())
    } else {
        Box::new(value.to_string())
    };
    Ok(param)
}

/// Convert a value to a parameter of the placeholder's inferred type.
fn to_param(value: &SqlValue, ty: &Type) -> Result<Param, QueryError> {
    let param: Param = match value {
        SqlValue::Null => null_for(ty),
        SqlValue::Text(s) => text_for(s, ty)?,
        SqlValue::Integer(i) if is_text(ty) => Box::new(i.to_string()),
        SqlValue::Integer(i) if *ty == Type::INT4 => {
            Box::new(i32::try_from(*i).map_err(|_| invalid(&i.to_string(), ty))?)
        }
        SqlValue::Integer(i) if *ty == Type::INT2 => {
            Box::new(i16::try_from(*i).map_err(|_| invalid(&i.to_string(), ty))?)
        }
        SqlValue::Integer(i) => Box::new(*i),
        SqlValue::Bool(b) if is_text(ty) => Box::new(b.to_string()),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Timestamp(ts) if is_text(ty) => Box::new(ts.to_rfc3339()),
        SqlValue::Timestamp(ts) if *ty == Type::TIMESTAMP => Box::new(ts.naive_utc()),
        SqlValue::Timestamp(ts) => Box::new(*ts),
    };
    Ok(param)
}

fn column_value(row: &tokio_postgres::Row, i: usize) -> Result<SqlValue, tokio_postgres::Error> {
    let ty = row.columns()[i].type_();
    let value = if *ty == Type::BOOL {
        SqlValue::from(row.try_get::<_, Option<bool>>(i)?)
    } else if *ty == Type::INT8 {
        SqlValue::from(row.try_get::<_, Option<i64>>(i)?)
    } else if *ty == Type::INT4 {
        SqlValue::from(row.try_get::<_, Option<i32>>(i)?.map(i64::from))
    } else if *ty == Type::INT2 {
        SqlValue::from(row.try_get::<_, Option<i16>>(i)?.map(i64::from))
    } else if *ty == Type::TIMESTAMPTZ {
        SqlValue::from(row.try_get::<_, Option<DateTime<Utc>>>(i)?)
    } else if *ty == Type::TIMESTAMP {
        SqlValue::from(
            row.try_get::<_, Option<NaiveDateTime>>(i)?
                .map(|ts| ts.and_utc()),
        )
    } else if *ty == Type::FLOAT8 {
        SqlValue::from(row.try_get::<_, Option<f64>>(i)?.map(|f| f.to_string()))
    } else {
        SqlValue::from(row.try_get::<_, Option<String>>(i)?)
    };
    Ok(value)
}

fn convert_row(row: &tokio_postgres::Row) -> Result<Row, tokio_postgres::Error> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        columns.push((column.name().to_string(), column_value(row, i)?));
    }
    Ok(Row::new(columns))
}

fn exec_error(statement: &str, err: tokio_postgres::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
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

fn query_error(statement: &str, err: tokio_postgres::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    StorageError::QueryFailed {
        statement: statement.to_string(),
        reason: err.to_string(),
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Executor over a borrowed client or transaction.
///
/// Passing a transaction makes a sequence of statements atomic, e.g. a
/// whole label update.
pub struct PgExecutor<'a, C> {
    client: &'a C,
}

impl<'a, C: GenericClient + Sync> PgExecutor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    async fn prepare(
        &self,
        sql: &str,
        args: &[SqlValue],
        on_error: fn(&str, tokio_postgres::Error) -> StorageError,
    ) -> RegistryResult<(tokio_postgres::Statement, Vec<Param>)> {
        let stmt = self
            .client
            .prepare(sql)
            .await
            .map_err(|err| on_error(sql, err))?;
        if stmt.params().len() != args.len() {
            return Err(QueryError::ArgumentMismatch {
                placeholders: stmt.params().len(),
                args: args.len(),
            }
            .into());
        }
        let params = args
            .iter()
            .zip(stmt.params())
            .map(|(value, ty)| to_param(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((stmt, params))
    }
}

fn as_refs(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

#[async_trait]
impl<C: GenericClient + Sync> Executor for PgExecutor<'_, C> {
    fn bind_style(&self) -> BindStyle {
        BindStyle::Dollar
    }

    async fn exec(&self, sql: &str, args: &[SqlValue]) -> RegistryResult<u64> {
        let (stmt, params) = self.prepare(sql, args, exec_error).await?;
        let affected = self
            .client
            .execute(&stmt, &as_refs(&params))
            .await
            .map_err(|err| exec_error(sql, err))?;
        Ok(affected)
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> RegistryResult<Vec<Row>> {
        let (stmt, params) = self.prepare(sql, args, query_error).await?;
        let rows = self
            .client
            .query(&stmt, &as_refs(&params))
            .await
            .map_err(|err| query_error(sql, err))?;
        rows.iter()
            .map(|row| convert_row(row).map_err(|err| RegistryError::from(query_error(sql, err))))
            .collect()
    }
}
