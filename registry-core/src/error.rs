//! Error types for registry persistence operations

use crate::EntityType;
use thiserror::Error;

/// Errors raised while validating or compiling criteria into a statement.
///
/// These are caller errors: the filter must be fixed, retrying is pointless.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Operator {operator} expects exactly one value for {left_op}, got {got}")]
    SingleValueExpected {
        operator: String,
        left_op: String,
        got: usize,
    },

    #[error("Operator {operator} expects at least one value for {left_op}")]
    MissingValues { operator: String, left_op: String },

    #[error("Criterion is missing its left operand")]
    MissingLeftOperand,

    #[error("Nullable operator {operator} is only supported for field queries (label {key})")]
    NullableLabelQuery { operator: String, key: String },

    #[error("Field {field} is not queryable on {table}")]
    UnknownField { table: String, field: String },

    #[error("Entity {entity_type:?} does not support labels")]
    LabelsNotSupported { entity_type: EntityType },

    #[error("Unknown operator: {token}")]
    UnknownOperator { token: String },

    #[error("Empty list passed for an IN placeholder")]
    EmptyInList,

    #[error("Value {value} cannot be bound as {expected}")]
    InvalidValue { value: String, expected: String },

    #[error("Number of bind variables ({placeholders}) does not match number of arguments ({args})")]
    ArgumentMismatch { placeholders: usize, args: usize },
}

/// Errors raised by the execution primitive or the statements built on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Statement failed: {statement}: {reason}")]
    ExecutionFailed { statement: String, reason: String },

    #[error("Query failed: {statement}: {reason}")]
    QueryFailed { statement: String, reason: String },

    #[error("Insert into {table} affected no rows")]
    NothingInserted { table: String },

    #[error("Unique constraint violated: {statement}: {reason}")]
    UniqueViolation { statement: String, reason: String },

    #[error("Could not generate id for new label: {reason}")]
    IdGenerationFailed { reason: String },

    #[error("Connection unavailable: {reason}")]
    ConnectionUnavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors reported by an outbound broker client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Unable to get client for broker {broker}: {reason}")]
    Unavailable { broker: String, reason: String },

    #[error("Request {method} {url} failed: {reason}")]
    RequestFailed {
        method: String,
        url: String,
        reason: String,
    },
}

/// Master error type for all registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

impl RegistryError {
    /// Whether the error was caused by the request rather than the backend.
    ///
    /// The API layer maps these to "bad request"; everything else is internal.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RegistryError::Query(_)
                | RegistryError::Storage(StorageError::UniqueViolation { .. })
        )
    }
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// TESTS
// =============================================================================
