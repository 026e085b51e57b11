//! Registry Storage - Query Compiler, Label Store and SQL Executors
//!
//! Turns abstract criteria into parameterized SQL, applies label changes and
//! runs the generic create/list/delete statements through an [`Executor`].
//! PostgreSQL and SQLite backends are provided.

pub mod bind;
pub mod compiler;
pub mod executor;
pub mod labels;
pub mod postgres;
pub mod schema;
pub mod sqlite;
pub mod statements;

pub use bind::{expand_in, rebind, BindArg, BindStyle};
pub use compiler::{build_query_with_params, translate_operator, CompiledQuery, QueryCompiler};
pub use executor::{execute, fetch, Executor, Row};
pub use labels::LabelStore;
pub use postgres::{checkout, PgConfig, PgExecutor};
pub use schema::{create_table_statements, migrate};
pub use sqlite::SqliteExecutor;
pub use statements::{create, delete, delete_query, list, list_ids, select_query};
