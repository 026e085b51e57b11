//! Table definitions for every catalogued entity type and its labels.

use crate::executor::{execute, Executor};
use registry_core::{Dialect, EntityDescriptor, EntityType, RegistryResult};

/// Columns owned by the base entity; everything else in a descriptor's
/// allowlist is a plain text column of the record.
const BASE_COLUMNS: [&str; 5] = ["id", "created_at", "updated_at", "paging_sequence", "ready"];

fn base_columns(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => {
            "id VARCHAR(100) PRIMARY KEY, \
             paging_sequence BIGSERIAL, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP, \
             updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP, \
             ready BOOLEAN NOT NULL DEFAULT TRUE"
        }
        Dialect::Sqlite => {
            "paging_sequence INTEGER PRIMARY KEY AUTOINCREMENT, \
             id TEXT NOT NULL UNIQUE, \
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
             updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
             ready BOOLEAN NOT NULL DEFAULT 1"
        }
    }
}

fn text_type(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "VARCHAR(255)",
        Dialect::Sqlite => "TEXT",
    }
}

fn timestamp_type(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "TIMESTAMPTZ",
        Dialect::Sqlite => "TEXT",
    }
}

fn entity_table(descriptor: &EntityDescriptor, dialect: Dialect) -> String {
    let mut columns = vec![base_columns(dialect).to_string()];
    for field in descriptor
        .fields
        .iter()
        .filter(|f| !BASE_COLUMNS.contains(*f))
    {
        let not_null = if *field == "name" { " NOT NULL" } else { "" };
        columns.push(format!("{} {}{}", field, text_type(dialect), not_null));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        descriptor.table,
        columns.join(", ")
    )
}

fn label_table(descriptor: &EntityDescriptor, dialect: Dialect) -> Option<String> {
    let labels = descriptor.labels?;
    let text = text_type(dialect);
    let ts = timestamp_type(dialect);
    Some(format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         {primary} {text} PRIMARY KEY, \
         key {text} NOT NULL, \
         val {text} NOT NULL, \
         {reference} {text} NOT NULL REFERENCES {owner}(id) ON DELETE CASCADE, \
         created_at {ts} NOT NULL DEFAULT CURRENT_TIMESTAMP, \
         updated_at {ts} NOT NULL DEFAULT CURRENT_TIMESTAMP, \
         UNIQUE ({reference}, key, val))",
        table = labels.table,
        primary = labels.primary_column,
        reference = labels.reference_column,
        owner = descriptor.table,
        text = text,
        ts = ts,
    ))
}

/// DDL for every entity and label table, owners before their labels.
pub fn create_table_statements(dialect: Dialect) -> Vec<String> {
    let mut statements = Vec::new();
    for entity_type in EntityType::ALL {
        let descriptor = entity_type.descriptor();
        statements.push(entity_table(descriptor, dialect));
        if dialect == Dialect::Postgres {
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_paging_sequence_idx ON {table} (paging_sequence)",
                table = descriptor.table
            ));
        }
        statements.extend(label_table(descriptor, dialect));
    }
    statements
}

/// Create any missing tables.
pub async fn migrate(executor: &dyn Executor, dialect: Dialect) -> RegistryResult<()> {
    let statements = create_table_statements(dialect);
    tracing::info!(%dialect, statements = statements.len(), "Applying registry schema");
    for statement in &statements {
        execute(executor, statement, &[]).await?;
    }
    Ok(())
}
