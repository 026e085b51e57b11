//! Generic create, list and delete statements over any entity type.

use crate::bind::{rebind, BindStyle};
use crate::compiler::{CompiledQuery, QueryCompiler};
use crate::executor::{execute, fetch, Executor, Row};
use registry_core::{
    Criterion, CriterionType, EntityType, Insertable, RegistryResult, StorageError,
};

fn has_label_criteria(criteria: &[Criterion]) -> bool {
    criteria
        .iter()
        .any(|c| c.criterion_type == CriterionType::LabelQuery)
}

/// `SELECT` over an entity table in paging order, joined with its labels
/// when any criterion targets a label.
pub fn select_query(
    entity_type: EntityType,
    criteria: &[Criterion],
    style: BindStyle,
) -> RegistryResult<CompiledQuery> {
    let compiler = QueryCompiler::new(entity_type, style);
    let table = compiler.descriptor().table;
    let base_query = match compiler.descriptor().labels {
        Some(labels) if has_label_criteria(criteria) => format!(
            "SELECT DISTINCT {table}.* FROM {table} LEFT JOIN {labels} ON {table}.id = {labels}.{reference}",
            table = table,
            labels = labels.table,
            reference = labels.reference_column
        ),
        _ => format!("SELECT {table}.* FROM {table}", table = table),
    };
    compiler.compile_in_paging_order(&base_query, criteria)
}

/// Insert a row. Null columns are left to their defaults.
pub async fn create(executor: &dyn Executor, row: &(dyn Insertable + Sync)) -> RegistryResult<u64> {
    let table = row.table().to_string();
    let (names, values): (Vec<_>, Vec<_>) = row
        .columns()
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .unzip();
    let markers = vec!["?"; names.len()].join(", ");
    let sql = rebind(
        executor.bind_style(),
        &format!(
            "INSERT INTO {} ({}) VALUES ({});",
            table,
            names.join(", "),
            markers
        ),
    );

    let affected = execute(executor, &sql, &values).await?;
    if affected < 1 {
        return Err(StorageError::NothingInserted { table }.into());
    }
    Ok(affected)
}

/// Rows of `entity_type` matching `criteria`, in paging order.
pub async fn list(
    executor: &dyn Executor,
    entity_type: EntityType,
    criteria: &[Criterion],
) -> RegistryResult<Vec<Row>> {
    let compiled = select_query(entity_type, criteria, executor.bind_style())?;
    fetch(executor, &compiled.sql, &compiled.args).await
}

/// `DELETE` of the entity rows matching `criteria`.
///
/// Label predicates need the join, so the rows are picked by id through the
/// same select the listing uses.
pub fn delete_query(
    entity_type: EntityType,
    criteria: &[Criterion],
    style: BindStyle,
) -> RegistryResult<CompiledQuery> {
    let compiler = QueryCompiler::new(entity_type, style);
    let table = compiler.descriptor().table;
    let labels = match compiler.descriptor().labels {
        Some(labels) if has_label_criteria(criteria) => labels,
        _ => return compiler.compile(&format!("DELETE FROM {}", table), criteria),
    };

    let selected = compiler.compile(
        &format!(
            "SELECT {table}.id FROM {table} LEFT JOIN {labels} ON {table}.id = {labels}.{reference}",
            table = table,
            labels = labels.table,
            reference = labels.reference_column
        ),
        criteria,
    )?;
    let subquery = selected.sql.trim_end_matches(';');
    Ok(CompiledQuery {
        sql: format!("DELETE FROM {} WHERE id IN ({});", table, subquery),
        args: selected.args,
    })
}

/// Delete rows of `entity_type` matching `criteria`, returning how many
/// were removed. Deleting nothing is not an error.
pub async fn delete(
    executor: &dyn Executor,
    entity_type: EntityType,
    criteria: &[Criterion],
) -> RegistryResult<u64> {
    let compiled = delete_query(entity_type, criteria, executor.bind_style())?;
    execute(executor, &compiled.sql, &compiled.args).await
}

/// Ids of the rows selected by `criteria`, in paging order.
pub async fn list_ids(
    executor: &dyn Executor,
    entity_type: EntityType,
    criteria: &[Criterion],
) -> RegistryResult<Vec<String>> {
    let rows = list(executor, entity_type, criteria).await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get_str("id").map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_core::{Operator, SqlValue};

    #[test]
    fn test_select_without_labels_skips_join() {
        let criteria = vec![Criterion::by_field(
            Operator::Equals,
            "service_instance_id",
            ["inst-1"],
        )];
        let compiled =
            select_query(EntityType::ServiceBinding, &criteria, BindStyle::Dollar).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT service_bindings.* FROM service_bindings \
             WHERE service_bindings.service_instance_id = $1 \
             ORDER BY service_bindings.paging_sequence;"
        );
    }

    #[test]
    fn test_select_with_label_criteria_joins_labels() {
        let criteria = vec![Criterion::by_label(Operator::Equals, "parent_id", ["inst-1"])];
        let compiled =
            select_query(EntityType::ServiceInstance, &criteria, BindStyle::Dollar).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT DISTINCT service_instances.* FROM service_instances \
             LEFT JOIN service_instance_labels \
             ON service_instances.id = service_instance_labels.service_instance_id \
             WHERE service_instance_labels.key = $1 AND service_instance_labels.val = $2 \
             ORDER BY service_instances.paging_sequence;"
        );
        assert_eq!(
            compiled.args,
            vec![SqlValue::from("parent_id"), SqlValue::from("inst-1")]
        );
    }

    #[test]
    fn test_delete_by_field_is_direct() {
        let criteria = vec![Criterion::by_field(Operator::In, "id", ["a", "b"])];
        let compiled =
            delete_query(EntityType::ServicePlan, &criteria, BindStyle::Dollar).unwrap();
        assert_eq!(
            compiled.sql,
            "DELETE FROM service_plans WHERE service_plans.id IN ($1, $2);"
        );
    }

    #[test]
    fn test_delete_by_label_selects_ids_through_join() {
        let criteria = vec![Criterion::by_label(Operator::Equals, "env", ["dev"])];
        let compiled =
            delete_query(EntityType::Platform, &criteria, BindStyle::Dollar).unwrap();
        assert_eq!(
            compiled.sql,
            "DELETE FROM platforms WHERE id IN (SELECT platforms.id FROM platforms \
             LEFT JOIN platform_labels ON platforms.id = platform_labels.platform_id \
             WHERE platform_labels.key = $1 AND platform_labels.val = $2);"
        );
        assert_eq!(compiled.args.len(), 2);
    }
}
