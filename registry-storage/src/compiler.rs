//! Criteria to SQL compilation.
//!
//! The compiler only emits predicates. A query with label criteria must
//! already join the label table against the base table; see
//! [`crate::statements::select_query`].

use crate::bind::{expand_in, rebind, BindArg, BindStyle};
use registry_core::{
    parse_bool, Criterion, CriterionType, EntityDescriptor, EntityType, Operator, QueryError,
    RegistryResult, SqlValue,
};

/// A statement ready for the execution primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// SQL spelling of an operator.
pub fn translate_operator(operator: Operator) -> String {
    match operator {
        Operator::LessThan => "<".to_string(),
        Operator::GreaterThan => ">".to_string(),
        Operator::LessThanOrEqual => "<=".to_string(),
        Operator::GreaterThanOrEqual => ">=".to_string(),
        Operator::NotIn => "NOT IN".to_string(),
        Operator::EqualsOrNil => "=".to_string(),
        other => other.token().to_uppercase(),
    }
}

/// Conversion of one textual operand into a bound value.
type Operand<'a> = &'a dyn Fn(&Criterion, &str) -> RegistryResult<SqlValue>;

fn text_operand(_: &Criterion, value: &str) -> RegistryResult<SqlValue> {
    Ok(SqlValue::from(value))
}

/// Placeholder and argument for a criterion's right operand.
fn build_right_op(
    criterion: &Criterion,
    operand: Operand<'_>,
) -> RegistryResult<(&'static str, BindArg)> {
    if criterion.operator.is_multi_variate() {
        let values = criterion
            .right_op
            .iter()
            .map(|value| operand(criterion, value))
            .collect::<RegistryResult<Vec<_>>>()?;
        Ok(("(?)", BindArg::List(values)))
    } else {
        let value = criterion.right_op.first().map(String::as_str).unwrap_or_default();
        Ok(("?", BindArg::Scalar(operand(criterion, value)?)))
    }
}

fn has_multi_variate_op(criteria: &[Criterion]) -> bool {
    criteria.iter().any(|c| c.operator.is_multi_variate())
}

/// Append the conjunction of `criteria` to `base_query`.
///
/// Field criteria are qualified with `base_table`, label criteria with
/// `labels_table`. Operands are bound as text. Criteria are not validated
/// here; use [`QueryCompiler`] for caller-supplied filters.
pub fn build_query_with_params(
    base_query: &str,
    base_table: &str,
    labels_table: &str,
    criteria: &[Criterion],
    style: BindStyle,
) -> RegistryResult<CompiledQuery> {
    build_query(base_query, base_table, labels_table, criteria, style, "", &text_operand)
}

/// `suffix` goes after the predicates, e.g. an `ORDER BY` clause.
fn build_query(
    base_query: &str,
    base_table: &str,
    labels_table: &str,
    criteria: &[Criterion],
    style: BindStyle,
    suffix: &str,
    operand: Operand<'_>,
) -> RegistryResult<CompiledQuery> {
    if criteria.is_empty() {
        return Ok(CompiledQuery {
            sql: format!("{}{};", base_query, suffix),
            args: Vec::new(),
        });
    }

    let mut params = Vec::with_capacity(criteria.len() * 2);
    let mut clauses = Vec::with_capacity(criteria.len());
    for criterion in criteria {
        let (bind_var, value) = build_right_op(criterion, operand)?;
        let sql_op = translate_operator(criterion.operator);
        match criterion.criterion_type {
            CriterionType::LabelQuery => {
                clauses.push(format!(
                    "{labels}.key = ? AND {labels}.val {op} {bind}",
                    labels = labels_table,
                    op = sql_op,
                    bind = bind_var
                ));
                params.push(BindArg::from(criterion.left_op.as_str()));
            }
            CriterionType::FieldQuery => {
                let mut clause = format!(
                    "{}.{} {} {}",
                    base_table, criterion.left_op, sql_op, bind_var
                );
                if criterion.operator.is_nullable() {
                    clause = format!(
                        "({} OR {}.{} IS NULL)",
                        clause, base_table, criterion.left_op
                    );
                }
                clauses.push(clause);
            }
        }
        params.push(value);
    }

    let sql = format!("{} WHERE {}{};", base_query, clauses.join(" AND "), suffix);
    let (sql, args) = if has_multi_variate_op(criteria) {
        expand_in(&sql, params)?
    } else {
        (sql, params.into_iter().flat_map(BindArg::into_values).collect())
    };

    Ok(CompiledQuery {
        sql: rebind(style, &sql),
        args,
    })
}

/// Validating compiler bound to one entity type.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler {
    descriptor: &'static EntityDescriptor,
    style: BindStyle,
}

impl QueryCompiler {
    pub fn new(entity_type: EntityType, style: BindStyle) -> Self {
        Self {
            descriptor: entity_type.descriptor(),
            style,
        }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    pub fn style(&self) -> BindStyle {
        self.style
    }

    /// Reject malformed criteria, unknown fields and label criteria on
    /// types without labels.
    pub fn validate(&self, criteria: &[Criterion]) -> RegistryResult<()> {
        for criterion in criteria {
            criterion.validate()?;
            match criterion.criterion_type {
                CriterionType::FieldQuery => {
                    if !self.descriptor.allows_field(&criterion.left_op) {
                        return Err(QueryError::UnknownField {
                            table: self.descriptor.table.to_string(),
                            field: criterion.left_op.clone(),
                        }
                        .into());
                    }
                }
                CriterionType::LabelQuery => {
                    if self.descriptor.labels.is_none() {
                        return Err(QueryError::LabelsNotSupported {
                            entity_type: self.descriptor.entity_type,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Typed operand for a criterion. Boolean columns take any spelling
    /// [`parse_bool`] accepts; everything else is bound as text.
    fn operand(&self, criterion: &Criterion, value: &str) -> RegistryResult<SqlValue> {
        let is_boolean = criterion.criterion_type == CriterionType::FieldQuery
            && self.descriptor.is_boolean_field(&criterion.left_op);
        if !is_boolean {
            return Ok(SqlValue::from(value));
        }
        parse_bool(value).map(SqlValue::Bool).ok_or_else(|| {
            QueryError::InvalidValue {
                value: value.to_string(),
                expected: "boolean".to_string(),
            }
            .into()
        })
    }

    pub fn compile(&self, base_query: &str, criteria: &[Criterion]) -> RegistryResult<CompiledQuery> {
        self.compile_with_suffix(base_query, criteria, "")
    }

    /// Like [`QueryCompiler::compile`], ordering rows by their paging
    /// sequence.
    pub fn compile_in_paging_order(
        &self,
        base_query: &str,
        criteria: &[Criterion],
    ) -> RegistryResult<CompiledQuery> {
        let order_by = format!(" ORDER BY {}.paging_sequence", self.descriptor.table);
        self.compile_with_suffix(base_query, criteria, &order_by)
    }

    fn compile_with_suffix(
        &self,
        base_query: &str,
        criteria: &[Criterion],
        suffix: &str,
    ) -> RegistryResult<CompiledQuery> {
        self.validate(criteria)?;
        let labels_table = self.descriptor.labels.map(|l| l.table).unwrap_or_default();
        build_query(
            base_query,
            self.descriptor.table,
            labels_table,
            criteria,
            self.style,
            suffix,
            &|criterion, value| self.operand(criterion, value),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_core::RegistryError;

    fn text(values: &[&str]) -> Vec<SqlValue> {
        values.iter().map(|v| SqlValue::from(*v)).collect()
    }

    #[test]
    fn test_operator_translation() {
        assert_eq!(translate_operator(Operator::LessThan), "<");
        assert_eq!(translate_operator(Operator::GreaterThan), ">");
        assert_eq!(translate_operator(Operator::NotIn), "NOT IN");
        assert_eq!(translate_operator(Operator::EqualsOrNil), "=");
        assert_eq!(translate_operator(Operator::In), "IN");
        assert_eq!(translate_operator(Operator::Equals), "=");
        assert_eq!(translate_operator(Operator::NotEquals), "!=");
        assert_eq!(translate_operator(Operator::Contains), "LIKE");
    }

    #[test]
    fn test_empty_criteria_has_no_where_clause() {
        let compiled =
            build_query_with_params("SELECT * FROM t", "t", "tl", &[], BindStyle::Dollar).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM t;");
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn test_field_and_label_clauses() {
        let criteria = vec![
            Criterion::by_field(Operator::Equals, "name", ["a"]),
            Criterion::by_label(Operator::Equals, "env", ["prod"]),
        ];
        let compiled = build_query_with_params(
            "SELECT * FROM t",
            "t",
            "tl",
            &criteria,
            BindStyle::Dollar,
        )
        .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM t WHERE t.name = $1 AND tl.key = $2 AND tl.val = $3;"
        );
        assert_eq!(compiled.args, text(&["a", "env", "prod"]));
    }

    #[test]
    fn test_nullable_operator_wraps_clause() {
        let criteria = vec![Criterion::by_field(Operator::EqualsOrNil, "platform_id", ["p"])];
        let compiled =
            build_query_with_params("SELECT * FROM t", "t", "tl", &criteria, BindStyle::Question)
                .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM t WHERE (t.platform_id = ? OR t.platform_id IS NULL);"
        );
        assert_eq!(compiled.args, text(&["p"]));
    }

    #[test]
    fn test_multi_variate_expansion_then_rebind() {
        let criteria = vec![
            Criterion::by_label(Operator::In, "env", ["a", "b", "c"]),
            Criterion::by_field(Operator::NotIn, "name", ["x"]),
            Criterion::by_field(Operator::GreaterThan, "paging_sequence", ["10"]),
        ];
        let compiled =
            build_query_with_params("SELECT * FROM t", "t", "tl", &criteria, BindStyle::Dollar)
                .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM t WHERE tl.key = $1 AND tl.val IN ($2, $3, $4) \
             AND t.name NOT IN ($5) AND t.paging_sequence > $6;"
        );
        assert_eq!(compiled.args, text(&["env", "a", "b", "c", "x", "10"]));
    }

    #[test]
    fn test_empty_in_list_is_compilation_error() {
        let criteria = vec![Criterion::by_field(Operator::In, "name", Vec::<String>::new())];
        let result =
            build_query_with_params("SELECT * FROM t", "t", "tl", &criteria, BindStyle::Dollar);
        assert!(matches!(
            result,
            Err(RegistryError::Query(QueryError::EmptyInList))
        ));
    }

    #[test]
    fn test_compiler_rejects_unknown_field() {
        let compiler = QueryCompiler::new(EntityType::ServiceBinding, BindStyle::Dollar);
        let criteria = vec![Criterion::by_field(
            Operator::Equals,
            "1=1 OR name",
            ["x"],
        )];
        assert!(matches!(
            compiler.compile("SELECT * FROM service_bindings", &criteria),
            Err(RegistryError::Query(QueryError::UnknownField { .. }))
        ));
    }

    #[test]
    fn test_compiler_uses_descriptor_tables() {
        let compiler = QueryCompiler::new(EntityType::ServiceInstance, BindStyle::Question);
        let criteria = vec![Criterion::by_label(Operator::Equals, "parent_id", ["inst-1"])];
        let compiled = compiler
            .compile("SELECT * FROM service_instances", &criteria)
            .unwrap();
        assert!(compiled
            .sql
            .contains("service_instance_labels.key = ? AND service_instance_labels.val = ?"));
    }

    #[test]
    fn test_paging_order_goes_before_terminator() {
        let compiler = QueryCompiler::new(EntityType::ServicePlan, BindStyle::Dollar);
        let criteria = vec![Criterion::by_field(Operator::In, "id", ["a", "b"])];
        let compiled = compiler
            .compile_in_paging_order("SELECT * FROM service_plans", &criteria)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM service_plans WHERE service_plans.id IN ($1, $2) \
             ORDER BY service_plans.paging_sequence;"
        );

        let all = compiler
            .compile_in_paging_order("SELECT * FROM service_plans", &[])
            .unwrap();
        assert_eq!(
            all.sql,
            "SELECT * FROM service_plans ORDER BY service_plans.paging_sequence;"
        );
    }

    #[test]
    fn test_boolean_field_binds_typed_operand() {
        let compiler = QueryCompiler::new(EntityType::ServiceInstance, BindStyle::Question);
        let criteria = vec![
            Criterion::by_field(Operator::Equals, "ready", ["TRUE"]),
            Criterion::by_field(Operator::In, "ready", ["0", "f"]),
            Criterion::by_label(Operator::Equals, "ready", ["true"]),
        ];
        let compiled = compiler
            .compile("SELECT * FROM service_instances", &criteria)
            .unwrap();
        assert_eq!(
            compiled.args,
            vec![
                SqlValue::Bool(true),
                SqlValue::Bool(false),
                SqlValue::Bool(false),
                SqlValue::from("ready"),
                SqlValue::from("true"),
            ]
        );
    }

    #[test]
    fn test_boolean_field_rejects_other_text() {
        let compiler = QueryCompiler::new(EntityType::ServiceInstance, BindStyle::Dollar);
        let criteria = vec![Criterion::by_field(Operator::Equals, "ready", ["maybe"])];
        match compiler.compile("SELECT * FROM service_instances", &criteria) {
            Err(RegistryError::Query(QueryError::InvalidValue { value, expected })) => {
                assert_eq!(value, "maybe");
                assert_eq!(expected, "boolean");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_compiler_rejects_invalid_arity() {
        let compiler = QueryCompiler::new(EntityType::ServiceInstance, BindStyle::Question);
        let criteria = vec![Criterion::by_field(Operator::Equals, "name", ["a", "b"])];
        assert!(compiler.compile("SELECT * FROM service_instances", &criteria).is_err());
    }
}
