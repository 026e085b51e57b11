//! Backend-independent filter criteria and label change actions.
//!
//! A list of [`Criterion`] values is an AND-conjunction evaluated left to
//! right. Field criteria refer to a column of the entity's own table, label
//! criteria to a key in its label table.

use crate::{QueryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessThanOrEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notin")]
    NotIn,
    /// Equals the value, or the field is absent.
    #[serde(rename = "eqornil")]
    EqualsOrNil,
    #[serde(rename = "like")]
    Contains,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::In,
        Operator::NotIn,
        Operator::EqualsOrNil,
        Operator::Contains,
    ];

    /// Query-language token of the operator.
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => "gt",
            Operator::GreaterThanOrEqual => "gte",
            Operator::LessThan => "lt",
            Operator::LessThanOrEqual => "lte",
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::EqualsOrNil => "eqornil",
            Operator::Contains => "like",
        }
    }

    /// The right operand is a set of values rather than a scalar.
    pub fn is_multi_variate(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// An absent field also satisfies the criterion.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Operator::EqualsOrNil)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.token().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueryError::UnknownOperator {
                token: s.to_string(),
            })
    }
}

/// What the left operand of a criterion names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriterionType {
    FieldQuery,
    LabelQuery,
}

/// One filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Field name or label key, depending on `criterion_type`.
    pub left_op: String,
    pub operator: Operator,
    pub right_op: Vec<String>,
    pub criterion_type: CriterionType,
}

impl Criterion {
    pub fn new(
        criterion_type: CriterionType,
        operator: Operator,
        left_op: impl Into<String>,
        right_op: Vec<String>,
    ) -> Self {
        Self {
            left_op: left_op.into(),
            operator,
            right_op,
            criterion_type,
        }
    }

    /// Criterion over a column of the entity's table.
    pub fn by_field<I, S>(operator: Operator, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            CriterionType::FieldQuery,
            operator,
            field,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Criterion over a label key of the entity.
    pub fn by_label<I, S>(operator: Operator, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            CriterionType::LabelQuery,
            operator,
            key,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// Check operand arity and operator applicability.
    pub fn validate(&self) -> RegistryResult<()> {
        if self.left_op.is_empty() {
            return Err(QueryError::MissingLeftOperand.into());
        }
        if self.operator.is_multi_variate() {
            if self.right_op.is_empty() {
                return Err(QueryError::MissingValues {
                    operator: self.operator.to_string(),
                    left_op: self.left_op.clone(),
                }
                .into());
            }
        } else if self.right_op.len() != 1 {
            return Err(QueryError::SingleValueExpected {
                operator: self.operator.to_string(),
                left_op: self.left_op.clone(),
                got: self.right_op.len(),
            }
            .into());
        }
        if self.operator.is_nullable() && self.criterion_type == CriterionType::LabelQuery {
            return Err(QueryError::NullableLabelQuery {
                operator: self.operator.to_string(),
                key: self.left_op.clone(),
            }
            .into());
        }
        Ok(())
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.left_op, self.operator)?;
        if self.operator.is_multi_variate() {
            write!(f, "({})", self.right_op.join(","))
        } else {
            write!(f, "{}", self.right_op.join(","))
        }
    }
}

/// Kind of label mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOperation {
    Add,
    AddValues,
    Remove,
    RemoveValues,
}

/// One label mutation against an owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChange {
    #[serde(rename = "op")]
    pub operation: LabelOperation,
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl LabelChange {
    pub fn new<I, S>(operation: LabelOperation, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Remove every value of `key`.
    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            operation: LabelOperation::Remove,
            key: key.into(),
            values: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistryError;

    #[test]
    fn test_operator_flags() {
        assert!(Operator::In.is_multi_variate());
        assert!(Operator::NotIn.is_multi_variate());
        assert!(!Operator::Equals.is_multi_variate());
        assert!(Operator::EqualsOrNil.is_nullable());
        assert!(!Operator::Equals.is_nullable());
    }

    #[test]
    fn test_operator_parses_from_token() {
        assert_eq!("notin".parse::<Operator>(), Ok(Operator::NotIn));
        assert_eq!("IN".parse::<Operator>(), Ok(Operator::In));
        assert_eq!("eqornil".parse::<Operator>(), Ok(Operator::EqualsOrNil));
        assert!(matches!(
            "between".parse::<Operator>(),
            Err(QueryError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn test_operator_serde_uses_token() {
        let json = serde_json::to_string(&Operator::GreaterThan).unwrap();
        assert_eq!(json, "\"gt\"");
        let op: Operator = serde_json::from_str("\"eqornil\"").unwrap();
        assert_eq!(op, Operator::EqualsOrNil);
    }

    #[test]
    fn test_single_value_operator_rejects_many_values() {
        let criterion = Criterion::by_field(Operator::Equals, "name", ["a", "b"]);
        assert!(matches!(
            criterion.validate(),
            Err(RegistryError::Query(QueryError::SingleValueExpected { got: 2, .. }))
        ));
    }

    #[test]
    fn test_multi_value_operator_requires_values() {
        let criterion = Criterion::by_field(Operator::In, "name", Vec::<String>::new());
        assert!(matches!(
            criterion.validate(),
            Err(RegistryError::Query(QueryError::MissingValues { .. }))
        ));
        let criterion = Criterion::by_field(Operator::In, "name", ["a"]);
        assert!(criterion.validate().is_ok());
    }

    #[test]
    fn test_nullable_operator_only_for_fields() {
        let criterion = Criterion::by_label(Operator::EqualsOrNil, "env", ["dev"]);
        assert!(matches!(
            criterion.validate(),
            Err(RegistryError::Query(QueryError::NullableLabelQuery { .. }))
        ));
        let criterion = Criterion::by_field(Operator::EqualsOrNil, "platform_id", ["p-1"]);
        assert!(criterion.validate().is_ok());
    }

    #[test]
    fn test_empty_left_operand_rejected() {
        let criterion = Criterion::by_field(Operator::Equals, "", ["x"]);
        assert!(criterion.validate().is_err());
    }

    #[test]
    fn test_criterion_display() {
        let criterion = Criterion::by_label(Operator::In, "env", ["dev", "prod"]);
        assert_eq!(criterion.to_string(), "env in (dev,prod)");
    }

    #[test]
    fn test_label_change_deserializes_without_values() {
        let change: LabelChange = serde_json::from_str(r#"{"op":"remove","key":"env"}"#).unwrap();
        assert_eq!(change, LabelChange::remove("env"));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Field criteria validate exactly when the operand count fits the operator.
        #[test]
        fn prop_validate_checks_arity(
            operator in prop::sample::select(Operator::ALL.to_vec()),
            values in prop::collection::vec("[a-z]{1,4}", 0..4),
        ) {
            let criterion = Criterion::by_field(operator, "name", values.clone());
            let arity_ok = if operator.is_multi_variate() {
                !values.is_empty()
            } else {
                values.len() == 1
            };
            prop_assert_eq!(criterion.validate().is_ok(), arity_ok);
        }

        /// Label criteria never accept a nullable operator.
        #[test]
        fn prop_label_criteria_reject_nullable(
            operator in prop::sample::select(Operator::ALL.to_vec()),
            key in "[a-z]{1,8}",
        ) {
            let values = if operator.is_multi_variate() { vec!["a", "b"] } else { vec!["a"] };
            let criterion = Criterion::by_label(operator, key, values);
            prop_assert_eq!(criterion.validate().is_ok(), !operator.is_nullable());
        }
    }
}
