//! Registry Test Utilities
//!
//! Shared test infrastructure for the registry workspace:
//! - Proptest generators for criteria and label changes
//! - Fixtures for every entity record and a migrated in-memory store
//! - Assertions for registry error variants

pub use registry_core::{
    BaseEntity, Criterion, CriterionType, Dialect, EntityType, LabelChange, LabelOperation,
    Operator, Platform, QueryError, RegistryError, RegistryResult, ServiceBinding, ServiceBroker,
    ServiceInstance, ServiceOffering, ServicePlan, SqlValue, StorageError, StorageSettings,
};
pub use registry_storage::{Executor, SqliteExecutor};

use uuid::Uuid;

/// Install a test-friendly tracing subscriber once; later calls are no-ops.
///
/// Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for registry query and label types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID string.
    pub fn arb_id() -> impl Strategy<Value = String> {
        any::<[u8; 16]>().prop_map(|bytes| Uuid::from_bytes(bytes).to_string())
    }

    pub fn arb_entity_type() -> impl Strategy<Value = EntityType> {
        prop::sample::select(EntityType::ALL.to_vec())
    }

    pub fn arb_operator() -> impl Strategy<Value = Operator> {
        prop::sample::select(Operator::ALL.to_vec())
    }

    /// Label keys and values: no whitespace, never empty.
    pub fn arb_label_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    pub fn arb_label_value() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9.-]{0,11}"
    }

    /// Right operand sized for the operator's arity.
    fn arb_right_op(operator: Operator) -> BoxedStrategy<Vec<String>> {
        if operator.is_multi_variate() {
            prop::collection::vec(arb_label_value(), 1..6).boxed()
        } else {
            arb_label_value().prop_map(|v| vec![v]).boxed()
        }
    }

    /// A valid field criterion over a column every entity table has.
    pub fn arb_field_criterion() -> impl Strategy<Value = Criterion> {
        (
            prop::sample::select(vec!["id", "name", "created_at", "updated_at"]),
            arb_operator(),
        )
            .prop_flat_map(|(field, operator)| {
                arb_right_op(operator)
                    .prop_map(move |values| Criterion::by_field(operator, field, values))
            })
    }

    /// A valid label criterion. Nullable operators are field-only.
    pub fn arb_label_criterion() -> impl Strategy<Value = Criterion> {
        (
            arb_label_key(),
            arb_operator().prop_filter("nullable operators are field-only", |op| {
                !op.is_nullable()
            }),
        )
            .prop_flat_map(|(key, operator)| {
                arb_right_op(operator)
                    .prop_map(move |values| Criterion::by_label(operator, key.clone(), values))
            })
    }

    pub fn arb_criteria() -> impl Strategy<Value = Vec<Criterion>> {
        prop::collection::vec(
            prop_oneof![arb_field_criterion(), arb_label_criterion()],
            0..6,
        )
    }

    pub fn arb_label_operation() -> impl Strategy<Value = LabelOperation> {
        prop_oneof![
            Just(LabelOperation::Add),
            Just(LabelOperation::AddValues),
            Just(LabelOperation::Remove),
            Just(LabelOperation::RemoveValues),
        ]
    }

    /// A label change with distinct values.
    pub fn arb_label_change() -> impl Strategy<Value = LabelChange> {
        (
            arb_label_operation(),
            arb_label_key(),
            prop::collection::btree_set(arb_label_value(), 0..4),
        )
            .prop_map(|(operation, key, values)| LabelChange::new(operation, key, values))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and stores for common testing scenarios.

    use super::*;

    pub fn platform(id: &str) -> Platform {
        Platform {
            base: BaseEntity::new(id),
            name: format!("platform-{}", id),
            description: Some("test platform".to_string()),
        }
    }

    pub fn broker(id: &str) -> ServiceBroker {
        ServiceBroker {
            base: BaseEntity::new(id),
            name: format!("broker-{}", id),
            broker_url: Some(format!("https://{}.brokers.test", id)),
        }
    }

    pub fn offering(id: &str, broker_id: &str) -> ServiceOffering {
        ServiceOffering {
            base: BaseEntity::new(id),
            name: format!("offering-{}", id),
            broker_id: Some(broker_id.to_string()),
        }
    }

    pub fn plan(id: &str, offering_id: &str) -> ServicePlan {
        ServicePlan {
            base: BaseEntity::new(id),
            name: format!("plan-{}", id),
            service_offering_id: Some(offering_id.to_string()),
        }
    }

    pub fn instance(id: &str, plan_id: &str, platform_id: Option<&str>) -> ServiceInstance {
        ServiceInstance {
            base: BaseEntity::new(id),
            name: format!("instance-{}", id),
            service_plan_id: Some(plan_id.to_string()),
            platform_id: platform_id.map(str::to_string),
        }
    }

    pub fn binding(id: &str, instance_id: &str) -> ServiceBinding {
        ServiceBinding {
            base: BaseEntity::new(id),
            name: format!("binding-{}", id),
            service_instance_id: Some(instance_id.to_string()),
        }
    }

    /// A fresh in-memory SQLite store with every registry table created.
    pub async fn memory_store() -> RegistryResult<SqliteExecutor> {
        let store = SqliteExecutor::open_in_memory().await?;
        registry_storage::migrate(&store, Dialect::Sqlite).await?;
        Ok(store)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for registry error variants.

    use super::*;

    /// Assert that a RegistryResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &RegistryResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a RegistryResult is a query (caller) error.
    #[track_caller]
    pub fn assert_query_error<T: std::fmt::Debug>(result: &RegistryResult<T>) {
        match result {
            Err(RegistryError::Query(_)) => {}
            other => panic!("Expected Query error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unique_violation<T: std::fmt::Debug>(result: &RegistryResult<T>) {
        match result {
            Err(RegistryError::Storage(StorageError::UniqueViolation { .. })) => {}
            other => panic!("Expected UniqueViolation, got: {:?}", other),
        }
    }
}
