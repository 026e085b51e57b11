//! Cascade resolution executed against an in-memory SQLite registry.
//!
//! Resolvers only describe children; these tests run every resolved entry
//! through the compiler and check which rows come back.

use registry_core::{
    cascade_for, CascadeObject, Criterion, EntityType, LabelChange, LabelOperation, Operator,
    StorageSettings,
};
use registry_storage::{create, list_ids, LabelStore, SqliteExecutor};
use registry_test_utils::fixtures::{
    binding, broker, instance, memory_store, offering, plan, platform,
};
use std::collections::BTreeMap;

const PARENT_KEY: &str = "parent_id";

/// Ids of every resolved child, per type.
async fn resolve(
    store: &SqliteExecutor,
    object: &CascadeObject,
    settings: &StorageSettings,
) -> BTreeMap<EntityType, Vec<String>> {
    let mut children = BTreeMap::new();
    for (entity_type, criteria) in cascade_for(object, settings).children_criterion() {
        let ids = list_ids(store, entity_type, &criteria).await.unwrap();
        children.insert(entity_type, ids);
    }
    children
}

async fn nest(store: &SqliteExecutor, child: &str, parent: &str) {
    LabelStore::new(store)
        .update_entity_labels(
            EntityType::ServiceInstance,
            child,
            &[LabelChange::new(LabelOperation::Add, PARENT_KEY, [parent])],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn instance_children_are_its_bindings() {
    let store = memory_store().await.unwrap();
    let parent = instance("inst-1", "plan-1", None);
    create(&store, &parent).await.unwrap();
    create(&store, &instance("inst-2", "plan-1", None)).await.unwrap();
    create(&store, &binding("b1", "inst-1")).await.unwrap();
    create(&store, &binding("b2", "inst-1")).await.unwrap();
    create(&store, &binding("b3", "inst-2")).await.unwrap();

    let object = CascadeObject::ServiceInstance(parent);
    let children = resolve(&store, &object, &StorageSettings::default()).await;

    assert_eq!(children.len(), 1);
    assert_eq!(children[&EntityType::ServiceBinding], vec!["b1", "b2"]);
}

#[test]
fn binding_criterion_is_a_foreign_key_equality() {
    let parent = instance("inst-1", "plan-1", None);
    let object = CascadeObject::ServiceInstance(parent);
    let settings = StorageSettings::default();

    let children = cascade_for(&object, &settings).children_criterion();
    assert_eq!(
        children[&EntityType::ServiceBinding],
        vec![Criterion::by_field(
            Operator::Equals,
            "service_instance_id",
            ["inst-1"]
        )]
    );
}

#[tokio::test]
async fn parent_label_nests_instances() {
    let store = memory_store().await.unwrap();
    let parent = instance("inst-1", "plan-1", None);
    create(&store, &parent).await.unwrap();
    for id in ["child-a", "child-b", "stranger", "grandchild"] {
        create(&store, &instance(id, "plan-1", None)).await.unwrap();
    }
    nest(&store, "child-a", "inst-1").await;
    nest(&store, "child-b", "inst-1").await;
    nest(&store, "stranger", "inst-9").await;
    nest(&store, "grandchild", "child-a").await;
    create(&store, &binding("b1", "inst-1")).await.unwrap();

    let settings = StorageSettings::default().with_parent_instance_label_key(PARENT_KEY);
    let object = CascadeObject::ServiceInstance(parent);
    let children = resolve(&store, &object, &settings).await;

    assert_eq!(children[&EntityType::ServiceBinding], vec!["b1"]);
    assert_eq!(
        children[&EntityType::ServiceInstance],
        vec!["child-a", "child-b"]
    );
}

#[tokio::test]
async fn nesting_resolves_recursively_one_level_at_a_time() {
    let store = memory_store().await.unwrap();
    for id in ["root", "mid", "leaf"] {
        create(&store, &instance(id, "plan-1", None)).await.unwrap();
    }
    nest(&store, "mid", "root").await;
    nest(&store, "leaf", "mid").await;
    let settings = StorageSettings::default().with_parent_instance_label_key(PARENT_KEY);

    let mut frontier = vec![instance("root", "plan-1", None)];
    let mut visited = Vec::new();
    while let Some(current) = frontier.pop() {
        let object = CascadeObject::ServiceInstance(current);
        let children = resolve(&store, &object, &settings).await;
        for id in children.get(&EntityType::ServiceInstance).into_iter().flatten() {
            visited.push(id.clone());
            frontier.push(instance(id, "plan-1", None));
        }
    }
    assert_eq!(visited, vec!["mid", "leaf"]);
}

#[tokio::test]
async fn nesting_disabled_without_label_key() {
    let store = memory_store().await.unwrap();
    let parent = instance("inst-1", "plan-1", None);
    create(&store, &parent).await.unwrap();
    create(&store, &instance("child", "plan-1", None)).await.unwrap();
    nest(&store, "child", "inst-1").await;

    let object = CascadeObject::ServiceInstance(parent);
    let children = resolve(&store, &object, &StorageSettings::default()).await;
    assert!(!children.contains_key(&EntityType::ServiceInstance));
}

#[tokio::test]
async fn catalog_parents_resolve_their_children() {
    let store = memory_store().await.unwrap();
    create(&store, &platform("p1")).await.unwrap();
    create(&store, &broker("br1")).await.unwrap();
    create(&store, &offering("o1", "br1")).await.unwrap();
    create(&store, &offering("o2", "br-other")).await.unwrap();
    create(&store, &plan("pl1", "o1")).await.unwrap();
    create(&store, &instance("i1", "pl1", Some("p1"))).await.unwrap();
    create(&store, &instance("i2", "pl-other", Some("p1"))).await.unwrap();
    create(&store, &instance("i3", "pl1", None)).await.unwrap();
    let settings = StorageSettings::default();

    let by_platform = resolve(&store, &CascadeObject::Platform(platform("p1")), &settings).await;
    assert_eq!(by_platform[&EntityType::ServiceInstance], vec!["i1", "i2"]);

    let by_broker = resolve(&store, &CascadeObject::ServiceBroker(broker("br1")), &settings).await;
    assert_eq!(by_broker[&EntityType::ServiceOffering], vec!["o1"]);

    let by_offering = resolve(
        &store,
        &CascadeObject::ServiceOffering(offering("o1", "br1")),
        &settings,
    )
    .await;
    assert_eq!(by_offering[&EntityType::ServicePlan], vec!["pl1"]);

    let by_plan = resolve(&store, &CascadeObject::ServicePlan(plan("pl1", "o1")), &settings).await;
    assert_eq!(by_plan[&EntityType::ServiceInstance], vec!["i1", "i3"]);

    let by_binding = resolve(
        &store,
        &CascadeObject::ServiceBinding(binding("b1", "i1")),
        &settings,
    )
    .await;
    assert!(by_binding.is_empty());
}
