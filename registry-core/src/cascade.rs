//! Cascade resolution: which rows of which types depend on an entity.
//!
//! Resolvers perform no I/O. They only describe, per dependent type, the
//! criteria that select the children of one parent instance; a cascade
//! driver compiles and executes each entry independently.

use crate::{
    Criterion, Entity, EntityType, Operator, Platform, ServiceBinding, ServiceBroker,
    ServiceInstance, ServiceOffering, ServicePlan, StorageSettings,
};
use std::collections::HashMap;

/// Dependent entity type to the criteria selecting its children.
pub type ChildrenCriterion = HashMap<EntityType, Vec<Criterion>>;

/// Per-type resolver of an entity's children.
pub trait Cascade {
    fn children_criterion(&self) -> ChildrenCriterion;
}

/// Children referencing `parent_id` through a foreign-key column.
fn by_reference(
    child: EntityType,
    column: &str,
    parent_id: &str,
) -> (EntityType, Vec<Criterion>) {
    (
        child,
        vec![Criterion::by_field(Operator::Equals, column, [parent_id])],
    )
}

pub struct PlatformCascade<'a> {
    pub platform: &'a Platform,
}

impl Cascade for PlatformCascade<'_> {
    fn children_criterion(&self) -> ChildrenCriterion {
        ChildrenCriterion::from([by_reference(
            EntityType::ServiceInstance,
            "platform_id",
            self.platform.get_id(),
        )])
    }
}

pub struct ServiceBrokerCascade<'a> {
    pub broker: &'a ServiceBroker,
}

impl Cascade for ServiceBrokerCascade<'_> {
    fn children_criterion(&self) -> ChildrenCriterion {
        ChildrenCriterion::from([by_reference(
            EntityType::ServiceOffering,
            "broker_id",
            self.broker.get_id(),
        )])
    }
}

pub struct ServiceOfferingCascade<'a> {
    pub offering: &'a ServiceOffering,
}

impl Cascade for ServiceOfferingCascade<'_> {
    fn children_criterion(&self) -> ChildrenCriterion {
        ChildrenCriterion::from([by_reference(
            EntityType::ServicePlan,
            "service_offering_id",
            self.offering.get_id(),
        )])
    }
}

pub struct ServicePlanCascade<'a> {
    pub plan: &'a ServicePlan,
}

impl Cascade for ServicePlanCascade<'_> {
    fn children_criterion(&self) -> ChildrenCriterion {
        ChildrenCriterion::from([by_reference(
            EntityType::ServiceInstance,
            "service_plan_id",
            self.plan.get_id(),
        )])
    }
}

pub struct ServiceInstanceCascade<'a> {
    pub instance: &'a ServiceInstance,

    /// Some platforms nest instances through a parent label instead of a column.
    pub parent_instance_label_key: Option<&'a str>,
}

impl Cascade for ServiceInstanceCascade<'_> {
    fn children_criterion(&self) -> ChildrenCriterion {
        let id = self.instance.get_id();
        let mut criterion = ChildrenCriterion::from([by_reference(
            EntityType::ServiceBinding,
            "service_instance_id",
            id,
        )]);
        if let Some(key) = self.parent_instance_label_key.filter(|k| !k.is_empty()) {
            criterion.insert(
                EntityType::ServiceInstance,
                vec![Criterion::by_label(Operator::Equals, key, [id])],
            );
        }
        criterion
    }
}

/// Bindings are leaves.
pub struct ServiceBindingCascade<'a> {
    pub binding: &'a ServiceBinding,
}

impl Cascade for ServiceBindingCascade<'_> {
    fn children_criterion(&self) -> ChildrenCriterion {
        ChildrenCriterion::new()
    }
}

/// Any entity a cascade can start from.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeObject {
    Platform(Platform),
    ServiceBroker(ServiceBroker),
    ServiceOffering(ServiceOffering),
    ServicePlan(ServicePlan),
    ServiceInstance(ServiceInstance),
    ServiceBinding(ServiceBinding),
}

impl CascadeObject {
    pub fn entity(&self) -> &dyn Entity {
        match self {
            CascadeObject::Platform(e) => e,
            CascadeObject::ServiceBroker(e) => e,
            CascadeObject::ServiceOffering(e) => e,
            CascadeObject::ServicePlan(e) => e,
            CascadeObject::ServiceInstance(e) => e,
            CascadeObject::ServiceBinding(e) => e,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity().entity_type()
    }
}

/// Select the resolver for `object`.
pub fn cascade_for<'a>(
    object: &'a CascadeObject,
    settings: &'a StorageSettings,
) -> Box<dyn Cascade + 'a> {
    match object {
        CascadeObject::Platform(platform) => Box::new(PlatformCascade { platform }),
        CascadeObject::ServiceBroker(broker) => Box::new(ServiceBrokerCascade { broker }),
        CascadeObject::ServiceOffering(offering) => Box::new(ServiceOfferingCascade { offering }),
        CascadeObject::ServicePlan(plan) => Box::new(ServicePlanCascade { plan }),
        CascadeObject::ServiceInstance(instance) => Box::new(ServiceInstanceCascade {
            instance,
            parent_instance_label_key: settings.parent_instance_label_key.as_deref(),
        }),
        CascadeObject::ServiceBinding(binding) => Box::new(ServiceBindingCascade { binding }),
    }
}
