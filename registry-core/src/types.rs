//! Entity catalog: the storable types, their tables and their thin records.

use crate::{BaseEntity, Entity, EntityLabel, Insertable, LabelDescriptor, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity type discriminator for polymorphic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Platform,
    ServiceBroker,
    ServiceOffering,
    ServicePlan,
    ServiceInstance,
    ServiceBinding,
}

/// Everything the generic compiler and label store need to know about a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity_type: EntityType,
    pub table: &'static str,
    /// Columns a field criterion may reference.
    pub fields: &'static [&'static str],
    pub labels: Option<LabelDescriptor>,
}

/// Base columns stored as booleans on every table.
const BOOLEAN_FIELDS: [&str; 1] = ["ready"];

impl EntityDescriptor {
    pub fn allows_field(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }

    pub fn is_boolean_field(&self, field: &str) -> bool {
        self.allows_field(field) && BOOLEAN_FIELDS.contains(&field)
    }
}

const PLATFORM: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::Platform,
    table: "platforms",
    fields: &[
        "id",
        "created_at",
        "updated_at",
        "paging_sequence",
        "ready",
        "name",
        "description",
    ],
    labels: Some(LabelDescriptor {
        table: "platform_labels",
        reference_column: "platform_id",
        primary_column: "id",
    }),
};

const SERVICE_BROKER: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::ServiceBroker,
    table: "brokers",
    fields: &[
        "id", "created_at", "updated_at", "paging_sequence", "ready", "name", "broker_url",
    ],
    labels: Some(LabelDescriptor {
        table: "broker_labels",
        reference_column: "broker_id",
        primary_column: "id",
    }),
};

const SERVICE_OFFERING: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::ServiceOffering,
    table: "service_offerings",
    fields: &[
        "id", "created_at", "updated_at", "paging_sequence", "ready", "name", "broker_id",
    ],
    labels: Some(LabelDescriptor {
        table: "service_offering_labels",
        reference_column: "service_offering_id",
        primary_column: "id",
    }),
};

const SERVICE_PLAN: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::ServicePlan,
    table: "service_plans",
    fields: &[
        "id",
        "created_at",
        "updated_at",
        "paging_sequence",
        "ready",
        "name",
        "service_offering_id",
    ],
    labels: Some(LabelDescriptor {
        table: "service_plan_labels",
        reference_column: "service_plan_id",
        primary_column: "id",
    }),
};

const SERVICE_INSTANCE: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::ServiceInstance,
    table: "service_instances",
    fields: &[
        "id",
        "created_at",
        "updated_at",
        "paging_sequence",
        "ready",
        "name",
        "service_plan_id",
        "platform_id",
    ],
    labels: Some(LabelDescriptor {
        table: "service_instance_labels",
        reference_column: "service_instance_id",
        primary_column: "id",
    }),
};

const SERVICE_BINDING: EntityDescriptor = EntityDescriptor {
    entity_type: EntityType::ServiceBinding,
    table: "service_bindings",
    fields: &[
        "id",
        "created_at",
        "updated_at",
        "paging_sequence",
        "ready",
        "name",
        "service_instance_id",
    ],
    labels: Some(LabelDescriptor {
        table: "service_binding_labels",
        reference_column: "service_binding_id",
        primary_column: "id",
    }),
};

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Platform,
        EntityType::ServiceBroker,
        EntityType::ServiceOffering,
        EntityType::ServicePlan,
        EntityType::ServiceInstance,
        EntityType::ServiceBinding,
    ];

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        match self {
            EntityType::Platform => &PLATFORM,
            EntityType::ServiceBroker => &SERVICE_BROKER,
            EntityType::ServiceOffering => &SERVICE_OFFERING,
            EntityType::ServicePlan => &SERVICE_PLAN,
            EntityType::ServiceInstance => &SERVICE_INSTANCE,
            EntityType::ServiceBinding => &SERVICE_BINDING,
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.descriptor().table
    }

    pub fn label_descriptor(&self) -> Option<LabelDescriptor> {
        self.descriptor().labels
    }

    /// Label row factory for one owning entity.
    ///
    /// Returns `None` for types without a label table.
    pub fn new_label(
        &self,
        reference_id: &str,
    ) -> Option<impl Fn(&str, &str, &str) -> EntityLabel> {
        let descriptor = self.label_descriptor()?;
        let reference_id = reference_id.to_string();
        Some(move |id: &str, key: &str, value: &str| {
            EntityLabel::new(descriptor, reference_id.as_str(), id, key, value)
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Platform => "platform",
            EntityType::ServiceBroker => "service_broker",
            EntityType::ServiceOffering => "service_offering",
            EntityType::ServicePlan => "service_plan",
            EntityType::ServiceInstance => "service_instance",
            EntityType::ServiceBinding => "service_binding",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type: {}", s))
    }
}

// ============================================================================
// THIN RECORDS
// ============================================================================

macro_rules! entity_record {
    (
        $(#[$meta:meta])*
        $name:ident => $entity_type:expr, { $($field:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(flatten)]
            pub base: BaseEntity,
            pub name: String,
            $(pub $field: Option<String>,)*
        }

        impl Insertable for $name {
            fn table(&self) -> &str {
                $entity_type.table_name()
            }

            fn columns(&self) -> Vec<(&'static str, SqlValue)> {
                let mut columns = self.base.columns();
                columns.push(("name", SqlValue::from(self.name.as_str())));
                $(columns.push((stringify!($field), SqlValue::from(self.$field.clone())));)*
                columns
            }
        }

        impl Entity for $name {
            fn get_id(&self) -> &str {
                &self.base.id
            }

            fn entity_type(&self) -> EntityType {
                $entity_type
            }
        }
    };
}

entity_record!(
    /// A platform (runtime environment) registered with the registry.
    Platform => EntityType::Platform, { description }
);

entity_record!(
    /// A service broker.
    ServiceBroker => EntityType::ServiceBroker, { broker_url }
);

entity_record!(ServiceOffering => EntityType::ServiceOffering, { broker_id });

entity_record!(ServicePlan => EntityType::ServicePlan, { service_offering_id });

entity_record!(
    /// A provisioned service instance, optionally owned by a platform.
    ServiceInstance => EntityType::ServiceInstance, { service_plan_id, platform_id }
);

entity_record!(
    /// A binding of a service instance.
    ServiceBinding => EntityType::ServiceBinding, { service_instance_id }
);
