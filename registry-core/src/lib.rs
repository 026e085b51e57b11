//! Registry Core - Entity, Criterion and Cascade Types
//!
//! Plain data shared by every registry crate: the entity and label row model,
//! the entity catalog, the abstract criterion model and the per-type cascade
//! resolvers. Nothing here touches a database.

pub mod cascade;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod query;
pub mod types;
pub mod value;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use cascade::{
    cascade_for, Cascade, CascadeObject, ChildrenCriterion, PlatformCascade, ServiceBindingCascade,
    ServiceBrokerCascade, ServiceInstanceCascade, ServiceOfferingCascade, ServicePlanCascade,
};
pub use client::{BasicCredentials, BrokerClient, BrokerRequest, BrokerResponse};
pub use config::{Dialect, StorageSettings};
pub use entity::{
    BaseEntity, BaseLabelEntity, Entity, EntityLabel, Insertable, LabelDescriptor, Labelable,
};
pub use error::{
    ClientError, ConfigError, QueryError, RegistryError, RegistryResult, StorageError,
};
pub use query::{Criterion, CriterionType, LabelChange, LabelOperation, Operator};
pub use types::{
    EntityDescriptor, EntityType, Platform, ServiceBinding, ServiceBroker, ServiceInstance,
    ServiceOffering, ServicePlan,
};
pub use value::{parse_bool, SqlValue};

/// Source of identifiers for new rows.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> RegistryResult<String>;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> RegistryResult<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}
