//! Entity and label row model shared by every storable type.

use crate::{EntityType, SqlValue, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Columns every entity table carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseEntity {
    /// Unique within the entity's table, immutable after creation.
    pub id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Assigned by the store on insert; strictly increasing per table.
    /// Zero until the row has been persisted.
    pub paging_sequence: i64,
    /// False while the entity is still being provisioned.
    pub ready: bool,
}

impl BaseEntity {
    /// Base columns for a new, not yet persisted entity.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            paging_sequence: 0,
            ready: true,
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    /// Insertable columns. `paging_sequence` is left to the store.
    pub fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("id", SqlValue::from(self.id.as_str())),
            ("created_at", SqlValue::from(self.created_at)),
            ("updated_at", SqlValue::from(self.updated_at)),
            ("ready", SqlValue::from(self.ready)),
        ]
    }
}

/// Where the labels of an entity type live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LabelDescriptor {
    pub table: &'static str,
    /// Column holding the owning entity's id.
    pub reference_column: &'static str,
    pub primary_column: &'static str,
}

/// Columns every label table carries. Any of them may be absent in a
/// partial projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseLabelEntity {
    pub id: Option<String>,
    pub key: Option<String>,
    pub val: Option<String>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl BaseLabelEntity {
    pub fn get_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn get_key(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }

    pub fn get_value(&self) -> &str {
        self.val.as_deref().unwrap_or_default()
    }

    pub fn labels_primary_column(&self) -> &'static str {
        "id"
    }
}

/// A row that can be inserted into a table.
pub trait Insertable {
    fn table(&self) -> &str;

    /// Column name/value pairs. Null values are skipped on insert.
    fn columns(&self) -> Vec<(&'static str, SqlValue)>;
}

/// A label row that knows which table and reference column it belongs to.
pub trait Labelable: Insertable {
    fn label(&self) -> LabelDescriptor;
    fn reference_id(&self) -> Option<&str>;
}

/// A label row owned by one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityLabel {
    #[serde(flatten)]
    pub base: BaseLabelEntity,
    pub reference_id: Option<String>,
    #[serde(skip)]
    pub descriptor: LabelDescriptor,
}

impl EntityLabel {
    pub fn new(
        descriptor: LabelDescriptor,
        reference_id: impl Into<String>,
        id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            base: BaseLabelEntity {
                id: Some(id.into()),
                key: Some(key.into()),
                val: Some(value.into()),
                created_at: Some(now),
                updated_at: Some(now),
            },
            reference_id: Some(reference_id.into()),
            descriptor,
        }
    }

    pub fn get_key(&self) -> &str {
        self.base.get_key()
    }

    pub fn get_value(&self) -> &str {
        self.base.get_value()
    }
}

impl Insertable for EntityLabel {
    fn table(&self) -> &str {
        self.descriptor.table
    }

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            (
                self.descriptor.primary_column,
                SqlValue::from(self.base.id.clone()),
            ),
            ("key", SqlValue::from(self.base.key.clone())),
            ("val", SqlValue::from(self.base.val.clone())),
            (
                self.descriptor.reference_column,
                SqlValue::from(self.reference_id.clone()),
            ),
            ("created_at", SqlValue::from(self.base.created_at)),
            ("updated_at", SqlValue::from(self.base.updated_at)),
        ]
    }
}

impl Labelable for EntityLabel {
    fn label(&self) -> LabelDescriptor {
        self.descriptor
    }

    fn reference_id(&self) -> Option<&str> {
        self.reference_id.as_deref()
    }
}

/// A persisted, identifiable entity of a known type.
pub trait Entity: Insertable {
    fn get_id(&self) -> &str;
    fn entity_type(&self) -> EntityType;
}
