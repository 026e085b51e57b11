//! Label sub-store: key/value rows attached to entities.
//!
//! Actions are applied strictly in order and the first failure aborts the
//! rest. Nothing is rolled back here; run inside a transaction when the
//! actions must apply atomically.

use crate::bind::{expand_in, rebind, BindArg};
use crate::executor::{execute, Executor};
use crate::statements::create;
use registry_core::{
    EntityType, IdGenerator, LabelChange, LabelOperation, Labelable, QueryError, RegistryResult,
    SqlValue, StorageError, UuidGenerator,
};

/// Applies label changes through an executor.
pub struct LabelStore<'a> {
    executor: &'a dyn Executor,
    ids: &'a dyn IdGenerator,
}

impl<'a> LabelStore<'a> {
    /// Label store generating random UUID label ids.
    pub fn new(executor: &'a dyn Executor) -> Self {
        Self {
            executor,
            ids: &UuidGenerator,
        }
    }

    pub fn with_id_generator(executor: &'a dyn Executor, ids: &'a dyn IdGenerator) -> Self {
        Self { executor, ids }
    }

    /// Apply `actions` to the labels of `reference_id`.
    ///
    /// `new_label` builds a label row of the owning type from
    /// `(id, key, value)`.
    pub async fn update_labels<L, F>(
        &self,
        new_label: F,
        reference_id: &str,
        actions: &[LabelChange],
    ) -> RegistryResult<()>
    where
        L: Labelable + Sync,
        F: Fn(&str, &str, &str) -> L + Sync,
    {
        for action in actions {
            match action.operation {
                LabelOperation::Add | LabelOperation::AddValues => {
                    self.add_label(&new_label, &action.key, &action.values)
                        .await?;
                }
                LabelOperation::Remove | LabelOperation::RemoveValues => {
                    let label = new_label("", "", "");
                    self.remove_label(&label, reference_id, &action.key, &action.values)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Apply `actions` to an entity of `entity_type` using its own label rows.
    pub async fn update_entity_labels(
        &self,
        entity_type: EntityType,
        reference_id: &str,
        actions: &[LabelChange],
    ) -> RegistryResult<()> {
        let new_label = entity_type
            .new_label(reference_id)
            .ok_or(QueryError::LabelsNotSupported { entity_type })?;
        self.update_labels(new_label, reference_id, actions).await
    }

    /// Insert one label row per value, each with a fresh id.
    async fn add_label<L, F>(&self, new_label: &F, key: &str, values: &[String]) -> RegistryResult<()>
    where
        L: Labelable + Sync,
        F: Fn(&str, &str, &str) -> L + Sync,
    {
        for value in values {
            let label_id = self.ids.generate().map_err(|err| StorageError::IdGenerationFailed {
                reason: err.to_string(),
            })?;
            let label = new_label(&label_id, key, value);
            create(self.executor, &label).await?;
        }
        Ok(())
    }

    /// Delete every value of `key`, or only `values` when given.
    async fn remove_label(
        &self,
        label: &(dyn Labelable + Sync),
        reference_id: &str,
        key: &str,
        values: &[String],
    ) -> RegistryResult<()> {
        let descriptor = label.label();
        let base_query = format!(
            "DELETE FROM {} WHERE key=? AND {}=?",
            descriptor.table, descriptor.reference_column
        );
        let style = self.executor.bind_style();

        if values.is_empty() {
            let sql = rebind(style, &base_query);
            let args = [SqlValue::from(key), SqlValue::from(reference_id)];
            execute(self.executor, &sql, &args).await?;
            return Ok(());
        }

        let (sql, args) = expand_in(
            &format!("{} AND val IN (?)", base_query),
            vec![
                BindArg::from(key),
                BindArg::from(reference_id),
                BindArg::List(values.iter().map(|v| SqlValue::from(v.as_str())).collect()),
            ],
        )?;
        execute(self.executor, &rebind(style, &sql), &args).await?;
        Ok(())
    }
}
