//! Storage settings
//!
//! Settings are loaded from environment variables with defaults suitable for
//! a PostgreSQL deployment without label-based instance nesting.

use crate::{ConfigError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect of the relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => f.write_str("postgres"),
            Dialect::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(ConfigError::InvalidValue {
                field: "dialect".to_string(),
                value: other.to_string(),
                reason: "expected postgres or sqlite".to_string(),
            }),
        }
    }
}

/// Settings for the persistence core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub dialect: Dialect,

    /// Label key that marks an instance as the child of another instance.
    /// Platforms without a native parent reference column nest instances
    /// through this label. `None` disables label-based nesting.
    #[serde(default)]
    pub parent_instance_label_key: Option<String>,
}

impl StorageSettings {
    /// Create settings from environment variables.
    ///
    /// Environment variables:
    /// - `REGISTRY_DB_DIALECT`: "postgres" or "sqlite" (default: postgres)
    /// - `REGISTRY_PARENT_INSTANCE_LABEL_KEY`: label key for instance nesting (default: unset)
    pub fn from_env() -> RegistryResult<Self> {
        let dialect = match std::env::var("REGISTRY_DB_DIALECT") {
            Ok(value) => value.parse()?,
            Err(_) => Dialect::default(),
        };

        let parent_instance_label_key = std::env::var("REGISTRY_PARENT_INSTANCE_LABEL_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let settings = Self {
            dialect,
            parent_instance_label_key,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_parent_instance_label_key(mut self, key: impl Into<String>) -> Self {
        self.parent_instance_label_key = Some(key.into());
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> RegistryResult<()> {
        if let Some(key) = &self.parent_instance_label_key {
            if key.trim().is_empty() || key.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    field: "parent_instance_label_key".to_string(),
                    value: key.clone(),
                    reason: "label keys must be non-empty and contain no whitespace".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistryError;

    #[test]
    fn test_default_settings_disable_nesting() {
        let settings = StorageSettings::default();
        assert_eq!(settings.dialect, Dialect::Postgres);
        assert!(settings.parent_instance_label_key.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("PostgreSQL".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert_eq!(" sqlite ".parse::<Dialect>(), Ok(Dialect::Sqlite));
        assert!("mysql".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_label_key_with_whitespace_is_invalid() {
        let settings = StorageSettings::default().with_parent_instance_label_key("parent id");
        assert!(matches!(
            settings.validate(),
            Err(RegistryError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_settings_deserialize() {
        let settings: StorageSettings =
            serde_json::from_str(r#"{"dialect":"sqlite","parent_instance_label_key":"parent_id"}"#)
                .unwrap();
        assert_eq!(settings.dialect, Dialect::Sqlite);
        assert_eq!(settings.parent_instance_label_key.as_deref(), Some("parent_id"));
    }
}
