//! Provisioner configuration.
//!
//! Describes each target system: its connector kind, live sync settings and
//! the object types it exposes with their internal and native attribute
//! names. Loaded from JSON.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use xavyo_connector::schema::{AttributeDataType, ObjectClass, Schema, SchemaAttribute};
use xavyo_connector::types::ConnectorType;

use crate::error::ConfigError;

const MAX_BATCH_SIZE: u32 = 10_000;

/// Configuration of every target system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Configured systems.
    #[serde(default)]
    pub systems: Vec<SystemConfig>,
}

impl ProvisionerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every system, and that system names are unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for system in &self.systems {
            system.validate()?;
            if !seen.insert(system.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "system",
                    name: system.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Find a system by name.
    #[must_use]
    pub fn system(&self, name: &str) -> Option<&SystemConfig> {
        self.systems.iter().find(|s| s.name == name)
    }
}

/// Configuration of one target system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    /// System name, as used in resource paths.
    pub name: String,
    /// Kind of connector serving this system.
    pub connector_type: ConnectorType,
    /// Live sync settings.
    #[serde(default)]
    pub sync: SyncSettings,
    /// Object types exposed by the system.
    #[serde(default)]
    pub object_types: Vec<ObjectTypeConfig>,
}

impl SystemConfig {
    /// Check names, batch size and property types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema().map(|_| ())
    }

    /// Build the validated schema of this system.
    pub fn schema(&self) -> Result<Schema, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("system name", "must not be empty"));
        }
        if self.sync.batch_size == 0 || self.sync.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::invalid(
                "sync.batchSize",
                format!("must be between 1 and {MAX_BATCH_SIZE}"),
            ));
        }

        let mut seen = HashSet::new();
        let mut schema = Schema::new();
        for object_type in &self.object_types {
            if !seen.insert(object_type.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "object type",
                    name: object_type.name.clone(),
                });
            }
            schema.add_object_class(object_type.object_class()?);
        }
        Ok(schema)
    }
}

/// Live sync settings of a system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Maximum records fetched per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Whether live sync may run for this system.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_batch_size() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            enabled: true,
        }
    }
}

/// An object type of a system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeConfig {
    /// Internal name, as used in resource paths.
    pub name: String,
    /// Native object class (e.g., `__ACCOUNT__`).
    pub native_name: String,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
}

impl ObjectTypeConfig {
    /// Build the object class schema.
    pub fn object_class(&self) -> Result<ObjectClass, ConfigError> {
        if self.name.trim().is_empty() || self.native_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "object type",
                "name and nativeName must not be empty",
            ));
        }

        let mut seen = HashSet::new();
        let mut object_class = ObjectClass::new(&self.name, &self.native_name);
        for property in &self.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "property",
                    name: property.name.clone(),
                });
            }
            object_class.add_attribute(property.attribute()?);
        }
        Ok(object_class)
    }
}

/// A property of an object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyConfig {
    /// Internal attribute name.
    pub name: String,
    /// Native attribute name; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_name: Option<String>,
    /// Native data type (e.g., `string`, `integer`, `boolean`).
    #[serde(default = "default_native_type")]
    pub native_type: String,
    /// Whether the attribute holds several values.
    #[serde(default)]
    pub multi_valued: bool,
    /// Whether the attribute must always hold a value.
    #[serde(default)]
    pub required: bool,
    /// Whether the attribute is returned on read.
    #[serde(default = "default_true")]
    pub readable: bool,
    /// Whether the attribute may be written.
    #[serde(default = "default_true")]
    pub writable: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_native_type() -> String {
    "string".to_string()
}

impl PropertyConfig {
    /// Build the schema attribute.
    pub fn attribute(&self) -> Result<SchemaAttribute, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("property name", "must not be empty"));
        }
        let data_type = AttributeDataType::parse_str(&self.native_type).ok_or_else(|| {
            ConfigError::UnsupportedType {
                native_type: self.native_type.clone(),
            }
        })?;

        let native_name = self.native_name.clone().unwrap_or_else(|| self.name.clone());
        let mut attribute = SchemaAttribute::new(&self.name, native_name, data_type);
        attribute.multi_valued = self.multi_valued;
        attribute.required = self.required;
        attribute.readable = self.readable;
        attribute.writable = self.writable;
        attribute.description = self.description.clone();
        Ok(attribute)
    }
}
