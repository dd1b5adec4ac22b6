//! System object service.
//!
//! The request surface of the provisioner. Resolves resource paths to a
//! configured system and object class, maps attribute names between their
//! internal and native forms, and delegates to the system's connector.
//! Every failure leaves here as a [`ResourceError`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use xavyo_connector::operation::{
    AttributeDelta, AttributeSet, Filter, PageRequest, Uid, NAME_ATTRIBUTE, UID_ATTRIBUTE,
};
use xavyo_connector::schema::{ObjectClass, Schema};
use xavyo_connector::traits::ProvisionerConnector;

use crate::action::{Action, ActionDispatcher};
use crate::config::SystemConfig;
use crate::error::{ConfigError, ResourceError, ResourceResult};
use crate::patch::{PatchEngine, PatchOperation};
use crate::path::ResourcePath;
use crate::sync::{LiveSyncEngine, NotificationSink, StageStore, SyncOutcome, SyncScope};

/// Attribute carrying the object identifier in resource responses.
pub const ID_FIELD: &str = "_id";

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Matching objects, with internal names and `_id`.
    pub result: Vec<AttributeSet>,
    /// Cookie for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paged_results_cookie: Option<String>,
}

struct SystemEntry {
    config: SystemConfig,
    schema: Arc<Schema>,
    connector: Arc<dyn ProvisionerConnector>,
}

/// Resource operations over every configured system.
pub struct SystemObjectService {
    systems: HashMap<String, SystemEntry>,
    sync: LiveSyncEngine,
}

impl SystemObjectService {
    /// Create a service with no systems.
    pub fn new(stages: Arc<dyn StageStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            systems: HashMap::new(),
            sync: LiveSyncEngine::new(stages, sink),
        }
    }

    /// Register a system served by `connector`.
    pub fn register(
        &mut self,
        config: SystemConfig,
        connector: Arc<dyn ProvisionerConnector>,
    ) -> Result<(), ConfigError> {
        let schema = Arc::new(config.schema()?);
        if self.systems.contains_key(&config.name) {
            return Err(ConfigError::Duplicate {
                kind: "system",
                name: config.name,
            });
        }

        info!(
            system = %config.name,
            connector = %connector.display_name(),
            connector_type = %config.connector_type,
            object_classes = schema.object_classes.len(),
            "Registered system"
        );
        self.systems.insert(
            config.name.clone(),
            SystemEntry {
                config,
                schema,
                connector,
            },
        );
        Ok(())
    }

    /// Names of the registered systems.
    #[must_use]
    pub fn system_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.systems.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Schema of a registered system.
    pub fn schema(&self, system: &str) -> ResourceResult<Arc<Schema>> {
        self.entry(system).map(|entry| Arc::clone(&entry.schema))
    }

    fn entry(&self, system: &str) -> ResourceResult<&SystemEntry> {
        self.systems
            .get(system)
            .ok_or_else(|| ResourceError::not_found(format!("System '{system}' is not configured")))
    }

    fn resolve<'s>(
        &'s self,
        path: &ResourcePath,
    ) -> ResourceResult<(&'s SystemEntry, &'s ObjectClass)> {
        let entry = self.entry(&path.system)?;
        let name = path.require_object_class()?;
        let object_class = entry.schema.get_object_class(name).ok_or_else(|| {
            ResourceError::not_found(format!(
                "Object class '{name}' is not configured for system '{}'",
                path.system
            ))
        })?;
        Ok((entry, object_class))
    }

    /// Create an object. An id in the path becomes the object's name.
    #[instrument(skip(self, value), fields(path = %path))]
    pub async fn create(
        &self,
        path: &ResourcePath,
        mut value: AttributeSet,
    ) -> ResourceResult<AttributeSet> {
        let (entry, object_class) = self.resolve(path)?;
        value.remove(ID_FIELD);

        let mut native = to_native(object_class, &value)?;
        if let Some(id) = &path.id {
            if !native.has(NAME_ATTRIBUTE) {
                native.set(NAME_ATTRIBUTE, id.as_str());
            }
        }

        let uid = entry
            .connector
            .create(&object_class.native_name, native)
            .await?;
        info!(uid = %uid.value(), "Created object");

        fetch(entry, object_class, &uid).await
    }

    /// Read an object.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn read(&self, path: &ResourcePath) -> ResourceResult<AttributeSet> {
        let (entry, object_class) = self.resolve(path)?;
        let uid = object_uid(path)?;
        fetch(entry, object_class, &uid).await
    }

    /// Replace an object's attributes with `value`.
    ///
    /// Readable attributes missing from `value` are cleared. Unreadable
    /// ones, such as passwords, change only when `value` supplies them.
    #[instrument(skip(self, value), fields(path = %path))]
    pub async fn update(
        &self,
        path: &ResourcePath,
        mut value: AttributeSet,
    ) -> ResourceResult<AttributeSet> {
        let (entry, object_class) = self.resolve(path)?;
        let uid = object_uid(path)?;
        value.remove(ID_FIELD);

        let changes = replacement(object_class, to_native(object_class, &value)?);
        let uid = entry
            .connector
            .update(&object_class.native_name, &uid, changes)
            .await?;
        debug!(uid = %uid.value(), "Updated object");

        fetch(entry, object_class, &uid).await
    }

    /// Delete an object, returning its last state.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete(&self, path: &ResourcePath) -> ResourceResult<AttributeSet> {
        let (entry, object_class) = self.resolve(path)?;
        let uid = object_uid(path)?;

        let existing = fetch(entry, object_class, &uid).await?;
        entry
            .connector
            .delete(&object_class.native_name, &uid)
            .await?;
        info!(uid = %uid.value(), "Deleted object");
        Ok(existing)
    }

    /// Apply patch operations to an object.
    ///
    /// Reads the object, applies every operation, sends the connector only
    /// the attributes that changed and returns the object as re-read.
    /// Attributes the read cannot see are never touched. Nothing is written
    /// if any operation fails. There is no version check between the read
    /// and the write.
    #[instrument(skip(self, operations), fields(path = %path, operations = operations.len()))]
    pub async fn patch(
        &self,
        path: &ResourcePath,
        operations: &[PatchOperation],
    ) -> ResourceResult<AttributeSet> {
        let (entry, object_class) = self.resolve(path)?;
        let uid = object_uid(path)?;

        let mut current = fetch(entry, object_class, &uid).await?;
        current.remove(ID_FIELD);

        let patched = PatchEngine::new(object_class).apply(&current, operations)?;
        let changes = AttributeDelta::between(
            &to_native(object_class, &current)?,
            &to_native(object_class, &patched)?,
        );
        debug!(attributes = ?changes.affected_attributes(), "Patch computed");
        let uid = entry
            .connector
            .update(&object_class.native_name, &uid, changes)
            .await?;
        debug!(uid = %uid.value(), "Patched object");

        fetch(entry, object_class, &uid).await
    }

    /// Query an object class.
    ///
    /// Filter attribute names are internal; `_id` addresses the identifier.
    #[instrument(skip(self, filter), fields(path = %path))]
    pub async fn query(
        &self,
        path: &ResourcePath,
        filter: Option<Filter>,
        page: Option<PageRequest>,
    ) -> ResourceResult<QueryResult> {
        let (entry, object_class) = self.resolve(path)?;

        let native_filter = filter
            .map(|f| {
                f.map_attributes(&|name: &str| {
                    if name == ID_FIELD {
                        Some(UID_ATTRIBUTE.to_string())
                    } else {
                        object_class.native_name_of(name)
                    }
                })
            })
            .transpose()
            .map_err(|name| {
                ResourceError::bad_request(format!("Unknown attribute '{name}' in query filter"))
            })?;

        let found = entry
            .connector
            .search(&object_class.native_name, native_filter, page)
            .await?;
        debug!(count = found.objects.len(), "Query completed");

        Ok(QueryResult {
            result: found
                .objects
                .iter()
                .map(|native| to_resource(object_class, native, None))
                .collect(),
            paged_results_cookie: found.next_cookie,
        })
    }

    /// Run a named action on a system or object class.
    #[instrument(skip(self, params), fields(path = %path))]
    pub async fn action(
        &self,
        path: &ResourcePath,
        name: &str,
        params: &Value,
    ) -> ResourceResult<Value> {
        match Action::parse(name, params)? {
            Action::Test => Ok(self.test(&path.system).await),
            Action::LiveSync => {
                let outcome = self.live_sync(path).await?;
                serde_json::to_value(&outcome).map_err(|e| ResourceError::internal(e.to_string()))
            }
            Action::Script { script_id, params } => {
                let entry = self.entry(&path.system)?;
                ActionDispatcher::new(&entry.config.name, entry.connector.as_ref())
                    .run_script(&script_id, &params)
                    .await
            }
            Action::Authenticate { username, password } => {
                let (entry, object_class) = self.resolve(path)?;
                ActionDispatcher::new(&entry.config.name, entry.connector.as_ref())
                    .authenticate(object_class, &username, &password)
                    .await
            }
        }
    }

    /// Run one live sync cycle.
    ///
    /// A path naming an object class syncs that class on its own stage; a
    /// system path syncs every configured object class on the system stage.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn live_sync(&self, path: &ResourcePath) -> ResourceResult<SyncOutcome> {
        let entry = self.entry(&path.system)?;
        if !entry.config.sync.enabled {
            return Err(ResourceError::bad_request(format!(
                "Live sync is disabled for system '{}'",
                path.system
            )));
        }

        let object_class = match &path.object_class {
            Some(_) => Some(self.resolve(path)?.1),
            None => None,
        };
        let scope = SyncScope {
            system: &entry.config.name,
            object_class,
            schema: &entry.schema,
            batch_size: entry.config.sync.batch_size,
        };

        self.sync.run_cycle(entry.connector.as_ref(), &scope).await
    }

    /// Test a registered system. Never fails; problems are reported in the body.
    #[instrument(skip(self))]
    pub async fn test(&self, system: &str) -> Value {
        match self.systems.get(system) {
            Some(entry) => Self::test_config(&entry.config, entry.connector.as_ref()).await,
            None => json!({
                "name": system,
                "ok": false,
                "error": format!("System '{system}' is not configured"),
            }),
        }
    }

    /// Test a system configuration with the connector that would serve it.
    pub async fn test_config(config: &SystemConfig, connector: &dyn ProvisionerConnector) -> Value {
        let result = match config.validate() {
            Err(err) => Err(err.to_string()),
            Ok(()) => connector
                .test_connection()
                .await
                .map_err(|err| ResourceError::from(err).to_string()),
        };

        match result {
            Ok(()) => json!({ "name": config.name, "ok": true }),
            Err(error) => {
                warn!(system = %config.name, %error, "System test failed");
                json!({ "name": config.name, "ok": false, "error": error })
            }
        }
    }
}

/// Read one object by identifier, in its internal form.
async fn fetch(
    entry: &SystemEntry,
    object_class: &ObjectClass,
    uid: &Uid,
) -> ResourceResult<AttributeSet> {
    let uid = Uid::new(UID_ATTRIBUTE, uid.value());
    let native = entry
        .connector
        .get(&object_class.native_name, &uid)
        .await?
        .ok_or_else(|| {
            ResourceError::not_found(format!(
                "Object '{}' not found in {}/{}",
                uid.value(),
                entry.config.name,
                object_class.name
            ))
        })?;
    Ok(to_resource(object_class, &native, Some(&uid)))
}

fn object_uid(path: &ResourcePath) -> ResourceResult<Uid> {
    path.require_id().map(|id| Uid::new(UID_ATTRIBUTE, id))
}

/// Delta making an object hold exactly `native` as a reader sees it.
fn replacement(object_class: &ObjectClass, native: AttributeSet) -> AttributeDelta {
    let mut delta = AttributeDelta::new();
    for attr in &object_class.attributes {
        if attr.readable && !native.has(&attr.native_name) {
            delta.clear_attribute(attr.native_name.as_str());
        }
    }
    for (name, value) in native {
        delta.replace(name, value);
    }
    delta
}

fn to_native(object_class: &ObjectClass, value: &AttributeSet) -> ResourceResult<AttributeSet> {
    object_class.to_native(value).map_err(|name| {
        ResourceError::bad_request(format!(
            "Attribute '{name}' is not defined for object class '{}'",
            object_class.name
        ))
    })
}

/// Internal view of a native object, with `_id` taken from the native
/// identifier or, failing that, from `uid`.
fn to_resource(
    object_class: &ObjectClass,
    native: &AttributeSet,
    uid: Option<&Uid>,
) -> AttributeSet {
    let mut resource = object_class.to_internal(native);
    let id = native
        .get_string(UID_ATTRIBUTE)
        .or_else(|| uid.map(Uid::value));
    if let Some(id) = id {
        resource.set(ID_FIELD, id);
    }
    resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use xavyo_connector::schema::{AttributeDataType, SchemaAttribute};

    fn accounts() -> ObjectClass {
        ObjectClass::new("account", "__ACCOUNT__")
            .with_attribute(SchemaAttribute::new(
                "name",
                NAME_ATTRIBUTE,
                AttributeDataType::String,
            ))
            .with_attribute(SchemaAttribute::new(
                "disabled",
                "__ENABLE__",
                AttributeDataType::Boolean,
            ))
    }

    #[test]
    fn test_to_resource_maps_names_and_id() {
        let native = AttributeSet::new()
            .with(UID_ATTRIBUTE, "42")
            .with(NAME_ATTRIBUTE, "bob")
            .with("__ENABLE__", true)
            .with("__PASSWORD__", "secret");

        let resource = to_resource(&accounts(), &native, None);
        assert_eq!(resource.get_string(ID_FIELD), Some("42"));
        assert_eq!(resource.get_string("name"), Some("bob"));
        assert_eq!(resource.get("disabled").and_then(|v| v.as_boolean()), Some(true));
        assert!(!resource.has("__PASSWORD__"));
    }

    #[test]
    fn test_to_resource_falls_back_to_uid() {
        let native = AttributeSet::new().with(NAME_ATTRIBUTE, "bob");
        let uid = Uid::new(UID_ATTRIBUTE, "7");
        let resource = to_resource(&accounts(), &native, Some(&uid));
        assert_eq!(resource.get_string(ID_FIELD), Some("7"));
    }

    #[test]
    fn test_to_native_rejects_undeclared() {
        let value = AttributeSet::new().with("nickname", "b");
        assert!(matches!(
            to_native(&accounts(), &value),
            Err(ResourceError::BadRequest { .. })
        ));
    }

    #[test]
    fn test_query_result_shape() {
        let result = QueryResult {
            result: vec![AttributeSet::new().with(ID_FIELD, "1")],
            paged_results_cookie: Some("c2".to_string()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, json!({"result": [{"_id": "1"}], "pagedResultsCookie": "c2"}));
    }
}
