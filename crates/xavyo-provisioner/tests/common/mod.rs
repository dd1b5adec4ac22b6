//! Shared fixtures for provisioner integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::operation::{
    AttributeDelta, AttributeSet, AttributeValue, Filter, PageRequest, SearchResult, Uid,
    NAME_ATTRIBUTE, UID_ATTRIBUTE,
};
use xavyo_connector::sync::{SyncBatch, SyncDelta, SyncToken, ALL_OBJECT_CLASSES};
use xavyo_connector::traits::{
    AuthenticateOp, Connector, CreateOp, DeleteOp, ScriptOp, SearchOp, SyncCapable, UpdateOp,
};
use xavyo_connector::types::ConnectorType;
use xavyo_provisioner::{
    InMemoryStageStore, Notification, NotificationSink, ProvisionerConfig, ResourceError,
    ResourceResult, SystemConfig, SystemObjectService,
};

pub const CONFIG: &str = r#"{
    "systems": [{
        "name": "XML",
        "connectorType": "scripted",
        "sync": { "batchSize": 1 },
        "objectTypes": [
            {
                "name": "account",
                "nativeName": "__ACCOUNT__",
                "properties": [
                    { "name": "name", "nativeName": "__NAME__", "required": true },
                    { "name": "lastname", "nativeName": "sn" },
                    { "name": "email", "multiValued": true },
                    { "name": "roles", "multiValued": true },
                    { "name": "age", "nativeType": "integer" },
                    { "name": "score", "nativeType": "number" },
                    { "name": "disabled", "nativeName": "__ENABLE__", "nativeType": "boolean" },
                    { "name": "password", "nativeName": "__PASSWORD__", "readable": false }
                ]
            },
            {
                "name": "group",
                "nativeName": "__GROUP__",
                "properties": [
                    { "name": "name", "nativeName": "__NAME__", "required": true },
                    { "name": "members", "multiValued": true }
                ]
            }
        ]
    }]
}"#;

/// Load the shared system configuration.
pub fn system_config() -> SystemConfig {
    let mut config = ProvisionerConfig::from_json(CONFIG).expect("valid config");
    config.systems.remove(0)
}

/// In-memory target system.
///
/// Objects are stored with native names and carry their identifier under
/// `__UID__`. Change records for live sync are scripted with
/// [`MemoryConnector::push_change`].
pub struct MemoryConnector {
    objects: Mutex<BTreeMap<String, (String, AttributeSet)>>,
    changes: Mutex<Vec<SyncDelta>>,
    head: AtomicI64,
    next_id: AtomicUsize,
    healthy: AtomicBool,
    fail_next: Mutex<Option<ConnectorError>>,
    update_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            changes: Mutex::new(Vec::new()),
            head: AtomicI64::new(0),
            next_id: AtomicUsize::new(1),
            healthy: AtomicBool::new(true),
            fail_next: Mutex::new(None),
            update_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Store an object directly, bypassing `create`.
    pub async fn seed(&self, object_class: &str, uid: &str, attributes: AttributeSet) {
        let attributes = attributes.with(UID_ATTRIBUTE, uid);
        self.objects
            .lock()
            .await
            .insert(uid.to_string(), (object_class.to_string(), attributes));
    }

    /// Native state of an object.
    pub async fn stored(&self, uid: &str) -> Option<AttributeSet> {
        self.objects.lock().await.get(uid).map(|(_, a)| a.clone())
    }

    /// Append a change record to the change log.
    pub async fn push_change(&self, delta: SyncDelta) {
        self.head.fetch_max(delta.token.value(), Ordering::SeqCst);
        self.changes.lock().await.push(delta);
    }

    /// Move the change log head without recording anything.
    pub fn advance_head(&self, token: i64) {
        self.head.fetch_max(token, Ordering::SeqCst);
    }

    /// Make the next connector call fail with `err`.
    pub async fn fail_next(&self, err: ConnectorError) {
        *self.fail_next.lock().await = Some(err);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn injected(&self) -> ConnectorResult<()> {
        match self.fail_next.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn matches(filter: &Filter, object: &AttributeSet) -> bool {
    let values = |attribute: &str| -> Vec<String> {
        object
            .get(attribute)
            .cloned()
            .map(AttributeValue::into_values)
            .unwrap_or_default()
            .iter()
            .map(|v| v.to_json().to_string().trim_matches('"').to_string())
            .collect()
    };

    match filter {
        Filter::Equals { attribute, value } => {
            values(attribute.as_str()).iter().any(|v| v == value)
        }
        Filter::Contains { attribute, value } => {
            values(attribute.as_str()).iter().any(|v| v.contains(value.as_str()))
        }
        Filter::StartsWith { attribute, value } => {
            values(attribute.as_str()).iter().any(|v| v.starts_with(value.as_str()))
        }
        Filter::Present { attribute } => object.has(attribute),
        Filter::And { filters } => filters.iter().all(|f| matches(f, object)),
        Filter::Or { filters } => filters.iter().any(|f| matches(f, object)),
        Filter::Not { filter } => !matches(filter, object),
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Scripted
    }

    fn display_name(&self) -> &str {
        "memory"
    }

    async fn test_connection(&self) -> ConnectorResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectorError::connection_failed("target unreachable"))
        }
    }
}

#[async_trait]
impl CreateOp for MemoryConnector {
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid> {
        self.injected().await?;
        let mut objects = self.objects.lock().await;

        if let Some(name) = attributes.get_string(NAME_ATTRIBUTE) {
            let taken = objects
                .values()
                .any(|(oc, a)| oc == object_class && a.get_string(NAME_ATTRIBUTE) == Some(name));
            if taken {
                return Err(ConnectorError::already_exists(name));
            }
        }

        let id = format!("{:03}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let attributes = attributes.with(UID_ATTRIBUTE, id.as_str());
        objects.insert(id.clone(), (object_class.to_string(), attributes));
        Ok(Uid::from_value(id))
    }
}

#[async_trait]
impl UpdateOp for MemoryConnector {
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.injected().await?;
        let mut objects = self.objects.lock().await;
        match objects.get_mut(uid.value()) {
            Some((oc, stored)) if oc == object_class => {
                changes.apply_to(stored);
                Ok(uid.clone())
            }
            _ => Err(ConnectorError::unknown_uid(uid.value())),
        }
    }
}

#[async_trait]
impl DeleteOp for MemoryConnector {
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()> {
        self.injected().await?;
        let mut objects = self.objects.lock().await;
        match objects.get(uid.value()) {
            Some((oc, _)) if oc == object_class => {
                objects.remove(uid.value());
                Ok(())
            }
            _ => Err(ConnectorError::unknown_uid(uid.value())),
        }
    }
}

#[async_trait]
impl SearchOp for MemoryConnector {
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
        page_request: Option<PageRequest>,
    ) -> ConnectorResult<SearchResult> {
        self.injected().await?;
        let objects = self.objects.lock().await;
        let found: Vec<AttributeSet> = objects
            .values()
            .filter(|(oc, _)| oc == object_class)
            .map(|(_, a)| a)
            .filter(|a| filter.as_ref().map_or(true, |f| matches(f, a)))
            .cloned()
            .collect();

        let Some(page) = page_request else {
            return Ok(SearchResult::new(found));
        };
        let offset: usize = page
            .cookie
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let end = (offset + page.page_size as usize).min(found.len());
        let result = SearchResult::new(found[offset.min(end)..end].to_vec());
        Ok(if end < found.len() {
            result.with_next_cookie(end.to_string())
        } else {
            result
        })
    }
}

#[async_trait]
impl SyncCapable for MemoryConnector {
    async fn fetch_changes(
        &self,
        object_class: &str,
        sync_token: Option<SyncToken>,
        batch_size: u32,
    ) -> ConnectorResult<SyncBatch> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.injected().await?;

        let after = sync_token.unwrap_or(SyncToken::new(i64::MIN));
        let mut pending: Vec<SyncDelta> = self
            .changes
            .lock()
            .await
            .iter()
            .filter(|d| d.token > after)
            .filter(|d| object_class == ALL_OBJECT_CLASSES || d.object_class == object_class)
            .cloned()
            .collect();
        pending.sort_by_key(|d| d.token);

        if pending.is_empty() {
            let head = SyncToken::new(self.head.load(Ordering::SeqCst));
            return Ok(SyncBatch::empty().with_next_token(head.max(after)));
        }

        let has_more = pending.len() > batch_size as usize;
        pending.truncate(batch_size as usize);
        let batch = SyncBatch::with_deltas(pending);
        Ok(if has_more { batch.with_more() } else { batch })
    }

    async fn latest_token(&self, _object_class: &str) -> ConnectorResult<SyncToken> {
        self.injected().await?;
        Ok(SyncToken::new(self.head.load(Ordering::SeqCst)))
    }
}

#[async_trait]
impl ScriptOp for MemoryConnector {
    async fn run_script(&self, script_id: &str, params: &Value) -> ConnectorResult<Value> {
        self.injected().await?;
        match script_id {
            "echo" => Ok(params.clone()),
            "count" => Ok(Value::from(self.objects.lock().await.len())),
            other => Err(ConnectorError::script_failed(
                other,
                format!("No script named '{other}'"),
            )),
        }
    }
}

#[async_trait]
impl AuthenticateOp for MemoryConnector {
    async fn authenticate(
        &self,
        object_class: &str,
        username: &str,
        password: &str,
    ) -> ConnectorResult<Uid> {
        self.injected().await?;
        let objects = self.objects.lock().await;
        objects
            .iter()
            .find(|(_, (oc, a))| {
                oc == object_class
                    && a.get_string(NAME_ATTRIBUTE) == Some(username)
                    && a.get_string("__PASSWORD__") == Some(password)
            })
            .map(|(uid, _)| Uid::from_value(uid.as_str()))
            .ok_or_else(|| ConnectorError::InvalidCredential {
                message: format!("Invalid credentials for '{username}'"),
            })
    }
}

/// Sink recording every notification, optionally failing for one id.
#[derive(Default)]
pub struct RecordingSink {
    pub received: Mutex<Vec<Notification>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingSink {
    pub async fn fail_on(&self, resource_id: Option<&str>) {
        *self.fail_on.lock().await = resource_id.map(str::to_string);
    }

    pub async fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.received.lock().await)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: &Notification) -> ResourceResult<()> {
        if self.fail_on.lock().await.as_deref() == Some(notification.resource_id.as_str()) {
            return Err(ResourceError::unavailable("sync service unavailable"));
        }
        self.received.lock().await.push(notification.clone());
        Ok(())
    }
}

/// A service over one `XML` system backed by a [`MemoryConnector`].
pub struct Harness {
    pub service: SystemObjectService,
    pub connector: Arc<MemoryConnector>,
    pub stages: Arc<InMemoryStageStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(system_config())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        Self::with_stages(config, InMemoryStageStore::new())
    }

    pub fn with_stages(config: SystemConfig, stages: InMemoryStageStore) -> Self {
        xavyo_provisioner::logging::init_test_logging();

        let connector = Arc::new(MemoryConnector::new());
        let stages = Arc::new(stages);
        let sink = Arc::new(RecordingSink::default());
        let mut service = SystemObjectService::new(stages.clone(), sink.clone());
        service
            .register(config, connector.clone())
            .expect("register system");

        Self {
            service,
            connector,
            stages,
            sink,
        }
    }
}
