//! Connector capabilities.
//!
//! A connector implements [`Connector`] plus one trait per operation it
//! supports. The provisioner needs all of them and holds connectors as
//! `Arc<dyn ProvisionerConnector>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ConnectorError, ConnectorResult};
use crate::operation::{AttributeDelta, AttributeSet, Filter, PageRequest, SearchResult, Uid};
use crate::sync::{SyncBatch, SyncToken, ALL_OBJECT_CLASSES};
use crate::types::ConnectorType;

/// Identity and health of a connector instance.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Kind of target system this connector talks to.
    fn connector_type(&self) -> ConnectorType;

    /// Human-readable name used in logs.
    fn display_name(&self) -> &str;

    /// Check that the target system is reachable and the connector's
    /// configuration is accepted.
    async fn test_connection(&self) -> ConnectorResult<()>;
}

/// Capability for creating objects on the target system.
#[async_trait]
pub trait CreateOp: Connector {
    /// Create an object of `object_class` from native attributes and return
    /// the identifier the target assigned.
    async fn create(&self, object_class: &str, attributes: AttributeSet) -> ConnectorResult<Uid>;
}

/// Capability for changing existing objects.
#[async_trait]
pub trait UpdateOp: Connector {
    /// Apply `changes` to an object.
    ///
    /// Only the attributes the delta names are touched. The returned
    /// identifier differs from `uid` when the update renamed the object.
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<Uid>;
}

/// Capability for removing objects.
#[async_trait]
pub trait DeleteOp: Connector {
    /// Delete the object identified by `uid`.
    ///
    /// Fails with [`ConnectorError::UnknownUid`] when there is no such object.
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<()>;
}

/// Capability for finding objects.
#[async_trait]
pub trait SearchOp: Connector {
    /// Objects of `object_class` matching `filter`, one page at a time.
    ///
    /// Each object carries its identifier under
    /// [`UID_ATTRIBUTE`](crate::operation::UID_ATTRIBUTE).
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
        page_request: Option<PageRequest>,
    ) -> ConnectorResult<SearchResult>;

    /// The object identified by `uid`, if it exists.
    async fn get(&self, object_class: &str, uid: &Uid) -> ConnectorResult<Option<AttributeSet>> {
        let by_uid = Filter::eq(uid.attribute_name(), uid.value());
        let found = self.search(object_class, Some(by_uid), None).await?;
        Ok(found.objects.into_iter().next())
    }
}

/// Source of changes made directly on the target system.
///
/// Tokens are totally ordered. [`fetch_changes`](Self::fetch_changes)
/// returns the records strictly after the given token, oldest first.
#[async_trait]
pub trait SyncCapable: Connector {
    /// At most `batch_size` change records after `sync_token`.
    ///
    /// `object_class` is a native class name or
    /// [`ALL_OBJECT_CLASSES`](crate::sync::ALL_OBJECT_CLASSES).
    async fn fetch_changes(
        &self,
        object_class: &str,
        sync_token: Option<SyncToken>,
        batch_size: u32,
    ) -> ConnectorResult<SyncBatch>;

    /// Token of the newest change on the target.
    async fn latest_token(&self, object_class: &str) -> ConnectorResult<SyncToken>;
}

/// Capability for running scripts hosted by the target system.
#[async_trait]
pub trait ScriptOp: Connector {
    /// Run a script the target system knows as `script_id`.
    ///
    /// A script that runs and fails reports [`ConnectorError::ScriptFailed`];
    /// connectors without scripting keep the default.
    async fn run_script(&self, script_id: &str, params: &Value) -> ConnectorResult<Value> {
        let _ = params;
        Err(ConnectorError::unsupported_operation(
            format!("run_script({script_id})"),
            ALL_OBJECT_CLASSES,
        ))
    }
}

/// Capability for checking account credentials.
#[async_trait]
pub trait AuthenticateOp: Connector {
    /// Check a password and return the identifier of the account it unlocks.
    async fn authenticate(
        &self,
        object_class: &str,
        username: &str,
        password: &str,
    ) -> ConnectorResult<Uid> {
        let _ = (username, password);
        Err(ConnectorError::unsupported_operation("authenticate", object_class))
    }
}

/// Everything the provisioner calls on a connector.
pub trait ProvisionerConnector:
    CreateOp + UpdateOp + DeleteOp + SearchOp + SyncCapable + ScriptOp + AuthenticateOp
{
}

impl<T> ProvisionerConnector for T where
    T: CreateOp + UpdateOp + DeleteOp + SearchOp + SyncCapable + ScriptOp + AuthenticateOp
{
}
