//! # Connector Framework
//!
//! What a connector exposes to the provisioner: native attribute sets and
//! identifiers, object-class schemas, the failure categories a connector
//! reports, and the change records it returns for live synchronization.
//!
//! ## Capabilities
//!
//! - [`Connector`](traits::Connector) - identity and connection test
//! - [`CreateOp`](traits::CreateOp), [`UpdateOp`](traits::UpdateOp),
//!   [`DeleteOp`](traits::DeleteOp), [`SearchOp`](traits::SearchOp) - object access
//! - [`SyncCapable`](traits::SyncCapable) - native change feed
//! - [`ScriptOp`](traits::ScriptOp), [`AuthenticateOp`](traits::AuthenticateOp) - actions
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_connector::prelude::*;
//!
//! connector.test_connection().await?;
//!
//! let uid = connector
//!     .create("__ACCOUNT__", AttributeSet::new().with(NAME_ATTRIBUTE, "bjensen"))
//!     .await?;
//! let batch = connector.fetch_changes("__ACCOUNT__", Some(SyncToken::new(0)), 100).await?;
//! ```

pub mod error;
pub mod operation;
pub mod schema;
pub mod sync;
pub mod traits;
pub mod types;

/// Everything a connector implementation usually imports.
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::operation::{
        AttributeDelta, AttributeSet, AttributeValue, Filter, PageRequest, SearchResult, Uid,
        NAME_ATTRIBUTE, UID_ATTRIBUTE,
    };
    pub use crate::schema::{AttributeDataType, ObjectClass, Schema, SchemaAttribute};
    pub use crate::sync::{SyncBatch, SyncDelta, SyncDeltaType, SyncToken, ALL_OBJECT_CLASSES};
    pub use crate::traits::{
        AuthenticateOp, Connector, CreateOp, DeleteOp, ProvisionerConnector, ScriptOp, SearchOp,
        SyncCapable, UpdateOp,
    };
    pub use crate::types::ConnectorType;
}

pub use async_trait::async_trait;
