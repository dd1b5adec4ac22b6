//! # Provisioner
//!
//! Bridges resource requests addressed as `system/{system}/{objectClass}/{id}`
//! to the connectors serving external identity stores.
//!
//! This crate provides:
//! - Resource operations (create, read, update, delete, patch, query, action)
//! - Patch application against object-class schemas
//! - Live synchronization with per-object coalescing
//! - Translation of native connector failures into resource outcomes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────────┐     ┌──────────────┐
//! │   Request    │────►│ SystemObjectService │────►│  Connector   │
//! │ (path, body) │     │  names int ↔ native │     │              │
//! └──────────────┘     └──────────┬──────────┘     └──────┬───────┘
//!                                 │                       │ failures
//!                    ┌────────────┼────────────┐          ▼
//!                    ▼            ▼            ▼    ┌──────────────┐
//!             ┌────────────┐ ┌─────────┐ ┌─────────┐│  Translator  │
//!             │PatchEngine │ │ Actions │ │LiveSync ││ResourceError │
//!             └────────────┘ └─────────┘ └────┬────┘└──────────────┘
//!                                             ▼
//!                                   ┌───────────────────┐
//!                                   │ Notification Sink │
//!                                   └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_provisioner::{ProvisionerConfig, ResourcePath, SystemObjectService};
//!
//! let config = ProvisionerConfig::from_json(&json)?;
//! let mut service = SystemObjectService::new(stages, sink);
//! for system in config.systems {
//!     service.register(system, connector.clone())?;
//! }
//!
//! let path = ResourcePath::parse("system/ldap/account/bjensen")?;
//! let account = service.read(&path).await?;
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod logging;
pub mod patch;
pub mod path;
pub mod service;
pub mod sync;
pub mod translate;

pub use action::{Action, ActionDispatcher};
pub use config::{ObjectTypeConfig, PropertyConfig, ProvisionerConfig, SyncSettings, SystemConfig};
pub use error::{ConfigError, ResourceError, ResourceResult};
pub use patch::{PatchEngine, PatchIndex, PatchOp, PatchOperation, PatchPath};
pub use path::ResourcePath;
pub use service::{QueryResult, SystemObjectService, ID_FIELD};
pub use sync::{
    InMemoryStageStore, LiveSyncEngine, Notification, NotificationKind, NotificationSink,
    StageStore, SyncOutcome, SyncScope,
};
pub use translate::translate;
