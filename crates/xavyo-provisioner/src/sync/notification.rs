//! Change notifications forwarded to the synchronization service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use xavyo_connector::operation::AttributeSet;

use crate::error::ResourceResult;

use super::coalesce::NetEffect;

/// Action requested of the synchronization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// A new object appeared.
    NotifyCreate,
    /// An existing object changed.
    NotifyUpdate,
    /// An object disappeared.
    NotifyDelete,
}

impl NotificationKind {
    /// Kind for a net effect, `None` for cancelled changes.
    #[must_use]
    pub fn for_effect(effect: NetEffect) -> Option<Self> {
        match effect {
            NetEffect::Create => Some(Self::NotifyCreate),
            NetEffect::Update => Some(Self::NotifyUpdate),
            NetEffect::Delete => Some(Self::NotifyDelete),
            NetEffect::Cancelled => None,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotifyCreate => "notifyCreate",
            Self::NotifyUpdate => "notifyUpdate",
            Self::NotifyDelete => "notifyDelete",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Net change of one object, with internal names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Requested action.
    #[serde(rename = "action")]
    pub kind: NotificationKind,
    /// Target system name.
    pub system: String,
    /// Internal object class name.
    pub object_class: String,
    /// Identifier of the object.
    pub resource_id: String,
    /// Identifier before a rename.
    #[serde(
        rename = "_previous-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_id: Option<String>,
    /// Object state after the change (absent for deletes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeSet>,
    /// When the provisioner observed the change.
    pub detected_at: DateTime<Utc>,
}

impl Notification {
    /// Resource path of the changed object.
    #[must_use]
    pub fn resource_path(&self) -> String {
        format!(
            "system/{}/{}/{}",
            self.system, self.object_class, self.resource_id
        )
    }
}

/// Receiver of change notifications.
///
/// Delivery is at-least-once: a notification may be repeated after a failed
/// cycle, so implementations must be idempotent.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    async fn notify(&self, notification: &Notification) -> ResourceResult<()>;
}
