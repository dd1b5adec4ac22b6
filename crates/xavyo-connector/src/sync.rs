//! Live synchronization primitives.
//!
//! Raw change records as reported by a connector, the cursor that orders
//! them, and the bounded batch a single fetch returns.

use serde::{Deserialize, Serialize};

use crate::operation::{AttributeSet, Uid};

/// Object class name requesting changes across every object class.
pub const ALL_OBJECT_CLASSES: &str = "__ALL__";

/// Opaque, totally ordered synchronization cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(i64);

impl SyncToken {
    /// Wrap a raw token value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw token value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for SyncToken {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SyncToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of change a connector reports for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDeltaType {
    /// A new object was created.
    Create,
    /// An existing object was updated.
    Update,
    /// The connector cannot tell a create from an update.
    CreateOrUpdate,
    /// An object was deleted.
    Delete,
}

impl SyncDeltaType {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDeltaType::Create => "create",
            SyncDeltaType::Update => "update",
            SyncDeltaType::CreateOrUpdate => "create_or_update",
            SyncDeltaType::Delete => "delete",
        }
    }
}

impl std::fmt::Display for SyncDeltaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single raw change record, with native attribute names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDelta {
    /// Position of this record in the change stream.
    pub token: SyncToken,
    /// Identifier of the changed object after the change.
    pub uid: Uid,
    /// Identifier before the change, when the change renamed the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_uid: Option<Uid>,
    /// Native object class of the changed object.
    pub object_class: String,
    /// Kind of change.
    pub delta_type: SyncDeltaType,
    /// Object state after the change (absent for deletes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeSet>,
}

impl SyncDelta {
    /// Create a record for a created object.
    pub fn created(
        token: impl Into<SyncToken>,
        uid: Uid,
        object_class: impl Into<String>,
        attributes: AttributeSet,
    ) -> Self {
        Self::new(token, uid, object_class, SyncDeltaType::Create, Some(attributes))
    }

    /// Create a record for an updated object.
    pub fn updated(
        token: impl Into<SyncToken>,
        uid: Uid,
        object_class: impl Into<String>,
        attributes: AttributeSet,
    ) -> Self {
        Self::new(token, uid, object_class, SyncDeltaType::Update, Some(attributes))
    }

    /// Create a record for a deleted object.
    pub fn deleted(token: impl Into<SyncToken>, uid: Uid, object_class: impl Into<String>) -> Self {
        Self::new(token, uid, object_class, SyncDeltaType::Delete, None)
    }

    /// Create a record of any kind.
    pub fn new(
        token: impl Into<SyncToken>,
        uid: Uid,
        object_class: impl Into<String>,
        delta_type: SyncDeltaType,
        attributes: Option<AttributeSet>,
    ) -> Self {
        Self {
            token: token.into(),
            uid,
            previous_uid: None,
            object_class: object_class.into(),
            delta_type,
            attributes,
        }
    }

    /// Record that the change renamed the object from `previous`.
    #[must_use]
    pub fn with_previous_uid(mut self, previous: Uid) -> Self {
        self.previous_uid = Some(previous);
        self
    }
}

/// One bounded batch of change records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    /// Records, in the order the connector reported them.
    pub deltas: Vec<SyncDelta>,
    /// Cursor the connector reports for the next fetch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<SyncToken>,
    /// Whether more records are pending after this batch.
    #[serde(default)]
    pub has_more: bool,
}

impl SyncBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a batch holding the given records.
    #[must_use]
    pub fn with_deltas(deltas: Vec<SyncDelta>) -> Self {
        Self {
            deltas,
            next_token: None,
            has_more: false,
        }
    }

    /// Set the connector-reported next cursor.
    #[must_use]
    pub fn with_next_token(mut self, token: impl Into<SyncToken>) -> Self {
        self.next_token = Some(token.into());
        self
    }

    /// Indicate that there are more records to fetch.
    #[must_use]
    pub fn with_more(mut self) -> Self {
        self.has_more = true;
        self
    }

    /// Whether the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}
