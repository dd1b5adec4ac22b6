//! Reduction of a change batch to one net effect per object.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use xavyo_connector::operation::{AttributeSet, Uid};
use xavyo_connector::sync::{SyncDelta, SyncDeltaType, SyncToken};

/// Net effect of every record seen for one object within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetEffect {
    /// The object did not exist before the batch and does after it.
    Create,
    /// The object existed before and after the batch.
    Update,
    /// The object existed before the batch and does not after it.
    Delete,
    /// Created and deleted within the batch; nothing to report.
    Cancelled,
}

impl NetEffect {
    /// Fold the next record kind into the running effect.
    #[must_use]
    pub fn then(current: Option<Self>, next: SyncDeltaType) -> Self {
        use NetEffect::{Cancelled, Create, Delete, Update};

        let next = match next {
            SyncDeltaType::Create => Create,
            SyncDeltaType::Update | SyncDeltaType::CreateOrUpdate => Update,
            SyncDeltaType::Delete => Delete,
        };

        match (current, next) {
            (None, next) => next,
            (Some(Create), Create | Update) => Create,
            (Some(Create), _) => Cancelled,
            (Some(Update), Delete) => Delete,
            (Some(Update), _) => Update,
            (Some(Delete), Delete) => Delete,
            (Some(Delete), _) => Update,
            (Some(Cancelled), Delete) => Cancelled,
            (Some(Cancelled), _) => Create,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NetEffect::Create => "create",
            NetEffect::Update => "update",
            NetEffect::Delete => "delete",
            NetEffect::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NetEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The net change for one object, in native names.
#[derive(Debug, Clone, PartialEq)]
pub struct NetChange {
    /// Identifier after the last record.
    pub uid: Uid,
    /// Identifier the object had before the batch, when it was renamed.
    pub previous_uid: Option<Uid>,
    /// Native object class of the last record.
    pub object_class: String,
    /// Net effect.
    pub effect: NetEffect,
    /// Payload of the last record.
    pub attributes: Option<AttributeSet>,
    origin: Uid,
}

impl NetChange {
    fn start(delta: SyncDelta) -> Self {
        let origin = delta.previous_uid.clone().unwrap_or_else(|| delta.uid.clone());
        let mut change = Self {
            uid: delta.uid.clone(),
            previous_uid: None,
            object_class: String::new(),
            effect: NetEffect::then(None, delta.delta_type),
            attributes: None,
            origin,
        };
        change.absorb_payload(delta);
        change
    }

    fn absorb(&mut self, delta: SyncDelta) {
        self.effect = NetEffect::then(Some(self.effect), delta.delta_type);
        self.uid = delta.uid.clone();
        self.absorb_payload(delta);
    }

    fn absorb_payload(&mut self, delta: SyncDelta) {
        self.object_class = delta.object_class;
        self.attributes = delta.attributes;
        self.previous_uid = match self.effect {
            NetEffect::Update | NetEffect::Delete if self.origin != self.uid => {
                Some(self.origin.clone())
            }
            _ => None,
        };
    }

    /// Whether a notification must be forwarded for this change.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        self.effect != NetEffect::Cancelled
    }
}

/// Position of one raw record within the reduced batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordSlot {
    token: SyncToken,
    change: Option<usize>,
}

/// A batch reduced to net changes, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct CoalescedBatch {
    /// Net changes, in order of first appearance.
    pub changes: Vec<NetChange>,
    records: Vec<RecordSlot>,
}

impl CoalescedBatch {
    /// Reduce `deltas` to net changes.
    ///
    /// Records are sorted by token first. Records for which `tracked` returns
    /// `false` are consumed without contributing a change.
    pub fn reduce<F>(mut deltas: Vec<SyncDelta>, tracked: F) -> Self
    where
        F: Fn(&SyncDelta) -> bool,
    {
        deltas.sort_by_key(|d| d.token);

        let mut batch = Self::default();
        let mut index: HashMap<(String, Uid), usize> = HashMap::new();

        for delta in deltas {
            let token = delta.token;
            if !tracked(&delta) {
                batch.records.push(RecordSlot {
                    token,
                    change: None,
                });
                continue;
            }

            let class = delta.object_class.clone();
            let existing = delta
                .previous_uid
                .as_ref()
                .and_then(|prev| index.get(&(class.clone(), prev.clone())).copied())
                .or_else(|| index.get(&(class.clone(), delta.uid.clone())).copied());

            let position = match existing {
                Some(position) => {
                    let old_key = (class.clone(), batch.changes[position].uid.clone());
                    index.remove(&old_key);
                    batch.changes[position].absorb(delta);
                    position
                }
                None => {
                    batch.changes.push(NetChange::start(delta));
                    batch.changes.len() - 1
                }
            };
            index.insert((class, batch.changes[position].uid.clone()), position);
            batch.records.push(RecordSlot {
                token,
                change: Some(position),
            });
        }

        batch
    }

    /// Number of raw records consumed.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Token of the last raw record, if any.
    #[must_use]
    pub fn last_token(&self) -> Option<SyncToken> {
        self.records.last().map(|r| r.token)
    }

    /// Token of the last record of the longest prefix whose changes are all
    /// settled.
    ///
    /// `forwarded[i]` tells whether change `i` reached the sink. Untracked
    /// records always count as settled. A cancelled change counts only when
    /// the prefix holds every one of its records, so a retry never sees the
    /// tail of a cancellation on its own.
    #[must_use]
    pub fn settled_token(&self, forwarded: &[bool]) -> Option<SyncToken> {
        let pending = |i: usize| {
            self.changes[i].is_reportable() && !forwarded.get(i).copied().unwrap_or(false)
        };
        let mut cut = self
            .records
            .iter()
            .position(|r| r.change.map_or(false, &pending))
            .unwrap_or(self.records.len());

        while let Some(first) = self.records[..cut].iter().position(|r| {
            r.change.is_some_and(|i| {
                !self.changes[i].is_reportable()
                    && self.records[cut..].iter().any(|later| later.change == Some(i))
            })
        }) {
            cut = first;
        }

        cut.checked_sub(1).map(|last| self.records[last].token)
    }
}
