//! Live Synchronization Module
//!
//! Pulls changes made natively in a target system and forwards them to the
//! synchronization service as net notifications.
//!
//! ## Key Components
//!
//! - [`LiveSyncEngine`] - Runs one cycle per call, serialized per stage key
//! - [`CoalescedBatch`] - Reduces a batch to one net change per object
//! - [`NotificationSink`] - Receives `notifyCreate`/`notifyUpdate`/`notifyDelete`
//! - [`StageStore`] - Persists the cursor of each stage
//!
//! ## Cycle
//!
//! ```text
//! ┌─────────────┐   ┌────────────────┐   ┌────────────┐   ┌──────────────────┐
//! │ Stage Store │──►│ fetch_changes  │──►│  Coalesce  │──►│ Notification Sink│
//! │ (cursor)    │   │ (one batch)    │   │            │   │ (one at a time)  │
//! └─────────────┘   └────────────────┘   └────────────┘   └────────┬─────────┘
//!        ▲                                                          │
//!        └──────────────── cursor of the settled prefix ◄───────────┘
//! ```

pub mod coalesce;
pub mod engine;
pub mod notification;
pub mod stage;

pub use coalesce::{CoalescedBatch, NetChange, NetEffect};
pub use engine::{LiveSyncEngine, SyncOutcome, SyncScope};
pub use notification::{Notification, NotificationKind, NotificationSink};
pub use stage::{stage_key, InMemoryStageStore, StageStore};
