//! Live sync cycle: load cursor, fetch one batch, reduce, forward, persist.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use xavyo_connector::schema::{ObjectClass, Schema};
use xavyo_connector::sync::{SyncDelta, SyncToken, ALL_OBJECT_CLASSES};
use xavyo_connector::traits::SyncCapable;

use crate::error::ResourceResult;

use super::coalesce::CoalescedBatch;
use super::notification::{Notification, NotificationKind, NotificationSink};
use super::stage::{stage_key, StageStore};

/// What a sync cycle covers.
#[derive(Debug, Clone, Copy)]
pub struct SyncScope<'a> {
    /// Target system name.
    pub system: &'a str,
    /// Object class to sync, or `None` for every configured object class.
    pub object_class: Option<&'a ObjectClass>,
    /// Schema of the system, used to map records to internal names.
    pub schema: &'a Schema,
    /// Maximum number of records fetched per cycle.
    pub batch_size: u32,
}

impl SyncScope<'_> {
    /// Stage key owning this scope's cursor.
    #[must_use]
    pub fn stage_key(&self) -> String {
        stage_key(self.system, self.object_class.map(|oc| oc.name.as_str()))
    }

    fn native_object_class(&self) -> &str {
        self.object_class
            .map_or(ALL_OBJECT_CLASSES, |oc| oc.native_name.as_str())
    }

    fn resolve(&self, native_object_class: &str) -> Option<&ObjectClass> {
        match self.object_class {
            Some(oc) if oc.native_name == native_object_class => Some(oc),
            Some(_) => None,
            None => self.schema.get_object_class_by_native(native_object_class),
        }
    }

    fn tracks(&self, delta: &SyncDelta) -> bool {
        self.resolve(&delta.object_class).is_some()
    }
}

/// Result of one sync cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// Identifier of this cycle, for log correlation.
    pub cycle_id: Uuid,
    /// Stage the cursor belongs to.
    pub stage_key: String,
    /// Cursor after the cycle.
    #[serde(rename = "connectorData")]
    pub token: SyncToken,
    /// Notifications delivered to the sink.
    pub notifications_forwarded: usize,
    /// Raw records consumed.
    pub records_consumed: usize,
    /// Whether the source reported more records pending.
    pub has_more: bool,
    /// Whether this cycle only initialized the cursor.
    pub bootstrapped: bool,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
}

/// Drives live sync cycles, at most one at a time per stage key.
pub struct LiveSyncEngine {
    stages: Arc<dyn StageStore>,
    sink: Arc<dyn NotificationSink>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LiveSyncEngine {
    /// Create an engine persisting cursors in `stages` and forwarding to `sink`.
    pub fn new(stages: Arc<dyn StageStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            stages,
            sink,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn stage_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Run one cycle for `scope`.
    ///
    /// Consumes exactly one batch. On a sink failure the cursor advances only
    /// past records whose changes were all delivered, and the failure is
    /// returned.
    #[instrument(
        skip(self, connector, scope),
        fields(system = %scope.system, stage = tracing::field::Empty)
    )]
    pub async fn run_cycle<C>(
        &self,
        connector: &C,
        scope: &SyncScope<'_>,
    ) -> ResourceResult<SyncOutcome>
    where
        C: SyncCapable + ?Sized,
    {
        let key = scope.stage_key();
        tracing::Span::current().record("stage", key.as_str());

        let lock = self.stage_lock(&key).await;
        let _guard = lock.lock().await;

        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let native_class = scope.native_object_class();

        let Some(current) = self.stages.load_token(&key).await? else {
            let latest = connector.latest_token(native_class).await?;
            self.stages.save_token(&key, latest).await?;
            info!(%cycle_id, token = %latest, "Initialized sync stage at latest token");
            return Ok(SyncOutcome {
                cycle_id,
                stage_key: key,
                token: latest,
                notifications_forwarded: 0,
                records_consumed: 0,
                has_more: false,
                bootstrapped: true,
                started_at,
                finished_at: Utc::now(),
            });
        };

        let batch = connector
            .fetch_changes(native_class, Some(current), scope.batch_size)
            .await?;
        let has_more = batch.has_more;
        let next_token = batch.next_token;

        let coalesced = CoalescedBatch::reduce(batch.deltas, |d| scope.tracks(d));
        debug!(
            %cycle_id,
            records = coalesced.record_count(),
            changes = coalesced.changes.len(),
            "Coalesced change batch"
        );

        let mut forwarded = vec![false; coalesced.changes.len()];
        let mut notifications_forwarded = 0;

        for (i, change) in coalesced.changes.iter().enumerate() {
            let Some(kind) = NotificationKind::for_effect(change.effect) else {
                continue;
            };
            let Some(object_class) = scope.resolve(&change.object_class) else {
                continue;
            };

            let notification = Notification {
                kind,
                system: scope.system.to_string(),
                object_class: object_class.name.clone(),
                resource_id: change.uid.value().to_string(),
                previous_id: change.previous_uid.as_ref().map(|u| u.value().to_string()),
                value: change
                    .attributes
                    .as_ref()
                    .filter(|_| kind != NotificationKind::NotifyDelete)
                    .map(|attrs| object_class.to_internal(attrs)),
                detected_at: Utc::now(),
            };

            if let Err(err) = self.sink.notify(&notification).await {
                let settled = coalesced.settled_token(&forwarded);
                if let Some(token) = settled {
                    if let Err(save_err) = self.stages.save_token(&key, token).await {
                        error!(
                            %cycle_id,
                            %token,
                            error = %save_err,
                            "Failed to persist settled sync token"
                        );
                    }
                }
                warn!(
                    %cycle_id,
                    resource_id = %notification.resource_id,
                    settled_token = ?settled,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Notification sink failed, aborting sync cycle"
                );
                return Err(err);
            }

            forwarded[i] = true;
            notifications_forwarded += 1;
        }

        let token = coalesced
            .last_token()
            .or(next_token)
            .map_or(current, |token| token.max(current));
        if token != current {
            self.stages.save_token(&key, token).await?;
        }

        info!(
            %cycle_id,
            %token,
            notifications_forwarded,
            records = coalesced.record_count(),
            has_more,
            "Sync cycle completed"
        );

        Ok(SyncOutcome {
            cycle_id,
            stage_key: key,
            token,
            notifications_forwarded,
            records_consumed: coalesced.record_count(),
            has_more,
            bootstrapped: false,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use xavyo_connector::error::ConnectorResult;
    use xavyo_connector::operation::{AttributeSet, Uid};
    use xavyo_connector::schema::{AttributeDataType, SchemaAttribute};
    use xavyo_connector::sync::SyncBatch;
    use xavyo_connector::traits::Connector;
    use xavyo_connector::types::ConnectorType;

    use crate::error::ResourceError;
    use crate::sync::stage::InMemoryStageStore;

    struct ScriptedSource {
        deltas: Vec<SyncDelta>,
        latest: SyncToken,
        idle_token: Option<SyncToken>,
        fetches: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(deltas: Vec<SyncDelta>) -> Self {
            Self {
                deltas,
                latest: SyncToken::new(100),
                idle_token: None,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedSource {
        fn connector_type(&self) -> ConnectorType {
            ConnectorType::Scripted
        }

        fn display_name(&self) -> &str {
            "scripted"
        }

        async fn test_connection(&self) -> ConnectorResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SyncCapable for ScriptedSource {
        async fn fetch_changes(
            &self,
            _object_class: &str,
            sync_token: Option<SyncToken>,
            batch_size: u32,
        ) -> ConnectorResult<SyncBatch> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let after = sync_token.unwrap_or(SyncToken::new(i64::MIN));
            let pending: Vec<SyncDelta> = self
                .deltas
                .iter()
                .filter(|d| d.token > after)
                .cloned()
                .collect();
            if pending.is_empty() {
                return Ok(match self.idle_token {
                    Some(token) => SyncBatch::empty().with_next_token(token),
                    None => SyncBatch::empty(),
                });
            }
            let has_more = pending.len() > batch_size as usize;
            let mut batch =
                SyncBatch::with_deltas(pending.into_iter().take(batch_size as usize).collect());
            batch.has_more = has_more;
            Ok(batch)
        }

        async fn latest_token(&self, _object_class: &str) -> ConnectorResult<SyncToken> {
            Ok(self.latest)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<Notification>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, notification: &Notification) -> ResourceResult<()> {
            if self.fail_on.as_deref() == Some(notification.resource_id.as_str()) {
                return Err(ResourceError::unavailable("sync service down"));
            }
            self.received.lock().await.push(notification.clone());
            Ok(())
        }
    }

    /// Store that can be read but refuses every write.
    struct ReadOnlyStages(InMemoryStageStore);

    #[async_trait]
    impl StageStore for ReadOnlyStages {
        async fn load_token(&self, key: &str) -> ResourceResult<Option<SyncToken>> {
            self.0.load_token(key).await
        }

        async fn save_token(&self, _key: &str, _token: SyncToken) -> ResourceResult<()> {
            Err(ResourceError::internal("stage store is read-only"))
        }
    }

    fn failing_on(id: &str) -> Arc<RecordingSink> {
        Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
            fail_on: Some(id.to_string()),
        })
    }

    fn schema() -> Schema {
        Schema::with_object_classes(vec![ObjectClass::new("account", "__ACCOUNT__")
            .with_attribute(SchemaAttribute::new(
                "name",
                "__NAME__",
                AttributeDataType::String,
            ))])
    }

    fn record(token: i64, id: &str) -> SyncDelta {
        SyncDelta::updated(
            token,
            Uid::from_value(id),
            "__ACCOUNT__",
            AttributeSet::new().with("__NAME__", id),
        )
    }

    async fn run(
        source: &ScriptedSource,
        stages: Arc<InMemoryStageStore>,
        sink: Arc<RecordingSink>,
    ) -> ResourceResult<SyncOutcome> {
        let schema = schema();
        let engine = LiveSyncEngine::new(stages, sink);
        let scope = SyncScope {
            system: "xml",
            object_class: schema.get_object_class("account"),
            schema: &schema,
            batch_size: 10,
        };
        engine.run_cycle(source, &scope).await
    }

    #[tokio::test]
    async fn test_first_run_bootstraps_latest_token() {
        let source = ScriptedSource::new(vec![record(1, "A")]);
        let stages = Arc::new(InMemoryStageStore::new());
        let sink = Arc::new(RecordingSink::default());

        let outcome = run(&source, stages.clone(), sink.clone()).await.unwrap();
        assert!(outcome.bootstrapped);
        assert_eq!(outcome.token, SyncToken::new(100));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(sink.received.lock().await.is_empty());
        assert_eq!(
            stages.load_token("SYSTEMXMLACCOUNT").await.unwrap(),
            Some(SyncToken::new(100))
        );
    }

    #[tokio::test]
    async fn test_cycle_forwards_mapped_notifications() {
        let source = ScriptedSource::new(vec![record(1, "A"), record(2, "B")]);
        let stages =
            Arc::new(InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await);
        let sink = Arc::new(RecordingSink::default());

        let outcome = run(&source, stages, sink.clone()).await.unwrap();
        assert_eq!(outcome.token, SyncToken::new(2));
        assert_eq!(outcome.notifications_forwarded, 2);

        let received = sink.received.lock().await;
        assert_eq!(received[0].kind, NotificationKind::NotifyUpdate);
        assert_eq!(received[0].object_class, "account");
        assert_eq!(
            received[0].value.as_ref().and_then(|v| v.get_string("name")),
            Some("A")
        );
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_settled_prefix() {
        let source = ScriptedSource::new(vec![record(1, "A"), record(2, "B"), record(3, "C")]);
        let stages =
            Arc::new(InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await);
        let sink = Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
            fail_on: Some("B".to_string()),
        });

        let err = run(&source, stages.clone(), sink.clone()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            stages.load_token("SYSTEMXMLACCOUNT").await.unwrap(),
            Some(SyncToken::new(1))
        );
        assert_eq!(sink.received.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_first_leaves_token_untouched() {
        let source = ScriptedSource::new(vec![record(1, "A")]);
        let stages =
            Arc::new(InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await);
        let sink = Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
            fail_on: Some("A".to_string()),
        });

        assert!(run(&source, stages.clone(), sink).await.is_err());
        assert_eq!(
            stages.load_token("SYSTEMXMLACCOUNT").await.unwrap(),
            Some(SyncToken::new(0))
        );
    }

    #[tokio::test]
    async fn test_concurrent_cycles_on_one_stage_are_serialized() {
        let source = ScriptedSource::new((1..=4).map(|t| record(t, &format!("U{t}"))).collect());
        let stages =
            Arc::new(InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await);
        let sink = Arc::new(RecordingSink::default());
        let schema = schema();
        let engine = LiveSyncEngine::new(stages, sink.clone());
        let scope = SyncScope {
            system: "xml",
            object_class: schema.get_object_class("account"),
            schema: &schema,
            batch_size: 2,
        };

        let (a, b) = tokio::join!(
            engine.run_cycle(&source, &scope),
            engine.run_cycle(&source, &scope)
        );
        let mut tokens = vec![a.unwrap().token, b.unwrap().token];
        tokens.sort();
        assert_eq!(tokens, vec![SyncToken::new(2), SyncToken::new(4)]);
        assert_eq!(sink.received.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_failure_never_splits_a_cancelled_change() {
        let source = ScriptedSource::new(vec![
            SyncDelta::created(
                1,
                Uid::from_value("A"),
                "__ACCOUNT__",
                AttributeSet::new().with("__NAME__", "A"),
            ),
            record(2, "B"),
            SyncDelta::deleted(3, Uid::from_value("A"), "__ACCOUNT__"),
        ]);
        let stages =
            Arc::new(InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await);

        assert!(run(&source, stages.clone(), failing_on("B")).await.is_err());
        assert_eq!(
            stages.load_token("SYSTEMXMLACCOUNT").await.unwrap(),
            Some(SyncToken::new(0))
        );

        let sink = Arc::new(RecordingSink::default());
        let outcome = run(&source, stages.clone(), sink.clone()).await.unwrap();
        assert_eq!(outcome.token, SyncToken::new(3));
        let received: Vec<(NotificationKind, String)> = sink
            .received
            .lock()
            .await
            .iter()
            .map(|n| (n.kind, n.resource_id.clone()))
            .collect();
        assert_eq!(received, vec![(NotificationKind::NotifyUpdate, "B".to_string())]);
    }

    #[tokio::test]
    async fn test_sink_error_survives_failed_token_save() {
        let source = ScriptedSource::new(vec![record(1, "A"), record(2, "B")]);
        let stages = Arc::new(ReadOnlyStages(
            InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(0)).await,
        ));
        let schema = schema();
        let engine = LiveSyncEngine::new(stages, failing_on("B"));
        let scope = SyncScope {
            system: "xml",
            object_class: schema.get_object_class("account"),
            schema: &schema,
            batch_size: 10,
        };

        let err = engine.run_cycle(&source, &scope).await.unwrap_err();
        assert!(matches!(err, ResourceError::ServiceUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cursor_never_moves_backwards() {
        let mut source = ScriptedSource::new(Vec::new());
        source.idle_token = Some(SyncToken::new(3));
        let stages =
            Arc::new(InMemoryStageStore::seeded("SYSTEMXMLACCOUNT", SyncToken::new(7)).await);

        let outcome = run(&source, stages.clone(), Arc::new(RecordingSink::default()))
            .await
            .unwrap();
        assert_eq!(outcome.token, SyncToken::new(7));
        assert_eq!(
            stages.load_token("SYSTEMXMLACCOUNT").await.unwrap(),
            Some(SyncToken::new(7))
        );
    }
}
