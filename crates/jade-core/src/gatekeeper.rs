use jade_events::Bus;
use jade_policy::GuardPolicy;
use jade_protocol::AuditAction;
use jade_resolver::{resolve, ResolvedValue};
use jade_topics as topics;
use serde_json::{json, Value};

use crate::{
    chat, GatekeeperError, GroundStore, SchemaCache, SYSTEM_ACTOR,
};

/// Outcome of one chat question.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatOutcome {
    Answer(ResolvedValue),
    /// Unmapped or guard-rejected question. Rendered as the fixed
    /// "Query type not supported" answer, never as an error status.
    Unsupported,
}

/// The policy-enforcement pipeline. Generic over the store boundary so the
/// guard-before-access and audit-ordering guarantees are testable without a
/// database.
pub struct Gatekeeper<S: GroundStore> {
    store: S,
    guard: GuardPolicy,
    schema_cache: SchemaCache,
    bus: Bus,
}

impl<S: GroundStore> Gatekeeper<S> {
    pub fn new(store: S, guard: GuardPolicy, bus: Bus) -> Self {
        Self {
            store,
            guard,
            schema_cache: SchemaCache::new(),
            bus,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn guard(&self) -> &GuardPolicy {
        &self.guard
    }

    /// Drop the cached schema validator so the next operation reloads it.
    pub async fn invalidate_schema(&self) {
        self.schema_cache.invalidate().await;
        self.bus.publish(topics::TOPIC_SCHEMA_RELOADED, &json!({}));
    }

    /// Validate `payload` against the active schema and persist it. The
    /// rejection audit commits before the error surfaces; the creation audit
    /// commits after the record is persisted.
    pub async fn create_record(
        &self,
        payload: Value,
        created_by: &str,
    ) -> Result<String, GatekeeperError> {
        let schema = self.schema_cache.get_or_load(&self.store).await?;
        if let Err(failure) = schema.validate(&payload) {
            let metadata = json!({ "error": failure.0 });
            self.store
                .append_audit(AuditAction::RejectedRecord, SYSTEM_ACTOR, None, Some(&metadata))
                .await
                .map_err(GatekeeperError::infra)?;
            self.bus
                .publish_with_actor(topics::TOPIC_RECORDS_REJECTED, Some(SYSTEM_ACTOR), &metadata);
            return Err(GatekeeperError::ValidationFailed(failure.0));
        }

        let record_id = uuid::Uuid::new_v4().to_string();
        self.store
            .insert_record(&record_id, schema.version(), &payload, created_by)
            .await
            .map_err(GatekeeperError::infra)?;
        self.store
            .append_audit(AuditAction::CreateRecord, created_by, Some(&record_id), None)
            .await
            .map_err(GatekeeperError::infra)?;
        self.bus.publish_with_actor(
            topics::TOPIC_RECORDS_CREATED,
            Some(created_by),
            &json!({ "record_id": record_id, "schema_version": schema.version() }),
        );
        tracing::info!(%record_id, schema_version = schema.version(), "record stored");
        Ok(record_id)
    }

    /// Read-only fetch of a record's data tree. Soft-deleted records are
    /// indistinguishable from absent ones.
    pub async fn read_record(
        &self,
        record_id: &str,
        performed_by: &str,
    ) -> Result<Value, GatekeeperError> {
        let data = self
            .store
            .fetch_record(record_id)
            .await
            .map_err(GatekeeperError::infra)?
            .ok_or(GatekeeperError::NotFound)?;
        self.store
            .append_audit(AuditAction::ReadRecord, performed_by, Some(record_id), None)
            .await
            .map_err(GatekeeperError::infra)?;
        self.bus.publish_with_actor(
            topics::TOPIC_RECORDS_READ,
            Some(performed_by),
            &json!({ "record_id": record_id }),
        );
        Ok(data)
    }

    /// Answer a direct field query. The guard runs first, on the field path
    /// alone; no record is fetched for a rejected query.
    pub async fn query_field(
        &self,
        record_id: &str,
        field: &str,
        performed_by: &str,
    ) -> Result<ResolvedValue, GatekeeperError> {
        let decision = self.guard.evaluate(field);
        if !decision.admitted {
            let metadata = json!({
                "field": field,
                "reason": "disallowed_query",
                "matched_keyword": decision.matched_keyword,
            });
            self.store
                .append_audit(
                    AuditAction::RejectedQuery,
                    performed_by,
                    Some(record_id),
                    Some(&metadata),
                )
                .await
                .map_err(GatekeeperError::infra)?;
            self.bus
                .publish_with_actor(topics::TOPIC_QUERIES_REJECTED, Some(performed_by), &metadata);
            return Err(GatekeeperError::QueryRejected);
        }

        let data = self
            .store
            .fetch_record(record_id)
            .await
            .map_err(GatekeeperError::infra)?
            .ok_or(GatekeeperError::NotFound)?;
        let answer = resolve(&data, field);
        let metadata = json!({ "field": field });
        self.store
            .append_audit(
                AuditAction::QueryRecord,
                performed_by,
                Some(record_id),
                Some(&metadata),
            )
            .await
            .map_err(GatekeeperError::infra)?;
        self.bus
            .publish_with_actor(topics::TOPIC_QUERIES_ANSWERED, Some(performed_by), &metadata);
        Ok(answer)
    }

    /// Answer a natural-language question via the fixed question map. An
    /// unmapped question is unsupported without touching the guard or the
    /// store; a mapped question goes through exactly the same guard as a
    /// direct field query.
    pub async fn answer_question(
        &self,
        record_id: &str,
        question: &str,
        performed_by: &str,
    ) -> Result<ChatOutcome, GatekeeperError> {
        let normalized = chat::normalize_question(question);
        let Some(field) = chat::field_for_question(&normalized) else {
            return Ok(ChatOutcome::Unsupported);
        };

        let decision = self.guard.evaluate(field);
        if !decision.admitted {
            let metadata = json!({
                "question": question,
                "field": field,
                "reason": "disallowed_query",
                "matched_keyword": decision.matched_keyword,
            });
            self.store
                .append_audit(
                    AuditAction::RejectedQuery,
                    performed_by,
                    Some(record_id),
                    Some(&metadata),
                )
                .await
                .map_err(GatekeeperError::infra)?;
            self.bus
                .publish_with_actor(topics::TOPIC_QUERIES_REJECTED, Some(performed_by), &metadata);
            return Ok(ChatOutcome::Unsupported);
        }

        let data = self
            .store
            .fetch_record(record_id)
            .await
            .map_err(GatekeeperError::infra)?
            .ok_or(GatekeeperError::NotFound)?;
        let answer = resolve(&data, field);
        let metadata = json!({ "question": question, "field": field });
        self.store
            .append_audit(
                AuditAction::ChatQuery,
                performed_by,
                Some(record_id),
                Some(&metadata),
            )
            .await
            .map_err(GatekeeperError::infra)?;
        self.bus.publish_with_actor(
            topics::TOPIC_QUERIES_CHAT_ANSWERED,
            Some(performed_by),
            &metadata,
        );
        Ok(ChatOutcome::Answer(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Clone, Debug)]
    struct AuditCall {
        action: AuditAction,
        performed_by: String,
        record_id: Option<String>,
        metadata: Option<Value>,
    }

    #[derive(Default)]
    struct MockStore {
        records: Mutex<Vec<(String, Value)>>,
        active_schemas: Vec<(String, String)>,
        audits: Mutex<Vec<AuditCall>>,
        record_fetches: AtomicUsize,
        schema_fetches: AtomicUsize,
        schema_fetch_delay: Option<Duration>,
        fail_audits: bool,
    }

    impl MockStore {
        fn with_schema(document: Value) -> Self {
            Self {
                active_schemas: vec![(document.to_string(), "v1.0".into())],
                ..Default::default()
            }
        }

        async fn seed_record(&self, id: &str, data: Value) {
            self.records.lock().await.push((id.to_string(), data));
        }

        async fn audit_actions(&self) -> Vec<AuditAction> {
            self.audits.lock().await.iter().map(|c| c.action).collect()
        }
    }

    #[async_trait]
    impl GroundStore for MockStore {
        async fn fetch_record(&self, id: &str) -> Result<Option<Value>> {
            self.record_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .find(|(rid, _)| rid == id)
                .map(|(_, data)| data.clone()))
        }

        async fn insert_record(
            &self,
            id: &str,
            _schema_version: &str,
            data: &Value,
            _created_by: &str,
        ) -> Result<()> {
            self.records
                .lock()
                .await
                .push((id.to_string(), data.clone()));
            Ok(())
        }

        async fn fetch_active_schemas(&self) -> Result<Vec<(String, String)>> {
            self.schema_fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.schema_fetch_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.active_schemas.clone())
        }

        async fn append_audit(
            &self,
            action: AuditAction,
            performed_by: &str,
            record_id: Option<&str>,
            metadata: Option<&Value>,
        ) -> Result<()> {
            if self.fail_audits {
                anyhow::bail!("audit store unavailable");
            }
            self.audits.lock().await.push(AuditCall {
                action,
                performed_by: performed_by.to_string(),
                record_id: record_id.map(|s| s.to_string()),
                metadata: metadata.cloned(),
            });
            Ok(())
        }
    }

    fn premises_schema() -> Value {
        json!({
            "type": "object",
            "required": ["proposer"],
            "properties": {
                "proposer": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {"name": {"type": "string"}}
                }
            }
        })
    }

    fn gatekeeper(store: MockStore) -> Gatekeeper<MockStore> {
        Gatekeeper::new(store, GuardPolicy::default(), Bus::new(16))
    }

    #[tokio::test]
    async fn rejected_field_query_never_touches_the_store() {
        let gk = gatekeeper(MockStore::default());
        let err = gk
            .query_field("rec-1", "why.is.risk.high", "internal_user")
            .await
            .expect_err("guard must reject");
        assert!(matches!(err, GatekeeperError::QueryRejected));
        assert_eq!(gk.store().record_fetches.load(Ordering::SeqCst), 0);

        let audits = gk.store().audits.lock().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::RejectedQuery);
        assert_eq!(audits[0].record_id.as_deref(), Some("rec-1"));
        let metadata = audits[0].metadata.as_ref().expect("rejection metadata");
        assert_eq!(metadata["reason"], "disallowed_query");
        assert_eq!(metadata["matched_keyword"], "why");
    }

    #[tokio::test]
    async fn admitted_field_query_resolves_and_audits() {
        let store = MockStore::default();
        store
            .seed_record("rec-1", json!({"security": {"cctv": {"installed": true}}}))
            .await;
        let gk = gatekeeper(store);
        let answer = gk
            .query_field("rec-1", "security.cctv.installed", "internal_user")
            .await
            .expect("admitted");
        assert_eq!(answer, ResolvedValue::Value(json!(true)));
        assert_eq!(
            gk.store().audit_actions().await,
            vec![AuditAction::QueryRecord]
        );
    }

    #[tokio::test]
    async fn admitted_query_on_missing_record_is_not_found() {
        let gk = gatekeeper(MockStore::default());
        let err = gk
            .query_field("missing", "security.cctv.installed", "internal_user")
            .await
            .expect_err("missing record");
        assert!(matches!(err, GatekeeperError::NotFound));
        // Absence of a record is not a policy decision.
        assert!(gk.store().audits.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unmapped_chat_question_fails_closed_without_store_access() {
        let gk = gatekeeper(MockStore::default());
        let outcome = gk
            .answer_question("rec-1", "what is the risk appetite", "internal_user")
            .await
            .expect("unsupported is not an error");
        assert_eq!(outcome, ChatOutcome::Unsupported);
        assert_eq!(gk.store().record_fetches.load(Ordering::SeqCst), 0);
        assert!(gk.store().audits.lock().await.is_empty());
    }

    #[tokio::test]
    async fn mapped_chat_question_resolves_and_audits_chat_query() {
        let store = MockStore::default();
        store
            .seed_record("rec-1", json!({"security": {"cctv": {"installed": true}}}))
            .await;
        let gk = gatekeeper(store);
        let outcome = gk
            .answer_question("rec-1", "  Is CCTV Installed ", "internal_user")
            .await
            .expect("mapped question");
        assert_eq!(outcome, ChatOutcome::Answer(ResolvedValue::Value(json!(true))));

        let audits = gk.store().audits.lock().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::ChatQuery);
        let metadata = audits[0].metadata.as_ref().expect("chat metadata");
        assert_eq!(metadata["field"], "security.cctv.installed");
    }

    #[tokio::test]
    async fn guard_rejection_on_mapped_question_is_unsupported_and_audited() {
        // An extended denylist can reject a mapped field; the caller sees the
        // same unsupported outcome as for an unmapped question, but the
        // rejection is audited and the store is never touched.
        let store = MockStore::default();
        store
            .seed_record("rec-1", json!({"security": {"cctv": {"installed": true}}}))
            .await;
        let guard = GuardPolicy::with_config(jade_policy::GuardConfig {
            extra_tokens: vec!["cctv".into()],
        });
        let gk = Gatekeeper::new(store, guard, Bus::new(16));

        let outcome = gk
            .answer_question("rec-1", "is cctv installed", "internal_user")
            .await
            .expect("rejection is not an error on the chat surface");
        assert_eq!(outcome, ChatOutcome::Unsupported);
        assert_eq!(gk.store().record_fetches.load(Ordering::SeqCst), 0);

        let audits = gk.store().audits.lock().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::RejectedQuery);
        assert_eq!(
            audits[0].metadata.as_ref().expect("metadata")["matched_keyword"],
            json!("cctv")
        );
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_with_deterministic_audit() {
        let gk = gatekeeper(MockStore::with_schema(premises_schema()));
        let err = gk
            .create_record(json!({"security": {}}), "manual_operator")
            .await
            .expect_err("payload misses proposer");
        let GatekeeperError::ValidationFailed(message) = err else {
            panic!("expected ValidationFailed");
        };

        let audits = gk.store().audits.lock().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::RejectedRecord);
        assert_eq!(audits[0].performed_by, SYSTEM_ACTOR);
        assert_eq!(
            audits[0].metadata.as_ref().expect("error metadata")["error"],
            json!(message)
        );
        assert!(gk.store().records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn valid_payload_is_persisted_then_audited() {
        let gk = gatekeeper(MockStore::with_schema(premises_schema()));
        let record_id = gk
            .create_record(json!({"proposer": {"name": "Acme"}}), "manual_operator")
            .await
            .expect("valid payload");

        let records = gk.store().records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, record_id);

        let audits = gk.store().audits.lock().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::CreateRecord);
        assert_eq!(audits[0].performed_by, "manual_operator");
        assert_eq!(audits[0].record_id.as_deref(), Some(record_id.as_str()));
    }

    #[tokio::test]
    async fn failed_audit_write_surfaces_as_infrastructure() {
        // The trail is load-bearing: an action whose audit cannot be
        // committed must not report success.
        let store = MockStore {
            active_schemas: vec![(premises_schema().to_string(), "v1.0".into())],
            fail_audits: true,
            ..Default::default()
        };
        let gk = gatekeeper(store);

        let err = gk
            .create_record(json!({"proposer": {"name": "Acme"}}), "manual_operator")
            .await
            .expect_err("audit write fails");
        assert!(matches!(err, GatekeeperError::Infrastructure(_)));

        // A rejection that cannot be audited is an infrastructure failure,
        // not a policy outcome, and the record is still never fetched.
        let err = gk
            .query_field("rec-1", "why.is.risk.high", "internal_user")
            .await
            .expect_err("audit write fails");
        assert!(matches!(err, GatekeeperError::Infrastructure(_)));
        assert_eq!(gk.store().record_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_rejection_audit_masks_the_validation_outcome() {
        let store = MockStore {
            active_schemas: vec![(premises_schema().to_string(), "v1.0".into())],
            fail_audits: true,
            ..Default::default()
        };
        let gk = gatekeeper(store);
        let err = gk
            .create_record(json!({"security": {}}), "manual_operator")
            .await
            .expect_err("invalid payload with failing audit");
        assert!(matches!(err, GatekeeperError::Infrastructure(_)));
        assert!(gk.store().records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_use_loads_the_schema_once() {
        let store = MockStore {
            active_schemas: vec![(premises_schema().to_string(), "v1.0".into())],
            schema_fetch_delay: Some(Duration::from_millis(25)),
            ..Default::default()
        };
        let gk = Arc::new(gatekeeper(store));

        let mut handles = Vec::new();
        for i in 0..8 {
            let gk = gk.clone();
            handles.push(tokio::spawn(async move {
                gk.create_record(
                    json!({"proposer": {"name": format!("Proposer {i}")}}),
                    "manual_operator",
                )
                .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("create succeeds");
        }
        assert_eq!(gk.store().schema_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let gk = gatekeeper(MockStore::with_schema(premises_schema()));
        let payload = json!({"proposer": {"name": "Acme"}});
        gk.create_record(payload.clone(), "manual_operator")
            .await
            .expect("first create");
        gk.invalidate_schema().await;
        gk.create_record(payload, "manual_operator")
            .await
            .expect("second create");
        assert_eq!(gk.store().schema_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_active_schemas_is_not_found() {
        let gk = gatekeeper(MockStore::default());
        let err = gk
            .create_record(json!({"proposer": {"name": "Acme"}}), "manual_operator")
            .await
            .expect_err("no active schema");
        assert!(matches!(err, GatekeeperError::NotFound));
    }

    #[tokio::test]
    async fn multiple_active_schemas_fail_closed() {
        let doc = premises_schema().to_string();
        let store = MockStore {
            active_schemas: vec![(doc.clone(), "v1.0".into()), (doc, "v1.1".into())],
            ..Default::default()
        };
        let gk = gatekeeper(store);
        let err = gk
            .create_record(json!({"proposer": {"name": "Acme"}}), "manual_operator")
            .await
            .expect_err("two active rows");
        assert!(matches!(err, GatekeeperError::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn soft_deleted_records_look_absent() {
        // The store contract hides deleted rows; from the core's side that is
        // identical to the record never having existed.
        let gk = gatekeeper(MockStore::default());
        let err = gk
            .read_record("deleted-rec", "internal_user")
            .await
            .expect_err("hidden record");
        assert!(matches!(err, GatekeeperError::NotFound));
    }
}
