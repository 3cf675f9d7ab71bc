use anyhow::Result;
use async_trait::async_trait;
use jade_protocol::AuditAction;
use serde_json::Value;

/// Boundary to the external store. The core owns the policy pipeline; the
/// store owns persistence mechanics. Implementations must filter soft-deleted
/// rows out of `fetch_record` and keep `append_audit` strictly append-only.
#[async_trait]
pub trait GroundStore: Send + Sync {
    /// Fetch a record's data tree by id. `None` when the record does not
    /// exist or is soft-deleted.
    async fn fetch_record(&self, id: &str) -> Result<Option<Value>>;

    async fn insert_record(
        &self,
        id: &str,
        schema_version: &str,
        data: &Value,
        created_by: &str,
    ) -> Result<()>;

    /// All rows currently flagged active in the schema registry. The core
    /// enforces the exactly-one invariant; the store just reports.
    async fn fetch_active_schemas(&self) -> Result<Vec<(String, String)>>;

    async fn append_audit(
        &self,
        action: AuditAction,
        performed_by: &str,
        record_id: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<()>;
}
