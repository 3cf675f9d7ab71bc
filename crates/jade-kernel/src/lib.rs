//! SQLite persistence for the JADE gatekeeper.
//!
//! Three tables: `records` (immutable after insert, soft-deletable),
//! `schema_versions` (exactly one active row is the invariant enforced by the
//! core), and `audit_logs` (append-only, hash-chained for tamper evidence).
//! Sync methods open one connection per logical operation; `*_async` wrappers
//! move the blocking work onto the tokio blocking pool.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use jade_protocol::{AuditAction, AuditEntry};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::Digest as _;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct Kernel {
    db_path: PathBuf,
}

impl Kernel {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("jade.sqlite");
        let need_init = !db_path.exists();
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Busy timeout (default 5000ms; override with JADE_SQLITE_BUSY_MS)
        let busy_ms: u64 = std::env::var("JADE_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        conn.busy_timeout(std::time::Duration::from_millis(busy_ms))?;
        if need_init {
            Self::init_schema(&conn)?;
        }
        Ok(Self { db_path })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
              id TEXT PRIMARY KEY,
              schema_version TEXT NOT NULL,
              data TEXT NOT NULL,
              created_by TEXT NOT NULL,
              is_deleted INTEGER NOT NULL DEFAULT 0,
              created TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS schema_versions (
              version TEXT PRIMARY KEY,
              schema_document TEXT NOT NULL,
              is_active INTEGER NOT NULL DEFAULT 0,
              created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_schema_active ON schema_versions(is_active);

            -- Append-only policy ledger. prev_hash/entry_hash chain each row
            -- to its predecessor; rows are never updated or deleted.
            CREATE TABLE IF NOT EXISTS audit_logs (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              time TEXT NOT NULL,
              record_id TEXT,
              action TEXT NOT NULL,
              performed_by TEXT NOT NULL,
              metadata TEXT,
              prev_hash TEXT NOT NULL,
              entry_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_logs(action);
            CREATE INDEX IF NOT EXISTS idx_audit_record ON audit_logs(record_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ----- records -----

    pub fn insert_record(
        &self,
        id: &str,
        schema_version: &str,
        data: &Value,
        created_by: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        conn.execute(
            "INSERT INTO records(id,schema_version,data,created_by,is_deleted,created) VALUES(?,?,?,?,0,?)",
            params![id, schema_version, data.to_string(), created_by, now],
        )?;
        Ok(())
    }

    /// Fetch a record's data tree. Soft-deleted rows are filtered here so no
    /// caller can observe them.
    pub fn fetch_record(&self, id: &str) -> Result<Option<Value>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT data FROM records WHERE id=? AND is_deleted=0 LIMIT 1")?;
        let data_s: Option<String> = stmt.query_row([id], |row| row.get(0)).optional()?;
        match data_s {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Soft-delete. The row stays for the audit trail's sake but every fetch
    /// path excludes it.
    pub fn set_record_deleted(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute("UPDATE records SET is_deleted=1 WHERE id=?", params![id])?;
        Ok(n > 0)
    }

    // ----- schema registry -----

    pub fn insert_schema_version(&self, version: &str, document: &str, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        conn.execute(
            "INSERT INTO schema_versions(version,schema_document,is_active,created) VALUES(?,?,?,?)",
            params![version, document, active as i64, now],
        )?;
        Ok(())
    }

    /// Activate one version and deactivate every other row in the same
    /// transaction, so readers can never observe two active rows from this
    /// path. Activating an unknown version rolls back and leaves the
    /// registry untouched.
    pub fn activate_schema_version(&self, version: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE schema_versions SET is_active=0", [])?;
        let n = tx.execute(
            "UPDATE schema_versions SET is_active=1 WHERE version=?",
            params![version],
        )?;
        if n == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    /// Every active row. The exactly-one invariant is enforced by the core,
    /// which treats anything other than a single row as a failure.
    pub fn fetch_active_schemas(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT schema_document, version FROM schema_versions WHERE is_active=1 ORDER BY version",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((row.get::<_, String>(0)?, row.get::<_, String>(1)?));
        }
        Ok(out)
    }

    // ----- audit ledger -----

    /// Append one audit entry, chained to its predecessor. The read of the
    /// previous hash and the insert happen in one transaction so concurrent
    /// appends cannot fork the chain.
    pub fn append_audit(
        &self,
        action: AuditAction,
        performed_by: &str,
        record_id: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let prev_hash: String = tx
            .query_row(
                "SELECT entry_hash FROM audit_logs ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_default();
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let metadata_s = metadata.map(|v| v.to_string());
        let entry_hash = chain_hash(
            &prev_hash,
            &now,
            record_id,
            action.as_str(),
            performed_by,
            metadata_s.as_deref(),
        );
        tx.execute(
            "INSERT INTO audit_logs(time,record_id,action,performed_by,metadata,prev_hash,entry_hash) VALUES(?,?,?,?,?,?,?)",
            params![
                now,
                record_id,
                action.as_str(),
                performed_by,
                metadata_s,
                prev_hash,
                entry_hash
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id,time,record_id,action,performed_by,metadata,entry_hash FROM audit_logs ORDER BY id DESC LIMIT ?",
        )?;
        let mut rows = stmt.query([limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let metadata_s: Option<String> = row.get(5)?;
            out.push(AuditEntry {
                id: row.get(0)?,
                time: row.get(1)?,
                record_id: row.get(2)?,
                action: row.get(3)?,
                performed_by: row.get(4)?,
                metadata: metadata_s.and_then(|s| serde_json::from_str(&s).ok()),
                entry_hash: row.get(6)?,
            });
        }
        out.reverse();
        Ok(out)
    }

    /// Recompute the hash chain from the first row. Any edited, removed, or
    /// reordered row breaks the recomputation.
    pub fn verify_audit_chain(&self) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT time,record_id,action,performed_by,metadata,prev_hash,entry_hash FROM audit_logs ORDER BY id ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut expected_prev = String::new();
        while let Some(row) = rows.next()? {
            let time: String = row.get(0)?;
            let record_id: Option<String> = row.get(1)?;
            let action: String = row.get(2)?;
            let performed_by: String = row.get(3)?;
            let metadata: Option<String> = row.get(4)?;
            let prev_hash: String = row.get(5)?;
            let entry_hash: String = row.get(6)?;
            if prev_hash != expected_prev {
                return Ok(false);
            }
            let recomputed = chain_hash(
                &prev_hash,
                &time,
                record_id.as_deref(),
                &action,
                &performed_by,
                metadata.as_deref(),
            );
            if recomputed != entry_hash {
                return Ok(false);
            }
            expected_prev = entry_hash;
        }
        Ok(true)
    }

    // ----- async wrappers -----

    pub async fn fetch_record_async(&self, id: &str) -> Result<Option<Value>> {
        let k = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || k.fetch_record(&id))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn insert_record_async(
        &self,
        id: &str,
        schema_version: &str,
        data: &Value,
        created_by: &str,
    ) -> Result<()> {
        let k = self.clone();
        let id = id.to_string();
        let schema_version = schema_version.to_string();
        let data = data.clone();
        let created_by = created_by.to_string();
        tokio::task::spawn_blocking(move || {
            k.insert_record(&id, &schema_version, &data, &created_by)
        })
        .await
        .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn fetch_active_schemas_async(&self) -> Result<Vec<(String, String)>> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.fetch_active_schemas())
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn append_audit_async(
        &self,
        action: AuditAction,
        performed_by: &str,
        record_id: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<i64> {
        let k = self.clone();
        let performed_by = performed_by.to_string();
        let record_id = record_id.map(|s| s.to_string());
        let metadata = metadata.cloned();
        tokio::task::spawn_blocking(move || {
            k.append_audit(action, &performed_by, record_id.as_deref(), metadata.as_ref())
        })
        .await
        .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn recent_audit_async(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.recent_audit(limit))
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }

    pub async fn verify_audit_chain_async(&self) -> Result<bool> {
        let k = self.clone();
        tokio::task::spawn_blocking(move || k.verify_audit_chain())
            .await
            .map_err(|e| anyhow!("join error: {}", e))?
    }
}

fn chain_hash(
    prev_hash: &str,
    time: &str,
    record_id: Option<&str>,
    action: &str,
    performed_by: &str,
    metadata: Option<&str>,
) -> String {
    let mut h = sha2::Sha256::new();
    h.update(prev_hash.as_bytes());
    h.update(b"\x1f");
    h.update(time.as_bytes());
    h.update(b"\x1f");
    h.update(record_id.unwrap_or("").as_bytes());
    h.update(b"\x1f");
    h.update(action.as_bytes());
    h.update(b"\x1f");
    h.update(performed_by.as_bytes());
    h.update(b"\x1f");
    h.update(metadata.unwrap_or("").as_bytes());
    format!("{:x}", h.finalize())
}

#[async_trait]
impl jade_core::GroundStore for Kernel {
    async fn fetch_record(&self, id: &str) -> Result<Option<Value>> {
        self.fetch_record_async(id).await
    }

    async fn insert_record(
        &self,
        id: &str,
        schema_version: &str,
        data: &Value,
        created_by: &str,
    ) -> Result<()> {
        self.insert_record_async(id, schema_version, data, created_by)
            .await
    }

    async fn fetch_active_schemas(&self) -> Result<Vec<(String, String)>> {
        self.fetch_active_schemas_async().await
    }

    async fn append_audit(
        &self,
        action: AuditAction,
        performed_by: &str,
        record_id: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<()> {
        self.append_audit_async(action, performed_by, record_id, metadata)
            .await
            .map(|_| ())
    }
}
