use std::sync::Arc;

use jade_schema::{CompiledSchema, SchemaError};
use tokio::sync::Mutex;

use crate::{GatekeeperError, GroundStore};

/// Process-wide cache for the compiled active schema.
///
/// The first load is single-flight: the mutex is held across the registry
/// fetch and compile, so concurrent first access performs exactly one load
/// and can never install two divergent validators. `invalidate` clears the
/// slot for schema rotation; there is no automatic expiry.
#[derive(Default)]
pub struct SchemaCache {
    slot: Mutex<Option<Arc<CompiledSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load<S: GroundStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Arc<CompiledSchema>, GatekeeperError> {
        let mut slot = self.slot.lock().await;
        if let Some(schema) = slot.as_ref() {
            return Ok(schema.clone());
        }
        let schema = Arc::new(load_active_schema(store).await?);
        *slot = Some(schema.clone());
        Ok(schema)
    }

    /// Drop the cached validator. The next use reloads from the registry.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

/// Load and compile the single active schema. Zero active rows is `NotFound`;
/// more than one is a consistency violation and fails closed as
/// `InvalidSchema` rather than being silently resolved.
async fn load_active_schema<S: GroundStore + ?Sized>(
    store: &S,
) -> Result<CompiledSchema, GatekeeperError> {
    let mut rows = store
        .fetch_active_schemas()
        .await
        .map_err(GatekeeperError::infra)?;
    match rows.len() {
        0 => Err(GatekeeperError::NotFound),
        1 => {
            let (document, version) = rows.remove(0);
            CompiledSchema::compile(&document, &version).map_err(|err| match err {
                SchemaError::InvalidDocument(msg) | SchemaError::InvalidSchema(msg) => {
                    GatekeeperError::InvalidSchema(msg)
                }
            })
        }
        n => Err(GatekeeperError::InvalidSchema(format!(
            "{n} schema rows are flagged active; exactly one is required"
        ))),
    }
}
