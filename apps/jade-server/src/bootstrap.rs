use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use jade_core::Gatekeeper;
use jade_events::Bus;
use jade_kernel::Kernel;
use jade_policy::GuardPolicy;
use tracing::info;

use crate::rephrase::Rephraser;
use crate::AppState;

pub fn bind_addr() -> SocketAddr {
    let host = std::env::var("JADE_BIND").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("JADE_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8091);
    format!("{host}:{port}")
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8091)))
}

fn state_dir() -> PathBuf {
    std::env::var("JADE_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("state"))
}

pub async fn build_state() -> Result<AppState> {
    let dir = state_dir();
    let kernel = Kernel::open(&dir).with_context(|| format!("open kernel in {}", dir.display()))?;
    seed_schema_if_requested(&kernel)?;

    let guard = GuardPolicy::load_from_env();
    info!(tokens = guard.tokens().len(), "query guard loaded");
    tracing::debug!(policy = %guard.snapshot(), "query guard tokens");
    let bus = Bus::new(256);
    let gatekeeper = Arc::new(Gatekeeper::new(kernel.clone(), guard, bus.clone()));
    let rephraser = Rephraser::from_env().map(Arc::new);
    if rephraser.is_some() {
        info!("rephrase collaborator enabled");
    }
    Ok(AppState::new(gatekeeper, kernel, bus, rephraser))
}

/// Optional first-run convenience: when `JADE_SCHEMA_FILE` is set and the
/// registry has no active row, load that document as the active schema.
/// Rotation beyond this is an external concern.
fn seed_schema_if_requested(kernel: &Kernel) -> Result<()> {
    let Ok(path) = std::env::var("JADE_SCHEMA_FILE") else {
        return Ok(());
    };
    if !kernel.fetch_active_schemas()?.is_empty() {
        return Ok(());
    }
    let document =
        std::fs::read_to_string(&path).with_context(|| format!("read schema file {path}"))?;
    let version = std::env::var("JADE_SCHEMA_VERSION").unwrap_or_else(|_| "v1.0".into());
    kernel.insert_schema_version(&version, &document, true)?;
    info!(%version, %path, "seeded active schema");
    Ok(())
}

/// Log every bus envelope with structured fields. Purely observational; the
/// durable trail is the kernel's audit ledger.
pub fn spawn_audit_tail(bus: Bus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(env) => {
                    info!(
                        target: "jade.audit",
                        kind = %env.kind,
                        actor = env.actor.as_deref().unwrap_or("-"),
                        payload = %env.payload,
                        "event"
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "audit tail lagged; events dropped from the tail only");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
