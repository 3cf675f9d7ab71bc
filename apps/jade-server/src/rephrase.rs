use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use jade_protocol::NOT_AVAILABLE_TEXT;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The rephraser may only restate an already-approved answer. It never sees
/// raw record data and must not add information.
const SYSTEM_PROMPT: &str = "\
You are a controlled language assistant.

RULES:
- You MUST NOT add new information
- You MUST NOT infer or explain
- You MUST NOT answer WHY or HOW
- You MUST NOT speculate

If the input is \"Information not available\",
return EXACTLY:
Information not available

Otherwise, rephrase the input in a neutral, factual tone.";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// UI-facing rephrase collaborator backed by a local `ollama` subprocess.
/// Strictly time-bounded; any failure falls back to the approved input text,
/// which is always safe to return verbatim.
pub struct Rephraser {
    model: String,
    timeout: Duration,
}

impl Rephraser {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Enabled with `JADE_REPHRASE=1`; `JADE_REPHRASE_MODEL` and
    /// `JADE_REPHRASE_TIMEOUT_SECS` tune it.
    pub fn from_env() -> Option<Self> {
        if std::env::var("JADE_REPHRASE").as_deref() != Ok("1") {
            return None;
        }
        let model = std::env::var("JADE_REPHRASE_MODEL").unwrap_or_else(|_| "mistral".into());
        let timeout = std::env::var("JADE_REPHRASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(Self::new(model, Duration::from_secs(timeout)))
    }

    /// Rephrase an already-approved answer. The "not available" sentinel
    /// passes through untouched so the rewriter cannot embellish absence.
    pub async fn rephrase(&self, approved: &str) -> String {
        if approved == NOT_AVAILABLE_TEXT {
            return approved.to_string();
        }
        match tokio::time::timeout(self.timeout, self.run(approved)).await {
            Ok(Ok(out)) if !out.trim().is_empty() => out.trim().to_string(),
            Ok(Ok(_)) => {
                tracing::warn!("rephraser returned empty output; using approved text");
                approved.to_string()
            }
            Ok(Err(err)) => {
                tracing::warn!(%err, "rephraser failed; using approved text");
                approved.to_string()
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "rephraser timed out; using approved text");
                approved.to_string()
            }
        }
    }

    async fn run(&self, approved: &str) -> Result<String> {
        let prompt = format!("{SYSTEM_PROMPT}\n\nInput:\n{approved}\n\nOutput:\n");
        let mut child = Command::new("ollama")
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawn ollama")?;
        let mut stdin = child.stdin.take().context("ollama stdin")?;
        stdin.write_all(prompt.as_bytes()).await?;
        drop(stdin);
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!("ollama exited with {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sentinel_passes_through_without_spawning() {
        let rephraser = Rephraser::new("no-such-model".into(), Duration::from_millis(10));
        assert_eq!(
            rephraser.rephrase(NOT_AVAILABLE_TEXT).await,
            NOT_AVAILABLE_TEXT
        );
    }

    #[tokio::test]
    async fn failure_falls_back_to_approved_text() {
        // The binary is absent in test environments; the approved text must
        // come back unchanged rather than an error.
        let rephraser = Rephraser::new("no-such-model".into(), Duration::from_millis(200));
        assert_eq!(rephraser.rephrase("true").await, "true");
    }
}
