//! The query guard: a conservative syntactic denylist.
//!
//! Any query text containing a token that implies inference, comparison,
//! causation, recommendation, or prediction is rejected before any record is
//! touched. Matching is substring containment over the lowercased input, not
//! whole-word matching: the guard over-rejects rather than under-rejects, and
//! rejection can never be reversed by embedding a blocked query in a longer
//! string.

use serde::{Deserialize, Serialize};
use std::fs;

/// Built-in denylist. Extend-only: configuration may add tokens but can
/// never remove these.
pub const BUILTIN_DENYLIST: &[&str] = &[
    "why",
    "how",
    "compare",
    "risk",
    "should",
    "suggest",
    "recommend",
    "predict",
    "analyze",
    "analysis",
    "better",
    "worse",
];

/// Outcome of one guard evaluation. Ephemeral; folded into audit metadata on
/// rejection, never persisted on its own.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardDecision {
    pub admitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GuardConfig {
    /// Extra denylist tokens layered on top of the built-in list.
    #[serde(default)]
    pub extra_tokens: Vec<String>,
}

/// The shared guard consumed by both the field-query and chat entry points.
/// There is exactly one of these per process so the two surfaces can never
/// drift apart.
#[derive(Clone, Debug)]
pub struct GuardPolicy {
    tokens: Vec<String>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self::with_config(GuardConfig::default())
    }
}

impl GuardPolicy {
    pub fn with_config(cfg: GuardConfig) -> Self {
        let mut tokens: Vec<String> = BUILTIN_DENYLIST.iter().map(|t| t.to_string()).collect();
        for extra in cfg.extra_tokens {
            let token = extra.trim().to_lowercase();
            if !token.is_empty() && !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        Self { tokens }
    }

    /// Build the guard from the environment. `JADE_DENYLIST_FILE` may point
    /// at a JSON file with an `extra_tokens` array; anything unreadable falls
    /// back to the built-in list alone.
    pub fn load_from_env() -> Self {
        if let Ok(path) = std::env::var("JADE_DENYLIST_FILE") {
            match fs::read(&path) {
                Ok(bytes) => match serde_json::from_slice::<GuardConfig>(&bytes) {
                    Ok(cfg) => return Self::with_config(cfg),
                    Err(err) => {
                        tracing::warn!(%path, %err, "ignoring unparseable denylist file");
                    }
                },
                Err(err) => {
                    tracing::warn!(%path, %err, "ignoring unreadable denylist file");
                }
            }
        }
        Self::default()
    }

    /// Evaluate a field path or question text. Runs before any data access
    /// and sees only the query text, never resolved record data.
    pub fn evaluate(&self, text: &str) -> GuardDecision {
        let lowered = text.to_lowercase();
        for token in &self.tokens {
            if lowered.contains(token.as_str()) {
                return GuardDecision {
                    admitted: false,
                    matched_keyword: Some(token.clone()),
                };
            }
        }
        GuardDecision {
            admitted: true,
            matched_keyword: None,
        }
    }

    pub fn is_disallowed(&self, text: &str) -> bool {
        !self.evaluate(text).admitted
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "builtin": BUILTIN_DENYLIST,
            "tokens": self.tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_field_paths_are_admitted() {
        let guard = GuardPolicy::default();
        let decision = guard.evaluate("security.cctv.installed");
        assert!(decision.admitted);
        assert!(decision.matched_keyword.is_none());
    }

    #[test]
    fn inference_vocabulary_is_rejected() {
        let guard = GuardPolicy::default();
        for text in [
            "why.is.risk.high",
            "compare premises",
            "SHOULD we insure this",
            "claims analysis",
            "predict.losses",
        ] {
            assert!(guard.is_disallowed(text), "expected rejection for {text}");
        }
    }

    #[test]
    fn first_matching_token_is_reported() {
        let guard = GuardPolicy::default();
        let decision = guard.evaluate("why.is.risk.high");
        assert_eq!(decision.matched_keyword.as_deref(), Some("why"));
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let guard = GuardPolicy::default();
        // Over-rejection is intentional: "shower" contains "how".
        assert!(guard.is_disallowed("premises.shower.count"));
        assert!(guard.is_disallowed("RiskScore"));
    }

    #[test]
    fn rejection_survives_concatenation() {
        let guard = GuardPolicy::default();
        for token in BUILTIN_DENYLIST {
            let base = format!("claims.{token}");
            assert!(guard.is_disallowed(&base));
            assert!(guard.is_disallowed(&format!("{base}.with.trailing.segments")));
            assert!(guard.is_disallowed(&format!("prefix.{base}")));
        }
    }

    #[test]
    fn extra_tokens_extend_but_never_replace_builtins() {
        let guard = GuardPolicy::with_config(GuardConfig {
            extra_tokens: vec!["Estimate".into(), "why".into(), " ".into()],
        });
        assert!(guard.is_disallowed("estimate.of.value"));
        for token in BUILTIN_DENYLIST {
            assert!(guard.tokens().iter().any(|t| t == token));
        }
        // Duplicate and blank extras are dropped.
        assert_eq!(
            guard.tokens().len(),
            BUILTIN_DENYLIST.len() + 1,
            "expected exactly one extra token"
        );
    }
}
