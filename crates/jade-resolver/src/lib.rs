//! Deterministic field-path resolution over record data.
//!
//! A field path is a dot-delimited sequence of keys (`security.cctv.installed`).
//! Literal dots in keys are not escapable; that is a documented limitation of
//! the path grammar, not something to paper over here.
//!
//! `resolve` is pure: no I/O, no logging, no panics. Every failure mode maps
//! to the same `NotAvailable` sentinel so the API layer cannot leak *why* a
//! value is absent (missing vs. masked vs. null are indistinguishable).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Literal masking token. A stored value equal to this string is reported as
/// not available, indistinguishable from genuine absence.
pub const MASKED_TOKEN: &str = "MASKED";

/// Result of one resolution: a concrete JSON value, or the sentinel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResolvedValue {
    Value(Value),
    NotAvailable,
}

impl ResolvedValue {
    pub fn is_available(&self) -> bool {
        matches!(self, ResolvedValue::Value(_))
    }

    /// Render for the API layer: the value itself, or the fixed sentinel
    /// text supplied by the caller.
    pub fn into_answer(self, not_available_text: &str) -> Value {
        match self {
            ResolvedValue::Value(v) => v,
            ResolvedValue::NotAvailable => Value::String(not_available_text.to_string()),
        }
    }
}

/// Walk `data` along `field_path`, one segment at a time. Each step requires
/// the current node to be a map holding the segment as an exact key; any
/// failure returns `NotAvailable` immediately. After a successful walk the
/// masking rules apply in fixed order: null, the `"MASKED"` token, then the
/// empty sequence.
pub fn resolve(data: &Value, field_path: &str) -> ResolvedValue {
    let mut current = data;
    for segment in field_path.split('.') {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return ResolvedValue::NotAvailable,
            },
            _ => return ResolvedValue::NotAvailable,
        }
    }

    match current {
        Value::Null => ResolvedValue::NotAvailable,
        Value::String(s) if s == MASKED_TOKEN => ResolvedValue::NotAvailable,
        Value::Array(items) if items.is_empty() => ResolvedValue::NotAvailable,
        other => ResolvedValue::Value(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn premises() -> Value {
        json!({
            "proposer": {"name": "Acme Warehousing", "tax_id": "MASKED"},
            "security": {
                "cctv": {"installed": true, "camera_count": 12},
                "guards": {"present": false},
                "alarms": []
            },
            "claims_history": {"has_claims": null, "items": [{"year": 2021}]}
        })
    }

    #[test]
    fn resolves_nested_scalar() {
        assert_eq!(
            resolve(&premises(), "security.cctv.installed"),
            ResolvedValue::Value(json!(true))
        );
    }

    #[test]
    fn table_of_sentinel_cases() {
        let data = premises();
        let cases = [
            // missing leaf key
            "security.cctv.resolution",
            // missing intermediate segment
            "security.perimeter.fence",
            // non-container mid-path
            "proposer.name.first",
            // null value
            "claims_history.has_claims",
            // masked value
            "proposer.tax_id",
            // empty sequence
            "security.alarms",
        ];
        for path in cases {
            assert_eq!(
                resolve(&data, path),
                ResolvedValue::NotAvailable,
                "path {path} should resolve to the sentinel"
            );
        }
    }

    #[test]
    fn non_empty_sequences_and_maps_return_verbatim() {
        let data = premises();
        assert_eq!(
            resolve(&data, "claims_history.items"),
            ResolvedValue::Value(json!([{"year": 2021}]))
        );
        assert_eq!(
            resolve(&data, "security.guards"),
            ResolvedValue::Value(json!({"present": false}))
        );
    }

    #[test]
    fn key_matching_is_exact() {
        let data = premises();
        assert_eq!(resolve(&data, "Security.cctv.installed"), ResolvedValue::NotAvailable);
        assert_eq!(resolve(&data, "security.CCTV.installed"), ResolvedValue::NotAvailable);
    }

    #[test]
    fn masked_only_matches_the_exact_token() {
        let data = json!({"a": "masked", "b": "MASKED "});
        assert_eq!(resolve(&data, "a"), ResolvedValue::Value(json!("masked")));
        assert_eq!(resolve(&data, "b"), ResolvedValue::Value(json!("MASKED ")));
    }

    #[test]
    fn resolve_is_idempotent_and_leaves_data_untouched() {
        let data = premises();
        let before = data.clone();
        let first = resolve(&data, "security.cctv.camera_count");
        let second = resolve(&data, "security.cctv.camera_count");
        assert_eq!(first, second);
        assert_eq!(data, before);
    }

    #[test]
    fn degenerate_paths_return_sentinel_not_panic() {
        let data = premises();
        for path in ["", ".", "..", "security..cctv", ".security"] {
            let _ = resolve(&data, path);
        }
        assert_eq!(resolve(&data, ""), ResolvedValue::NotAvailable);
        assert_eq!(resolve(&json!(null), "a"), ResolvedValue::NotAvailable);
        assert_eq!(resolve(&json!([1, 2]), "0"), ResolvedValue::NotAvailable);
    }

    #[test]
    fn into_answer_substitutes_fixed_text() {
        let text = "Information not available";
        assert_eq!(
            ResolvedValue::NotAvailable.into_answer(text),
            json!("Information not available")
        );
        assert_eq!(ResolvedValue::Value(json!(3)).into_answer(text), json!(3));
        assert!(ResolvedValue::Value(json!(3)).is_available());
        assert!(!ResolvedValue::NotAvailable.is_available());
    }
}
