//! Schema compilation and deterministic payload validation.
//!
//! The registry stores one active JSON Schema document; this crate turns it
//! into a reusable validator and enforces the tie-break rule for validation
//! errors: when a payload violates the schema in several places, the reported
//! error is the one whose instance path sorts first. Identical invalid
//! payloads therefore always produce identical rejection audit records.

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("stored schema document is not valid JSON: {0}")]
    InvalidDocument(String),
    #[error("schema document is not a structurally valid JSON Schema: {0}")]
    InvalidSchema(String),
}

/// Payload violates the active schema. Carries exactly one deterministic
/// message.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationFailed(pub String);

/// A compiled validator plus the version identifier of the document it was
/// built from. Compilation fails fast; a `CompiledSchema` never errors on
/// first use.
pub struct CompiledSchema {
    version: String,
    validator: Validator,
}

impl CompiledSchema {
    /// Parse and compile a stored schema document.
    pub fn compile(document: &str, version: &str) -> Result<Self, SchemaError> {
        let parsed: Value = serde_json::from_str(document)
            .map_err(|err| SchemaError::InvalidDocument(err.to_string()))?;
        Self::compile_value(&parsed, version)
    }

    pub fn compile_value(document: &Value, version: &str) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(document)
            .map_err(|err| SchemaError::InvalidSchema(err.to_string()))?;
        Ok(Self {
            version: version.to_string(),
            validator,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Validate a candidate record payload. On failure, the single reported
    /// message is the violation whose instance path sorts first
    /// (lexicographically, ties broken by message text).
    pub fn validate(&self, payload: &Value) -> Result<(), ValidationFailed> {
        let mut issues: Vec<(String, String)> = self
            .validator
            .iter_errors(payload)
            .map(|e| (e.instance_path.to_string(), e.to_string()))
            .collect();
        if issues.is_empty() {
            return Ok(());
        }
        issues.sort();
        Err(ValidationFailed(issues.remove(0).1))
    }
}
