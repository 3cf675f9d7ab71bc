//! Wire-level types shared by the gatekeeper server and its clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Fixed answer text rendered for the `NOT_AVAILABLE` sentinel. The API layer
/// deliberately does not reveal *why* information is absent.
pub const NOT_AVAILABLE_TEXT: &str = "Information not available";

/// Fixed answer text for unsupported or rejected chat questions. Never names
/// the keyword that triggered a rejection.
pub const UNSUPPORTED_TEXT: &str = "Query type not supported";

/// RFC7807-style error payload used at service edges.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: Option<String>,
}

/// Audit action tags. One entry per triggering event; stored as
/// SCREAMING_SNAKE strings in the `audit_logs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateRecord,
    ReadRecord,
    QueryRecord,
    ChatQuery,
    RejectedQuery,
    RejectedRecord,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateRecord => "CREATE_RECORD",
            AuditAction::ReadRecord => "READ_RECORD",
            AuditAction::QueryRecord => "QUERY_RECORD",
            AuditAction::ChatQuery => "CHAT_QUERY",
            AuditAction::RejectedQuery => "REJECTED_QUERY",
            AuditAction::RejectedRecord => "REJECTED_RECORD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE_RECORD" => Some(AuditAction::CreateRecord),
            "READ_RECORD" => Some(AuditAction::ReadRecord),
            "QUERY_RECORD" => Some(AuditAction::QueryRecord),
            "CHAT_QUERY" => Some(AuditAction::ChatQuery),
            "REJECTED_QUERY" => Some(AuditAction::RejectedQuery),
            "REJECTED_RECORD" => Some(AuditAction::RejectedRecord),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the append-only audit ledger as exposed over the API.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct AuditEntry {
    pub id: i64,
    pub time: String,
    pub record_id: Option<String>,
    pub action: String,
    pub performed_by: String,
    pub metadata: Option<Value>,
    pub entry_hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, utoipa::ToSchema)]
pub struct CreateRecordResponse {
    pub record_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, utoipa::ToSchema)]
pub struct RecordResponse {
    pub record_id: String,
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, utoipa::ToSchema)]
pub struct QueryRequest {
    pub record_id: Option<String>,
    pub field: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, utoipa::ToSchema)]
pub struct QueryResponse {
    pub record_id: String,
    pub field: String,
    pub answer: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, utoipa::ToSchema)]
pub struct ChatRequest {
    pub record_id: Option<String>,
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema, utoipa::ToSchema)]
pub struct ChatResponse {
    pub record_id: String,
    pub question: String,
    pub answer: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_action_tags_round_trip() {
        for action in [
            AuditAction::CreateRecord,
            AuditAction::ReadRecord,
            AuditAction::QueryRecord,
            AuditAction::ChatQuery,
            AuditAction::RejectedQuery,
            AuditAction::RejectedRecord,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("NOT_A_TAG"), None);
    }

    #[test]
    fn audit_action_serializes_as_screaming_snake() {
        let v = serde_json::to_value(AuditAction::RejectedQuery).unwrap();
        assert_eq!(v, serde_json::json!("REJECTED_QUERY"));
    }
}
