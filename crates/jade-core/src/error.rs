use thiserror::Error;

/// Error taxonomy of the gatekeeper core.
///
/// Policy-relevant failures (`ValidationFailed`, `QueryRejected`) are audited
/// before they surface. `Infrastructure` failures propagate immediately and
/// are logged outside the audit trail; the audit trail records policy events,
/// not operational faults.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// Record or active schema absent. Surfaced as a not-found response.
    #[error("not found")]
    NotFound,
    /// Payload violates the active schema. Carries the single deterministic
    /// message selected by the payload validator.
    #[error("{0}")]
    ValidationFailed(String),
    /// Guard denylist match or unmapped chat question. The surfaced message
    /// never names the keyword that triggered rejection.
    #[error("Query type not supported")]
    QueryRejected,
    /// Missing or unusable request parameters. No audit entry; no policy
    /// decision was made.
    #[error("{0}")]
    MalformedRequest(String),
    /// The schema registry is in an unusable state: unparseable document,
    /// structurally invalid schema, or more than one active row.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Store unreachable, audit write failure, and similar faults. Not
    /// user-recoverable; surfaced as a generic failure.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl GatekeeperError {
    pub(crate) fn infra(err: anyhow::Error) -> Self {
        GatekeeperError::Infrastructure(err.to_string())
    }
}
