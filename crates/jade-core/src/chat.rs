//! The fixed, closed mapping from recognized chat questions to field paths.
//!
//! The chat surface performs no language understanding: a question either
//! matches one of these normalized strings exactly or it is unsupported.
//! Unmapped questions fail closed without touching the guard or the store.

/// Normalized question text to field path. Closed by design; extending this
/// table is a policy change, not a runtime concern.
pub const QUESTION_FIELD_MAP: &[(&str, &str)] = &[
    ("is cctv installed", "security.cctv.installed"),
    ("does the premises have cctv", "security.cctv.installed"),
    ("are security guards present", "security.guards.present"),
    ("has there been any claims", "claims_history.has_claims"),
];

/// Trim and lowercase, the only normalization the chat surface performs.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

pub fn field_for_question(normalized: &str) -> Option<&'static str> {
    QUESTION_FIELD_MAP
        .iter()
        .find(|(question, _)| *question == normalized)
        .map(|(_, field)| *field)
}
