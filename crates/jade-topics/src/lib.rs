//! Canonical event topic constants shared across the gatekeeper services.
//!
//! This crate centralizes the string constants used when publishing bus
//! events so the server and any future observers stay in sync. Keep the list
//! alphabetized within sections and favor dot.case names.

// Records
pub const TOPIC_RECORDS_CREATED: &str = "records.created";
pub const TOPIC_RECORDS_READ: &str = "records.read";
pub const TOPIC_RECORDS_REJECTED: &str = "records.rejected";

// Queries
pub const TOPIC_QUERIES_ANSWERED: &str = "queries.answered";
pub const TOPIC_QUERIES_CHAT_ANSWERED: &str = "queries.chat.answered";
pub const TOPIC_QUERIES_REJECTED: &str = "queries.rejected";

// Schema registry
pub const TOPIC_SCHEMA_RELOADED: &str = "schema.reloaded";

// Service lifecycle
pub const TOPIC_SERVICE_START: &str = "service.start";
pub const TOPIC_SERVICE_STOP: &str = "service.stop";
