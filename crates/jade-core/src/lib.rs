//! Policy-enforcement core of the JADE gatekeeper.
//!
//! The gatekeeper admits only pre-approved, non-inferential factual queries
//! against schema-validated records. Every admitted and rejected action is
//! written to the audit store before the outcome is surfaced; the query guard
//! runs before any record is fetched so record contents can never influence
//! (or leak through) a rejection.

mod chat;
mod error;
mod gatekeeper;
mod schema_cache;
mod store;

pub use chat::{field_for_question, normalize_question, QUESTION_FIELD_MAP};
pub use error::GatekeeperError;
pub use gatekeeper::{ChatOutcome, Gatekeeper};
pub use schema_cache::SchemaCache;
pub use store::GroundStore;

/// Actor recorded for policy decisions the system makes on its own behalf
/// (for example rejecting an invalid record payload).
pub const SYSTEM_ACTOR: &str = "system";
