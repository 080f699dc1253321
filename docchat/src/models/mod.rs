//! Data models for documents, sessions, messages and users.
//!
//! Field names follow the backend's JSON (`_id`, camelCase) through serde
//! attributes; the Rust side uses snake_case.

mod document;
mod message;
mod reference;
mod session;
mod user;

pub use document::{Document, DocumentStatus};
pub use message::{AssistantState, Message, MessageMetadata, MessageRole, MessageSource};
pub use reference::{Identified, Reference};
pub use session::{Session, SessionMetadata, SessionStatus};
pub use user::User;

use uuid::Uuid;

/// Generate a client-side id (`UUIDv7`, time-ordered) with a purpose prefix.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}
