//! Docchat - client for a "chat with your document" backend.
//!
//! Users upload a document, the backend indexes it, and the user converses
//! with an assistant grounded in that document. This crate is the client side
//! of that conversation:
//!
//! - `channel` keeps one authenticated WebSocket to the backend alive and
//!   turns its frames into typed events
//! - `store` holds sessions, documents and the message list, and applies
//!   streamed deltas to the message list
//! - `upload` validates and sends documents, then tracks processing progress
//! - `controller` ties the pieces together for one chat view
//!
//! REST calls go through the `api` module; every call and every channel
//! connection asks a `CredentialProvider` for fresh credentials.

pub mod api;
pub mod channel;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod models;
pub mod notice;
pub mod retry;
pub mod store;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Rejected, Result};
