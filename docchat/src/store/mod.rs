//! Client-side state: sessions, documents and the active message list.
//!
//! Stores are plain owned values mutated through `&mut self`. Every action
//! that talks to the backend follows the same shape: set `is_loading`, clear
//! `error`, make the call, then either apply the result or record a readable
//! error (and usually raise a notice) and return `Err(Rejected)`.

mod documents;
mod grouping;
mod messages;
mod sessions;

pub use documents::DocumentStore;
pub use grouping::{group_sessions, Bucket, SessionGroup};
pub use messages::MessageStore;
pub use sessions::SessionStore;

use tracing::warn;

use crate::error::{Error, Rejected};
use crate::notice::Notices;

/// Record a failed action and turn it into a `Rejected`.
pub(crate) fn reject(
    error_slot: &mut Option<String>,
    notices: Option<&Notices>,
    err: &Error,
    fallback: &str,
) -> Rejected {
    let message = err.user_message(fallback);
    warn!("{}: {}", fallback, message);
    if let Some(notices) = notices {
        notices.error(message.clone());
    }
    *error_slot = Some(message.clone());
    Rejected(message)
}
