//! References that the backend sends either as a bare id or populated.

use serde::{Deserialize, Serialize};

/// Anything with a backend id.
pub trait Identified {
    /// The backend id.
    fn id(&self) -> &str;
}

/// A reference to another record: just its id, or the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    /// Only the id was sent.
    Id(String),
    /// The record was populated in place.
    Expanded(Box<T>),
}

impl<T: Identified> Reference<T> {
    /// Id of the referenced record, whichever form it came in.
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Expanded(record) => record.id(),
        }
    }

    /// The populated record, if the backend expanded it.
    pub fn expanded(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Expanded(record) => Some(record),
        }
    }
}
