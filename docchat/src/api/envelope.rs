//! The `{ data, message, status, success }` envelope every REST response uses.

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_success() -> bool {
    true
}

/// Raw response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default = "default_success")]
    pub success: bool,
}

/// Payload of a successful call plus the server's message for notices.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub data: T,
    pub message: Option<String>,
}

impl<T> Reply<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The server message, or `fallback` when it sent none.
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

impl<T> ApiResponse<T> {
    /// Fail on `success: false`.
    fn check(&self, http_status: u16) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(Error::Api {
                status: self.status.unwrap_or(http_status),
                message: self.message.clone().unwrap_or_default(),
            })
        }
    }

    /// Unwrap an envelope that must carry data.
    pub fn into_reply(self, http_status: u16) -> Result<Reply<T>> {
        self.check(http_status)?;
        match self.data {
            Some(data) => Ok(Reply {
                data,
                message: self.message,
            }),
            None => Err(Error::Api {
                status: http_status,
                message: "Response carried no data".to_string(),
            }),
        }
    }

    /// Unwrap an envelope whose data is irrelevant (deletes).
    pub fn into_message(self, http_status: u16) -> Result<Option<String>> {
        self.check(http_status)?;
        Ok(self.message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::models::Session;
    use crate::testing::session_json;

    #[test]
    fn unwraps_data_and_message() {
        let envelope: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"data": [1, 2], "message": "ok", "status": 200, "success": true}"#)
                .unwrap();
        let reply = envelope.into_reply(200).unwrap();
        assert_eq!(reply.data, vec![1, 2]);
        assert_eq!(reply.message_or("fallback"), "ok");
    }

    #[test]
    fn decodes_payloads_without_a_default() {
        let body = json!({
            "data": session_json("s1", "d1", "2026-10-01T10:00:00Z"),
            "message": "Session created successfully",
        });
        let envelope: ApiResponse<Session> = serde_json::from_value(body).unwrap();
        let reply = envelope.into_reply(201).unwrap();
        assert_eq!(reply.data.id, "s1");
        assert_eq!(reply.data.document_id(), "d1");

        let missing: ApiResponse<Session> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(missing.into_reply(200).is_err());
    }

    #[test]
    fn success_false_is_an_error_with_the_server_message() {
        let envelope: ApiResponse<Value> =
            serde_json::from_str(r#"{"data": null, "message": "Document not indexed", "success": false}"#)
                .unwrap();
        match envelope.into_reply(200) {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "Document not indexed");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_success_defaults_to_true() {
        let envelope: ApiResponse<Value> = serde_json::from_str(r#"{"message": "Deleted"}"#).unwrap();
        assert_eq!(envelope.into_message(200).unwrap().as_deref(), Some("Deleted"));

        let empty: ApiResponse<Value> = serde_json::from_str("{}").unwrap();
        assert!(empty.into_reply(200).is_err());
    }
}
