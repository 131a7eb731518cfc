//! Wire types for the remote chat service (`POST /chat`, `POST /chat/clear`).

use serde::{Deserialize, Serialize};

/// `POST /chat` body: `{ "message", "session_id"? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// `POST /chat` reply: `{ "response", "success", "error"?, "session_id"? }`.
/// `success: false` is a failure even when `response` carries text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatResponse {
    /// Reply text, if the server sent any.
    pub fn text(&self) -> Option<&str> {
        non_blank(Some(&self.response))
    }

    /// Server-supplied error description, if any.
    pub fn error_text(&self) -> Option<&str> {
        non_blank(self.error.as_ref())
    }
}

/// `POST /chat/clear` body: `{ "session_id"? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// `POST /chat/clear` reply: `{ "success", "message"? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClearResponse {
    pub fn message_text(&self) -> Option<&str> {
        non_blank(self.message.as_ref())
    }
}

fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
}
