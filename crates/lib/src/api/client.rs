//! Remote chat service seam: the coordinator talks to the service only through `ChatApi`.

use async_trait::async_trait;

use super::protocol::{ChatRequest, ChatResponse, ClearRequest, ClearResponse};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response at all (connect failure, timeout, broken connection).
    #[error("chat service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx status whose body is not a chat reply.
    #[error("chat service returned {status}: {body}")]
    Status { status: u16, body: String },
    /// Non-2xx status whose body still parses as a chat reply.
    #[error("chat service rejected the request with {status}")]
    Rejected { status: u16, reply: ChatResponse },
    /// 2xx status with a body that is not the expected JSON.
    #[error("chat service sent an unreadable body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Chat reply carried by the failure, if the server sent one.
    pub fn reply(&self) -> Option<&ChatResponse> {
        match self {
            ApiError::Rejected { reply, .. } => Some(reply),
            _ => None,
        }
    }

    /// True when the server was never reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// Request contracts of the remote assistant service.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// POST /chat.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
    /// POST /chat/clear.
    async fn clear_history(&self, request: &ClearRequest) -> Result<ClearResponse, ApiError>;
    /// GET / ; Ok on any 2xx status.
    async fn health(&self) -> Result<(), ApiError>;
}
