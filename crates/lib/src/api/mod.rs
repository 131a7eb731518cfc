//! Remote chat service: request contracts and the HTTP client.

mod client;
mod http;
mod protocol;

pub use client::{ApiError, ChatApi};
pub use http::HttpChatApi;
pub use protocol::{ChatRequest, ChatResponse, ClearRequest, ClearResponse};
