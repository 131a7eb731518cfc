//! HTTP client for the chat service (http://localhost:8000/api by default).
//! JSON bodies; the session id travels in the body and, redundantly, in `X-Session-ID`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::client::{ApiError, ChatApi};
use super::protocol::{ChatRequest, ChatResponse, ClearRequest, ClearResponse};
use crate::config::{self, Config};

const SESSION_HEADER: &str = "X-Session-ID";

/// Client for the chat service HTTP API.
#[derive(Clone)]
pub struct HttpChatApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChatApi {
    /// Client with the given base URL (trailing slash dropped) and per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    /// Client configured from `api` settings (CHATLINE_API_URL wins over the file).
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config::resolve_api_base_url(config), config.api.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str, session_id: Option<&str>) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.post(&url);
        match session_id {
            Some(id) => req.header(SESSION_HEADER, id),
            None => req,
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        log::debug!("POST /chat (session: {})", request.session_id.is_some());
        let res = self
            .post("/chat", request.session_id.as_deref())
            .json(request)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            // A failing status may still carry a composed reply and a fresh session id.
            return Err(match serde_json::from_str::<ChatResponse>(&body) {
                Ok(reply)
                    if reply.text().is_some()
                        || reply.error_text().is_some()
                        || reply.session_id.is_some() =>
                {
                    ApiError::Rejected {
                        status: status.as_u16(),
                        reply,
                    }
                }
                _ => ApiError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }
        parse_body(&body)
    }

    async fn clear_history(&self, request: &ClearRequest) -> Result<ClearResponse, ApiError> {
        log::debug!("POST /chat/clear (session: {})", request.session_id.is_some());
        let res = self
            .post("/chat/clear", request.session_id.as_deref())
            .json(request)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_body(&body)
    }

    async fn health(&self) -> Result<(), ApiError> {
        let url = format!("{}/", self.base_url);
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
