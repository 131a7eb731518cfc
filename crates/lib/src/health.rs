//! Service availability probe and the transient notice it raises.
//!
//! The probe runs once per coordinator. A failed probe puts up a notice that a
//! single-shot timer takes down again; the timer belongs to the notice slot, so
//! replacing the notice or dropping the slot cancels it.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::api::{ApiError, ChatApi};

/// Result of probing the service root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// 2xx from `GET /`.
    Healthy,
    /// The service answered with a non-2xx status.
    Unavailable,
    /// The service could not be reached.
    Unreachable,
}

impl Health {
    pub fn is_healthy(self) -> bool {
        self == Health::Healthy
    }

    /// Text of the notice to show, if any.
    pub fn notice_text(self) -> Option<&'static str> {
        match self {
            Health::Healthy => None,
            Health::Unavailable => {
                Some("The chat service is currently unavailable. Please try again later.")
            }
            Health::Unreachable => {
                Some("Unable to connect to the chat service. Please check your connection.")
            }
        }
    }
}

/// `GET /` against the service; classifies the outcome.
pub async fn probe(api: &dyn ChatApi) -> Health {
    match api.health().await {
        Ok(()) => Health::Healthy,
        Err(ApiError::Transport(e)) => {
            log::warn!("health probe could not reach chat service: {}", e);
            Health::Unreachable
        }
        Err(e) => {
            log::warn!("health probe failed: {}", e);
            Health::Unavailable
        }
    }
}

/// A transient banner, independent of request state.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub text: String,
    pub raised_at: DateTime<Utc>,
}

/// Holds at most one notice and the timer that will dismiss it.
#[derive(Debug, Default)]
pub(crate) struct NoticeSlot {
    current: Option<Notice>,
    timer: Option<JoinHandle<()>>,
    next_id: u64,
}

impl NoticeSlot {
    pub(crate) fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    /// Replace any existing notice (cancelling its timer) and return the new notice id.
    /// The caller arms the dismiss timer for that id with `arm`.
    pub(crate) fn raise(&mut self, text: impl Into<String>) -> u64 {
        self.cancel_timer();
        self.next_id += 1;
        let id = self.next_id;
        self.current = Some(Notice {
            id,
            text: text.into(),
            raised_at: Utc::now(),
        });
        id
    }

    pub(crate) fn arm(&mut self, timer: JoinHandle<()>) {
        self.cancel_timer();
        self.timer = Some(timer);
    }

    /// Timer callback: remove the notice only if it is still the one the timer was armed for.
    pub(crate) fn expire(&mut self, id: u64) -> bool {
        match &self.current {
            Some(n) if n.id == id => {
                self.current = None;
                self.timer = None;
                true
            }
            _ => false,
        }
    }

    /// Take the notice down now and cancel its timer.
    pub(crate) fn dismiss(&mut self) -> bool {
        self.cancel_timer();
        self.current.take().is_some()
    }

    fn cancel_timer(&mut self) {
        if let Some(t) = self.timer.take() {
            t.abort();
        }
    }
}

impl Drop for NoticeSlot {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
