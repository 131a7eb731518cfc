//! Request coordinator: the conversational session controller behind the chat widget.
//!
//! `send`, `retry` and `clear` do their synchronous part (optimistic timeline update,
//! pending flag) before returning and spawn the network half on the current tokio
//! runtime. The returned [`Dispatch`] resolves once the response has been applied;
//! dropping it detaches the work. Outside a runtime the network half runs when the
//! dispatch is awaited. A `None` return means the action was a no-op.
//!
//! Sends are serialized through a single slot: a send while another is pending is
//! rejected, so replies always land in submission order. Clear has its own slot and may
//! overlap a pending send; a reply that resolves after a clear lands on the new timeline.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::api::{ApiError, ChatApi, ChatRequest, ChatResponse, ClearRequest, ClearResponse};
use crate::config::{Config, UiConfig};
use crate::health::{self, Health, Notice, NoticeSlot};
use crate::session::{FileSessionStore, SessionContext};
use crate::timeline::{Message, MessageTimeline};

/// Timeline text when the service could not be reached or gave no explanation.
pub const SEND_FALLBACK: &str = "Failed to communicate with the chat service. Please try again.";
/// Request-state text for a failed send without a server-supplied error.
pub const SEND_FAILED: &str = "Failed to send message. Please try again.";
pub const CLEAR_FAILED: &str = "Failed to clear chat history. Please try again.";
pub const NOTHING_TO_RETRY: &str = "No previous message to retry";

const EVENT_CAPACITY: usize = 64;

/// Network half of an action; resolves once the response has been applied.
pub type Dispatch = BoxFuture<'static, Outcome>;

/// How a dispatched action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send succeeded; an assistant entry was appended.
    Replied,
    /// Clear succeeded; the timeline was reset.
    Cleared,
    /// The action failed; carries the text now shown as the request error.
    Failed(String),
}

/// Transient request state shown by the widget (spinner / error banner).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
    Error(String),
}

/// Change notifications for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    TimelineChanged,
    RequestStateChanged,
    NoticeChanged,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub request: RequestState,
    pub clearing: bool,
    pub notice: Option<Notice>,
}

/// Texts and timings the coordinator needs.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub welcome_text: String,
    pub cleared_text: String,
    pub notice_dismiss_after: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from(&UiConfig::default())
    }
}

impl From<&UiConfig> for CoordinatorOptions {
    fn from(ui: &UiConfig) -> Self {
        Self {
            welcome_text: ui.welcome_text.clone(),
            cleared_text: ui.cleared_text.clone(),
            notice_dismiss_after: ui.notice_dismiss_after(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Send,
    Clear,
}

struct State {
    timeline: MessageTimeline,
    /// Ticket of the pending send, if any.
    sending: Option<u64>,
    /// Ticket of the pending clear, if any.
    clearing: Option<u64>,
    error: Option<String>,
    notice: NoticeSlot,
    /// Set once the health probe has started.
    probed: bool,
    next_ticket: u64,
}

impl State {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn slot(&mut self, slot: Slot) -> &mut Option<u64> {
        match slot {
            Slot::Send => &mut self.sending,
            Slot::Clear => &mut self.clearing,
        }
    }

    /// Release a pending slot if it still belongs to `ticket`.
    fn release(&mut self, slot: Slot, ticket: u64) -> bool {
        let s = self.slot(slot);
        if *s == Some(ticket) {
            *s = None;
            true
        } else {
            false
        }
    }
}

struct Inner {
    api: Arc<dyn ChatApi>,
    session: SessionContext,
    options: CoordinatorOptions,
    state: Mutex<State>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, events: &[ControllerEvent]) {
        for ev in events {
            // No subscribers is fine.
            let _ = self.events.send(*ev);
        }
    }

    fn finish_send(&self, ticket: u64, result: Result<ChatResponse, ApiError>) -> Outcome {
        let (entry, outcome) = match result {
            Ok(reply) if reply.success => {
                self.session.adopt(reply.session_id.as_deref());
                (Message::assistant(reply.response), Outcome::Replied)
            }
            Ok(reply) => {
                log::warn!("chat service reported failure");
                self.send_failure(Some(&reply))
            }
            Err(e) => {
                log::warn!("chat request failed: {}", e);
                self.send_failure(e.reply())
            }
        };
        {
            let mut st = self.lock();
            st.timeline.append(entry);
            st.error = match &outcome {
                Outcome::Failed(text) => Some(text.clone()),
                _ => None,
            };
            st.release(Slot::Send, ticket);
        }
        self.emit(&[
            ControllerEvent::TimelineChanged,
            ControllerEvent::RequestStateChanged,
        ]);
        outcome
    }

    /// Server text is never dropped: reply text goes to the timeline, the server's error
    /// string to the request state; generic fallbacks fill whichever is missing.
    fn send_failure(&self, reply: Option<&ChatResponse>) -> (Message, Outcome) {
        if let Some(r) = reply {
            self.session.adopt(r.session_id.as_deref());
        }
        let entry = reply
            .and_then(|r| r.text().or(r.error_text()))
            .unwrap_or(SEND_FALLBACK);
        let banner = reply.and_then(|r| r.error_text()).unwrap_or(SEND_FAILED);
        (Message::error(entry), Outcome::Failed(banner.to_string()))
    }

    fn finish_clear(&self, ticket: u64, result: Result<ClearResponse, ApiError>) -> Outcome {
        let failure = match result {
            Ok(r) if r.success => None,
            Ok(r) => {
                log::warn!("chat service refused to clear history");
                Some(r.message_text().unwrap_or(CLEAR_FAILED).to_string())
            }
            Err(e) => {
                log::warn!("clear history request failed: {}", e);
                Some(CLEAR_FAILED.to_string())
            }
        };
        {
            let mut st = self.lock();
            match &failure {
                None => {
                    st.timeline.seed(self.options.cleared_text.clone());
                    st.error = None;
                }
                Some(text) => {
                    st.timeline.append(Message::error(text.clone()));
                    st.error = Some(text.clone());
                }
            }
            st.release(Slot::Clear, ticket);
        }
        self.emit(&[
            ControllerEvent::TimelineChanged,
            ControllerEvent::RequestStateChanged,
        ]);
        match failure {
            None => {
                log::info!("chat history cleared");
                Outcome::Cleared
            }
            Some(text) => Outcome::Failed(text),
        }
    }

    /// Record a network half that ended without applying a response.
    fn abandon(&self, slot: Slot, ticket: u64) {
        let (entry, banner) = match slot {
            Slot::Send => (SEND_FALLBACK, SEND_FAILED),
            Slot::Clear => (CLEAR_FAILED, CLEAR_FAILED),
        };
        {
            let mut st = self.lock();
            if !st.release(slot, ticket) {
                return;
            }
            st.timeline.append(Message::error(entry));
            st.error = Some(banner.to_string());
        }
        log::warn!("{:?} request ended before its response was applied", slot);
        self.emit(&[
            ControllerEvent::TimelineChanged,
            ControllerEvent::RequestStateChanged,
        ]);
    }

    fn expire_notice(&self, id: u64) {
        let expired = self.lock().notice.expire(id);
        if expired {
            log::debug!("notice {} dismissed", id);
            self.emit(&[ControllerEvent::NoticeChanged]);
        }
    }
}

/// Owns a pending slot until the response is applied. Dropped any earlier, the action
/// is recorded as failed.
struct PendingGuard {
    inner: Arc<Inner>,
    slot: Slot,
    ticket: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner.abandon(self.slot, self.ticket);
    }
}

/// Start `work` on the current runtime so it runs whether or not the dispatch is polled.
fn dispatch<F>(work: F, failed: &'static str) -> Dispatch
where
    F: Future<Output = Outcome> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(rt) => {
            let task = rt.spawn(work);
            async move {
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::warn!("dispatch task did not complete: {}", e);
                        Outcome::Failed(failed.to_string())
                    }
                }
            }
            .boxed()
        }
        Err(_) => {
            log::debug!("no tokio runtime; request runs when the dispatch is awaited");
            work.boxed()
        }
    }
}

/// Cheap-to-clone handle to one chat session's controller.
#[derive(Clone)]
pub struct RequestCoordinator {
    inner: Arc<Inner>,
}

impl RequestCoordinator {
    /// New coordinator with the timeline seeded with the welcome message.
    pub fn new(api: Arc<dyn ChatApi>, session: SessionContext, options: CoordinatorOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = State {
            timeline: MessageTimeline::seeded(options.welcome_text.clone()),
            sending: None,
            clearing: None,
            error: None,
            notice: NoticeSlot::default(),
            probed: false,
            next_ticket: 0,
        };
        Self {
            inner: Arc::new(Inner {
                api,
                session,
                options,
                state: Mutex::new(state),
                events,
            }),
        }
    }

    /// Coordinator over the HTTP client and file-backed session store described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let api = crate::api::HttpChatApi::from_config(config)?;
        let store = FileSessionStore::new(crate::config::resolve_session_path(config));
        Ok(Self::new(
            Arc::new(api),
            SessionContext::new(Arc::new(store)),
            CoordinatorOptions::from(&config.ui),
        ))
    }

    /// Submit user text. No-op (None) for blank text or while a send is pending.
    /// The user entry is on the timeline when this returns.
    pub fn send(&self, content: &str) -> Option<Dispatch> {
        if content.trim().is_empty() {
            return None;
        }
        let ticket = {
            let mut st = self.inner.lock();
            if st.sending.is_some() {
                log::debug!("send ignored: another send is pending");
                return None;
            }
            st.timeline.append(Message::user(content));
            st.error = None;
            let ticket = st.ticket();
            st.sending = Some(ticket);
            ticket
        };
        self.inner.emit(&[
            ControllerEvent::TimelineChanged,
            ControllerEvent::RequestStateChanged,
        ]);

        let request = ChatRequest {
            message: content.to_string(),
            session_id: self.inner.session.current(),
        };
        let guard = PendingGuard {
            inner: self.inner.clone(),
            slot: Slot::Send,
            ticket,
        };
        let work = async move {
            let result = guard.inner.api.chat(&request).await;
            let outcome = guard.inner.finish_send(guard.ticket, result);
            drop(guard);
            outcome
        };
        Some(dispatch(work, SEND_FAILED))
    }

    /// Resend the most recent user message as a fresh send. No-op (None) while a send is
    /// pending. With no user message on the timeline, sets a local error and makes no
    /// request.
    pub fn retry(&self) -> Option<Dispatch> {
        let last = {
            let st = self.inner.lock();
            if st.sending.is_some() {
                log::debug!("retry ignored: a send is pending");
                return None;
            }
            st.timeline.last_user_message().map(|m| m.content.clone())
        };
        match last {
            Some(content) => self.send(&content),
            None => {
                self.inner.lock().error = Some(NOTHING_TO_RETRY.to_string());
                self.inner.emit(&[ControllerEvent::RequestStateChanged]);
                None
            }
        }
    }

    /// Ask the service to forget this session's history. No-op (None) while a clear is
    /// pending. Only a confirmed success resets the timeline.
    pub fn clear(&self) -> Option<Dispatch> {
        let ticket = {
            let mut st = self.inner.lock();
            if st.clearing.is_some() {
                log::debug!("clear ignored: another clear is pending");
                return None;
            }
            st.error = None;
            let ticket = st.ticket();
            st.clearing = Some(ticket);
            ticket
        };
        self.inner.emit(&[ControllerEvent::RequestStateChanged]);

        let request = ClearRequest {
            session_id: self.inner.session.current(),
        };
        let guard = PendingGuard {
            inner: self.inner.clone(),
            slot: Slot::Clear,
            ticket,
        };
        let work = async move {
            let result = guard.inner.api.clear_history(&request).await;
            let outcome = guard.inner.finish_clear(guard.ticket, result);
            drop(guard);
            outcome
        };
        Some(dispatch(work, CLEAR_FAILED))
    }

    /// Probe the service once per coordinator lifetime. Returns None when the probe has
    /// already run. An unhealthy result raises the unavailability notice.
    pub async fn probe_health(&self) -> Option<Health> {
        {
            let mut st = self.inner.lock();
            if st.probed {
                return None;
            }
            st.probed = true;
        }
        let result = health::probe(self.inner.api.as_ref()).await;
        if let Some(text) = result.notice_text() {
            self.raise_notice(text);
        }
        Some(result)
    }

    /// Put up a notice, replacing any current one, and arm its dismiss timer. Outside a
    /// tokio runtime the notice stays until `dismiss_notice`.
    pub fn raise_notice(&self, text: impl Into<String>) {
        let delay = self.inner.options.notice_dismiss_after;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let rt = tokio::runtime::Handle::try_current();
        {
            let mut st = self.inner.lock();
            let id = st.notice.raise(text);
            match rt {
                Ok(rt) => {
                    let timer = rt.spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(inner) = weak.upgrade() {
                            inner.expire_notice(id);
                        }
                    });
                    st.notice.arm(timer);
                }
                Err(_) => log::warn!("no tokio runtime; notice {} will not auto-dismiss", id),
            }
        }
        self.inner.emit(&[ControllerEvent::NoticeChanged]);
    }

    /// Take the notice down now and cancel its timer.
    pub fn dismiss_notice(&self) {
        let dismissed = self.inner.lock().notice.dismiss();
        if dismissed {
            self.inner.emit(&[ControllerEvent::NoticeChanged]);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events.subscribe()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().timeline.entries().to_vec()
    }

    pub fn request_state(&self) -> RequestState {
        let st = self.inner.lock();
        request_state_of(&st)
    }

    pub fn is_clearing(&self) -> bool {
        self.inner.lock().clearing.is_some()
    }

    /// Whether a clear button would do anything useful: there is history beyond the
    /// welcome entry and no clear is running. `clear` itself does not check this.
    pub fn can_clear(&self) -> bool {
        let st = self.inner.lock();
        st.clearing.is_none() && st.timeline.len() > 1
    }

    pub fn notice(&self) -> Option<Notice> {
        self.inner.lock().notice.current().cloned()
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn snapshot(&self) -> Snapshot {
        let st = self.inner.lock();
        Snapshot {
            messages: st.timeline.entries().to_vec(),
            request: request_state_of(&st),
            clearing: st.clearing.is_some(),
            notice: st.notice.current().cloned(),
        }
    }
}

fn request_state_of(st: &State) -> RequestState {
    if st.sending.is_some() {
        RequestState::Pending
    } else if let Some(e) = &st.error {
        RequestState::Error(e.clone())
    } else {
        RequestState::Idle
    }
}
