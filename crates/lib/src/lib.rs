//! Chatline core library: the conversational session controller behind the chat widget,
//! its remote service client, session persistence, and configuration.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod health;
pub mod session;
pub mod timeline;

pub use coordinator::{
    ControllerEvent, CoordinatorOptions, Dispatch, Outcome, RequestCoordinator, RequestState,
    Snapshot,
};
pub use session::{FileSessionStore, MemorySessionStore, SessionContext, SessionStore};
pub use timeline::{Message, MessageTimeline, Role};
