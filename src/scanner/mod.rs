//! The in-page scanning agent.
//!
//! Leaves first: `visibility` and `click` are stateless helpers,
//! `contacts` (enumerator) and `messages` (extractor) read the page into a
//! [`Registry`], and `orchestrator` drives them to termination. Every
//! component takes the registry explicitly; nothing here holds global state.

pub mod click;
pub mod contacts;
pub mod messages;
pub mod orchestrator;
pub mod registry;
pub mod timestamp;
pub mod visibility;

pub use click::simulate_click;
pub use contacts::{extract_contacts, Enumeration};
pub use messages::extract_messages;
pub use orchestrator::{ProcessOutcome, ScanState, Scanner, TerminationGuard};
pub use registry::{ContactRecord, Registry};
pub use visibility::is_sufficiently_visible;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("chat list container not found on the page")]
    ChatListMissing,

    #[error("a scan is already running on this chat session")]
    AlreadyRunning,

    #[error("chat list did not appear within {0}s (login pending?)")]
    LoginTimeout(u64),

    #[error("browser failure: {0}")]
    Browser(String),
}
