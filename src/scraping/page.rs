//! The host-page contract as seen by the scanner.
//!
//! `ChatPage` is the only way the scanner touches the messenger's DOM. The
//! live implementation (`cdp_page::CdpChatPage`) evaluates JavaScript over
//! CDP; tests plug in an in-memory virtualized list. Every selector lives
//! behind this trait, so a host-page redesign is an edit to
//! `dom_contract.rs` and nothing else.

use crate::types::{Direction, ElementHandle, Point, Rect, ScrollChange};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One rendered chat-list row, captured during an enumeration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRow {
    /// The row element itself.
    pub element: ElementHandle,
    /// Narrower interactive child, if the row exposes one.
    #[serde(default)]
    pub click_target: Option<ElementHandle>,
    /// Trimmed display name; `None` when the label could not be resolved.
    #[serde(default)]
    pub name: Option<String>,
    /// Viewport-relative top edge at capture time.
    pub top: f64,
    /// Raw "last activity" label (`09:45`, `Yesterday`, `30/03/2025` …).
    #[serde(default)]
    pub last_interaction: Option<String>,
}

/// One rendered row of the conversation pane, in DOM order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    /// `data-id` of the message, when the host page provides one.
    #[serde(default)]
    pub dom_id: Option<String>,
    /// `None` for rows without an incoming/outgoing marker (date separators, system notices).
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Raw text of the copyable text span; `None` when the row has no such span.
    #[serde(default)]
    pub text: Option<String>,
    /// Localized preamble, e.g. `[09:45, 30/03/2025] Alice: `.
    #[serde(default)]
    pub preamble: Option<String>,
}

/// Pointer events the click simulator dispatches, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    #[serde(rename = "mousemove")]
    Move,
    #[serde(rename = "mousedown")]
    Down,
    #[serde(rename = "mouseup")]
    Up,
    Click,
}

impl PointerKind {
    pub const SEQUENCE: [PointerKind; 4] = [
        PointerKind::Move,
        PointerKind::Down,
        PointerKind::Up,
        PointerKind::Click,
    ];

    /// DOM event type name.
    pub fn event_type(self) -> &'static str {
        match self {
            PointerKind::Move => "mousemove",
            PointerKind::Down => "mousedown",
            PointerKind::Up => "mouseup",
            PointerKind::Click => "click",
        }
    }

    /// `(button, buttons)` as a real left click would report them.
    pub fn buttons(self) -> (i32, i32) {
        match self {
            PointerKind::Move => (0, 0),
            PointerKind::Down => (0, 1),
            PointerKind::Up | PointerKind::Click => (0, 0),
        }
    }
}

/// Read/act surface over the messenger page.
///
/// Errors mean the driver itself failed (transport dropped, evaluation threw).
/// "Nothing there" is never an error: it is `None`, `false` or an empty list.
#[async_trait]
pub trait ChatPage: Send + Sync {
    /// Bounding box of the chat-list scroll container; `None` when it is not in the DOM.
    async fn chat_list_rect(&self) -> Result<Option<Rect>>;

    /// `window.innerWidth`.
    async fn viewport_width(&self) -> Result<f64>;

    /// Every currently rendered chat-list row, top to bottom.
    async fn contact_rows(&self) -> Result<Vec<ContactRow>>;

    /// Current box of an element; `None` when the handle is unknown or detached.
    async fn element_rect(&self, element: ElementHandle) -> Result<Option<Rect>>;

    /// Topmost element under a viewport point (`document.elementFromPoint`).
    async fn element_at_point(&self, point: Point) -> Result<Option<ElementHandle>>;

    /// Dispatch one bubbling, cancelable mouse event at `point` on `target`.
    async fn dispatch_pointer(
        &self,
        target: ElementHandle,
        kind: PointerKind,
        point: Point,
    ) -> Result<()>;

    /// Scroll the chat list by `delta` px; `None` when the container is missing.
    async fn scroll_chat_list(&self, delta: f64) -> Result<Option<ScrollChange>>;

    /// Whether a conversation pane with a scrollable message list is present.
    async fn message_pane_present(&self) -> Result<bool>;

    /// Every currently rendered row of the open conversation, in DOM order (oldest on top).
    async fn message_rows(&self) -> Result<Vec<MessageRow>>;

    /// Number of rendered conversation rows, markers or not.
    async fn message_row_count(&self) -> Result<usize>;

    /// Scroll the message list by `delta` px (negative = up); `None` when the pane is missing.
    async fn scroll_message_pane(&self, delta: f64) -> Result<Option<ScrollChange>>;

    /// Persist `value` under `key` in the page's own key-value store.
    async fn store_local(&self, key: &str, value: &str) -> Result<()>;
}
