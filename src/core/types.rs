use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Page geometry ───────────────────────────────────────────────────────────

/// Opaque, volatile reference to a DOM element owned by the host page.
///
/// Handles are only meaningful until the page recycles the node; every read
/// through a handle must tolerate "detached".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Viewport-relative bounding box, same shape as `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.left + self.width / 2.0,
            y: self.top + self.height / 2.0,
        }
    }
}

/// Result of a scroll attempt on a container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollChange {
    pub before: f64,
    pub after: f64,
}

impl ScrollChange {
    /// Absolute distance actually travelled.
    pub fn distance(&self) -> f64 {
        (self.after - self.before).abs()
    }

    pub fn moved(&self) -> bool {
        self.after != self.before
    }
}

// ── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// One message pulled out of an open conversation pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// DOM-provided id when available, otherwise a synthesized `msg_<millis>_<suffix>`.
    pub id: String,
    pub text: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

/// The list row's "last activity" label plus its resolved date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastInteraction {
    pub text: String,
    /// ISO-8601, `None` when the label could not be resolved to a date.
    pub date: Option<String>,
}

impl Default for LastInteraction {
    fn default() -> Self {
        Self {
            text: "Unknown".to_string(),
            date: None,
        }
    }
}

// ── Scan results ────────────────────────────────────────────────────────────

/// Why the orchestrator left the `Scanning` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The list stopped scrolling for more than the no-scroll threshold.
    ListExhausted,
    /// Nothing visible for a while and every known contact is processed.
    AllProcessed,
    /// Nothing visible past the hard threshold, unprocessed contacts or not.
    Stalled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub contacts_found: usize,
    pub processed: usize,
    pub with_messages: usize,
    pub open_failures: usize,
    pub process_attempts: usize,
    pub stop_reason: StopReason,
}

/// Exported view of one contact, keyed by name in [`RegistryExport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedContact {
    pub message_count: usize,
    pub messages: Vec<MessageRecord>,
    pub processed: bool,
    pub last_interaction: LastInteraction,
}

pub type RegistryExport = BTreeMap<String, ExportedContact>;

// ── Ingestion wire format ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub name: String,
    pub phone: String,
    pub contacts: Vec<SyncContact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncContact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<SyncMessage>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub direction: Direction,
    pub content: String,
}

// ── HTTP surface ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub report: ScanReport,
    pub contacts: RegistryExport,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
