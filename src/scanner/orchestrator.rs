//! Top-level scan state machine.
//!
//! `Idle → Scanning → Done(reason)`. While scanning, each round enumerates
//! the rendered rows, processes up to `batch_size` visible unprocessed
//! contacts topmost-first, scrolls the list one step, lets it settle and
//! re-enumerates. Two guards decide when the round loop ends; see
//! [`TerminationGuard`].

use super::click::simulate_click;
use super::contacts::extract_contacts;
use super::messages::extract_messages;
use super::registry::Registry;
use super::visibility::is_sufficiently_visible;
use super::ScanError;
use crate::core::config::ScanPolicy;
use crate::scraping::page::ChatPage;
use crate::types::{ElementHandle, ScanReport, StopReason};
use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Done(StopReason),
}

fn log_state(state: ScanState) {
    info!("scan_state={:?}", state);
}

/// How one processing attempt ended. Every variant marks the contact processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Conversation opened; `messages` records were stored.
    Opened { name: String, messages: usize },
    /// Neither a click target nor a row handle from the current pass.
    NoTarget { name: String },
    /// The click simulator could not deliver the click.
    ClickFailed { name: String },
}

impl ProcessOutcome {
    pub fn name(&self) -> &str {
        match self {
            ProcessOutcome::Opened { name, .. }
            | ProcessOutcome::NoTarget { name }
            | ProcessOutcome::ClickFailed { name } => name,
        }
    }
}

/// The orchestrator's two stop guards.
///
/// * no-scroll: consecutive list scrolls that did not move the offset;
///   past `no_scroll_threshold` the list is exhausted.
/// * no-visible: consecutive rounds ending with nothing visible to process;
///   past `no_visible_threshold` the scan stops if the registry has nothing
///   unprocessed, and past `no_visible_hard_threshold` it stops regardless.
///
/// Each round bumps at least one counter unless it either moved the list or
/// found something to process, so a list that neither moves nor reveals
/// anything ends within `no_scroll_threshold + 1` rounds.
#[derive(Debug, Clone)]
pub struct TerminationGuard {
    no_scroll: u32,
    no_visible: u32,
    no_scroll_threshold: u32,
    no_visible_threshold: u32,
    no_visible_hard_threshold: u32,
}

impl TerminationGuard {
    pub fn new(policy: &ScanPolicy) -> Self {
        Self {
            no_scroll: 0,
            no_visible: 0,
            no_scroll_threshold: policy.no_scroll_threshold,
            no_visible_threshold: policy.no_visible_threshold,
            no_visible_hard_threshold: policy.no_visible_hard_threshold,
        }
    }

    pub fn on_new_contacts(&mut self, newly_found: usize) {
        if newly_found > 0 {
            self.no_visible = 0;
        }
    }

    pub fn on_scroll(&mut self, moved: bool) -> Option<StopReason> {
        if moved {
            self.no_scroll = 0;
            return None;
        }
        self.no_scroll += 1;
        (self.no_scroll > self.no_scroll_threshold).then_some(StopReason::ListExhausted)
    }

    pub fn on_visibility(&mut self, any_visible: bool, unprocessed: usize) -> Option<StopReason> {
        if any_visible {
            self.no_visible = 0;
            return None;
        }
        self.no_visible += 1;
        if self.no_visible <= self.no_visible_threshold {
            return None;
        }
        if unprocessed == 0 {
            Some(StopReason::AllProcessed)
        } else if self.no_visible > self.no_visible_hard_threshold {
            Some(StopReason::Stalled)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    attempts: usize,
    open_failures: usize,
}

/// Drives one scan over one page. Not reentrant: one scanner per page.
pub struct Scanner<'a> {
    page: &'a dyn ChatPage,
    policy: ScanPolicy,
    state: ScanState,
    tally: Tally,
}

impl<'a> Scanner<'a> {
    pub fn new(page: &'a dyn ChatPage, policy: ScanPolicy) -> Self {
        Self {
            page,
            policy,
            state: ScanState::Idle,
            tally: Tally::default(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    fn transition(&mut self, next: ScanState) {
        self.state = next;
        log_state(next);
    }

    /// Unprocessed contacts whose current-pass row is visible, topmost first.
    pub async fn visible_unprocessed(&self, registry: &Registry) -> Vec<(String, f64)> {
        let container = match self.page.chat_list_rect().await {
            Ok(Some(rect)) => rect,
            Ok(None) => {
                debug!("orchestrator: chat list not rendered");
                return Vec::new();
            }
            Err(e) => {
                warn!("orchestrator: chat list lookup failed: {}", e);
                return Vec::new();
            }
        };
        let viewport_width = match self.page.viewport_width().await {
            Ok(w) => w,
            Err(e) => {
                warn!("orchestrator: viewport width lookup failed: {}", e);
                return Vec::new();
            }
        };

        let generation = registry.generation();
        let mut visible = Vec::new();
        for record in registry.iter().filter(|r| !r.processed()) {
            let Some(handle) = record.dom_reference(generation) else {
                continue;
            };
            let rect = self.page.element_rect(handle).await.unwrap_or_else(|e| {
                debug!("orchestrator: rect of {:?} failed: {}", handle, e);
                None
            });
            if let Some(r) = rect {
                if is_sufficiently_visible(
                    Some(r),
                    container,
                    viewport_width,
                    self.policy.visibility_tolerance,
                ) {
                    visible.push((record.name().to_string(), r.top));
                }
            }
        }
        visible.sort_by(|a, b| a.1.total_cmp(&b.1));
        visible
    }

    /// Process the topmost visible unprocessed contact, if any.
    pub async fn process_next(&mut self, registry: &mut Registry) -> Option<ProcessOutcome> {
        let (name, _) = self.visible_unprocessed(registry).await.into_iter().next()?;
        self.tally.attempts += 1;

        let target: Option<ElementHandle> = registry
            .get(&name)
            .and_then(|r| r.click_handle(registry.generation()));

        let Some(target) = target else {
            warn!("orchestrator: no clickable element for '{}'", name);
            registry.complete(&name, Vec::new());
            self.tally.open_failures += 1;
            return Some(ProcessOutcome::NoTarget { name });
        };

        if !simulate_click(self.page, target).await {
            warn!("orchestrator: failed to open '{}'", name);
            registry.complete(&name, Vec::new());
            self.tally.open_failures += 1;
            return Some(ProcessOutcome::ClickFailed { name });
        }

        sleep(self.policy.open_settle).await;

        let messages = extract_messages(self.page, &self.policy).await;
        let count = messages.len();
        registry.complete(&name, messages);
        info!("orchestrator: processed '{}': {} messages", name, count);

        sleep(self.policy.courtesy_delay).await;
        Some(ProcessOutcome::Opened {
            name,
            messages: count,
        })
    }

    /// One list step down. `true` when the offset changed.
    async fn scroll_list(&self) -> bool {
        let change = self
            .page
            .scroll_chat_list(self.policy.list_scroll_step())
            .await;
        sleep(self.policy.list_scroll_pause).await;
        match change {
            Ok(Some(change)) => change.moved(),
            Ok(None) => {
                warn!("orchestrator: chat list missing while scrolling");
                false
            }
            Err(e) => {
                warn!("orchestrator: list scroll failed: {}", e);
                false
            }
        }
    }

    /// Run the scan to completion, mutating `registry` in place.
    ///
    /// Fails only when the chat list is absent at start.
    pub async fn run(&mut self, registry: &mut Registry) -> Result<ScanReport, ScanError> {
        let started_at = Utc::now();
        match self.page.chat_list_rect().await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ScanError::ChatListMissing),
            Err(e) => return Err(ScanError::Browser(e.to_string())),
        }

        self.transition(ScanState::Scanning);
        let mut guard = TerminationGuard::new(&self.policy);
        let mut rounds = 0u32;

        let reason = loop {
            rounds += 1;
            let found = extract_contacts(self.page, registry).await;
            guard.on_new_contacts(found.newly_found);

            let mut batch = 0;
            while batch < self.policy.batch_size {
                match self.process_next(registry).await {
                    Some(_) => batch += 1,
                    None => break,
                }
            }

            let moved = self.scroll_list().await;
            sleep(self.policy.list_settle).await;
            extract_contacts(self.page, registry).await;

            let scroll_stop = guard.on_scroll(moved);
            let any_visible = !self.visible_unprocessed(registry).await.is_empty();
            let visible_stop = guard.on_visibility(any_visible, registry.unprocessed_count());

            debug!(
                "orchestrator: round {} processed {} (moved={}, visible={}, registry={})",
                rounds,
                batch,
                moved,
                any_visible,
                registry.len()
            );

            if let Some(reason) = scroll_stop.or(visible_stop) {
                break reason;
            }
        };

        self.transition(ScanState::Done(reason));

        let processed = registry.iter().filter(|r| r.processed()).count();
        let with_messages = registry
            .iter()
            .filter(|r| r.processed() && !r.messages().is_empty())
            .count();
        info!(
            "orchestrator: scan complete after {} rounds ({:?}): {} contacts, {} with messages",
            rounds,
            reason,
            registry.len(),
            with_messages
        );

        Ok(ScanReport {
            scan_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            contacts_found: registry.len(),
            processed,
            with_messages,
            open_failures: self.tally.open_failures,
            process_attempts: self.tally.attempts,
            stop_reason: reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> TerminationGuard {
        TerminationGuard::new(&ScanPolicy::default())
    }

    #[test]
    fn test_no_scroll_needs_more_than_threshold() {
        let mut g = guard();
        for _ in 0..3 {
            assert_eq!(g.on_scroll(false), None);
        }
        assert_eq!(g.on_scroll(false), Some(StopReason::ListExhausted));
    }

    #[test]
    fn test_movement_resets_no_scroll() {
        let mut g = guard();
        for _ in 0..3 {
            g.on_scroll(false);
        }
        assert_eq!(g.on_scroll(true), None);
        assert_eq!(g.on_scroll(false), None);
    }

    #[test]
    fn test_no_visible_stops_early_when_all_processed() {
        let mut g = guard();
        for _ in 0..4 {
            assert_eq!(g.on_visibility(false, 0), None);
        }
        assert_eq!(g.on_visibility(false, 0), Some(StopReason::AllProcessed));
    }

    #[test]
    fn test_no_visible_hard_stop_with_leftovers() {
        let mut g = guard();
        for _ in 0..10 {
            assert_eq!(g.on_visibility(false, 3), None);
        }
        assert_eq!(g.on_visibility(false, 3), Some(StopReason::Stalled));
    }

    #[test]
    fn test_new_contacts_reset_no_visible() {
        let mut g = guard();
        for _ in 0..4 {
            g.on_visibility(false, 0);
        }
        g.on_new_contacts(2);
        assert_eq!(g.on_visibility(false, 0), None);
        g.on_new_contacts(0);
        assert_eq!(g.on_visibility(true, 5), None);
    }
}
