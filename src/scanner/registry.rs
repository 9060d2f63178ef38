//! Contact registry: the scan-session context object.
//!
//! Owned by the caller and passed by `&mut` into the enumerator, the
//! extractor's caller and the orchestrator. Records are keyed by display
//! name, created on first sighting, refreshed in place on every later
//! sighting, processed at most once, and never removed.

use crate::types::{ElementHandle, ExportedContact, LastInteraction, MessageRecord, RegistryExport};
use std::collections::HashMap;

/// A handle stamped with the enumeration pass that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedHandle {
    pub handle: ElementHandle,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct ContactRecord {
    name: String,
    dom_reference: Option<TrackedHandle>,
    click_target: Option<TrackedHandle>,
    processed: bool,
    messages: Vec<MessageRecord>,
    last_seen_position: f64,
    last_interaction: LastInteraction,
}

impl ContactRecord {
    fn new(name: String) -> Self {
        Self {
            name,
            dom_reference: None,
            click_target: None,
            processed: false,
            messages: Vec::new(),
            last_seen_position: 0.0,
            last_interaction: LastInteraction::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn processed(&self) -> bool {
        self.processed
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn last_seen_position(&self) -> f64 {
        self.last_seen_position
    }

    pub fn last_interaction(&self) -> &LastInteraction {
        &self.last_interaction
    }

    /// Row handle, only if it was captured in pass `generation`.
    pub fn dom_reference(&self, generation: u64) -> Option<ElementHandle> {
        self.dom_reference
            .filter(|t| t.generation == generation)
            .map(|t| t.handle)
    }

    /// Click target if current, else the row itself if current.
    pub fn click_handle(&self, generation: u64) -> Option<ElementHandle> {
        self.click_target
            .filter(|t| t.generation == generation)
            .map(|t| t.handle)
            .or_else(|| self.dom_reference(generation))
    }
}

/// What the enumerator saw for one row.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub element: ElementHandle,
    pub click_target: Option<ElementHandle>,
    pub position: f64,
    pub last_interaction: LastInteraction,
}

#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<ContactRecord>,
    index: HashMap<String, usize>,
    generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new enumeration pass; handles from earlier passes go stale.
    pub fn begin_pass(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Generation of the most recent pass (0 before the first one).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Create-or-refresh. Returns `true` when the name was new.
    ///
    /// Refreshing replaces handles, position and last interaction but never
    /// touches `processed` or `messages`.
    pub fn observe(&mut self, name: &str, sighting: Sighting) -> bool {
        let generation = self.generation;
        let (idx, created) = match self.index.get(name) {
            Some(&idx) => (idx, false),
            None => {
                self.records.push(ContactRecord::new(name.to_string()));
                let idx = self.records.len() - 1;
                self.index.insert(name.to_string(), idx);
                (idx, true)
            }
        };

        let record = &mut self.records[idx];
        record.dom_reference = Some(TrackedHandle {
            handle: sighting.element,
            generation,
        });
        record.click_target = sighting.click_target.map(|handle| TrackedHandle {
            handle,
            generation,
        });
        record.last_seen_position = sighting.position;
        record.last_interaction = sighting.last_interaction;
        created
    }

    /// Set the outcome of the one processing attempt for `name`.
    ///
    /// Returns `false` (and changes nothing) when the contact is unknown or
    /// was already processed.
    pub fn complete(&mut self, name: &str, messages: Vec<MessageRecord>) -> bool {
        let Some(&idx) = self.index.get(name) else {
            return false;
        };
        let record = &mut self.records[idx];
        if record.processed {
            return false;
        }
        record.messages = messages;
        record.processed = true;
        true
    }

    pub fn get(&self, name: &str) -> Option<&ContactRecord> {
        self.index.get(name).map(|&idx| &self.records[idx])
    }

    /// Records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ContactRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unprocessed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.processed).count()
    }

    /// Name → `{ messageCount, messages, processed, lastInteraction }`.
    pub fn export(&self) -> RegistryExport {
        self.records
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    ExportedContact {
                        message_count: r.messages.len(),
                        messages: r.messages.clone(),
                        processed: r.processed,
                        last_interaction: r.last_interaction.clone(),
                    },
                )
            })
            .collect()
    }
}
