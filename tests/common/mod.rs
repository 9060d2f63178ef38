// In-memory stand-in for the messenger page.
//
// The chat list is virtualized like the real one: only rows intersecting the
// list viewport (plus one overscan row below) are rendered, and a row that
// leaves the window and comes back gets new handles. Opening a conversation
// shows its newest `page_batch` messages; scrolling the pane to the top loads
// the next older batch.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use contact_scout::scraping::{ChatPage, ContactRow, MessageRow, PointerKind};
use contact_scout::types::{Direction, ElementHandle, Point, Rect, ScrollChange};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const ROW_HEIGHT: f64 = 72.0;
pub const LIST_TOP: f64 = 60.0;
pub const LIST_HEIGHT: f64 = 288.0;
pub const LIST_WIDTH: f64 = 400.0;
pub const VIEWPORT_WIDTH: f64 = 1200.0;
pub const OWNER: &str = "Me";

/// Offset the pane sits at while older history is still available.
const PANE_REST_OFFSET: f64 = 500.0;

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct FakeContact {
    pub name: String,
    pub label: Option<String>,
    pub messages: Vec<(Direction, String)>,
    /// Hit-testing the row finds nothing (an overlay swallows the pointer).
    pub unclickable: bool,
    /// Row renders outside the horizontal viewport.
    pub offscreen: bool,
}

impl FakeContact {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            messages: Vec::new(),
            unclickable: false,
            offscreen: false,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn conversation(mut self, messages: &[(Direction, &str)]) -> Self {
        self.messages = messages
            .iter()
            .map(|(d, t)| (*d, t.to_string()))
            .collect();
        self
    }

    /// `count` messages `m0..m{count-1}`, alternating incoming/outgoing.
    pub fn messages(mut self, count: usize) -> Self {
        self.messages = (0..count)
            .map(|k| {
                let dir = if k % 2 == 0 {
                    Direction::Incoming
                } else {
                    Direction::Outgoing
                };
                (dir, format!("m{}", k))
            })
            .collect();
        self
    }

    pub fn unclickable(mut self) -> Self {
        self.unclickable = true;
        self
    }

    pub fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }
}

/// How the conversation pane reacts to scrolling up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneBehavior {
    /// Reaching the top loads the next older batch.
    Normal,
    /// The offset never changes.
    Frozen,
    /// The pane scrolls, bounces back, and never loads anything.
    Stalled,
}

#[derive(Debug, Clone, Copy)]
struct RenderedRow {
    element: u64,
    click: u64,
}

#[derive(Debug)]
struct MockState {
    contacts: Vec<FakeContact>,
    list_present: bool,
    login_probes: u32,
    scroll_top: f64,
    rendered: BTreeMap<usize, RenderedRow>,
    next_handle: u64,
    open: Option<usize>,
    pane_scroll_top: f64,
    loaded: usize,
    page_batch: usize,
    behavior: PaneBehavior,
    dom_ids: bool,
    separator: bool,
    opens: Vec<u32>,
    events: Vec<(ElementHandle, PointerKind)>,
    hit_tests: usize,
    stored: Vec<(String, String)>,
}

impl MockState {
    fn max_scroll(&self) -> f64 {
        (self.contacts.len() as f64 * ROW_HEIGHT - LIST_HEIGHT).max(0.0)
    }

    fn refresh_window(&mut self) {
        let n = self.contacts.len();
        if n == 0 {
            self.rendered.clear();
            return;
        }
        let first = (self.scroll_top / ROW_HEIGHT).floor() as usize;
        let last = (((self.scroll_top + LIST_HEIGHT - 1.0) / ROW_HEIGHT).floor() as usize + 1)
            .min(n - 1);

        self.rendered.retain(|i, _| (first..=last).contains(i));
        for i in first..=last {
            if !self.rendered.contains_key(&i) {
                let element = self.next_handle;
                self.next_handle += 2;
                self.rendered.insert(
                    i,
                    RenderedRow {
                        element,
                        click: element + 1,
                    },
                );
            }
        }
    }

    fn row_rect(&self, i: usize) -> Rect {
        let left = if self.contacts[i].offscreen {
            VIEWPORT_WIDTH + 100.0
        } else {
            0.0
        };
        Rect::new(
            LIST_TOP + i as f64 * ROW_HEIGHT - self.scroll_top,
            left,
            LIST_WIDTH,
            ROW_HEIGHT,
        )
    }

    fn click_rect(&self, i: usize) -> Rect {
        let row = self.row_rect(i);
        Rect::new(row.top + 8.0, row.left + 8.0, row.width - 16.0, row.height - 16.0)
    }

    fn find(&self, handle: ElementHandle) -> Option<(usize, bool)> {
        self.rendered.iter().find_map(|(&i, r)| {
            if r.element == handle.0 {
                Some((i, false))
            } else if r.click == handle.0 {
                Some((i, true))
            } else {
                None
            }
        })
    }

    fn open_conversation(&mut self, i: usize) {
        self.opens[i] += 1;
        self.open = Some(i);
        let total = self.contacts[i].messages.len();
        self.loaded = self.page_batch.min(total);
        self.pane_scroll_top = if self.loaded < total {
            PANE_REST_OFFSET
        } else {
            0.0
        };
    }

    fn pane_rows(&self) -> Vec<MessageRow> {
        let Some(i) = self.open else {
            return Vec::new();
        };
        let contact = &self.contacts[i];
        let total = contact.messages.len();

        let mut rows = Vec::new();
        if self.separator {
            rows.push(MessageRow {
                dom_id: None,
                direction: None,
                text: Some("TODAY".to_string()),
                preamble: None,
            });
        }
        for k in total - self.loaded..total {
            let (direction, text) = &contact.messages[k];
            let author = match direction {
                Direction::Incoming => contact.name.as_str(),
                Direction::Outgoing => OWNER,
            };
            rows.push(MessageRow {
                dom_id: self.dom_ids.then(|| message_id(&contact.name, k)),
                direction: Some(*direction),
                text: Some(text.clone()),
                preamble: Some(format!("[10:{:02}, 30/03/2025] {}: ", k % 60, author)),
            });
        }
        rows
    }
}

/// DOM id the mock gives message `k` of `name`.
pub fn message_id(name: &str, k: usize) -> String {
    format!("{}-{}", name, k)
}

pub struct MockChatPage {
    state: Mutex<MockState>,
}

impl MockChatPage {
    pub fn new(contacts: Vec<FakeContact>) -> Self {
        let opens = vec![0; contacts.len()];
        let mut state = MockState {
            contacts,
            list_present: true,
            login_probes: 0,
            scroll_top: 0.0,
            rendered: BTreeMap::new(),
            next_handle: 100,
            open: None,
            pane_scroll_top: 0.0,
            loaded: 0,
            page_batch: 5,
            behavior: PaneBehavior::Normal,
            dom_ids: true,
            separator: true,
            opens,
            events: Vec::new(),
            hit_tests: 0,
            stored: Vec::new(),
        };
        state.refresh_window();
        Self {
            state: Mutex::new(state),
        }
    }

    /// `count` contacts named `Contact 00..`, each with `messages` messages.
    pub fn with_contacts(count: usize, messages: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| FakeContact::new(&format!("Contact {:02}", i)).messages(messages))
                .collect(),
        )
    }

    pub fn pane(self, behavior: PaneBehavior) -> Self {
        self.state.lock().unwrap().behavior = behavior;
        self
    }

    pub fn without_dom_ids(self) -> Self {
        self.state.lock().unwrap().dom_ids = false;
        self
    }

    pub fn without_chat_list(self) -> Self {
        self.state.lock().unwrap().list_present = false;
        self
    }

    /// The list container only appears after `probes` lookups.
    pub fn login_after(self, probes: u32) -> Self {
        self.state.lock().unwrap().login_probes = probes;
        self
    }

    pub fn opens(&self, name: &str) -> u32 {
        let s = self.state.lock().unwrap();
        s.contacts
            .iter()
            .position(|c| c.name == name)
            .map(|i| s.opens[i])
            .unwrap_or(0)
    }

    pub fn total_opens(&self) -> u32 {
        self.state.lock().unwrap().opens.iter().sum()
    }

    pub fn events(&self) -> Vec<(ElementHandle, PointerKind)> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn hit_tests(&self) -> usize {
        self.state.lock().unwrap().hit_tests
    }

    pub fn stored(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn open_conversation(&self) -> Option<String> {
        let s = self.state.lock().unwrap();
        s.open.map(|i| s.contacts[i].name.clone())
    }

    /// Open `name`'s conversation directly, bypassing the list.
    pub fn open(&self, name: &str) {
        let mut s = self.state.lock().unwrap();
        if let Some(i) = s.contacts.iter().position(|c| c.name == name) {
            s.open_conversation(i);
        }
    }

    /// Current `(row, click target)` handles of `name`, if rendered.
    pub fn handles_of(&self, name: &str) -> Option<(ElementHandle, ElementHandle)> {
        let s = self.state.lock().unwrap();
        let i = s.contacts.iter().position(|c| c.name == name)?;
        s.rendered
            .get(&i)
            .map(|r| (ElementHandle(r.element), ElementHandle(r.click)))
    }

    pub fn scroll_top(&self) -> f64 {
        self.state.lock().unwrap().scroll_top
    }
}

#[async_trait]
impl ChatPage for MockChatPage {
    async fn chat_list_rect(&self) -> Result<Option<Rect>> {
        let mut s = self.state.lock().unwrap();
        if !s.list_present {
            return Ok(None);
        }
        if s.login_probes > 0 {
            s.login_probes -= 1;
            return Ok(None);
        }
        Ok(Some(Rect::new(LIST_TOP, 0.0, LIST_WIDTH, LIST_HEIGHT)))
    }

    async fn viewport_width(&self) -> Result<f64> {
        Ok(VIEWPORT_WIDTH)
    }

    async fn contact_rows(&self) -> Result<Vec<ContactRow>> {
        let s = self.state.lock().unwrap();
        Ok(s.rendered
            .iter()
            .map(|(&i, r)| ContactRow {
                element: ElementHandle(r.element),
                click_target: Some(ElementHandle(r.click)),
                name: Some(s.contacts[i].name.clone()),
                top: s.row_rect(i).top,
                last_interaction: s.contacts[i].label.clone(),
            })
            .collect())
    }

    async fn element_rect(&self, element: ElementHandle) -> Result<Option<Rect>> {
        let s = self.state.lock().unwrap();
        Ok(s.find(element).map(|(i, is_click)| {
            if is_click {
                s.click_rect(i)
            } else {
                s.row_rect(i)
            }
        }))
    }

    async fn element_at_point(&self, point: Point) -> Result<Option<ElementHandle>> {
        let mut s = self.state.lock().unwrap();
        s.hit_tests += 1;
        if point.y < LIST_TOP || point.y >= LIST_TOP + LIST_HEIGHT {
            return Ok(None);
        }
        let hit = s.rendered.iter().find_map(|(&i, r)| {
            let rect = s.row_rect(i);
            let inside = point.y >= rect.top
                && point.y < rect.bottom()
                && point.x >= rect.left
                && point.x < rect.right();
            (inside && !s.contacts[i].unclickable).then_some(ElementHandle(r.click))
        });
        Ok(hit)
    }

    async fn dispatch_pointer(
        &self,
        target: ElementHandle,
        kind: PointerKind,
        _point: Point,
    ) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.events.push((target, kind));
        if kind == PointerKind::Click {
            if let Some((i, _)) = s.find(target) {
                s.open_conversation(i);
            }
        }
        Ok(())
    }

    async fn scroll_chat_list(&self, delta: f64) -> Result<Option<ScrollChange>> {
        let mut s = self.state.lock().unwrap();
        if !s.list_present {
            return Ok(None);
        }
        let before = s.scroll_top;
        let after = (before + delta).clamp(0.0, s.max_scroll());
        s.scroll_top = after;
        s.refresh_window();
        Ok(Some(ScrollChange { before, after }))
    }

    async fn message_pane_present(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().open.is_some())
    }

    async fn message_rows(&self) -> Result<Vec<MessageRow>> {
        Ok(self.state.lock().unwrap().pane_rows())
    }

    async fn message_row_count(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().pane_rows().len())
    }

    async fn scroll_message_pane(&self, delta: f64) -> Result<Option<ScrollChange>> {
        let mut s = self.state.lock().unwrap();
        let Some(i) = s.open else {
            return Ok(None);
        };
        let before = s.pane_scroll_top;
        let total = s.contacts[i].messages.len();

        let behavior = s.behavior;
        let after = match behavior {
            PaneBehavior::Frozen => before,
            PaneBehavior::Stalled => (before + delta).max(0.0),
            PaneBehavior::Normal => {
                let after = (before + delta).max(0.0);
                s.pane_scroll_top = after;
                if after == 0.0 && before > 0.0 && s.loaded < total {
                    s.loaded = (s.loaded + s.page_batch).min(total);
                    if s.loaded < total {
                        s.pane_scroll_top = PANE_REST_OFFSET;
                    }
                }
                after
            }
        };
        Ok(Some(ScrollChange { before, after }))
    }

    async fn store_local(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .stored
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}
