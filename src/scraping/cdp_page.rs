//! `ChatPage` over a live Chromium tab.
//!
//! Element handles are numeric ids kept in a page-side table
//! (`window.__scoutHandles`). The table holds the element reference itself,
//! so a handle to a recycled node resolves to "detached" (`isConnected ==
//! false`) rather than silently pointing at whatever row reused the slot.

use super::dom_contract::DomContract;
use super::page::{ChatPage, ContactRow, MessageRow, PointerKind};
use crate::types::{ElementHandle, Point, Rect, ScrollChange};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const PRELUDE: &str = r#"
const H = window.__scoutHandles || (window.__scoutHandles = { next: 1, byId: new Map(), ids: new WeakMap() });
const ref = (el) => {
    if (!el) return null;
    let id = H.ids.get(el);
    if (!id) { id = H.next++; H.ids.set(el, id); }
    H.byId.set(id, el);
    return id;
};
const get = (id) => {
    const el = H.byId.get(id);
    if (!el) return null;
    if (!el.isConnected) { H.byId.delete(id); return null; }
    return el;
};
const rectOf = (el) => {
    const r = el.getBoundingClientRect();
    return { top: r.top, left: r.left, width: r.width, height: r.height };
};
const list = () => document.getElementById(C.chatListId);
const area = () => document.querySelector(C.messageArea);
const scroller = () => { const a = area(); return a ? a.querySelector(C.messageScroller) : null; };
"#;

#[derive(Deserialize)]
struct Wrapped<T> {
    v: T,
}

/// Finite number literal for script interpolation.
fn num(v: f64) -> String {
    if v.is_finite() {
        format!("{}", v)
    } else {
        "0".to_string()
    }
}

pub struct CdpChatPage {
    page: chromiumoxide::Page,
    contract: DomContract,
    contract_js: String,
}

impl CdpChatPage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self::with_contract(page, DomContract::default())
    }

    pub fn with_contract(page: chromiumoxide::Page, contract: DomContract) -> Self {
        let contract_js = contract.to_js_literal();
        Self {
            page,
            contract,
            contract_js,
        }
    }

    pub fn contract(&self) -> &DomContract {
        &self.contract
    }

    pub fn inner(&self) -> &chromiumoxide::Page {
        &self.page
    }

    /// Run `body` (a function body that `return`s a JSON-able value) with the
    /// prelude in scope. The result is wrapped so `null` survives the trip.
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        let script = format!(
            "(() => {{ const C = {contract}; {prelude} const __r = (() => {{ {body} }})(); return {{ v: __r === undefined ? null : __r }}; }})()",
            contract = self.contract_js,
            prelude = PRELUDE,
            body = body
        );
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("page evaluate failed: {}", e))?;
        let wrapped: Wrapped<T> = result
            .into_value()
            .map_err(|e| anyhow!("unexpected evaluate result: {}", e))?;
        Ok(wrapped.v)
    }
}

#[async_trait]
impl ChatPage for CdpChatPage {
    async fn chat_list_rect(&self) -> Result<Option<Rect>> {
        self.eval("const el = list(); return el ? rectOf(el) : null;")
            .await
    }

    async fn viewport_width(&self) -> Result<f64> {
        self.eval("return window.innerWidth;").await
    }

    async fn contact_rows(&self) -> Result<Vec<ContactRow>> {
        let rows: Vec<ContactRow> = self
            .eval(
                r#"
for (const [id, el] of H.byId) { if (!el.isConnected) H.byId.delete(id); }
const pattern = new RegExp(C.contactTimestampPattern);
return Array.from(document.querySelectorAll(C.contactRow)).map((row) => {
    const label = row.querySelector(C.contactName);
    const name = label && label.textContent ? label.textContent.trim() : '';
    const stamp = Array.from(row.querySelectorAll(C.contactTimestampCandidates))
        .map((d) => (d.textContent || '').trim())
        .find((t) => pattern.test(t));
    return {
        element: ref(row),
        clickTarget: ref(row.querySelector(C.contactClickTarget)),
        name: name || null,
        top: row.getBoundingClientRect().top,
        lastInteraction: stamp || null,
    };
});
"#,
            )
            .await?;
        debug!("cdp_page: {} chat-list rows rendered", rows.len());
        Ok(rows)
    }

    async fn element_rect(&self, element: ElementHandle) -> Result<Option<Rect>> {
        self.eval(&format!(
            "const el = get({}); return el ? rectOf(el) : null;",
            element.0
        ))
        .await
    }

    async fn element_at_point(&self, point: Point) -> Result<Option<ElementHandle>> {
        let id: Option<u64> = self
            .eval(&format!(
                "return ref(document.elementFromPoint({}, {}));",
                num(point.x),
                num(point.y)
            ))
            .await?;
        Ok(id.map(ElementHandle))
    }

    async fn dispatch_pointer(
        &self,
        target: ElementHandle,
        kind: PointerKind,
        point: Point,
    ) -> Result<()> {
        let (button, buttons) = kind.buttons();
        let dispatched: bool = self
            .eval(&format!(
                r#"
const el = get({id});
if (!el) return false;
el.dispatchEvent(new MouseEvent('{ty}', {{
    bubbles: true, cancelable: true, view: window,
    clientX: {x}, clientY: {y}, button: {button}, buttons: {buttons},
}}));
return true;
"#,
                id = target.0,
                ty = kind.event_type(),
                x = num(point.x),
                y = num(point.y),
                button = button,
                buttons = buttons
            ))
            .await?;
        if !dispatched {
            bail!("{} target {:?} detached", kind.event_type(), target);
        }
        Ok(())
    }

    async fn scroll_chat_list(&self, delta: f64) -> Result<Option<ScrollChange>> {
        self.eval(&format!(
            r#"
const el = list();
if (!el) return null;
const before = el.scrollTop;
el.scrollBy({{ top: {delta}, behavior: 'auto' }});
return {{ before, after: el.scrollTop }};
"#,
            delta = num(delta)
        ))
        .await
    }

    async fn message_pane_present(&self) -> Result<bool> {
        self.eval("return !!scroller();").await
    }

    async fn message_rows(&self) -> Result<Vec<MessageRow>> {
        self.eval(
            r#"
const a = area();
if (!a) return [];
return Array.from(a.querySelectorAll(C.messageRow)).map((row) => {
    const bubble = row.querySelector('.' + C.incomingClass + ', .' + C.outgoingClass);
    const holder = row.querySelector(C.messageIdHolder);
    const textEl = row.querySelector(C.messageText);
    const pre = row.querySelector('[' + C.messagePreambleAttribute + ']');
    return {
        domId: holder ? holder.getAttribute(C.messageIdAttribute) : null,
        direction: bubble ? (bubble.classList.contains(C.outgoingClass) ? 'outgoing' : 'incoming') : null,
        text: textEl ? (textEl.textContent || '') : null,
        preamble: pre ? pre.getAttribute(C.messagePreambleAttribute) : null,
    };
});
"#,
        )
        .await
    }

    async fn message_row_count(&self) -> Result<usize> {
        self.eval("const a = area(); return a ? a.querySelectorAll(C.messageRow).length : 0;")
            .await
    }

    async fn scroll_message_pane(&self, delta: f64) -> Result<Option<ScrollChange>> {
        // Direct scrollTop first; some builds of the pane only react to scrollBy.
        self.eval(&format!(
            r#"
const el = scroller();
if (!el) return null;
const before = el.scrollTop;
el.scrollTop = before + ({delta});
if (el.scrollTop === before) el.scrollBy({{ top: {delta}, behavior: 'auto' }});
return {{ before, after: el.scrollTop }};
"#,
            delta = num(delta)
        ))
        .await
    }

    async fn store_local(&self, key: &str, value: &str) -> Result<()> {
        let key_js = serde_json::to_string(key)?;
        let value_js = serde_json::to_string(value)?;
        let stored: bool = self
            .eval(&format!(
                "try {{ localStorage.setItem({}, {}); return true; }} catch (e) {{ return false; }}",
                key_js, value_js
            ))
            .await?;
        if !stored {
            bail!("localStorage.setItem rejected key '{}'", key);
        }
        Ok(())
    }
}
