use super::timestamp::parse_preamble;
use crate::core::config::ScanPolicy;
use crate::scraping::page::{ChatPage, MessageRow};
use crate::types::MessageRecord;
use chrono::Utc;
use rand::distr::{Distribution, StandardUniform};
use std::collections::HashSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `msg_<unix-millis>_<9 base36 chars>`.
///
/// Not stable across passes: the same bubble read twice gets two ids.
pub fn fallback_message_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut n: u64 = StandardUniform.sample(&mut rand::rng());
    let radix = ID_ALPHABET.len() as u64;
    let suffix: String = (0..9)
        .map(|_| {
            let c = ID_ALPHABET[(n % radix) as usize] as char;
            n /= radix;
            c
        })
        .collect();
    format!("msg_{}_{}", millis, suffix)
}

/// Turn rendered rows into new records, bottom row first.
///
/// Rows without a direction marker or text span are ignored, text is trimmed
/// and empty bodies dropped, DOM ids already in `seen` are skipped.
fn harvest(rows: &[MessageRow], seen: &mut HashSet<String>) -> Vec<MessageRecord> {
    let mut fresh = Vec::new();
    for row in rows.iter().rev() {
        let Some(direction) = row.direction else {
            continue;
        };
        if let Some(id) = row.dom_id.as_deref() {
            if seen.contains(id) {
                continue;
            }
        }
        let Some(text) = row.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };

        let id = match row.dom_id.as_deref() {
            Some(id) => {
                seen.insert(id.to_string());
                id.to_string()
            }
            None => fallback_message_id(),
        };

        fresh.push(MessageRecord {
            id,
            text: text.to_string(),
            direction,
            timestamp: row.preamble.as_deref().and_then(parse_preamble),
        });
    }
    fresh
}

async fn read_visible(page: &dyn ChatPage, seen: &mut HashSet<String>) -> Vec<MessageRecord> {
    match page.message_rows().await {
        Ok(rows) => harvest(&rows, seen),
        Err(e) => {
            warn!("extractor: reading message rows failed: {}", e);
            Vec::new()
        }
    }
}

async fn row_count(page: &dyn ChatPage) -> usize {
    page.message_row_count().await.unwrap_or_else(|e| {
        debug!("extractor: row count failed: {}", e);
        0
    })
}

/// Poll until the pane renders more than `previous` rows or `max_load_wait` elapses.
async fn wait_for_more_rows(page: &dyn ChatPage, previous: usize, policy: &ScanPolicy) -> usize {
    let started = Instant::now();
    let mut current = row_count(page).await;

    while current <= previous && started.elapsed() < policy.max_load_wait {
        sleep(policy.load_poll_interval).await;
        current = row_count(page).await;
        if current > previous {
            debug!("extractor: {} new rows rendered", current - previous);
            sleep(policy.load_render_grace).await;
            break;
        }
    }
    current
}

/// Pull up to `policy.message_cap` messages from the open conversation.
///
/// Reads the rendered rows, then keeps scrolling the pane up and re-reading
/// until one of three things happens: the cap is reached, the scroll offset
/// stops moving, or `empty_cycle_threshold` consecutive cycles bring nothing
/// new. The newest messages win when the cap truncates. Returned records are
/// chronological (oldest first). A missing pane yields an empty list.
pub async fn extract_messages(page: &dyn ChatPage, policy: &ScanPolicy) -> Vec<MessageRecord> {
    match page.message_pane_present().await {
        Ok(true) => {}
        Ok(false) => {
            warn!("extractor: conversation pane not found");
            return Vec::new();
        }
        Err(e) => {
            warn!("extractor: conversation pane lookup failed: {}", e);
            return Vec::new();
        }
    }

    let mut seen = HashSet::new();
    // Newest first while collecting.
    let mut collected = read_visible(page, &mut seen).await;
    let mut empty_cycles = 0u32;
    let mut cycles = 0u32;

    while collected.len() < policy.message_cap && empty_cycles < policy.empty_cycle_threshold {
        let previous = row_count(page).await;

        let change = match page.scroll_message_pane(-policy.message_scroll_step).await {
            Ok(Some(change)) => change,
            Ok(None) => {
                warn!("extractor: message list vanished while scrolling");
                break;
            }
            Err(e) => {
                warn!("extractor: scroll failed: {}", e);
                break;
            }
        };
        if !change.moved() || change.distance() < policy.min_scroll_distance {
            debug!("extractor: reached top of history (offset {})", change.after);
            break;
        }

        cycles += 1;
        sleep(policy.message_scroll_settle).await;
        wait_for_more_rows(page, previous, policy).await;

        let fresh = read_visible(page, &mut seen).await;
        if fresh.is_empty() {
            empty_cycles += 1;
        } else {
            empty_cycles = 0;
            collected.extend(fresh);
        }
    }

    collected.truncate(policy.message_cap);
    collected.reverse();

    info!(
        "extractor: {} messages after {} scroll cycles",
        collected.len(),
        cycles
    );
    collected
}
