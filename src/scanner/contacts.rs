use super::registry::{Registry, Sighting};
use super::timestamp::last_interaction_from_label;
use crate::scraping::page::ChatPage;
use chrono::{Local, NaiveDate};
use tracing::{debug, warn};

/// Result of one enumeration pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enumeration {
    /// Names seen for the first time in this pass.
    pub newly_found: usize,
    /// Those names, in row order.
    pub names: Vec<String>,
    /// Rows rendered, named or not.
    pub rows_seen: usize,
}

/// Scan the rendered chat-list rows into `registry`.
///
/// Opens a new registry pass, so every handle captured earlier goes stale;
/// contacts whose rows are still rendered get fresh handles and positions.
/// Rows without a name are skipped. A failing driver yields an empty pass.
pub async fn extract_contacts(page: &dyn ChatPage, registry: &mut Registry) -> Enumeration {
    extract_contacts_on(page, registry, Local::now().date_naive()).await
}

/// [`extract_contacts`] with an explicit "today" for resolving row labels.
pub async fn extract_contacts_on(
    page: &dyn ChatPage,
    registry: &mut Registry,
    today: NaiveDate,
) -> Enumeration {
    registry.begin_pass();

    let rows = match page.contact_rows().await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("enumerator: reading chat-list rows failed: {}", e);
            return Enumeration::default();
        }
    };

    let mut outcome = Enumeration {
        rows_seen: rows.len(),
        ..Default::default()
    };

    for row in rows {
        let Some(name) = row.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            debug!("enumerator: skipping unnamed row {:?}", row.element);
            continue;
        };

        let sighting = Sighting {
            element: row.element,
            click_target: row.click_target,
            position: row.top,
            last_interaction: last_interaction_from_label(row.last_interaction.as_deref(), today),
        };

        if registry.observe(name, sighting) {
            outcome.newly_found += 1;
            outcome.names.push(name.to_string());
        }
    }

    debug!(
        "enumerator: pass {} saw {} rows, {} new (registry size {})",
        registry.generation(),
        outcome.rows_seen,
        outcome.newly_found,
        registry.len()
    );
    outcome
}
