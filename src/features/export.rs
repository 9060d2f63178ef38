//! Registry export: the page-scoped store, an on-disk copy, and the
//! ingestion payload.
//!
//! Export failures are logged and reported to the caller but never touch the
//! registry; whatever was collected stays available.

use crate::scraping::page::ChatPage;
use crate::types::{RegistryExport, SyncContact, SyncMessage, SyncPayload};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Shape the ingestion call body from an export.
///
/// Every contact is sent; `lastInteraction` only when its label resolved to
/// a date, `messages` only when at least one was collected.
pub fn to_sync_payload(export: &RegistryExport, name: &str, phone: &str) -> SyncPayload {
    let contacts = export
        .iter()
        .map(|(contact_name, contact)| SyncContact {
            name: contact_name.clone(),
            last_interaction: contact.last_interaction.date.clone(),
            messages: (!contact.messages.is_empty()).then(|| {
                contact
                    .messages
                    .iter()
                    .map(|m| SyncMessage {
                        direction: m.direction,
                        content: m.text.clone(),
                    })
                    .collect()
            }),
        })
        .collect();

    SyncPayload {
        name: name.to_string(),
        phone: phone.to_string(),
        contacts,
    }
}

/// Write the export as JSON into the page's `localStorage` under `key`.
pub async fn export_to_page(
    page: &dyn ChatPage,
    key: &str,
    export: &RegistryExport,
) -> Result<()> {
    let json = serde_json::to_string(export).context("registry serialization failed")?;
    page.store_local(key, &json)
        .await
        .with_context(|| format!("storing export under '{}'", key))?;
    info!(
        "export: {} contacts saved to page storage (key '{}')",
        export.len(),
        key
    );
    Ok(())
}

/// Write the export to `{dir}/contacts-<utc-timestamp>.json` atomically
/// (temp file + rename). Returns the final path.
pub fn write_export_file(dir: &Path, export: &RegistryExport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let json = serde_json::to_string_pretty(export).context("registry serialization failed")?;
    let path = dir.join(format!(
        "contacts-{}.json",
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));
    let tmp = path.with_extension("tmp");

    std::fs::write(&tmp, &json)
        .with_context(|| format!("failed to write temp file {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to rename into {}", path.display()));
    }

    info!("export: {} contacts written to {}", export.len(), path.display());
    Ok(path)
}

/// Run both local exports; returns human-readable warnings for the ones that failed.
pub async fn export_locally(
    page: &dyn ChatPage,
    key: &str,
    dir: Option<&Path>,
    export: &RegistryExport,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Err(e) = export_to_page(page, key, export).await {
        warn!("export: page storage failed: {:#}", e);
        warnings.push(format!("page_export_failed: {:#}", e));
    }

    if let Some(dir) = dir {
        if let Err(e) = write_export_file(dir, export) {
            warn!("export: file export failed: {:#}", e);
            warnings.push(format!("file_export_failed: {:#}", e));
        }
    }

    warnings
}
