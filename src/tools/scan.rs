use crate::core::config::{ScanPolicy, ScoutConfig};
use crate::features::export::{export_locally, to_sync_payload};
use crate::features::sync::{IngestionClient, SyncError, SyncIdentity};
use crate::scanner::{Registry, ScanError, Scanner};
use crate::scraping::browser_manager::ChatSession;
use crate::scraping::page::ChatPage;
use crate::types::ScanResponse;
use crate::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything one scan needs besides the page.
pub struct ScanJob {
    pub policy: ScanPolicy,
    pub login_timeout: Duration,
    pub storage_key: String,
    pub export_dir: Option<PathBuf>,
    pub sync: Option<(IngestionClient, SyncIdentity)>,
}

impl ScanJob {
    pub fn from_config(config: &ScoutConfig, http: &reqwest::Client) -> Self {
        let sync = match IngestionClient::from_config(http.clone(), &config.sync) {
            Ok(pair) => Some(pair),
            Err(SyncError::NotConfigured(field)) => {
                info!("sync disabled ({} not set)", field);
                None
            }
            Err(e) => {
                warn!("sync disabled: {}", e);
                None
            }
        };

        Self {
            policy: config.scan_policy(),
            login_timeout: config.browser.resolve_login_timeout(),
            storage_key: config.export.resolve_local_storage_key(),
            export_dir: config.export.resolve_dir(),
            sync,
        }
    }
}

/// Poll until the chat list container shows up (the user may still be
/// scanning the login QR code).
pub async fn wait_for_chat_list(page: &dyn ChatPage, timeout: Duration) -> Result<(), ScanError> {
    let deadline = Instant::now() + timeout;
    let mut announced = false;

    loop {
        match page.chat_list_rect().await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(e) => warn!("login wait: probe failed: {}", e),
        }

        if Instant::now() >= deadline {
            return Err(ScanError::LoginTimeout(timeout.as_secs()));
        }
        if !announced {
            info!(
                "⏳ waiting up to {}s for the chat list (complete the login in the browser window)",
                timeout.as_secs()
            );
            announced = true;
        }
        sleep(LOGIN_POLL_INTERVAL).await;
    }
}

/// Scan one page end to end: wait for login, walk the list, export, sync.
///
/// Export and sync failures become `warnings`; the collected data is returned
/// regardless.
pub async fn run_scan_on_page(page: &dyn ChatPage, job: &ScanJob) -> Result<ScanResponse, ScanError> {
    wait_for_chat_list(page, job.login_timeout).await?;

    let mut registry = Registry::new();
    let report = Scanner::new(page, job.policy.clone())
        .run(&mut registry)
        .await?;

    let contacts = registry.export();
    let mut warnings = export_locally(
        page,
        &job.storage_key,
        job.export_dir.as_deref(),
        &contacts,
    )
    .await;

    let mut synced = false;
    if let Some((client, identity)) = job.sync.as_ref() {
        let payload = to_sync_payload(&contacts, &identity.name, &identity.phone);
        match client.sync(&payload).await {
            Ok(()) => synced = true,
            Err(e) => {
                warn!("sync failed: {}", e);
                warnings.push(format!("sync_failed: {}", e));
            }
        }
    }

    Ok(ScanResponse {
        report,
        contacts,
        synced,
        warnings,
    })
}

/// Scan the shared chat session, launching the browser on first use.
///
/// Returns [`ScanError::AlreadyRunning`] instead of waiting when another scan
/// holds the session.
pub async fn run_scan(state: &Arc<AppState>) -> Result<ScanResponse, ScanError> {
    let _scan = state
        .scan_lock
        .try_lock()
        .map_err(|_| ScanError::AlreadyRunning)?;

    let mut session = state.session.lock().await;
    let stale = match session.as_ref() {
        Some(existing) => !existing.is_alive().await,
        None => false,
    };
    if stale {
        warn!("chat session unresponsive; relaunching");
        if let Some(dead) = session.take() {
            dead.close().await;
        }
    }
    if session.is_none() {
        let launched = ChatSession::launch(&state.config)
            .await
            .map_err(|e| ScanError::Browser(format!("{:#}", e)))?;
        *session = Some(launched);
    }
    let page = match session.as_ref() {
        Some(s) => {
            info!("🔎 scanning {}", s.chat_url());
            s.chat_page()
        }
        None => return Err(ScanError::Browser("chat session unavailable".into())),
    };

    let job = ScanJob::from_config(&state.config, &state.http_client);
    let response = run_scan_on_page(&page, &job).await?;

    *state.last_result.write().await = Some(response.clone());
    Ok(response)
}
