use crate::core::config::{load_scout_config, ScoutConfig};
use crate::core::types::ScanResponse;
use crate::scraping::browser_manager::ChatSession;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,

    /// File-based config loaded from `contact-scout.json` (env-var fallback for all fields).
    pub config: Arc<ScoutConfig>,

    // Long-lived browser tab on the chat page; launched on the first scan.
    pub session: Arc<Mutex<Option<ChatSession>>>,

    // One scan per tab. Held for the whole scan, `try_lock` only.
    pub scan_lock: Arc<Mutex<()>>,

    pub last_result: Arc<RwLock<Option<ScanResponse>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chat_url", &self.config.browser.resolve_chat_url())
            .field("sync_configured", &self.config.sync.resolve_base_url().is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_config(http_client, load_scout_config())
    }

    pub fn with_config(http_client: reqwest::Client, config: ScoutConfig) -> Self {
        Self {
            http_client,
            config: Arc::new(config),
            session: Arc::new(Mutex::new(None)),
            scan_lock: Arc::new(Mutex::new(())),
            last_result: Arc::new(RwLock::new(None)),
        }
    }

    /// Close the browser session, if any.
    ///
    /// Does not wait for a running scan: the session stays with it and is torn
    /// down by `ChatSession`'s `Drop` once the last state handle goes away.
    /// Returns `false` in that case.
    pub async fn shutdown(&self) -> bool {
        let Ok(mut session) = self.session.try_lock() else {
            warn!("shutdown: a scan is still running; browser session closes when it finishes");
            return false;
        };
        if let Some(session) = session.take() {
            session.close().await;
        }
        true
    }
}
