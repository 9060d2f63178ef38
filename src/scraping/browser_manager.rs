//! Native browser management using `chromiumoxide`.
//!
//! This module is the single source of truth for:
//! * Finding a usable browser executable (Brave → Chrome → Chromium, cross-platform).
//! * Building the launch config for the messenger session (persistent profile,
//!   visible by default so the user can complete the QR login).
//! * `ChatSession`: one long-lived browser + tab pointed at the chat page.
//!   The scanner assumes exactly one scan per tab, so the session is what the
//!   app-level scan lock guards.

use crate::core::config::{chrome_executable_override, ScoutConfig};
use crate::scraping::cdp_page::CdpChatPage;
use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Browser;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan – finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "brave-browser",
            "brave",
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/brave-browser",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

// ── Launch config ────────────────────────────────────────────────────────────

/// Build a `BrowserConfig` for the messenger session.
///
/// The profile directory is persistent: the messenger keeps its login in
/// IndexedDB/localStorage, and the page-scoped export lands there too.
pub fn build_session_config(
    exe: &str,
    user_data_dir: Option<&Path>,
    headless: bool,
    width: u32,
    height: u32,
) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-dev-shm-usage") // avoids /dev/shm OOM in constrained environments
        .arg("--disable-background-timer-throttling")
        .arg("--disable-renderer-backgrounding")
        // Suppress the CDP automation fingerprint.
        .arg("--disable-blink-features=AutomationControlled");

    if !headless {
        builder = builder.with_head();
    }

    if let Some(dir) = user_data_dir {
        builder = builder.user_data_dir(dir);
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Chat session ─────────────────────────────────────────────────────────────

/// One browser process with one tab on the chat page.
pub struct ChatSession {
    browser: Option<Browser>,
    page: chromiumoxide::Page,
    handler: JoinHandle<()>,
    chat_url: String,
}

impl ChatSession {
    /// Launch the browser and open the chat page.
    pub async fn launch(config: &ScoutConfig) -> Result<Self> {
        let exe = find_chrome_executable().ok_or_else(|| {
            anyhow!("No browser found. Install Chrome, Chromium or Brave, or set CHROME_EXECUTABLE.")
        })?;
        let chat_url = config.browser.resolve_chat_url();
        url::Url::parse(&chat_url).map_err(|e| anyhow!("Invalid chat URL '{}': {}", chat_url, e))?;

        let profile: Option<PathBuf> = config.browser.resolve_user_data_dir();
        if let Some(dir) = profile.as_ref() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("chat session: cannot create profile dir {}: {}", dir.display(), e);
            }
        }
        let headless = config.browser.resolve_headless();

        info!(
            "🚀 chat session: launching {} (headless={}, profile={})",
            exe,
            headless,
            profile
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<ephemeral>".into())
        );

        let launch_cfg = build_session_config(&exe, profile.as_deref(), headless, 1440, 900)?;
        let (mut browser, mut handler) = Browser::launch(launch_cfg)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("chat session CDP handler error: {}", e);
                }
            }
        });

        let page = match browser.new_page(chat_url.as_str()).await {
            Ok(p) => p,
            Err(e) => {
                browser.close().await.ok();
                handler.abort();
                return Err(anyhow!("Failed to open {}: {}", chat_url, e));
            }
        };

        info!("🌐 chat session: opened {}", chat_url);

        Ok(Self {
            browser: Some(browser),
            page,
            handler,
            chat_url,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Scanner-facing view of the session tab.
    pub fn chat_page(&self) -> CdpChatPage {
        CdpChatPage::new(self.page.clone())
    }

    /// Cheap liveness probe used before reusing a session.
    pub async fn is_alive(&self) -> bool {
        self.page.evaluate("1 + 1").await.is_ok()
    }

    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
        }
        self.handler.abort();
        info!("🛑 chat session closed");
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        // Drop cannot await; hand the close to the runtime if one is around so
        // no Chromium process is left behind.
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        self.handler.abort();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = browser.close().await;
            });
        }
    }
}
