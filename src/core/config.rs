use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (contact-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "CONTACT_SCOUT_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_CHAT_URL: &str = "CONTACT_SCOUT_CHAT_URL";
pub const ENV_PROFILE_DIR: &str = "CONTACT_SCOUT_PROFILE_DIR";
pub const ENV_HEADLESS: &str = "CONTACT_SCOUT_HEADLESS";
pub const ENV_LOGIN_TIMEOUT: &str = "CONTACT_SCOUT_LOGIN_TIMEOUT_SECS";
pub const ENV_SYNC_URL: &str = "CONTACT_SCOUT_SYNC_URL";
pub const ENV_USER_NAME: &str = "CONTACT_SCOUT_USER_NAME";
pub const ENV_PHONE: &str = "CONTACT_SCOUT_PHONE";
pub const ENV_STORAGE_KEY: &str = "CONTACT_SCOUT_STORAGE_KEY";
pub const ENV_EXPORT_DIR: &str = "CONTACT_SCOUT_EXPORT_DIR";

const DEFAULT_CHAT_URL: &str = "https://web.whatsapp.com/";
const DEFAULT_STORAGE_KEY: &str = "whatsappContactsData";

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn scout_home() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".contact-scout"))
}

/// Browser sub-config (mirrors the `browser` key in contact-scout.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct BrowserSection {
    /// Page hosting the chat list.
    pub chat_url: Option<String>,
    /// Persistent Chromium profile so the messenger login survives restarts.
    pub user_data_dir: Option<String>,
    /// Headless only works once the profile already holds a login.
    pub headless: Option<bool>,
    /// How long to wait for the chat list to appear (QR login etc.).
    pub login_timeout_secs: Option<u64>,
}

impl BrowserSection {
    /// Chat URL: JSON field → `CONTACT_SCOUT_CHAT_URL` → `https://web.whatsapp.com/`.
    pub fn resolve_chat_url(&self) -> String {
        non_empty(&self.chat_url)
            .or_else(|| env_non_empty(ENV_CHAT_URL))
            .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string())
    }

    /// Profile dir: JSON field → `CONTACT_SCOUT_PROFILE_DIR` → `~/.contact-scout/profile`.
    pub fn resolve_user_data_dir(&self) -> Option<PathBuf> {
        non_empty(&self.user_data_dir)
            .or_else(|| env_non_empty(ENV_PROFILE_DIR))
            .map(PathBuf::from)
            .or_else(|| scout_home().map(|h| h.join("profile")))
    }

    /// Headless: JSON field → `CONTACT_SCOUT_HEADLESS` → `false`.
    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        env_non_empty(ENV_HEADLESS)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(false)
    }

    /// Login timeout: JSON field → `CONTACT_SCOUT_LOGIN_TIMEOUT_SECS` → 180s.
    pub fn resolve_login_timeout(&self) -> Duration {
        let secs = self
            .login_timeout_secs
            .or_else(|| env_non_empty(ENV_LOGIN_TIMEOUT).and_then(|v| v.parse().ok()))
            .unwrap_or(180);
        Duration::from_secs(secs)
    }
}

/// Ingestion backend sub-config.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SyncSection {
    /// Backend root, e.g. `http://localhost:3000`. The client posts to `{base_url}/v1/sync`.
    pub base_url: Option<String>,
    /// Account owner display name sent with every sync.
    pub user_name: Option<String>,
    /// Account owner phone (E.164): the backend's user key.
    pub phone: Option<String>,
}

impl SyncSection {
    pub fn resolve_base_url(&self) -> Option<String> {
        non_empty(&self.base_url).or_else(|| env_non_empty(ENV_SYNC_URL))
    }

    pub fn resolve_user_name(&self) -> Option<String> {
        non_empty(&self.user_name).or_else(|| env_non_empty(ENV_USER_NAME))
    }

    pub fn resolve_phone(&self) -> Option<String> {
        non_empty(&self.phone).or_else(|| env_non_empty(ENV_PHONE))
    }
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ExportSection {
    pub local_storage_key: Option<String>,
    pub dir: Option<String>,
}

impl ExportSection {
    pub fn resolve_local_storage_key(&self) -> String {
        non_empty(&self.local_storage_key)
            .or_else(|| env_non_empty(ENV_STORAGE_KEY))
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string())
    }

    /// Export dir: JSON field → `CONTACT_SCOUT_EXPORT_DIR` → `~/.contact-scout/exports`.
    pub fn resolve_dir(&self) -> Option<PathBuf> {
        non_empty(&self.dir)
            .or_else(|| env_non_empty(ENV_EXPORT_DIR))
            .map(PathBuf::from)
            .or_else(|| scout_home().map(|h| h.join("exports")))
    }
}

/// Optional overrides for [`ScanPolicy`]. Durations are in milliseconds.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScanSection {
    pub contact_row_height: Option<f64>,
    pub batch_size: Option<usize>,
    pub list_scroll_rows: Option<u32>,
    pub list_scroll_pause_ms: Option<u64>,
    pub list_settle_ms: Option<u64>,
    pub no_scroll_threshold: Option<u32>,
    pub no_visible_threshold: Option<u32>,
    pub no_visible_hard_threshold: Option<u32>,
    pub open_settle_ms: Option<u64>,
    pub courtesy_delay_ms: Option<u64>,
    pub message_cap: Option<usize>,
    pub message_scroll_step: Option<f64>,
    pub min_scroll_distance: Option<f64>,
    pub message_scroll_settle_ms: Option<u64>,
    pub load_poll_interval_ms: Option<u64>,
    pub max_load_wait_ms: Option<u64>,
    pub load_render_grace_ms: Option<u64>,
    pub empty_cycle_threshold: Option<u32>,
    pub visibility_tolerance: Option<f64>,
}

/// Top-level config loaded from `contact-scout.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    #[serde(default)]
    pub browser: BrowserSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub scan: ScanSection,
}

impl ScoutConfig {
    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy::default().with_overrides(&self.scan)
    }
}

/// Load `contact-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `CONTACT_SCOUT_CONFIG` env var path
/// 2. `./contact-scout.json`
/// 3. `../contact-scout.json`
///
/// Missing file → `ScoutConfig::default()`. Parse error → warning + defaults.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![
        PathBuf::from("contact-scout.json"),
        PathBuf::from("../contact-scout.json"),
    ];
    if let Some(env_path) = env_non_empty(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return parse_scout_config(&contents, path);
    }

    ScoutConfig::default()
}

fn parse_scout_config(contents: &str, path: &Path) -> ScoutConfig {
    match serde_json::from_str::<ScoutConfig>(contents) {
        Ok(cfg) => {
            tracing::info!("contact-scout.json loaded from {}", path.display());
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "contact-scout.json parse error at {}: {}, using defaults",
                path.display(),
                e
            );
            ScoutConfig::default()
        }
    }
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` points at an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = env_non_empty(ENV_CHROME_EXECUTABLE)?;
    Path::new(&p).exists().then_some(p)
}

// ---------------------------------------------------------------------------
// ScanPolicy: tunable constants for the scanner
// ---------------------------------------------------------------------------

/// Timing and threshold policy for one scan.
///
/// None of these are protocol requirements; they trade scan speed against the
/// host page's rendering latency. The three extractor stopping conditions and
/// the two orchestrator counters hold for any values.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Height of one chat-list row in CSS px.
    pub contact_row_height: f64,
    /// Contacts processed before the list is scrolled again.
    pub batch_size: usize,
    /// Rows scrolled per list step.
    pub list_scroll_rows: u32,
    /// Pause right after issuing a list scroll, before reading the new offset.
    pub list_scroll_pause: Duration,
    /// Wait after a list scroll for rows to re-render.
    pub list_settle: Duration,
    /// Scan ends once consecutive non-moving list scrolls exceed this.
    pub no_scroll_threshold: u32,
    /// After this many passes without a visible unprocessed contact, re-check the registry.
    pub no_visible_threshold: u32,
    /// After this many passes without a visible unprocessed contact, stop regardless.
    pub no_visible_hard_threshold: u32,
    /// Wait after clicking a contact for its conversation pane.
    pub open_settle: Duration,
    /// Pause between contacts.
    pub courtesy_delay: Duration,
    /// Max messages kept per contact.
    pub message_cap: usize,
    /// Pixels scrolled up per extractor cycle.
    pub message_scroll_step: f64,
    /// Scrolls moving less than this count as "reached the top".
    pub min_scroll_distance: f64,
    /// Wait after an upward scroll before polling for rows.
    pub message_scroll_settle: Duration,
    pub load_poll_interval: Duration,
    /// Upper bound on the row-count poll.
    pub max_load_wait: Duration,
    /// Extra wait once new rows are detected, for them to finish rendering.
    pub load_render_grace: Duration,
    /// Extractor stops after this many consecutive cycles with nothing new.
    pub empty_cycle_threshold: u32,
    /// Fraction of a row's height that must be inside the list container.
    pub visibility_tolerance: f64,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            contact_row_height: 72.0,
            batch_size: 4,
            list_scroll_rows: 4,
            list_scroll_pause: Duration::from_millis(100),
            list_settle: Duration::from_millis(1600),
            no_scroll_threshold: 3,
            no_visible_threshold: 4,
            no_visible_hard_threshold: 10,
            open_settle: Duration::from_millis(1000),
            courtesy_delay: Duration::from_millis(500),
            message_cap: 20,
            message_scroll_step: 800.0,
            min_scroll_distance: 10.0,
            message_scroll_settle: Duration::from_millis(1500),
            load_poll_interval: Duration::from_millis(300),
            max_load_wait: Duration::from_millis(1000),
            load_render_grace: Duration::from_millis(1600),
            empty_cycle_threshold: 2,
            visibility_tolerance: 0.5,
        }
    }
}

impl ScanPolicy {
    pub fn with_overrides(mut self, s: &ScanSection) -> Self {
        let ms = Duration::from_millis;
        if let Some(v) = s.contact_row_height.filter(|v| *v > 0.0) {
            self.contact_row_height = v;
        }
        if let Some(v) = s.batch_size.filter(|v| *v > 0) {
            self.batch_size = v;
        }
        if let Some(v) = s.list_scroll_rows.filter(|v| *v > 0) {
            self.list_scroll_rows = v;
        }
        if let Some(v) = s.list_scroll_pause_ms {
            self.list_scroll_pause = ms(v);
        }
        if let Some(v) = s.list_settle_ms {
            self.list_settle = ms(v);
        }
        if let Some(v) = s.no_scroll_threshold {
            self.no_scroll_threshold = v;
        }
        if let Some(v) = s.no_visible_threshold {
            self.no_visible_threshold = v;
        }
        if let Some(v) = s.no_visible_hard_threshold {
            self.no_visible_hard_threshold = v;
        }
        if let Some(v) = s.open_settle_ms {
            self.open_settle = ms(v);
        }
        if let Some(v) = s.courtesy_delay_ms {
            self.courtesy_delay = ms(v);
        }
        if let Some(v) = s.message_cap {
            self.message_cap = v;
        }
        if let Some(v) = s.message_scroll_step.filter(|v| *v > 0.0) {
            self.message_scroll_step = v;
        }
        if let Some(v) = s.min_scroll_distance.filter(|v| *v >= 0.0) {
            self.min_scroll_distance = v;
        }
        if let Some(v) = s.message_scroll_settle_ms {
            self.message_scroll_settle = ms(v);
        }
        if let Some(v) = s.load_poll_interval_ms.filter(|v| *v > 0) {
            self.load_poll_interval = ms(v);
        }
        if let Some(v) = s.max_load_wait_ms {
            self.max_load_wait = ms(v);
        }
        if let Some(v) = s.load_render_grace_ms {
            self.load_render_grace = ms(v);
        }
        if let Some(v) = s.empty_cycle_threshold.filter(|v| *v > 0) {
            self.empty_cycle_threshold = v;
        }
        if let Some(v) = s.visibility_tolerance.filter(|v| *v > 0.0 && *v <= 1.0) {
            self.visibility_tolerance = v;
        }
        self
    }

    /// Distance of one chat-list scroll step.
    pub fn list_scroll_step(&self) -> f64 {
        self.contact_row_height * f64::from(self.list_scroll_rows)
    }
}
