//! Localized time labels → dates.

use crate::types::LastInteraction;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const TIME_FORMATS: &[&str] = &["%H:%M", "%I:%M %p", "%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y", "%Y-%m-%d"];

static CLOCK_RE: OnceLock<Regex> = OnceLock::new();
static DATE_RE: OnceLock<Regex> = OnceLock::new();
static PREAMBLE_RE: OnceLock<Regex> = OnceLock::new();

fn clock_re() -> &'static Regex {
    CLOCK_RE.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid clock regex"))
}

fn date_re() -> &'static Regex {
    DATE_RE.get_or_init(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid date regex"))
}

fn preamble_re() -> &'static Regex {
    PREAMBLE_RE.get_or_init(|| {
        Regex::new(r"^\s*\[(?P<time>[^,\]]+),\s*(?P<date>[^\]]+)\]").expect("valid preamble regex")
    })
}

/// Resolve a chat-list "last activity" label relative to `today`.
///
/// * `09:45` → today at that time
/// * `Yesterday` → start of yesterday
/// * weekday name → start of its most recent past occurrence (1–7 days back)
/// * `30/03/2025` → start of that day (day/month/year)
pub fn parse_last_interaction(label: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let label = label.trim();
    if label.is_empty() || label == "Unknown" {
        return None;
    }

    if let Some(caps) = clock_re().captures(label) {
        let hours: u32 = caps[1].parse().ok()?;
        let minutes: u32 = caps[2].parse().ok()?;
        return today.and_hms_opt(hours, minutes, 0);
    }

    if label == "Yesterday" {
        return today.pred_opt()?.and_hms_opt(0, 0, 0);
    }

    if let Some(day_index) = WEEKDAYS.iter().position(|d| *d == label) {
        let current = today.weekday().num_days_from_sunday() as i64;
        let mut days_ago = current - day_index as i64;
        if days_ago <= 0 {
            days_ago += 7;
        }
        return (today - Duration::days(days_ago)).and_hms_opt(0, 0, 0);
    }

    if let Some(caps) = date_re().captures(label) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0);
    }

    None
}

/// Local wall-clock time → ISO-8601 UTC with millisecond precision.
pub fn local_to_iso(naive: NaiveDateTime) -> Option<String> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Build the stored last-interaction value from a raw row label.
pub fn last_interaction_from_label(label: Option<&str>, today: NaiveDate) -> LastInteraction {
    let Some(text) = label.map(str::trim).filter(|t| !t.is_empty()) else {
        return LastInteraction::default();
    };
    LastInteraction {
        text: text.to_string(),
        date: parse_last_interaction(text, today).and_then(local_to_iso),
    }
}

/// Parse the `[time, date] author: ` preamble of a message bubble.
pub fn parse_preamble(preamble: &str) -> Option<NaiveDateTime> {
    let caps = preamble_re().captures(preamble)?;
    // Some locales put a narrow no-break space before AM/PM.
    let time_raw = caps["time"].replace(['\u{202f}', '\u{a0}'], " ");
    let date_raw = caps["date"].trim();

    let time = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(time_raw.trim(), f).ok())?;
    let date = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date_raw, f).ok())?;
    Some(date.and_time(time))
}
