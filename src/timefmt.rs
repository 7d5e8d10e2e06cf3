//! Display-time helpers.
//!
//! The backend stores naive UTC timestamps (SQLite `CURRENT_TIMESTAMP`).
//! Everything shown to the operator is rendered in UTC+8.

use crate::model::UiLanguage;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// The fixed display timezone.
pub fn display_offset() -> FixedOffset {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Convert a naive UTC backend timestamp into display time.
///
/// Strings that do not parse (already zoned, clock-only, garbage) are returned
/// unchanged.
pub fn to_display_time(raw: &str) -> String {
    let trimmed = raw.trim();
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return naive
                .and_utc()
                .with_timezone(&display_offset())
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
        }
    }

    tracing::debug!("Passing through unparseable timestamp {:?}", raw);
    raw.to_string()
}

/// Relative age of a display-zone timestamp at `now`: "just now", "5 minutes
/// ago", and so on. From seven days on, the absolute display time is returned.
///
/// `None` when the string is not a full display timestamp.
pub fn relative_label(display: &str, now: DateTime<Utc>, language: UiLanguage) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(display.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    let at = display_offset().from_local_datetime(&naive).single()?;
    let elapsed = now.signed_duration_since(at.with_timezone(&Utc));

    let secs = elapsed.num_seconds().max(0);
    let (minutes, hours, days) = (secs / 60, secs / 3600, secs / 86_400);

    let unit = if secs < 60 {
        None
    } else if minutes < 60 {
        Some((minutes, "minute", "分钟"))
    } else if hours < 24 {
        Some((hours, "hour", "小时"))
    } else if days < 7 {
        Some((days, "day", "天"))
    } else {
        return Some(display.trim().to_string());
    };

    let label = match (unit, language) {
        (None, UiLanguage::En) => "just now".to_string(),
        (None, UiLanguage::Zh) => "刚刚".to_string(),
        (Some((n, unit, _)), UiLanguage::En) => format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" }),
        (Some((n, _, unit)), UiLanguage::Zh) => format!("{}{}前", n, unit),
    };
    Some(label)
}

fn display_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&display_offset())
}

/// `HH:MM:SS` label for chart points and alerts.
pub fn clock_label() -> String {
    display_now().format("%H:%M:%S").to_string()
}

/// `HH:MM:SS` label `secs_ago` seconds in the past.
pub fn clock_label_ago(secs_ago: i64) -> String {
    (display_now() - ChronoDuration::seconds(secs_ago))
        .format("%H:%M:%S")
        .to_string()
}

/// `HH:MM:SS.mmm` label for synthetic log lines.
pub fn precise_clock_label() -> String {
    display_now().format("%H:%M:%S%.3f").to_string()
}
