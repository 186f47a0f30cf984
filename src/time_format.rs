// Relative timestamps for historical results

use chrono::{DateTime, Local, Utc};

/// "yesterday" for the previous local calendar day, otherwise a relative phrase
/// such as "3 minutes ago". Missing or epoch-zero dates render as "-".
pub fn time_format_ago(date: Option<DateTime<Utc>>) -> String {
    time_format_ago_at(date, Local::now())
}

pub fn time_format_ago_at(date: Option<DateTime<Utc>>, now: DateTime<Local>) -> String {
    let Some(date) = date.filter(|d| d.timestamp_millis() != 0) else {
        return "-".to_string();
    };

    let local = date.with_timezone(&Local);
    if now.date_naive().pred_opt() == Some(local.date_naive()) {
        return "yesterday".to_string();
    }

    let seconds = now.signed_duration_since(local).num_seconds();
    let phrase = relative_phrase(seconds.unsigned_abs());
    if seconds < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round(value: f64) -> u64 {
    value.round() as u64
}

/// Same buckets as the dayjs relativeTime plugin.
#[allow(clippy::cast_precision_loss)]
fn relative_phrase(seconds: u64) -> String {
    let secs = seconds as f64;
    let minutes = round(secs / 60.0);
    let hours = round(secs / 3_600.0);
    let days = round(secs / 86_400.0);
    let months = round(secs / (86_400.0 * 30.4375));
    let years = round(secs / (86_400.0 * 365.25));

    if seconds <= 44 {
        "a few seconds".to_string()
    } else if seconds <= 89 {
        "a minute".to_string()
    } else if minutes <= 44 {
        format!("{minutes} minutes")
    } else if minutes <= 89 {
        "an hour".to_string()
    } else if hours <= 21 {
        format!("{hours} hours")
    } else if hours <= 35 {
        "a day".to_string()
    } else if days <= 25 {
        format!("{days} days")
    } else if days <= 45 {
        "a month".to_string()
    } else if months <= 10 {
        format!("{months} months")
    } else if months <= 17 {
        "a year".to_string()
    } else {
        format!("{} years", years.max(2))
    }
}
