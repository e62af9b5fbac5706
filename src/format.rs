//! Human-readable time labels for the messaging views.
//!
//! Everything here is pure: callers pass `now` and the display offset so the
//! labels are reproducible.

use time::{Date, Duration, OffsetDateTime, UtcOffset, macros::format_description};

/// Age of a conversation's last activity, e.g. `"5m ago"`.
///
/// Under a minute (including timestamps slightly in the future) reads
/// `"Just now"`; a week or older falls back to `"Jan 5"`.
pub fn relative_time(then: OffsetDateTime, now: OffsetDateTime, offset: UtcOffset) -> String {
    let elapsed = now - then;
    let minutes = elapsed.whole_minutes();
    let hours = elapsed.whole_hours();
    let days = elapsed.whole_days();

    if minutes < 1 {
        "Just now".to_owned()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else {
        month_day(then.to_offset(offset).date())
    }
}

/// Heading of a date group: `"Today"`, `"Yesterday"` or `"Jan 5, 2024"`.
pub fn date_label(date: Date, today: Date) -> String {
    if date == today {
        "Today".to_owned()
    } else if today.checked_sub(Duration::days(1)) == Some(date) {
        "Yesterday".to_owned()
    } else {
        format!("{}, {}", month_day(date), date.year())
    }
}

/// Clock time shown under a message bubble, e.g. `"03:05 PM"`.
pub fn time_of_day(at: OffsetDateTime, offset: UtcOffset) -> String {
    let format = format_description!("[hour repr:12]:[minute] [period]");
    at.to_offset(offset)
        .format(&format)
        .unwrap_or_else(|_| at.to_offset(offset).time().to_string())
}

/// Calendar date of `at` as seen from `offset`.
pub fn local_date(at: OffsetDateTime, offset: UtcOffset) -> Date {
    at.to_offset(offset).date()
}

/// Euro amount in German notation, e.g. `"1.250,50 €"`.
pub fn price(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = (cents / 100).unsigned_abs().to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}{grouped},{:02}\u{a0}€", (cents % 100).unsigned_abs())
}

fn month_day(date: Date) -> String {
    let month = date.month().to_string();
    format!("{} {}", &month[..3], date.day())
}
