//! Message rendering
//!
//! Channel rows carry a body template with one `%s` placeholder for the
//! sensor name. `%%` renders a literal percent sign.

use chrono::{DateTime, TimeZone};

/// Format of the optional timestamp suffix
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";

/// Maximum title length for in-app, push and post messages
pub const MAX_TITLE_CHARS: usize = 32;

/// Maximum body length for push and post messages
pub const MAX_BODY_CHARS: usize = 256;

/// Substitute `name` into the first `%s` of `template`
///
/// Further `%s` placeholders and unknown directives are kept verbatim.
pub fn render_body(template: &str, name: &str) -> String {
    let mut out = String::with_capacity(template.len() + name.len());
    let mut substituted = false;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') if !substituted => {
                chars.next();
                out.push_str(name);
                substituted = true;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    out
}

/// Append `" DD.MM.YYYY, HH:MM:SS"` when `use_timestamp` is set
pub fn with_timestamp<Tz: TimeZone>(text: String, use_timestamp: bool, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if use_timestamp {
        format!("{} {}", text, now.format(TIMESTAMP_FORMAT))
    } else {
        text
    }
}

/// Cut `text` to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
