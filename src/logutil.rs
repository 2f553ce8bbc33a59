//! Helpers for putting player-supplied strings into logs and records.
//!
//! Usernames, gang names and item ids arrive from the client. Logs must stay
//! one line per event, and stored names must not carry control characters.

use std::fmt::Write;

const MAX_LOG_PREVIEW: usize = 120;
const MAX_DISPLAY_NAME: usize = 64;

/// Escape a client string for single-line logging. Control characters become
/// `\n`, `\t` or `\xNN`; long values are cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_LOG_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_LOG_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Normalize a display name: drop control characters, collapse runs of
/// whitespace and trim. Capped at 64 characters.
pub fn clean_display_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_DISPLAY_NAME));
    let mut pending_space = false;
    for ch in raw.chars().filter(|c| !c.is_control() || c.is_whitespace()) {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
        if out.chars().count() >= MAX_DISPLAY_NAME {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_escape_keeps_one_line() {
        assert_eq!(escape_log("Big\nBoss\t\u{7}"), "Big\\nBoss\\t\\x07");
        let long = "x".repeat(500);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), MAX_LOG_PREVIEW + 1);
    }

    #[test]
    fn display_names_are_trimmed_and_collapsed() {
        assert_eq!(clean_display_name("  Night \n\t Owls  "), "Night Owls");
        assert_eq!(clean_display_name("\u{0}\u{1b}"), "");
        assert_eq!(clean_display_name(&"a".repeat(100)).len(), MAX_DISPLAY_NAME);
    }
}
