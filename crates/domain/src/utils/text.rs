//! String helpers for bounding error payloads

use crate::constants::{MAX_ERROR_MESSAGE_CHARS, TRUNCATE_SUFFIX};

/// Truncate `message` to at most `max_chars` characters, appending
/// [`TRUNCATE_SUFFIX`] when anything was cut.
///
/// Counts characters rather than bytes so multi-byte text never splits a
/// code point.
///
/// # Examples
///
/// ```
/// use fabricflow_domain::utils::truncate_message;
///
/// assert_eq!(truncate_message("short", 10), "short");
/// assert_eq!(truncate_message("abcdefghij", 6), "abc...");
/// ```
#[must_use]
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATE_SUFFIX.chars().count());
    let mut out: String = message.chars().take(keep).collect();
    out.push_str(TRUNCATE_SUFFIX);
    out
}

/// Convenience extension for bounding error text with the default limit.
pub trait TruncateExt {
    /// Truncate to [`MAX_ERROR_MESSAGE_CHARS`].
    fn truncated(&self) -> String;
}

impl TruncateExt for str {
    fn truncated(&self) -> String {
        truncate_message(self, MAX_ERROR_MESSAGE_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_short_messages() {
        assert_eq!(truncate_message("", 4), "");
        assert_eq!(truncate_message("abcd", 4), "abcd");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let text = "ééééééééé";
        let out = truncate_message(text, 5);
        assert_eq!(out, "éé...");
        assert_eq!(out.chars().count(), 5);
    }

    #[test]
    fn default_limit_bounds_huge_bodies() {
        let huge = "x".repeat(MAX_ERROR_MESSAGE_CHARS * 20);
        assert_eq!(huge.as_str().truncated().chars().count(), MAX_ERROR_MESSAGE_CHARS);
    }
}
