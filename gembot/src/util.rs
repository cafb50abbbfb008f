//! Small shared helpers: ids, timestamps, paths, string trimming.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Generate a unique message id.
#[must_use]
pub fn generate_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Configuration directory (`~/.gembot`).
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gembot")
}

/// Truncate a string to at most `max_chars` characters for log previews.
///
/// Appends an ellipsis when anything was cut off.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_uniqueness() {
        assert_ne!(generate_message_id(), generate_message_id());
    }

    #[test]
    fn test_timestamp_monotonic_enough() {
        assert!(timestamp_ms() > 0);
    }

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let out = truncate_str("hello world", 5);
        assert_eq!(out, "hello…");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let out = truncate_str("héllö wörld", 4);
        assert_eq!(out, "héll…");
    }
}
