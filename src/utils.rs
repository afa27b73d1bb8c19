//! Utility functions for string manipulation and lightweight text checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging
//! - Title slugification for Radio Ambulante episode URLs
//! - Duration normalization from feed metadata
//! - A fast Spanish-vs-English heuristic for feed sanity checks

use once_cell::sync::Lazy;
use regex::Regex;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte
/// count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

/// Convert an episode title to a URL-friendly slug.
///
/// Radio Ambulante publishes episodes at `radioambulante.org/audio/<slug>`;
/// the slug is the lowercased title with punctuation removed and runs of
/// spaces or hyphens collapsed to a single hyphen.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_title("El buzo — parte 1"), "el-buzo-parte-1");
/// ```
pub fn slugify_title(title: &str) -> String {
    static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    SEPARATORS
        .replace_all(cleaned.trim(), "-")
        .trim_matches('-')
        .to_string()
}

/// Normalize a duration value from feed metadata.
///
/// `itunes:duration` may be plain seconds (`"1560"`), `M:SS`, or `H:MM:SS`;
/// plain seconds are converted to `M:SS`, everything else is kept as-is.
pub fn normalize_duration(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        let total: u64 = raw.parse().unwrap_or(0);
        format!("{}:{:02}", total / 60, total % 60)
    } else {
        raw.to_string()
    }
}

/// Truncate to at most `max` characters on a char boundary.
///
/// Bounds scraped bodies and analysis prompt input.
pub fn cap_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Fast check that a block of text is Spanish rather than English.
///
/// Counts common function words of each language; used to sanity-check feed
/// entries before spending an LLM call on them. The curated feeds are
/// Spanish, so ties resolve in favor of Spanish.
pub fn looks_spanish(text: &str) -> bool {
    const SPANISH: [&str; 10] = [
        "el ", "la ", "es ", "que ", "con ", "de ", "en ", "por ", "para ", "ñ",
    ];
    const ENGLISH: [&str; 8] = [
        "the ", "and ", "is ", "are ", "was ", "were ", "this ", "that ",
    ];

    let lower = text.to_lowercase();
    let spanish = SPANISH.iter().filter(|p| lower.contains(*p)).count();
    let english = ENGLISH.iter().filter(|p| lower.contains(*p)).count();
    spanish >= english
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_utf8_boundary() {
        // 'ñ' is two bytes; truncating inside it must not panic.
        let s = "ñ".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with('ñ'));
    }

    #[test]
    fn test_slugify_title() {
        assert_eq!(slugify_title("El buzo"), "el-buzo");
        assert_eq!(slugify_title("Un día más, ¡gracias!"), "un-día-más-gracias");
        assert_eq!(slugify_title("  Multiple   Spaces  "), "multiple-spaces");
        assert_eq!(slugify_title("Ya - con - guiones"), "ya-con-guiones");
    }

    #[test]
    fn test_normalize_duration_seconds() {
        assert_eq!(normalize_duration("1560"), "26:00");
        assert_eq!(normalize_duration("95"), "1:35");
    }

    #[test]
    fn test_normalize_duration_passthrough() {
        assert_eq!(normalize_duration("26:30"), "26:30");
        assert_eq!(normalize_duration("1:02:15"), "1:02:15");
        assert_eq!(normalize_duration(" 18:04 "), "18:04");
    }

    #[test]
    fn test_cap_chars() {
        assert_eq!(cap_chars("corto", 2000), "corto");
        let long = "ñ".repeat(3000);
        assert_eq!(cap_chars(&long, 2000).chars().count(), 2000);
    }

    #[test]
    fn test_looks_spanish() {
        assert!(looks_spanish(
            "El gobierno aprobó la reforma que afecta a los trabajadores en España."
        ));
        assert!(!looks_spanish(
            "The government approved the reform and this is what it means."
        ));
    }
}
