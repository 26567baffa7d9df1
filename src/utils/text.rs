//! Text cleanup for pipeline output

use once_cell::sync::Lazy;
use regex::Regex;

/// Remove terminal escape sequences: CSI, OSC (terminated or not), charset
/// designations such as `ESC ( B`, and two-byte escapes.
pub fn strip_ansi_codes(input: &str) -> String {
    static ANSI_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)?|[ -/]+[0-~]|[@-Z\\-_])",
        )
        .expect("ANSI pattern should compile")
    });
    ANSI_RE.replace_all(input, "").to_string()
}

/// Strip escape sequences and surrounding whitespace from a report.
pub fn sanitize_report(input: &str) -> String {
    strip_ansi_codes(input).trim().to_string()
}

/// First `max` characters of `input` (char boundary safe).
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}
