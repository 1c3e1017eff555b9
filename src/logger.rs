//! Logging with colored module prefixes.
//!
//! Messages go to stderr so that rendered wikitext on stdout stays clean.
//! `error` and `warn` messages are always shown; everything else only in
//! verbose mode.
//!
//! # Example
//!
//! ```ignore
//! log!("data"; "discovering {}", title);
//! log!("error"; "render failed: {:#}", err);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::terminal::size;
use std::{
    io::{Write, stderr},
    sync::{
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;

/// Total prefix length for a module name: `[`, `]` and the trailing space.
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
/// Falls back to 120 columns if detection fails.
fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Write one log line to stderr.
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    if !is_verbose() && !always_shown(&module_lower) {
        return;
    }

    let prefix = colorize_prefix(module, &module_lower);
    let mut stderr = stderr().lock();

    if message.contains('\n') {
        writeln!(stderr, "{prefix} {message}").ok();
    } else {
        let width = get_terminal_width() as usize;
        let max_msg_len = width.saturating_sub(calc_prefix_len(module.len()));
        writeln!(stderr, "{prefix} {}", truncate_str(message, max_msg_len)).ok();
    }

    stderr.flush().ok();
}

#[inline]
fn always_shown(module_lower: &str) -> bool {
    matches!(module_lower, "error" | "warn")
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "data" => prefix.bright_blue().bold(),
        "build" => prefix.bright_green().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_prefix_len() {
        // "data" -> "[data] " = 4 + 2 + 1
        assert_eq!(calc_prefix_len(4), 7);
        assert_eq!(calc_prefix_len(0), 3);
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 5), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("", 0), "");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        // "€" is 3 bytes; byte 4 is inside the second one
        assert_eq!(truncate_str("€€", 4), "€");
        assert_eq!(truncate_str("€€", 2), "");
    }

    #[test]
    fn test_always_shown() {
        assert!(always_shown("error"));
        assert!(always_shown("warn"));
        assert!(!always_shown("data"));
    }

    #[test]
    fn test_colorize_prefix_text() {
        colored::control::set_override(false);
        assert_eq!(colorize_prefix("Data", "data").to_string(), "[Data]");
    }
}
