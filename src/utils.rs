use std::io::{self, Write};
use std::sync::Once;
use std::time::Duration;

const ATTR_RESET: &str = "\x1B[0m";
const CLEAR_LINE: &str = "\r\x1B[K";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Reset colors and leave the cursor on a fresh line.
///
/// A Ctrl-C while a prompt is waiting leaves the cursor after the prompt
/// text, possibly inside a colored span.
pub fn reset_terminal() {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(format!("{CLEAR_LINE}{ATTR_RESET}\n").as_bytes());
    let _ = stdout.flush();
}

/// Install a panic hook that resets the terminal before the default hook runs.
/// Only the first call installs it.
pub fn install_terminal_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            reset_terminal();
            default_hook(panic_info);
        }));
    });
}

/// Truncate a string safely by character count, not byte count.
/// This ensures we don't break UTF-8 encoding by cutting mid-character.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Compact duration for the summary table: `850ms`, `12.4s`, `3m05s`
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        let secs = d.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_utf8() {
        let result = truncate("Überprüfung fehlgeschlagen", 10);
        assert_eq!(result, "Überprü...");
        assert!(result.is_char_boundary(result.len()));
    }

    #[test]
    fn test_truncate_very_short() {
        assert_eq!(truncate("hello", 3), "...");
        assert_eq!(truncate("hello", 2), "...");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(12_400)), "12.4s");
        assert_eq!(format_duration(Duration::from_secs(185)), "3m05s");
    }
}
