//! Terminal output helpers: colors, status symbols, and the global
//! `--quiet` / `--json` / `--no-color` switches.
//!
//! The switches travel through environment variables so every command sees
//! them without threading flags around.

use std::io::IsTerminal;

pub const QUIET_ENV: &str = "CAMPUS_LOGIN_QUIET";
pub const JSON_ENV: &str = "CAMPUS_LOGIN_JSON";
pub const NO_COLOR_ENV: &str = "CAMPUS_LOGIN_NO_COLOR";

/// Color is on for a terminal unless `NO_COLOR` or `--no-color` says
/// otherwise.
pub fn color_enabled() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() || std::env::var_os(NO_COLOR_ENV).is_some() {
        return false;
    }
    std::io::stderr().is_terminal()
}

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Colored string builder.
pub struct Styled {
    use_color: bool,
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

impl Styled {
    pub fn new() -> Self {
        Self {
            use_color: color_enabled(),
        }
    }

    pub fn ok_sym(&self) -> &str {
        if self.use_color {
            "\x1b[32m\u{2713}\x1b[0m"
        } else {
            "OK"
        }
    }

    pub fn fail_sym(&self) -> &str {
        if self.use_color {
            "\x1b[31m\u{2717}\x1b[0m"
        } else {
            "!!"
        }
    }

    pub fn info_sym(&self) -> &str {
        if self.use_color {
            "\x1b[34m\u{25cb}\x1b[0m"
        } else {
            "--"
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    pub fn red(&self, s: &str) -> String {
        self.paint(RED, s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }
}

/// One result line: symbol, padded label, value.
pub fn print_check(symbol: &str, label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    eprintln!("  {symbol} {label:<12} {value}");
}

/// Human-readable duration ("45s", "2m 5s", "1h 3m").
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn is_quiet() -> bool {
    std::env::var_os(QUIET_ENV).is_some()
}

pub fn is_json() -> bool {
    std::env::var_os(JSON_ENV).is_some()
}

/// Pretty JSON to stdout.
pub fn print_json(value: &serde_json::Value) {
    if let Ok(s) = serde_json::to_string_pretty(value) {
        println!("{s}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_styles_are_identity() {
        let s = Styled { use_color: false };
        assert_eq!(s.green("ok"), "ok");
        assert_eq!(s.dim("x"), "x");
        assert_eq!(s.ok_sym(), "OK");
        assert_eq!(s.fail_sym(), "!!");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(20), "20s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3780), "1h 3m");
    }
}
