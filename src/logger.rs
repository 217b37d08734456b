//! Per-session log file.
//!
//! `init` opens `<data dir>/Hexpick/hexpick.log`, dropping whatever the previous
//! run wrote, and hooks panics into it. Lines below the session's minimum level
//! (`HEXPICK_LOG=info|warn|error`, default `info`) are skipped. Until `init` has
//! run every macro call is a no-op, which is what unit tests rely on.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    /// Parse a `HEXPICK_LOG` value. Case-insensitive; panics can't be filtered out.
    pub fn parse(text: &str) -> Option<Level> {
        match text.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        })
    }
}

struct Session {
    file: Mutex<File>,
    path: PathBuf,
    min_level: Level,
}

static SESSION: OnceLock<Session> = OnceLock::new();

pub fn log_path() -> Option<&'static Path> {
    SESSION.get().map(|s| s.path.as_path())
}

/// Append one record. Dropped before `init`, below the minimum level, or when
/// the file can't be written.
pub fn write(level: Level, msg: &str) {
    let Some(session) = SESSION.get() else { return };
    if level < session.min_level {
        return;
    }
    if let Ok(mut file) = session.file.lock() {
        let _ = writeln!(file, "{}", format_line(&clock_now(), level, msg));
    }
}

fn format_line(clock: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", clock, level, msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log. Later calls do nothing.
pub fn init() {
    if SESSION.get().is_some() {
        return;
    }
    let path = data_dir().join("Hexpick").join("hexpick.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("hexpick: no session log at {}: {}", path.display(), e);
            return;
        }
    };

    let min_level = std::env::var("HEXPICK_LOG")
        .ok()
        .and_then(|v| Level::parse(&v))
        .unwrap_or(Level::Info);
    let _ = writeln!(
        file,
        "# Hexpick {} session, unix time {}, level {}",
        env!("CARGO_PKG_VERSION"),
        unix_secs().unwrap_or(0),
        min_level
    );

    let session = Session {
        file: Mutex::new(file),
        path,
        min_level,
    };
    if SESSION.set(session).is_err() {
        return;
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

/// OS data directory the `Hexpick` folder lives in.
fn data_dir() -> PathBuf {
    let var = |name: &str| std::env::var_os(name).map(PathBuf::from);
    if cfg!(target_os = "windows")
        && let Some(appdata) = var("APPDATA")
    {
        return appdata;
    }
    if cfg!(target_os = "macos")
        && let Some(home) = var("HOME")
    {
        return home.join("Library").join("Application Support");
    }
    var("XDG_DATA_HOME")
        .or_else(|| var("HOME").map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn unix_secs() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// UTC wall clock as HH:MM:SS.
fn clock_now() -> String {
    unix_secs().map_or_else(|| "--:--:--".to_string(), clock_of_day)
}

fn clock_of_day(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, day % 3600 / 60, day % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_has_time_and_level() {
        assert_eq!(
            format_line("01:02:03", Level::Warn, "history save failed"),
            "[01:02:03] [WARN] history save failed"
        );
    }

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock_of_day(0), "00:00:00");
        assert_eq!(clock_of_day(86_399), "23:59:59");
        assert_eq!(clock_of_day(86_400 + 3_661), "01:01:01");
    }

    #[test]
    fn levels_parse_and_order() {
        assert_eq!(Level::parse(" WARNING "), Some(Level::Warn));
        assert_eq!(Level::parse("error"), Some(Level::Error));
        assert_eq!(Level::parse("panic"), None);
        assert_eq!(Level::parse("verbose"), None);
        assert!(Level::Info < Level::Warn && Level::Error < Level::Panic);
    }

    #[test]
    fn logging_before_init_is_a_no_op() {
        log_info!("nothing listens yet: {}", 42);
        log_err!("still nothing");
        assert!(log_path().is_none());
    }
}
