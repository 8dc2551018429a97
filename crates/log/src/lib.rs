//! Process-wide stderr logger with levels, text or JSON lines, and debug
//! categories for the tier-two subsystems.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Text = 0,
    Json = 1,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Debug categories for the tier-two subsystems.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Category {
    Masternode = 0,
    Sporks = 1,
    Sync = 2,
    Net = 3,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Masternode,
        Category::Sporks,
        Category::Sync,
        Category::Net,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Masternode => "masternode",
            Self::Sporks => "sporks",
            Self::Sync => "mnsync",
            Self::Net => "net",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "masternode" | "mn" => Some(Self::Masternode),
            "sporks" | "spork" => Some(Self::Sporks),
            "mnsync" | "sync" => Some(Self::Sync),
            "net" => Some(Self::Net),
            _ => None,
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static LOG_FORMAT: AtomicU8 = AtomicU8::new(Format::Text as u8);
static LOG_TIMESTAMPS: AtomicBool = AtomicBool::new(true);
static LOG_CATEGORIES: AtomicU32 = AtomicU32::new(0);

pub fn init(config: LogConfig) {
    LOG_LEVEL.store(config.level as u8, Ordering::Relaxed);
    LOG_FORMAT.store(config.format as u8, Ordering::Relaxed);
    LOG_TIMESTAMPS.store(config.timestamps, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= LOG_LEVEL.load(Ordering::Relaxed)
}

pub fn enable_category(category: Category) {
    LOG_CATEGORIES.fetch_or(category.bit(), Ordering::Relaxed);
}

pub fn disable_categories() {
    LOG_CATEGORIES.store(0, Ordering::Relaxed);
}

pub fn category_enabled(category: Category) -> bool {
    LOG_CATEGORIES.load(Ordering::Relaxed) & category.bit() != 0
}

/// Parses a `-debug=` style list (`masternode,sporks`, `all`, `1`).
/// Unknown names are returned so the caller can warn about them.
pub fn parse_categories(raw: &str) -> (Vec<Category>, Vec<String>) {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if name == "all" || name == "1" {
            known = Category::ALL.to_vec();
            continue;
        }
        match Category::parse(name) {
            Some(category) => {
                if !known.contains(&category) {
                    known.push(category);
                }
            }
            None => unknown.push(name.to_string()),
        }
    }
    (known, unknown)
}

pub fn log(
    level: Level,
    target: &'static str,
    file: &'static str,
    line: u32,
    args: fmt::Arguments<'_>,
) {
    log_with_category(level, None, target, file, line, args);
}

pub fn log_with_category(
    level: Level,
    category: Option<Category>,
    target: &'static str,
    file: &'static str,
    line: u32,
    args: fmt::Arguments<'_>,
) {
    let allowed = match category {
        Some(category) => category_enabled(category) || enabled(Level::Trace),
        None => enabled(level),
    };
    if !allowed {
        return;
    }
    let format = if LOG_FORMAT.load(Ordering::Relaxed) == Format::Json as u8 {
        Format::Json
    } else {
        Format::Text
    };
    let record = Record {
        now: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default(),
        level,
        category,
        target,
        file,
        line,
    };
    let rendered = record.render(format, LOG_TIMESTAMPS.load(Ordering::Relaxed), args);
    let _ = writeln!(io::stderr().lock(), "{rendered}");
}

/// One log line before formatting.
struct Record {
    now: Duration,
    level: Level,
    category: Option<Category>,
    target: &'static str,
    file: &'static str,
    line: u32,
}

impl Record {
    fn render(&self, format: Format, timestamps: bool, args: fmt::Arguments<'_>) -> String {
        match format {
            Format::Json => {
                let ts_ms: u64 = self.now.as_millis().try_into().unwrap_or(u64::MAX);
                json!({
                    "ts_ms": ts_ms,
                    "level": self.level.as_str(),
                    "target": self.target,
                    "category": self.category.map(Category::as_str),
                    "file": self.file,
                    "line": self.line,
                    "msg": args.to_string(),
                })
                .to_string()
            }
            Format::Text => {
                let mut out = String::new();
                if timestamps {
                    let ts = Timestamp {
                        unix_seconds: self.now.as_secs(),
                        millis: self.now.subsec_millis(),
                    };
                    out.push_str(&format!("{ts} "));
                }
                out.push_str(self.level.as_str());
                if let Some(category) = self.category {
                    out.push_str(&format!(" [{}]", category.as_str()));
                }
                out.push_str(&format!(" {}: {args}", self.target));
                out
            }
        }
    }
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, module_path!(), file!(), line!(), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Error, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Warn, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Info, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Debug, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Trace, $($arg)*);
    }};
}

/// Debug-level line gated on a category rather than the global level.
#[macro_export]
macro_rules! log_category {
    ($category:expr, $($arg:tt)*) => {{
        let category: $crate::Category = $category;
        if $crate::category_enabled(category) || $crate::enabled($crate::Level::Trace) {
            $crate::log_with_category(
                $crate::Level::Debug,
                Some(category),
                module_path!(),
                file!(),
                line!(),
                format_args!($($arg)*),
            );
        }
    }};
}

struct Timestamp {
    unix_seconds: u64,
    millis: u32,
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SECS_PER_DAY: u64 = 86_400;
        let days = (self.unix_seconds / SECS_PER_DAY) as i64;
        let secs_of_day = self.unix_seconds % SECS_PER_DAY;
        let hour = secs_of_day / 3600;
        let minute = (secs_of_day % 3600) / 60;
        let second = secs_of_day % 60;
        let (year, month, day) = civil_from_days(days);
        write!(
            f,
            "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{millis:03}Z",
            millis = self.millis
        )
    }
}

fn civil_from_days(days_since_unix_epoch: i64) -> (i32, u32, u32) {
    // From Howard Hinnant's "civil_from_days" algorithm (public domain).
    let z = days_since_unix_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = (yoe as i32) + (era as i32) * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = y + if m <= 2 { 1 } else { 0 };
    (year, m, d)
}
