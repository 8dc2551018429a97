//! Tier-two service settings from `bczd.conf` plus command-line overrides.
//!
//! The conf file is `key=value` per line; `#` and `;` start comments, a bare
//! key means `1`, and a repeated key keeps every value (the last one wins for
//! single-valued settings).

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bczd_consensus::{bytes_from_hex, Network};
use bczd_log::{parse_categories, Category, Format, Level};

pub const CONF_FILE_NAME: &str = "bczd.conf";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_SYNC_TICK_SECS: u64 = 5;

pub type ConfMap = HashMap<String, Vec<String>>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    InvalidValue { key: String, value: String },
    UnknownCategory(String),
    MissingOperatorKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{value}' for {key}")
            }
            ConfigError::UnknownCategory(name) => write!(f, "unknown debug category '{name}'"),
            ConfigError::MissingOperatorKey => {
                write!(f, "masternode=1 requires mnoperatorpubkey")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageBackend {
    Memory,
    Fjall,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(StorageBackend::Memory),
            "fjall" => Some(StorageBackend::Fjall),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TierTwoConfig {
    pub network: Network,
    pub data_dir: PathBuf,
    pub masternode: bool,
    pub operator_pubkey: Option<Vec<u8>>,
    pub spork_key: Option<[u8; 32]>,
    pub log_level: Level,
    pub log_format: Format,
    pub log_timestamps: bool,
    pub debug_categories: Vec<Category>,
    pub sync_tick_secs: u64,
    pub storage: StorageBackend,
}

impl Default for TierTwoConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            masternode: false,
            operator_pubkey: None,
            spork_key: None,
            log_level: Level::Info,
            log_format: Format::Text,
            log_timestamps: true,
            debug_categories: Vec::new(),
            sync_tick_secs: DEFAULT_SYNC_TICK_SECS,
            storage: StorageBackend::Fjall,
        }
    }
}

impl TierTwoConfig {
    /// Defaults, then the conf file, then command-line values.
    pub fn from_sources(conf: Option<&ConfMap>, cli: &ConfMap) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(conf) = conf {
            config.apply(conf)?;
        }
        config.apply(cli)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, values: &ConfMap) -> Result<(), ConfigError> {
        if let Some(value) = last(values, "network") {
            self.network = Network::parse(value).ok_or_else(|| invalid("network", value))?;
        }
        // Legacy boolean network switches.
        if let Some(value) = last(values, "testnet") {
            if parse_conf_bool(value).ok_or_else(|| invalid("testnet", value))? {
                self.network = Network::Testnet;
            }
        }
        if let Some(value) = last(values, "regtest") {
            if parse_conf_bool(value).ok_or_else(|| invalid("regtest", value))? {
                self.network = Network::Regtest;
            }
        }
        if let Some(value) = last(values, "datadir") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = last(values, "masternode") {
            self.masternode = parse_conf_bool(value).ok_or_else(|| invalid("masternode", value))?;
        }
        if let Some(value) = last(values, "mnoperatorpubkey") {
            let bytes = bytes_from_hex(value).map_err(|_| invalid("mnoperatorpubkey", value))?;
            if !matches!(bytes.len(), 33 | 65) {
                return Err(invalid("mnoperatorpubkey", value));
            }
            self.operator_pubkey = Some(bytes);
        }
        if let Some(value) = last(values, "sporkkey") {
            let bytes = bytes_from_hex(value).map_err(|_| invalid("sporkkey", "<redacted>"))?;
            let secret: [u8; 32] = bytes
                .try_into()
                .map_err(|_| invalid("sporkkey", "<redacted>"))?;
            self.spork_key = Some(secret);
        }
        if let Some(value) = last(values, "loglevel") {
            self.log_level = Level::parse(value).ok_or_else(|| invalid("loglevel", value))?;
        }
        if let Some(value) = last(values, "logformat") {
            self.log_format = Format::parse(value).ok_or_else(|| invalid("logformat", value))?;
        }
        if let Some(value) = last(values, "logtimestamps") {
            self.log_timestamps =
                parse_conf_bool(value).ok_or_else(|| invalid("logtimestamps", value))?;
        }
        if let Some(debug) = values.get("debug") {
            for raw in debug {
                let (known, unknown) = parse_categories(raw);
                if let Some(name) = unknown.into_iter().next() {
                    return Err(ConfigError::UnknownCategory(name));
                }
                for category in known {
                    if !self.debug_categories.contains(&category) {
                        self.debug_categories.push(category);
                    }
                }
            }
        }
        if let Some(value) = last(values, "synctick") {
            self.sync_tick_secs = value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| invalid("synctick", value))?;
        }
        if let Some(value) = last(values, "storage") {
            self.storage = StorageBackend::parse(value).ok_or_else(|| invalid("storage", value))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.masternode && self.operator_pubkey.is_none() {
            return Err(ConfigError::MissingOperatorKey);
        }
        Ok(())
    }

    /// Operator key when this node runs as a masternode.
    pub fn active_operator_key(&self) -> Option<Vec<u8>> {
        if self.masternode {
            self.operator_pubkey.clone()
        } else {
            None
        }
    }

    /// Network-specific data directory.
    pub fn network_data_dir(&self) -> PathBuf {
        match self.network {
            Network::Mainnet => self.data_dir.clone(),
            Network::Testnet => self.data_dir.join("testnet"),
            Network::Regtest => self.data_dir.join("regtest"),
        }
    }
}

fn last<'a>(values: &'a ConfMap, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .and_then(|values| values.last())
        .map(String::as_str)
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Reads a conf file; a missing file is not an error.
pub fn load_conf_file(path: &Path) -> Result<Option<ConfMap>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(Some(parse_conf(&contents)))
}

pub fn parse_conf(contents: &str) -> ConfMap {
    let mut out = ConfMap::new();
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if let Some(idx) = line.find(|c| c == '#' || c == ';') {
            line = &line[..idx];
        }
        line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    out
}

pub fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
