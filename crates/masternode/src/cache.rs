//! `mncache.dat`: the masternode registry persisted across restarts.
//!
//! Layout: `i32 version`, `var_str "MasternodeCache"`, the 4-byte network
//! magic, the serialized registry, then `sha256d` of everything before it.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bczd_log::{log_category, Category};
use bczd_primitives::encoding::{DecodeError, Decoder, Encoder};
use bczd_primitives::hash::sha256d;

use crate::manager::MasternodeManager;

pub const CACHE_FILE_NAME: &str = "mncache.dat";
pub const CACHE_VERSION: i32 = 2;
pub const CACHE_MAGIC_MESSAGE: &str = "MasternodeCache";

#[derive(Debug)]
pub enum CacheError {
    FileOpen(io::Error),
    /// File shorter than the trailing checksum.
    HashRead,
    IncorrectHash,
    IncorrectMagicMessage,
    IncorrectMagicNumber,
    IncorrectFormat(DecodeError),
    Io(io::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::FileOpen(err) => write!(f, "failed to open masternode cache: {err}"),
            CacheError::HashRead => write!(f, "masternode cache too short for checksum"),
            CacheError::IncorrectHash => write!(f, "masternode cache checksum mismatch"),
            CacheError::IncorrectMagicMessage => {
                write!(f, "invalid masternode cache magic message")
            }
            CacheError::IncorrectMagicNumber => write!(f, "masternode cache is for another network"),
            CacheError::IncorrectFormat(err) => write!(f, "masternode cache format error: {err}"),
            CacheError::Io(err) => write!(f, "masternode cache i/o error: {err}"),
        }
    }
}

impl std::error::Error for CacheError {}

pub struct MasternodeCache {
    path: PathBuf,
    message_start: [u8; 4],
}

impl MasternodeCache {
    pub fn new(data_dir: &Path, message_start: [u8; 4]) -> Self {
        Self {
            path: data_dir.join(CACHE_FILE_NAME),
            message_start,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_bytes(&self, manager: &MasternodeManager) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(CACHE_VERSION);
        encoder.write_var_str(CACHE_MAGIC_MESSAGE);
        encoder.write_bytes(&self.message_start);
        manager.encode_registry(&mut encoder);
        let mut bytes = encoder.into_inner();
        let checksum = sha256d(&bytes);
        bytes.extend_from_slice(&checksum);
        bytes
    }

    pub fn write(&self, manager: &MasternodeManager) -> Result<(), CacheError> {
        let start = Instant::now();
        let bytes = self.to_bytes(manager);
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(CacheError::Io)?;
        if fs::rename(&tmp, &self.path).is_err() {
            let _ = fs::remove_file(&self.path);
            fs::rename(&tmp, &self.path).map_err(CacheError::Io)?;
        }
        log_category!(
            Category::Masternode,
            "written info to {} {}ms",
            CACHE_FILE_NAME,
            start.elapsed().as_millis()
        );
        log_category!(Category::Masternode, "  {manager}");
        Ok(())
    }

    /// Loads the cache into `manager`. On a format error the registry is
    /// left empty.
    pub fn read(&self, manager: &MasternodeManager) -> Result<usize, CacheError> {
        let start = Instant::now();
        let bytes = fs::read(&self.path).map_err(CacheError::FileOpen)?;
        let loaded = self.load_bytes(&bytes, manager)?;
        log_category!(
            Category::Masternode,
            "loaded info from {} (dbversion={CACHE_VERSION}) {}ms",
            CACHE_FILE_NAME,
            start.elapsed().as_millis()
        );
        log_category!(Category::Masternode, "  {manager}");
        Ok(loaded)
    }

    pub fn load_bytes(&self, bytes: &[u8], manager: &MasternodeManager) -> Result<usize, CacheError> {
        if bytes.len() < 32 {
            return Err(CacheError::HashRead);
        }
        let (payload, stored) = bytes.split_at(bytes.len() - 32);
        if sha256d(payload).as_slice() != stored {
            return Err(CacheError::IncorrectHash);
        }

        let mut decoder = Decoder::new(payload);
        let (version, magic) = match read_header(&mut decoder) {
            Ok(header) => header,
            Err(err) => {
                manager.clear();
                return Err(CacheError::IncorrectFormat(err));
            }
        };
        if magic != CACHE_MAGIC_MESSAGE {
            return Err(CacheError::IncorrectMagicMessage);
        }
        let network_magic = match decoder.read_fixed::<4>() {
            Ok(magic) => magic,
            Err(err) => {
                manager.clear();
                return Err(CacheError::IncorrectFormat(err));
            }
        };
        if network_magic != self.message_start {
            return Err(CacheError::IncorrectMagicNumber);
        }
        if version != CACHE_VERSION {
            manager.clear();
            return Err(CacheError::IncorrectFormat(DecodeError::InvalidData(
                "unsupported masternode cache version",
            )));
        }

        let decoded = manager.decode_registry(&mut decoder).and_then(|loaded| {
            if decoder.is_empty() {
                Ok(loaded)
            } else {
                Err(DecodeError::TrailingBytes)
            }
        });
        match decoded {
            Ok(loaded) => Ok(loaded),
            Err(err) => {
                manager.clear();
                Err(CacheError::IncorrectFormat(err))
            }
        }
    }
}

fn read_header(decoder: &mut Decoder) -> Result<(i32, String), DecodeError> {
    let version = decoder.read_i32_le()?;
    let magic = decoder.read_var_str()?;
    Ok((version, magic))
}
