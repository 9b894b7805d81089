//! Key vault
//!
//! Append-only, deduplicated store of discovered symmetric keys, in the
//! Wireshark key-file format (`"<key>","Normal","<short id>"` per line) so
//! the external decryption facility can consume it directly. Dedup is
//! exact-byte-match on the key string; callers normalize casing upstream.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::logic::error::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInsert {
    Added,
    AlreadyPresent,
}

pub struct KeyVault {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl KeyVault {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan-then-append. The short id is the CRC32 of the raw key bytes,
    /// matching what the key file's consumers expect as a name.
    pub fn add_key(&self, key: &str) -> EngineResult<KeyInsert> {
        let _guard = self.write_lock.lock();

        if self.path.exists() {
            let existing = fs::read_to_string(&self.path)?;
            if existing.lines().any(|line| line.contains(key)) {
                log::info!("key {key} already present in {}", self.path.display());
                return Ok(KeyInsert::AlreadyPresent);
            }
        }

        let short_id = short_key_id(key);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "\"{key}\",\"Normal\",\"{short_id}\"")?;
        log::info!("key {key} added to {}", self.path.display());
        Ok(KeyInsert::Added)
    }
}

fn short_key_id(key: &str) -> u32 {
    let normalized = key.replace(':', "");
    // keys that fail hex decoding still get a stable id from the raw text
    let bytes = hex::decode(&normalized).unwrap_or_else(|_| normalized.clone().into_bytes());
    crc32fast::hash(&bytes)
}
