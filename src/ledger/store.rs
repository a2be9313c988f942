//! Durable storage behind the code ledger.
//!
//! # Responsibilities
//! - Read and write the full code map (`load`, `save`)
//! - Keep the on-disk format deterministic so it round-trips byte-for-byte
//!
//! # Design Decisions
//! - Whole-file overwrite, never append
//! - Writes go to a sibling temp file, are fsynced, then renamed over the
//!   ledger so a crash mid-write leaves the previous version intact
//! - The trait is synchronous: a save must complete before `mark_used` returns

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;

/// Usage state of a single code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeState {
    pub used: bool,
}

/// Code → state, ordered so serialization is stable.
pub type Codes = BTreeMap<String, CodeState>;

/// Persistence interface for the ledger.
pub trait LedgerStore: Send + Sync {
    /// Read the persisted ledger. `Ok(None)` means nothing has been written yet.
    fn load(&self) -> Result<Option<Codes>, LedgerError>;

    /// Replace the persisted ledger with `codes`.
    fn save(&self, codes: &Codes) -> Result<(), LedgerError>;
}

/// Serialize the ledger in its on-disk JSON form.
pub fn encode(codes: &Codes) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec_pretty(codes).map_err(LedgerError::Encode)
}

/// Parse the on-disk JSON form.
pub fn decode(bytes: &[u8]) -> Result<Codes, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Build a fresh ledger from a seed list: one code per line, trimmed, blank
/// lines ignored, every code unused.
pub fn parse_seed(text: &str) -> Codes {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|code| (code.to_string(), CodeState::default()))
        .collect()
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Option<Codes>, LedgerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        let codes = decode(&bytes).map_err(|source| LedgerError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(codes))
    }

    fn save(&self, codes: &Codes) -> Result<(), LedgerError> {
        let bytes = encode(codes)?;
        let temp = self.temp_path();
        let io_err = |source| LedgerError::Io {
            path: temp.clone(),
            source,
        };

        let mut file = File::create(&temp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

/// In-process store for tests and embedding.
///
/// Writes can be made to fail on demand to exercise the commit failure path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `codes` already persisted.
    pub fn with_codes(codes: &Codes) -> Result<Self, LedgerError> {
        let store = Self::new();
        *store.lock() = Some(encode(codes)?);
        Ok(store)
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last persisted ledger, decoded.
    pub fn persisted(&self) -> Option<Codes> {
        self.lock().as_deref().and_then(|bytes| decode(bytes).ok())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<Codes>, LedgerError> {
        match self.lock().as_deref() {
            Some(bytes) => decode(bytes).map(Some).map_err(|source| LedgerError::Corrupt {
                path: PathBuf::from("<memory>"),
                source,
            }),
            None => Ok(None),
        }
    }

    fn save(&self, codes: &Codes) -> Result<(), LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("injected write failure"),
            });
        }
        *self.lock() = Some(encode(codes)?);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared stores are stores too, so tests can keep a handle for inspection.
impl<S: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<Codes>, LedgerError> {
        (**self).load()
    }

    fn save(&self, codes: &Codes) -> Result<(), LedgerError> {
        (**self).save(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Codes {
        let mut codes = Codes::new();
        codes.insert("ABC123".to_string(), CodeState { used: false });
        codes.insert("DEF456".to_string(), CodeState { used: true });
        codes.insert("abc123".to_string(), CodeState { used: false });
        codes
    }

    #[test]
    fn test_parse_seed() {
        let codes = parse_seed("  ABC123 \n\nDEF456\r\n   \nGHI789");
        assert_eq!(codes.len(), 3);
        assert!(codes.values().all(|s| !s.used));
        assert!(codes.contains_key("ABC123"));
        assert!(codes.contains_key("GHI789"));
    }

    #[test]
    fn test_seed_duplicates_collapse() {
        let codes = parse_seed("AAA\nAAA\nBBB\n");
        assert_eq!(codes.len(), 2);
    }

    #[test]
    fn test_encoding_is_stable() {
        let first = encode(&sample()).unwrap();
        let second = encode(&decode(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encoding_format() {
        let mut codes = Codes::new();
        codes.insert("ABC123".to_string(), CodeState { used: false });
        let text = String::from_utf8(encode(&codes).unwrap()).unwrap();
        assert_eq!(text, "{\n  \"ABC123\": {\n    \"used\": false\n  }\n}");
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("codes.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), sample());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("codes.json"));
        store.save(&sample()).unwrap();

        let mut smaller = Codes::new();
        smaller.insert("ONLY".to_string(), CodeState { used: true });
        store.save(&smaller).unwrap();

        assert_eq!(store.load().unwrap().unwrap(), smaller);
    }

    #[test]
    fn test_file_store_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.save(&sample()).is_err());
        assert_eq!(store.save_count(), 0);
        assert!(store.persisted().is_none());

        store.set_fail_writes(false);
        store.save(&sample()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.persisted().unwrap(), sample());
    }
}
