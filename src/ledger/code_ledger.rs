//! The authoritative record of which codes have been claimed.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::ledger::store::{parse_seed, Codes, LedgerStore};
use crate::ledger::LedgerError;
use crate::observability::metrics;

/// Aggregate counts, safe to expose (no code values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub used: usize,
    pub unused: usize,
}

/// In-memory ledger mirrored to a [`LedgerStore`].
pub struct CodeLedger {
    codes: Mutex<Codes>,
    store: Box<dyn LedgerStore>,
}

impl CodeLedger {
    /// Wrap an already loaded code map.
    pub fn new(store: impl LedgerStore + 'static, codes: Codes) -> Self {
        let ledger = Self {
            codes: Mutex::new(codes),
            store: Box::new(store),
        };
        metrics::record_ledger(&ledger.stats());
        ledger
    }

    /// Load the persisted ledger, or build one from the seed list and
    /// persist it immediately.
    ///
    /// Fails if the store is unreadable, or if it is empty and the seed list
    /// cannot be read.
    pub fn load(store: impl LedgerStore + 'static, seed_path: &Path) -> Result<Self, LedgerError> {
        if let Some(codes) = store.load()? {
            tracing::info!(codes = codes.len(), "Loaded code ledger");
            return Ok(Self::new(store, codes));
        }

        let text = std::fs::read_to_string(seed_path).map_err(|source| LedgerError::Io {
            path: seed_path.to_path_buf(),
            source,
        })?;
        let codes = parse_seed(&text);
        store.save(&codes)?;

        tracing::info!(
            codes = codes.len(),
            seed = %seed_path.display(),
            "Created code ledger from seed list"
        );
        Ok(Self::new(store, codes))
    }

    /// True iff the code exists and has not been used.
    ///
    /// Unknown and used codes are deliberately indistinguishable.
    pub fn is_redeemable(&self, code: &str) -> bool {
        self.lock().get(code).is_some_and(|state| !state.used)
    }

    /// Mark `code` used and persist the full ledger before returning.
    ///
    /// The used flag is re-checked under the same lock as the write, so two
    /// callers can never both commit the same code. If the durable write
    /// fails the in-memory flag is rolled back before the lock is released.
    pub fn mark_used(&self, code: &str) -> Result<(), LedgerError> {
        let mut codes = self.lock();
        let state = codes.get_mut(code).ok_or(LedgerError::UnknownCode)?;
        if state.used {
            return Err(LedgerError::AlreadyUsed);
        }
        state.used = true;

        if let Err(e) = self.store.save(&codes) {
            if let Some(state) = codes.get_mut(code) {
                state.used = false;
            }
            return Err(e);
        }

        metrics::record_ledger(&stats_of(&codes));
        Ok(())
    }

    /// Total, used and unused counts.
    pub fn stats(&self) -> LedgerStats {
        stats_of(&self.lock())
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Codes {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Codes> {
        // Memory is only mutated after a successful save or rolled back
        // before unlocking, so a poisoned guard still holds consistent data.
        self.codes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn stats_of(codes: &Codes) -> LedgerStats {
    let used = codes.values().filter(|state| state.used).count();
    LedgerStats {
        total: codes.len(),
        used,
        unused: codes.len() - used,
    }
}

impl std::fmt::Debug for CodeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeLedger")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::{encode, CodeState, JsonFileStore, MemoryStore};
    use std::sync::Arc;

    fn codes(entries: &[(&str, bool)]) -> Codes {
        entries
            .iter()
            .map(|(code, used)| (code.to_string(), CodeState { used: *used }))
            .collect()
    }

    #[test]
    fn test_redeemable() {
        let ledger = CodeLedger::new(MemoryStore::new(), codes(&[("ABC123", false), ("USED01", true)]));
        assert!(ledger.is_redeemable("ABC123"));
        assert!(!ledger.is_redeemable("USED01"));
        assert!(!ledger.is_redeemable("XYZ999"));
        assert!(!ledger.is_redeemable("abc123"));
    }

    #[test]
    fn test_mark_used_persists() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CodeLedger::new(store.clone(), codes(&[("ABC123", false), ("DEF456", false)]));

        ledger.mark_used("ABC123").unwrap();

        assert!(!ledger.is_redeemable("ABC123"));
        assert!(ledger.is_redeemable("DEF456"));
        assert_eq!(store.persisted().unwrap(), ledger.snapshot());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_mark_used_twice() {
        let ledger = CodeLedger::new(MemoryStore::new(), codes(&[("ABC123", false)]));
        ledger.mark_used("ABC123").unwrap();
        assert!(matches!(ledger.mark_used("ABC123"), Err(LedgerError::AlreadyUsed)));
        assert!(!ledger.is_redeemable("ABC123"));
    }

    #[test]
    fn test_mark_unknown() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CodeLedger::new(store.clone(), codes(&[("ABC123", false)]));
        assert!(matches!(ledger.mark_used("NOPE"), Err(LedgerError::UnknownCode)));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CodeLedger::new(store.clone(), codes(&[("ABC123", false)]));
        store.set_fail_writes(true);

        let err = ledger.mark_used("ABC123").unwrap_err();
        assert!(err.is_storage());
        assert!(ledger.is_redeemable("ABC123"));

        store.set_fail_writes(false);
        ledger.mark_used("ABC123").unwrap();
        assert!(!ledger.is_redeemable("ABC123"));
    }

    #[test]
    fn test_stats() {
        let ledger = CodeLedger::new(
            MemoryStore::new(),
            codes(&[("A", false), ("B", true), ("C", false)]),
        );
        assert_eq!(ledger.stats(), LedgerStats { total: 3, used: 1, unused: 2 });
    }

    #[test]
    fn test_load_from_seed_creates_ledger_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("codes.txt");
        let ledger_path = dir.path().join("codes.json");
        std::fs::write(&seed, "ABC123\n  DEF456  \n\nGHI789\n").unwrap();

        let ledger = CodeLedger::load(JsonFileStore::new(&ledger_path), &seed).unwrap();

        assert_eq!(ledger.stats(), LedgerStats { total: 3, used: 0, unused: 3 });
        let on_disk = JsonFileStore::new(&ledger_path).load().unwrap().unwrap();
        assert_eq!(on_disk, ledger.snapshot());
        assert!(on_disk.values().all(|state| !state.used));
    }

    #[test]
    fn test_load_prefers_existing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("codes.txt");
        let ledger_path = dir.path().join("codes.json");
        std::fs::write(&seed, "FRESH1\nFRESH2\n").unwrap();
        std::fs::write(&ledger_path, encode(&codes(&[("ABC123", true)])).unwrap()).unwrap();

        let ledger = CodeLedger::load(JsonFileStore::new(&ledger_path), &seed).unwrap();

        assert_eq!(ledger.stats().total, 1);
        assert!(!ledger.is_redeemable("ABC123"));
        assert!(!ledger.is_redeemable("FRESH1"));
    }

    #[test]
    fn test_load_without_any_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = CodeLedger::load(
            JsonFileStore::new(dir.path().join("codes.json")),
            &dir.path().join("codes.txt"),
        );
        assert!(matches!(result, Err(LedgerError::Io { .. })));
    }

    #[test]
    fn test_used_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("codes.txt");
        let ledger_path = dir.path().join("codes.json");
        std::fs::write(&seed, "ABC123\nDEF456\n").unwrap();

        let ledger = CodeLedger::load(JsonFileStore::new(&ledger_path), &seed).unwrap();
        ledger.mark_used("ABC123").unwrap();
        drop(ledger);

        let reloaded = CodeLedger::load(JsonFileStore::new(&ledger_path), &seed).unwrap();
        assert!(!reloaded.is_redeemable("ABC123"));
        assert!(reloaded.is_redeemable("DEF456"));
    }
}
