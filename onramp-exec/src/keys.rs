//! Idempotency key sources.
//!
//! Every ledger write carries a monotonically increasing key so a
//! retried write is not double-applied by the provider. Two sources are
//! provided: an in-memory counter (process lifetime only) and a
//! file-backed counter that survives restarts.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ports::IdempotencyKeys;

// =============================================================================
// CounterKeys
// =============================================================================

/// In-memory monotonic key source.
///
/// Seeded from the wall clock by default so two runs of the process are
/// unlikely to collide, but a crash-restart can still reuse keys if the
/// clock steps backwards. Use `FileBackedKeys` where duplicate external
/// deposits after a restart are unacceptable.
pub struct CounterKeys {
    next: AtomicI64,
}

impl CounterKeys {
    /// Create a source seeded from the current wall clock (millis).
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self::starting_at(millis)
    }

    /// Create a source starting at an explicit seed.
    pub fn starting_at(seed: i64) -> Self {
        Self {
            next: AtomicI64::new(seed),
        }
    }
}

impl Default for CounterKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyKeys for CounterKeys {
    fn next_key(&self) -> String {
        self.next.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

// =============================================================================
// FileBackedKeys
// =============================================================================

/// Durable monotonic key source.
///
/// The high-water mark is written to disk on every allocation, so keys
/// handed out before a crash are never reissued after a restart. A
/// persist failure degrades to in-process monotonicity and is logged
/// for operator attention.
pub struct FileBackedKeys {
    path: PathBuf,
    next: AtomicI64,
}

impl FileBackedKeys {
    /// Open (or create) a key file.
    ///
    /// # Errors
    /// Returns an I/O error if the file exists but cannot be read or
    /// holds something other than an integer.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let next = match std::fs::read_to_string(&path) {
            Ok(contents) => contents.trim().parse::<i64>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("corrupt key file {}: {}", path.display(), e),
                )
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            next: AtomicI64::new(next),
        })
    }
}

impl IdempotencyKeys for FileBackedKeys {
    fn next_key(&self) -> String {
        let key = self.next.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = std::fs::write(&self.path, format!("{}", key + 1)) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist idempotency high-water mark"
            );
        }

        key.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_keys_strictly_increasing() {
        let keys = CounterKeys::starting_at(100);

        let issued: Vec<i64> = (0..50)
            .map(|_| keys.next_key().parse::<i64>().unwrap())
            .collect();

        for pair in issued.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(issued[0], 100);
    }

    #[test]
    fn test_counter_keys_never_repeat() {
        let keys = CounterKeys::starting_at(0);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..1000 {
            assert!(seen.insert(keys.next_key()));
        }
    }

    #[test]
    fn test_file_backed_keys_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys");

        let first = FileBackedKeys::open(&path).unwrap();
        let a: i64 = first.next_key().parse().unwrap();
        let b: i64 = first.next_key().parse().unwrap();
        drop(first);

        let second = FileBackedKeys::open(&path).unwrap();
        let c: i64 = second.next_key().parse().unwrap();

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert!(c > b, "reopened source must not reuse issued keys");
    }

    #[test]
    fn test_file_backed_keys_reject_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys");
        std::fs::write(&path, "not-a-number").unwrap();

        assert!(FileBackedKeys::open(&path).is_err());
    }
}
