//! The boundary between the query engine and wherever log entries live.
//!
//! The engine only needs to read a dataset in order and list its distinct
//! subsystems and labels. `InMemoryLogStore` backs the CLI and tests.

use crate::models::LogEntry;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors raised by a [`LogStore`].
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// The store's lock was poisoned by a panicking writer.
    #[error("Log store lock is poisoned")]
    LockError,
}

/// Entries returned for a query, plus how many matched the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQueryResult {
    /// Entries after the pipeline and the result cap.
    pub logs: Vec<LogEntry>,

    /// Filter matches before any stage or cap.
    pub total_count: usize,
}

/// A dataset of RabbitMQ log entries.
///
/// Shared between threads, so every method takes `&self`.
pub trait LogStore: Send + Sync {
    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn insert(&self, entry: LogEntry) -> Result<(), LogStoreError>;

    /// Appends entries, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn insert_batch(&self, entries: Vec<LogEntry>) -> Result<(), LogStoreError>;

    /// Returns every entry, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn entries(&self) -> Result<Vec<LogEntry>, LogStoreError>;

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count(&self) -> Result<usize, LogStoreError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn clear(&self) -> Result<(), LogStoreError>;

    /// Distinct subsystems, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn subsystems(&self) -> Result<Vec<String>, LogStoreError>;

    /// Distinct label names, sorted.
    ///
    /// A label counts when at least one entry carries it, whether set or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn labels(&self) -> Result<Vec<String>, LogStoreError>;
}

/// A dataset held in memory behind a `RwLock`.
///
/// Nothing is persisted; the CLI reloads its data file on every run.
///
/// # Example
///
/// ```
/// use engine::models::{LogEntry, Severity};
/// use engine::storage::{InMemoryLogStore, LogStore};
///
/// let store = InMemoryLogStore::new();
///
/// let entry = LogEntry::new(1, "rabbit@a", "2024-01-01 10:00:00", Severity::Info, "started")
///     .with_subsystem("boot");
/// store.insert(entry).unwrap();
///
/// assert_eq!(store.count().unwrap(), 1);
/// assert_eq!(store.subsystems().unwrap(), vec!["boot"]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl InMemoryLogStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// An empty store behind an `Arc`, for sharing between workers.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// A store holding `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<LogEntry>>, LogStoreError> {
        self.entries.read().map_err(|_| LogStoreError::LockError)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<LogEntry>>, LogStoreError> {
        self.entries.write().map_err(|_| LogStoreError::LockError)
    }
}

impl LogStore for InMemoryLogStore {
    fn insert(&self, entry: LogEntry) -> Result<(), LogStoreError> {
        self.write()?.push(entry);
        Ok(())
    }

    fn insert_batch(&self, entries: Vec<LogEntry>) -> Result<(), LogStoreError> {
        self.write()?.extend(entries);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LogEntry>, LogStoreError> {
        Ok(self.read()?.clone())
    }

    fn count(&self) -> Result<usize, LogStoreError> {
        Ok(self.read()?.len())
    }

    fn clear(&self) -> Result<(), LogStoreError> {
        self.write()?.clear();
        Ok(())
    }

    fn subsystems(&self) -> Result<Vec<String>, LogStoreError> {
        let entries = self.read()?;
        let distinct: BTreeSet<&str> =
            entries.iter().filter_map(|e| e.subsystem.as_deref()).collect();
        Ok(distinct.into_iter().map(str::to_string).collect())
    }

    fn labels(&self) -> Result<Vec<String>, LogStoreError> {
        let entries = self.read()?;
        let distinct: BTreeSet<&str> = entries
            .iter()
            .flat_map(|e| e.labels.keys().map(String::as_str))
            .collect();
        Ok(distinct.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn create_test_log(id: i64, subsystem: Option<&str>, labels: &[(&str, bool)]) -> LogEntry {
        let mut log = LogEntry::new(
            id,
            "rabbit@test",
            "2024-03-01 12:00:00.000000+00:00",
            Severity::Info,
            format!("message {id}"),
        );
        if let Some(subsystem) = subsystem {
            log = log.with_subsystem(subsystem);
        }
        for (label, value) in labels {
            log = log.with_label(*label, *value);
        }
        log
    }

    #[test]
    fn test_insert_and_count() {
        let store = InMemoryLogStore::new();
        assert_eq!(store.count().unwrap(), 0);

        store.insert(create_test_log(1, None, &[])).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.insert(create_test_log(2, None, &[])).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_insert_batch_keeps_order() {
        let store = InMemoryLogStore::new();
        store
            .insert_batch(vec![
                create_test_log(3, None, &[]),
                create_test_log(1, None, &[]),
                create_test_log(2, None, &[]),
            ])
            .unwrap();

        let ids: Vec<i64> = store.entries().unwrap().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_clear() {
        let store = InMemoryLogStore::new();
        store.insert(create_test_log(1, None, &[])).unwrap();
        store.insert(create_test_log(2, None, &[])).unwrap();
        assert_eq!(store.count().unwrap(), 2);

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_distinct_subsystems_sorted() {
        let store = InMemoryLogStore::with_entries(vec![
            create_test_log(1, Some("queues"), &[]),
            create_test_log(2, Some("connections"), &[]),
            create_test_log(3, None, &[]),
            create_test_log(4, Some("queues"), &[]),
        ]);
        assert_eq!(store.subsystems().unwrap(), vec!["connections", "queues"]);
    }

    #[test]
    fn test_distinct_labels_include_unset_flags() {
        let store = InMemoryLogStore::with_entries(vec![
            create_test_log(1, None, &[("tls", true), ("disconnects", false)]),
            create_test_log(2, None, &[("raft", true), ("tls", false)]),
        ]);
        assert_eq!(store.labels().unwrap(), vec!["disconnects", "raft", "tls"]);
    }

    #[test]
    fn test_shared_store_across_threads() {
        let store = InMemoryLogStore::new_shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(create_test_log(i, None, &[])))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(store.count().unwrap(), 4);
    }

    #[test]
    fn test_poisoned_lock_reports_lock_error() {
        let store = InMemoryLogStore::new_shared();
        let writer = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = writer.entries.write().unwrap();
            panic!("writer died while holding the lock");
        })
        .join();

        assert!(matches!(store.count(), Err(LogStoreError::LockError)));
        assert!(matches!(
            store.insert(create_test_log(1, None, &[])),
            Err(LogStoreError::LockError)
        ));
    }
}
