use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use feedscope_types::ArcLogEntry;

use crate::record::LogRecord;

/// A message waiting in the staging queue, already stamped
struct Pending {
    record: LogRecord,
    timestamp: f64,
}

/// Thread-safe, bounded, append-only store of log entries
///
/// Appends from any thread go through a staging queue; readers flush it
/// before looking at the entries, so a reader never sees a half-appended
/// entry and eviction happens under the same write lock as insertion.
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage - uses Arc<LogEntry> so snapshots are cheap
    entries: Arc<RwLock<VecDeque<ArcLogEntry>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next entry ID (never reset, so IDs stay unique across clears)
    next_id: Arc<AtomicU64>,

    /// Bumped on every change to `entries`
    version: Arc<AtomicU64>,

    /// Staging queue for appends (the single writer path)
    pending: Arc<Mutex<Vec<Pending>>>,

    /// Every tag seen since the last clear
    tags: Arc<RwLock<BTreeSet<String>>>,

    /// Session clock used to stamp records without a timestamp
    session_start: Arc<Mutex<Instant>>,
}

/// Batch size for flushing pending entries
const BATCH_FLUSH_SIZE: usize = 100;

/// Immutable view of the store taken at the start of a rebuild
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub entries: Vec<ArcLogEntry>,
    pub version: u64,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
            version: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(Mutex::new(Vec::with_capacity(BATCH_FLUSH_SIZE))),
            tags: Arc::new(RwLock::new(BTreeSet::new())),
            session_start: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Append a record
    ///
    /// Records without a timestamp are stamped with the session clock.
    /// The record lands in the staging buffer and is flushed to the store
    /// when the batch fills or a reader asks for the entries.
    pub fn push(&self, record: LogRecord) {
        if let Some(tag) = &record.tag {
            if !self.tags.read().contains(tag) {
                self.tags.write().insert(tag.clone());
            }
        }

        let mut pending = self.pending.lock();
        let timestamp = record
            .timestamp
            .unwrap_or_else(|| self.session_start.lock().elapsed().as_secs_f64());
        pending.push(Pending { record, timestamp });

        if pending.len() >= BATCH_FLUSH_SIZE {
            self.flush_pending_locked(&mut pending);
        }
    }

    /// Flush pending entries to main buffer (caller holds pending lock)
    fn flush_pending_locked(&self, pending: &mut Vec<Pending>) {
        if pending.is_empty() {
            return;
        }

        let mut entries = self.entries.write();
        for Pending { record, timestamp } in pending.drain(..) {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let entry = record.into_entry(id, timestamp);
            if entries.len() >= self.capacity {
                if let Some(evicted) = entries.pop_front() {
                    tracing::trace!(id = evicted.id, "Evicted oldest entry");
                }
            }
            entries.push_back(Arc::new(entry));
        }
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Force flush any pending entries
    pub fn flush(&self) {
        let mut pending = self.pending.lock();
        self.flush_pending_locked(&mut pending);
    }

    /// Take an immutable snapshot of the store
    pub fn snapshot(&self) -> Snapshot {
        let mut pending = self.pending.lock();
        self.flush_pending_locked(&mut pending);
        let entries = self.entries.read();
        Snapshot {
            entries: entries.iter().cloned().collect(),
            version: self.version.load(Ordering::Acquire),
        }
    }

    /// Get all entries in insertion order
    pub fn all(&self) -> Vec<ArcLogEntry> {
        self.snapshot().entries
    }

    /// Current store version; changes whenever entries are added or cleared
    pub fn version(&self) -> u64 {
        self.flush();
        self.version.load(Ordering::Acquire)
    }

    /// Every tag seen since the last clear
    pub fn tags(&self) -> Vec<String> {
        self.tags.read().iter().cloned().collect()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.flush();
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Export all entries as plain lines
    pub fn export_raw(&self) -> String {
        self.all()
            .iter()
            .map(|e| e.plain_message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clear all entries and tags, and restart the session clock
    pub fn clear(&self) {
        let mut pending = self.pending.lock();
        pending.clear();
        self.entries.write().clear();
        self.tags.write().clear();
        *self.session_start.lock() = Instant::now();
        self.version.fetch_add(1, Ordering::Release);
        tracing::debug!("Log buffer cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize) -> LogRecord {
        LogRecord::new(format!("message {}", i)).at(i as f64)
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let buffer = LogBuffer::new(3);
        for i in 0..10 {
            buffer.push(record(i));
        }

        let entries = buffer.all();
        assert_eq!(entries.len(), 3);
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["message 7", "message 8", "message 9"]);
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[test]
    fn test_eviction_across_batches() {
        let buffer = LogBuffer::new(150);
        for i in 0..(BATCH_FLUSH_SIZE * 3 + 7) {
            buffer.push(record(i));
            assert!(buffer.entries.read().len() <= 150);
        }
        assert_eq!(buffer.len(), 150);
        assert_eq!(buffer.all()[0].id, (BATCH_FLUSH_SIZE * 3 + 7 - 150) as u64);
    }

    #[test]
    fn test_missing_timestamp_uses_session_clock() {
        let buffer = LogBuffer::new(10);
        buffer.push(LogRecord::new("first"));
        buffer.push(LogRecord::new("second"));
        let entries = buffer.all();
        assert!(entries[0].timestamp >= 0.0);
        assert!(entries[1].timestamp >= entries[0].timestamp);
    }

    #[test]
    fn test_tags_registered_and_cleared() {
        let buffer = LogBuffer::new(10);
        buffer.push(LogRecord::new("a").tag("net"));
        buffer.push(LogRecord::new("b").tag("ai"));
        buffer.push(LogRecord::new("c").tag("net"));
        buffer.push(LogRecord::new("d"));
        assert_eq!(buffer.tags(), vec!["ai".to_string(), "net".to_string()]);

        buffer.clear();
        assert!(buffer.tags().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_ids_unique_across_clear() {
        let buffer = LogBuffer::new(10);
        buffer.push(record(0));
        buffer.push(record(1));
        buffer.clear();
        buffer.push(record(2));
        assert_eq!(buffer.all()[0].id, 2);
    }

    #[test]
    fn test_version_changes_on_mutation_only() {
        let buffer = LogBuffer::new(10);
        let v0 = buffer.version();
        assert_eq!(buffer.version(), v0);
        buffer.push(record(0));
        let v1 = buffer.version();
        assert_ne!(v0, v1);
        buffer.clear();
        assert_ne!(buffer.version(), v1);
    }

    #[test]
    fn test_snapshot_is_immutable() {
        let buffer = LogBuffer::new(2);
        buffer.push(record(0));
        buffer.push(record(1));
        let snapshot = buffer.snapshot();
        buffer.push(record(2));
        buffer.push(record(3));

        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].id, 0);
        assert_eq!(buffer.all()[0].id, 2);
    }

    #[test]
    fn test_concurrent_appends() {
        let buffer = LogBuffer::new(1000);
        std::thread::scope(|scope| {
            for t in 0..4 {
                let buffer = buffer.clone();
                scope.spawn(move || {
                    for i in 0..250 {
                        buffer.push(LogRecord::new(format!("{}-{}", t, i)));
                    }
                });
            }
            for _ in 0..20 {
                let snapshot = buffer.snapshot();
                assert!(snapshot.entries.len() <= 1000);
                assert!(snapshot.entries.windows(2).all(|w| w[0].id < w[1].id));
            }
        });
        assert_eq!(buffer.len(), 1000);
    }

    #[test]
    fn test_export_raw_strips_markup() {
        let buffer = LogBuffer::new(10);
        buffer.push(LogRecord::new("<b>one</b>"));
        buffer.push(LogRecord::new("two"));
        assert_eq!(buffer.export_raw(), "one\ntwo");
    }
}
