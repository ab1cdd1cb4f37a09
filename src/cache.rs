use crate::DictionaryEntry;
use crate::error::StorageError;
use crate::normalize::normalize;
use crate::storage::CacheStorage;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Upper bound on stored records, negative records included.
pub const MAX_ENTRIES: usize = 500;

/// One cached outcome. `value: None` records a "not found" and still takes a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub value: Option<DictionaryEntry>,
    /// Milliseconds since the Unix epoch.
    pub inserted_at: u64,
}

impl CacheRecord {
    pub fn new(value: Option<DictionaryEntry>, inserted_at: u64) -> Self {
        Self { value, inserted_at }
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_none()
    }
}

/// A record together with the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedEntry {
    pub key: String,
    #[serde(flatten)]
    pub record: CacheRecord,
}

/// What the lazy load found in durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// The slot was never written.
    Empty,
    /// The slot held this many records.
    Loaded(usize),
    /// The slot could not be read or parsed; the store started empty.
    Recovered { reason: String },
}

/// Source of insertion timestamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to. Each reading advances it by `step`.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    step: u64,
}

impl ManualClock {
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
            step,
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

struct LoadedRecords {
    records: Mutex<HashMap<String, CacheRecord>>,
    state: LoadState,
    /// Bumped under `records` for every snapshot taken.
    revision: AtomicU64,
    /// Revision of the newest snapshot handed to storage.
    written: Mutex<u64>,
}

/// Serialized copy of the records, tagged with the revision it was taken at.
struct Snapshot {
    revision: u64,
    payload: String,
}

/// Bounded key → record map mirrored into a single durable slot.
///
/// The slot is read lazily on first access. Every mutation is followed by a
/// full rewrite of the slot. Storage failures are logged and otherwise
/// ignored: the store keeps serving from memory.
///
/// Eviction is insertion-ordered. Reads never refresh `inserted_at`, so a
/// frequently read word still leaves once it is among the oldest inserts.
///
/// The slot is written outside the record lock: readers never wait on
/// storage, and a snapshot older than one already written is dropped.
pub struct CacheStore {
    storage: Box<dyn CacheStorage>,
    max_entries: usize,
    loaded: OnceCell<LoadedRecords>,
}

impl CacheStore {
    pub fn new(storage: impl CacheStorage + 'static) -> Self {
        Self::with_capacity(storage, MAX_ENTRIES)
    }

    pub fn with_capacity(storage: impl CacheStorage + 'static, max_entries: usize) -> Self {
        Self {
            storage: Box::new(storage),
            max_entries,
            loaded: OnceCell::new(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn load_state(&self) -> LoadState {
        self.loaded().state.clone()
    }

    pub fn get(&self, key: &str) -> Option<CacheRecord> {
        let key = normalize(key);
        if key.is_empty() {
            return None;
        }
        self.loaded().records.lock().get(&key).cloned()
    }

    /// Inserts or overwrites `key`, evicts down to the bound, then persists.
    /// A persistence failure is logged and dropped.
    pub fn put(&self, key: &str, record: CacheRecord) {
        if let Err(err) = self.try_put(key, record) {
            warn!(error = %err, slot = self.storage.slot_name(), "failed to persist dictionary cache");
        }
    }

    /// Like [`CacheStore::put`] but reports the persistence outcome. The
    /// in-memory update has already happened when this returns `Err`.
    pub fn try_put(&self, key: &str, mut record: CacheRecord) -> Result<(), StorageError> {
        let key = normalize(key);
        if key.is_empty() {
            return Ok(());
        }
        if let Some(entry) = record.value.as_mut() {
            if entry.word.trim().is_empty() {
                entry.word = key.clone();
            }
        }

        let loaded = self.loaded();
        let snapshot = {
            let mut records = loaded.records.lock();
            records.insert(key, record);
            let evicted = evict_oldest(&mut records, self.max_entries);
            if evicted > 0 {
                debug!(evicted, remaining = records.len(), "evicted oldest dictionary cache records");
            }
            snapshot(loaded, &records)?
        };
        self.write(loaded, snapshot)
    }

    pub fn remove(&self, key: &str) -> bool {
        let key = normalize(key);
        if key.is_empty() {
            return false;
        }
        let loaded = self.loaded();
        let snapshot = {
            let mut records = loaded.records.lock();
            if records.remove(&key).is_none() {
                return false;
            }
            snapshot(loaded, &records)
        };
        self.persist(loaded, snapshot);
        true
    }

    pub fn clear(&self) {
        let loaded = self.loaded();
        let snapshot = {
            let mut records = loaded.records.lock();
            records.clear();
            snapshot(loaded, &records)
        };
        self.persist(loaded, snapshot);
    }

    /// All records, sorted by key.
    pub fn entries(&self) -> Vec<CachedEntry> {
        let records = self.loaded().records.lock();
        let mut entries: Vec<CachedEntry> = records
            .iter()
            .map(|(key, record)| CachedEntry {
                key: key.clone(),
                record: record.clone(),
            })
            .collect();
        drop(records);
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn len(&self) -> usize {
        self.loaded().records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn loaded(&self) -> &LoadedRecords {
        self.loaded.get_or_init(|| {
            let (mut records, state) = load_records(self.storage.as_ref());
            // A slot written under a larger bound is trimmed in memory only.
            evict_oldest(&mut records, self.max_entries);
            LoadedRecords {
                records: Mutex::new(records),
                state,
                revision: AtomicU64::new(0),
                written: Mutex::new(0),
            }
        })
    }

    fn persist(&self, loaded: &LoadedRecords, snapshot: Result<Snapshot, StorageError>) {
        if let Err(err) = snapshot.and_then(|snapshot| self.write(loaded, snapshot)) {
            warn!(error = %err, slot = self.storage.slot_name(), "failed to persist dictionary cache");
        }
    }

    fn write(&self, loaded: &LoadedRecords, snapshot: Snapshot) -> Result<(), StorageError> {
        let mut written = loaded.written.lock();
        if *written >= snapshot.revision {
            return Ok(());
        }
        *written = snapshot.revision;
        self.storage.write_slot(&snapshot.payload)
    }
}

/// Must be called with `records` locked so revisions follow mutation order.
fn snapshot(
    loaded: &LoadedRecords,
    records: &HashMap<String, CacheRecord>,
) -> Result<Snapshot, StorageError> {
    let payload = serde_json::to_string(records)?;
    let revision = loaded.revision.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(Snapshot { revision, payload })
}

fn load_records(storage: &dyn CacheStorage) -> (HashMap<String, CacheRecord>, LoadState) {
    let payload = match storage.read_slot() {
        Ok(Some(payload)) => payload,
        Ok(None) => return (HashMap::new(), LoadState::Empty),
        Err(err) => {
            warn!(error = %err, slot = storage.slot_name(), "dictionary cache unreadable, starting empty");
            return (
                HashMap::new(),
                LoadState::Recovered {
                    reason: err.to_string(),
                },
            );
        }
    };
    match serde_json::from_str::<HashMap<String, CacheRecord>>(&payload) {
        Ok(records) => {
            debug!(records = records.len(), slot = storage.slot_name(), "loaded dictionary cache");
            let count = records.len();
            (records, LoadState::Loaded(count))
        }
        Err(err) => {
            let err = StorageError::Corrupt {
                slot: storage.slot_name().to_string(),
                message: err.to_string(),
            };
            warn!(error = %err, "dictionary cache corrupt, starting empty");
            (
                HashMap::new(),
                LoadState::Recovered {
                    reason: err.to_string(),
                },
            )
        }
    }
}

/// Drops the `len - max_entries` records with the smallest `inserted_at`.
/// Ties fall back to key order so the outcome is reproducible.
fn evict_oldest(records: &mut HashMap<String, CacheRecord>, max_entries: usize) -> usize {
    let excess = records.len().saturating_sub(max_entries);
    if excess == 0 {
        return 0;
    }
    let mut by_age: Vec<(u64, String)> = records
        .iter()
        .map(|(key, record)| (record.inserted_at, key.clone()))
        .collect();
    by_age.sort_unstable();
    for (_, key) in by_age.into_iter().take(excess) {
        records.remove(&key);
    }
    excess
}
