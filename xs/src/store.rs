//! Core ExperienceStore implementations

use std::collections::{BTreeSet, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::record::{ExperienceMatch, ExperienceRecord, StoreStats};
use crate::similarity::similarity;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Retention options shared by all store implementations
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum records kept; the oldest are evicted first
    pub capacity: usize,
    /// Records older than this are dropped by `prune`
    pub max_age_days: Option<u32>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            capacity: crate::DEFAULT_CAPACITY,
            max_age_days: None,
        }
    }
}

/// Durable, append-mostly store of experience records
///
/// Implementations are shared across concurrent planning sessions behind an
/// `Arc`, so every method takes `&self` and synchronizes internally. None of
/// them block on anything but local I/O.
pub trait ExperienceStore: Send + Sync {
    /// Append one record, evicting the oldest beyond capacity
    fn append(&self, record: ExperienceRecord) -> Result<(), StoreError>;

    /// Append several records
    fn append_batch(&self, records: Vec<ExperienceRecord>) -> Result<(), StoreError> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Records of `task_type` whose similarity to `action_descriptor` is
    /// nonzero and at least `min_similarity`, newest first, at most `limit`
    fn query(
        &self,
        task_type: &str,
        action_descriptor: &str,
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<ExperienceMatch>, StoreError>;

    /// All records, oldest first
    fn records(&self) -> Result<Vec<ExperienceRecord>, StoreError>;

    /// Drop records past the age limit or over capacity, returning how many were removed
    fn prune(&self) -> Result<usize, StoreError>;

    /// Remove every record
    fn clear(&self) -> Result<(), StoreError>;

    /// Summary statistics
    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(compute_stats(&self.records()?))
    }

    /// Number of records held
    fn len(&self) -> usize {
        self.records().map(|r| r.len()).unwrap_or(0)
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory FIFO log shared by both implementations
#[derive(Debug)]
struct RecordLog {
    records: VecDeque<ExperienceRecord>,
    options: StoreOptions,
}

impl RecordLog {
    fn new(options: StoreOptions) -> Self {
        Self {
            records: VecDeque::new(),
            options,
        }
    }

    /// Push a record; returns the number of records evicted
    fn push(&mut self, record: ExperienceRecord) -> usize {
        self.records.push_back(record);
        let mut evicted = 0;
        while self.records.len() > self.options.capacity {
            self.records.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.options.capacity, "RecordLog::push: evicted oldest records");
        }
        evicted
    }

    fn query(&self, task_type: &str, action_descriptor: &str, min_similarity: f64, limit: usize) -> Vec<ExperienceMatch> {
        let mut matches: Vec<(usize, ExperienceMatch)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.task_type == task_type)
            .filter_map(|(idx, r)| {
                let sim = similarity(&r.action_descriptor, action_descriptor);
                (sim > 0.0 && sim >= min_similarity).then(|| {
                    (
                        idx,
                        ExperienceMatch {
                            record: r.clone(),
                            similarity: sim,
                        },
                    )
                })
            })
            .collect();

        // Newest first; insertion order breaks timestamp ties
        matches.sort_by(|(ia, a), (ib, b)| {
            b.record
                .timestamp
                .cmp(&a.record.timestamp)
                .then_with(|| ib.cmp(ia))
        });
        matches.truncate(limit);
        matches.into_iter().map(|(_, m)| m).collect()
    }

    /// Drop records older than the age limit; returns how many were removed
    fn prune_expired(&mut self, now_ms: i64) -> usize {
        let Some(days) = self.options.max_age_days else {
            return 0;
        };
        let cutoff = now_ms - i64::from(days) * MS_PER_DAY;
        let before = self.records.len();
        self.records.retain(|r| r.timestamp >= cutoff);
        before - self.records.len()
    }
}

fn compute_stats(records: &[ExperienceRecord]) -> StoreStats {
    let task_types: BTreeSet<&str> = records.iter().map(|r| r.task_type.as_str()).collect();
    let ratios: Vec<f64> = records.iter().filter_map(ExperienceRecord::ratio).collect();
    StoreStats {
        record_count: records.len(),
        task_type_count: task_types.len(),
        oldest_timestamp: records.iter().map(|r| r.timestamp).min(),
        newest_timestamp: records.iter().map(|r| r.timestamp).max(),
        mean_ratio: if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        },
    }
}

/// Ephemeral store for tests and sessions that should not persist anything
#[derive(Debug)]
pub struct MemoryExperienceStore {
    inner: Mutex<RecordLog>,
}

impl MemoryExperienceStore {
    pub fn new(options: StoreOptions) -> Self {
        debug!(capacity = options.capacity, "MemoryExperienceStore::new: called");
        Self {
            inner: Mutex::new(RecordLog::new(options)),
        }
    }

    /// Build a store pre-populated with `records` (oldest first)
    pub fn with_records(options: StoreOptions, records: impl IntoIterator<Item = ExperienceRecord>) -> Self {
        let store = Self::new(options);
        if let Ok(mut log) = store.inner.lock() {
            for record in records {
                log.push(record);
            }
        }
        store
    }
}

impl Default for MemoryExperienceStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl ExperienceStore for MemoryExperienceStore {
    fn append(&self, record: ExperienceRecord) -> Result<(), StoreError> {
        debug!(task_type = %record.task_type, "MemoryExperienceStore::append: called");
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.push(record);
        Ok(())
    }

    fn query(
        &self,
        task_type: &str,
        action_descriptor: &str,
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<ExperienceMatch>, StoreError> {
        debug!(%task_type, %action_descriptor, min_similarity, limit, "MemoryExperienceStore::query: called");
        let log = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(log.query(task_type, action_descriptor, min_similarity, limit))
    }

    fn records(&self) -> Result<Vec<ExperienceRecord>, StoreError> {
        let log = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(log.records.iter().cloned().collect())
    }

    fn prune(&self) -> Result<usize, StoreError> {
        let mut log = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(log.prune_expired(chrono::Utc::now().timestamp_millis()))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)?.records.clear();
        Ok(())
    }
}

/// Exclusive advisory lock on the store's lock file, released on drop
struct FileLockGuard {
    file: File,
}

impl FileLockGuard {
    fn exclusive(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.lock_exclusive().map_err(|source| StoreError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "FileLockGuard::drop: failed to release store lock");
        }
    }
}

/// File-backed store: JSONL log plus an in-memory mirror
///
/// Writers (in this process or others) serialize on an `fs2` exclusive lock.
/// The file is compacted back down to `capacity` lines once it grows past
/// capacity by more than the compaction slack.
pub struct JsonlExperienceStore {
    records_path: PathBuf,
    lock_path: PathBuf,
    inner: Mutex<JsonlState>,
}

struct JsonlState {
    log: RecordLog,
    /// Lines this process believes the file holds
    file_lines: usize,
}

impl JsonlExperienceStore {
    /// Open or create a store in `dir`
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let records_path = dir.join(crate::RECORDS_FILE);
        let lock_path = dir.join(crate::LOCK_FILE);
        debug!(?records_path, capacity = options.capacity, "JsonlExperienceStore::open: called");

        let store = Self {
            records_path,
            lock_path,
            inner: Mutex::new(JsonlState {
                log: RecordLog::new(options),
                file_lines: 0,
            }),
        };

        {
            let _guard = FileLockGuard::exclusive(&store.lock_path)?;
            let mut state = store.inner.lock().map_err(|_| StoreError::Poisoned)?;
            store.reload_locked(&mut state)?;
            if state.file_lines > state.log.options.capacity {
                store.rewrite_locked(&mut state)?;
            }
            info!(records = state.log.records.len(), path = %store.records_path.display(), "Opened experience store");
        }

        Ok(store)
    }

    /// Path of the JSONL record file
    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    fn compaction_threshold(capacity: usize) -> usize {
        capacity + (capacity / 10).max(1)
    }

    /// Re-read the file into memory. Caller holds the file lock.
    fn reload_locked(&self, state: &mut JsonlState) -> Result<(), StoreError> {
        state.log.records.clear();
        state.file_lines = 0;

        if !self.records_path.exists() {
            return Ok(());
        }

        let file = File::open(&self.records_path).map_err(|e| StoreError::io(&self.records_path, e))?;
        let reader = BufReader::new(file);
        let mut skipped = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(&self.records_path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            state.file_lines += 1;
            match serde_json::from_str::<ExperienceRecord>(&line) {
                Ok(record) => {
                    state.log.push(record);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(line = lineno + 1, error = %e, "Skipping malformed experience record");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, path = %self.records_path.display(), "Experience store contained malformed lines");
        }
        Ok(())
    }

    /// Rewrite the file from memory via a temp file + rename. Caller holds the file lock.
    fn rewrite_locked(&self, state: &mut JsonlState) -> Result<(), StoreError> {
        let tmp_path = self.records_path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
            for record in &state.log.records {
                let line = serde_json::to_string(record)?;
                writeln!(tmp, "{}", line).map_err(|e| StoreError::io(&tmp_path, e))?;
            }
            tmp.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, &self.records_path).map_err(|e| StoreError::io(&self.records_path, e))?;
        state.file_lines = state.log.records.len();
        debug!(records = state.file_lines, "JsonlExperienceStore::rewrite_locked: compacted");
        Ok(())
    }
}

impl ExperienceStore for JsonlExperienceStore {
    fn append(&self, record: ExperienceRecord) -> Result<(), StoreError> {
        debug!(task_type = %record.task_type, descriptor = %record.action_descriptor, "JsonlExperienceStore::append: called");
        let line = serde_json::to_string(&record)?;

        let _guard = FileLockGuard::exclusive(&self.lock_path)?;
        let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .map_err(|e| StoreError::io(&self.records_path, e))?;
        writeln!(file, "{}", line).map_err(|e| StoreError::io(&self.records_path, e))?;

        state.file_lines += 1;
        state.log.push(record);

        if state.file_lines > Self::compaction_threshold(state.log.options.capacity) {
            // Other processes may have appended too; compact from what is on disk
            self.reload_locked(&mut state)?;
            self.rewrite_locked(&mut state)?;
        }
        Ok(())
    }

    fn append_batch(&self, records: Vec<ExperienceRecord>) -> Result<(), StoreError> {
        debug!(count = records.len(), "JsonlExperienceStore::append_batch: called");
        if records.is_empty() {
            return Ok(());
        }

        let _guard = FileLockGuard::exclusive(&self.lock_path)?;
        let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .map_err(|e| StoreError::io(&self.records_path, e))?;
        for record in records {
            let line = serde_json::to_string(&record)?;
            writeln!(file, "{}", line).map_err(|e| StoreError::io(&self.records_path, e))?;
            state.file_lines += 1;
            state.log.push(record);
        }

        if state.file_lines > Self::compaction_threshold(state.log.options.capacity) {
            self.reload_locked(&mut state)?;
            self.rewrite_locked(&mut state)?;
        }
        Ok(())
    }

    fn query(
        &self,
        task_type: &str,
        action_descriptor: &str,
        min_similarity: f64,
        limit: usize,
    ) -> Result<Vec<ExperienceMatch>, StoreError> {
        debug!(%task_type, %action_descriptor, min_similarity, limit, "JsonlExperienceStore::query: called");
        let state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.log.query(task_type, action_descriptor, min_similarity, limit))
    }

    fn records(&self) -> Result<Vec<ExperienceRecord>, StoreError> {
        let state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.log.records.iter().cloned().collect())
    }

    fn prune(&self) -> Result<usize, StoreError> {
        debug!("JsonlExperienceStore::prune: called");
        let _guard = FileLockGuard::exclusive(&self.lock_path)?;
        let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        self.reload_locked(&mut state)?;
        let over_capacity = state.file_lines.saturating_sub(state.log.records.len());
        let expired = state.log.prune_expired(chrono::Utc::now().timestamp_millis());
        self.rewrite_locked(&mut state)?;

        let removed = over_capacity + expired;
        info!(removed, remaining = state.log.records.len(), "Pruned experience store");
        Ok(removed)
    }

    fn clear(&self) -> Result<(), StoreError> {
        debug!("JsonlExperienceStore::clear: called");
        let _guard = FileLockGuard::exclusive(&self.lock_path)?;
        let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        state.log.records.clear();
        self.rewrite_locked(&mut state)?;
        Ok(())
    }
}
