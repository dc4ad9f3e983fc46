//! In-process job registry
//!
//! Maps handles to their latest [`JobRecord`] and tracks which handles have
//! an operation in flight. At most one mutating operation (async upload,
//! wait, refresh, async download) runs per handle at a time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use offload_core::{JobHandle, JobRecord, RemoteJobId};

/// Shared map of job records
#[derive(Debug, Default)]
pub struct JobRegistry {
    records: RwLock<HashMap<JobHandle, JobRecord>>,
    in_flight: Arc<Mutex<HashSet<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record of its handle
    pub fn insert(&self, record: JobRecord) {
        self.write().insert(record.handle, record);
    }

    pub fn get(&self, handle: JobHandle) -> Option<JobRecord> {
        self.read().get(&handle).cloned()
    }

    pub fn find_by_remote(&self, id: RemoteJobId) -> Option<JobRecord> {
        self.read()
            .values()
            .find(|record| record.remote_id == Some(id))
            .cloned()
    }

    /// Inserts `record` unless its scheduler id is already tracked
    ///
    /// The lookup and the insert happen under one write lock. Returns the
    /// record that owns the scheduler id afterwards.
    pub fn insert_unless_tracked(&self, record: JobRecord) -> JobRecord {
        let mut records = self.write();
        if let Some(remote_id) = record.remote_id {
            if let Some(existing) = records.values().find(|r| r.remote_id == Some(remote_id)) {
                return existing.clone();
            }
        }
        records.insert(record.handle, record.clone());
        record
    }

    /// Applies `f` to the record of `handle`, returning the updated copy
    pub fn update<F>(&self, handle: JobHandle, f: F) -> Option<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut records = self.write();
        let record = records.get_mut(&handle)?;
        f(record);
        Some(record.clone())
    }

    pub fn remove(&self, handle: JobHandle) -> Option<JobRecord> {
        self.write().remove(&handle)
    }

    /// Snapshot of every record, oldest update first
    pub fn snapshot(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.read().values().cloned().collect();
        records.sort_by_key(|record| record.updated_at);
        records
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Claims `handle` for one operation
    ///
    /// Returns `None` if another operation holds it. The claim is released
    /// when the returned guard is dropped.
    pub fn try_begin(&self, handle: JobHandle) -> Option<InFlight> {
        let mut set = lock(&self.in_flight);
        if !set.insert(handle) {
            return None;
        }
        Some(InFlight {
            set: Arc::clone(&self.in_flight),
            handle,
        })
    }

    pub fn is_busy(&self, handle: JobHandle) -> bool {
        lock(&self.in_flight).contains(&handle)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobHandle, JobRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobHandle, JobRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claim on a handle, released on drop
#[derive(Debug)]
pub struct InFlight {
    set: Arc<Mutex<HashSet<JobHandle>>>,
    handle: JobHandle,
}

impl InFlight {
    pub fn handle(&self) -> JobHandle {
        self.handle
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.handle);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
