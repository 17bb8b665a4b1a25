use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use super::domain::{
    Application, ApplicationId, Document, DocumentId, Shift, ShiftId, Timesheet, TimesheetId,
    WorkerApproval, WorkerId,
};
use super::lifecycle::ShiftStatus;
use super::repository::{
    ChangeSet, Record, RecordKey, RepositoryError, StaffingRepository, StagedWrite, Versioned,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_POLL_INTERVAL: Duration = Duration::from_micros(200);

#[derive(Debug, Default)]
struct Tables {
    shifts: HashMap<ShiftId, Versioned<Shift>>,
    applications: HashMap<ApplicationId, Versioned<Application>>,
    timesheets: HashMap<TimesheetId, Versioned<Timesheet>>,
    documents: HashMap<DocumentId, Versioned<Document>>,
    approvals: HashMap<WorkerId, Versioned<WorkerApproval>>,
}

impl Tables {
    fn version_of(&self, key: &RecordKey) -> Option<u64> {
        match key {
            RecordKey::Shift(id) => self.shifts.get(id).map(|entry| entry.version),
            RecordKey::Application(id) => self.applications.get(id).map(|entry| entry.version),
            RecordKey::Timesheet(id) => self.timesheets.get(id).map(|entry| entry.version),
            RecordKey::Document(id) => self.documents.get(id).map(|entry| entry.version),
            RecordKey::WorkerApproval(id) => self.approvals.get(id).map(|entry| entry.version),
        }
    }

    fn check_version(&self, key: &RecordKey, expected: Option<u64>) -> Result<(), RepositoryError> {
        match (self.version_of(key), expected) {
            (None, None) => Ok(()),
            (Some(current), Some(expected)) if current == expected => Ok(()),
            (None, Some(_)) => Err(RepositoryError::Missing { key: key.clone() }),
            _ => Err(RepositoryError::VersionConflict { key: key.clone() }),
        }
    }

    /// One active application per (shift, worker) and one timesheet per (shift, worker).
    fn check_unique(
        &self,
        write: &StagedWrite,
        batch: &[StagedWrite],
    ) -> Result<(), RepositoryError> {
        match &write.record {
            Record::Application(application) if application.is_active() => {
                let clash = self
                    .applications
                    .values()
                    .map(|entry| &entry.record)
                    .chain(batch.iter().filter_map(|staged| match &staged.record {
                        Record::Application(other) => Some(other),
                        _ => None,
                    }))
                    .find(|other| {
                        other.id != application.id
                            && other.is_active()
                            && other.shift_id == application.shift_id
                            && other.worker_id == application.worker_id
                            && !superseded(other, batch)
                    });
                match clash {
                    Some(other) => Err(RepositoryError::UniqueViolation {
                        key: write.record.key(),
                        existing: RecordKey::Application(other.id.clone()),
                    }),
                    None => Ok(()),
                }
            }
            Record::Timesheet(timesheet) if write.expected_version.is_none() => {
                let clash = self.timesheets.values().find(|entry| {
                    entry.record.shift_id == timesheet.shift_id
                        && entry.record.worker_id == timesheet.worker_id
                });
                match clash {
                    Some(other) => Err(RepositoryError::UniqueViolation {
                        key: write.record.key(),
                        existing: RecordKey::Timesheet(other.record.id.clone()),
                    }),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, write: StagedWrite) {
        let version = write.expected_version.map_or(1, |current| current + 1);
        match write.record {
            Record::Shift(record) => {
                upsert(&mut self.shifts, record.id.clone(), record, version);
            }
            Record::Application(record) => {
                upsert(&mut self.applications, record.id.clone(), record, version);
            }
            Record::Timesheet(record) => {
                upsert(&mut self.timesheets, record.id.clone(), record, version);
            }
            Record::Document(record) => {
                upsert(&mut self.documents, record.id.clone(), record, version);
            }
            Record::WorkerApproval(record) => {
                upsert(&mut self.approvals, record.worker_id.clone(), record, version);
            }
        }
    }
}

/// True when the stored application is being rewritten in the same batch as inactive.
fn superseded(application: &Application, batch: &[StagedWrite]) -> bool {
    batch.iter().any(|staged| match &staged.record {
        Record::Application(other) => other.id == application.id && !other.is_active(),
        _ => false,
    })
}

fn upsert<K: Eq + Hash, T>(table: &mut HashMap<K, Versioned<T>>, key: K, record: T, version: u64) {
    table.insert(key, Versioned { record, version });
}

fn cloned<K: Eq + Hash, T: Clone>(
    table: &HashMap<K, Versioned<T>>,
    key: &K,
) -> Option<Versioned<T>> {
    table.get(key).cloned()
}

/// Process-local store backed by a single mutex. Every commit holds the lock for its whole
/// validate-then-apply pass, which makes change sets atomic.
#[derive(Debug)]
pub struct InMemoryStaffingRepository {
    tables: Mutex<Tables>,
    lock_timeout: Duration,
}

impl Default for InMemoryStaffingRepository {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryStaffingRepository {
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            lock_timeout,
        }
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        let started = Instant::now();
        loop {
            match self.tables.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(RepositoryError::Unavailable(
                        "in-memory store lock poisoned".to_string(),
                    ))
                }
                Err(TryLockError::WouldBlock) => {
                    let waited = started.elapsed();
                    if waited >= self.lock_timeout {
                        return Err(RepositoryError::Timeout {
                            operation,
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
            }
        }
    }
}

impl StaffingRepository for InMemoryStaffingRepository {
    fn shift(&self, id: &ShiftId) -> Result<Option<Versioned<Shift>>, RepositoryError> {
        let tables = self.lock("shift")?;
        Ok(cloned(&tables.shifts, id))
    }

    fn shifts_with_status(
        &self,
        status: ShiftStatus,
    ) -> Result<Vec<Versioned<Shift>>, RepositoryError> {
        let tables = self.lock("shifts_with_status")?;
        let mut shifts: Vec<_> = tables
            .shifts
            .values()
            .filter(|entry| entry.record.status == status)
            .cloned()
            .collect();
        shifts.sort_by(|left, right| left.record.starts_at.cmp(&right.record.starts_at));
        Ok(shifts)
    }

    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Versioned<Application>>, RepositoryError> {
        let tables = self.lock("application")?;
        Ok(cloned(&tables.applications, id))
    }

    fn applications_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Application>>, RepositoryError> {
        let tables = self.lock("applications_for_shift")?;
        let mut applications: Vec<_> = tables
            .applications
            .values()
            .filter(|entry| &entry.record.shift_id == shift_id)
            .cloned()
            .collect();
        applications.sort_by(|left, right| {
            (left.record.applied_at, &left.record.id)
                .cmp(&(right.record.applied_at, &right.record.id))
        });
        Ok(applications)
    }

    fn timesheet(&self, id: &TimesheetId) -> Result<Option<Versioned<Timesheet>>, RepositoryError> {
        let tables = self.lock("timesheet")?;
        Ok(cloned(&tables.timesheets, id))
    }

    fn timesheets_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Timesheet>>, RepositoryError> {
        let tables = self.lock("timesheets_for_shift")?;
        Ok(tables
            .timesheets
            .values()
            .filter(|entry| &entry.record.shift_id == shift_id)
            .cloned()
            .collect())
    }

    fn document(&self, id: &DocumentId) -> Result<Option<Versioned<Document>>, RepositoryError> {
        let tables = self.lock("document")?;
        Ok(cloned(&tables.documents, id))
    }

    fn documents_for_worker(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Vec<Versioned<Document>>, RepositoryError> {
        let tables = self.lock("documents_for_worker")?;
        let mut documents: Vec<_> = tables
            .documents
            .values()
            .filter(|entry| &entry.record.owner_id == worker_id)
            .cloned()
            .collect();
        documents.sort_by(|left, right| left.record.id.cmp(&right.record.id));
        Ok(documents)
    }

    fn worker_approval(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<Versioned<WorkerApproval>>, RepositoryError> {
        let tables = self.lock("worker_approval")?;
        Ok(cloned(&tables.approvals, worker_id))
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut tables = self.lock("commit")?;

        for (key, version) in changes.guards() {
            tables.check_version(key, Some(*version))?;
        }
        for write in changes.writes() {
            tables.check_version(&write.record.key(), write.expected_version)?;
            tables.check_unique(write, changes.writes())?;
        }

        for write in changes.into_writes() {
            tables.apply(write);
        }
        Ok(())
    }
}
