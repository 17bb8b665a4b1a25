use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, CareHomeId, Document, DocumentId, Shift, ShiftId, Timesheet,
    TimesheetId, WorkerApproval, WorkerId,
};
use super::lifecycle::ShiftStatus;

/// A stored record together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// Storage address of any record the engine persists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id", rename_all = "snake_case")]
pub enum RecordKey {
    Shift(ShiftId),
    Application(ApplicationId),
    Timesheet(TimesheetId),
    Document(DocumentId),
    WorkerApproval(WorkerId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Shift(id) => write!(f, "shift {id}"),
            RecordKey::Application(id) => write!(f, "application {id}"),
            RecordKey::Timesheet(id) => write!(f, "timesheet {id}"),
            RecordKey::Document(id) => write!(f, "document {id}"),
            RecordKey::WorkerApproval(id) => write!(f, "worker approval {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Shift(Shift),
    Application(Application),
    Timesheet(Timesheet),
    Document(Document),
    WorkerApproval(WorkerApproval),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::Shift(shift) => RecordKey::Shift(shift.id.clone()),
            Record::Application(application) => RecordKey::Application(application.id.clone()),
            Record::Timesheet(timesheet) => RecordKey::Timesheet(timesheet.id.clone()),
            Record::Document(document) => RecordKey::Document(document.id.clone()),
            Record::WorkerApproval(approval) => {
                RecordKey::WorkerApproval(approval.worker_id.clone())
            }
        }
    }
}

impl From<Shift> for Record {
    fn from(value: Shift) -> Self {
        Self::Shift(value)
    }
}

impl From<Application> for Record {
    fn from(value: Application) -> Self {
        Self::Application(value)
    }
}

impl From<Timesheet> for Record {
    fn from(value: Timesheet) -> Self {
        Self::Timesheet(value)
    }
}

impl From<Document> for Record {
    fn from(value: Document) -> Self {
        Self::Document(value)
    }
}

impl From<WorkerApproval> for Record {
    fn from(value: WorkerApproval) -> Self {
        Self::WorkerApproval(value)
    }
}

/// A write staged for commit. `expected_version: None` means the record must not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedWrite {
    pub record: Record,
    pub expected_version: Option<u64>,
}

/// All writes of one transition. A store applies every write or none of them, and only if
/// each expected version (and each read guard) still matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    guards: Vec<(RecordKey, u64)>,
    writes: Vec<StagedWrite>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: impl Into<Record>) -> &mut Self {
        self.writes.push(StagedWrite {
            record: record.into(),
            expected_version: None,
        });
        self
    }

    pub fn update(&mut self, record: impl Into<Record>, read_version: u64) -> &mut Self {
        self.writes.push(StagedWrite {
            record: record.into(),
            expected_version: Some(read_version),
        });
        self
    }

    /// Pin a record that was read to make the decision but is not modified.
    pub fn guard(&mut self, key: RecordKey, read_version: u64) -> &mut Self {
        self.guards.push((key, read_version));
        self
    }

    pub fn guards(&self) -> &[(RecordKey, u64)] {
        &self.guards
    }

    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<StagedWrite> {
        self.writes
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait StaffingRepository: Send + Sync {
    fn shift(&self, id: &ShiftId) -> Result<Option<Versioned<Shift>>, RepositoryError>;
    fn shifts_with_status(
        &self,
        status: ShiftStatus,
    ) -> Result<Vec<Versioned<Shift>>, RepositoryError>;
    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Versioned<Application>>, RepositoryError>;
    fn applications_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Application>>, RepositoryError>;
    fn timesheet(&self, id: &TimesheetId) -> Result<Option<Versioned<Timesheet>>, RepositoryError>;
    fn timesheets_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Timesheet>>, RepositoryError>;
    fn document(&self, id: &DocumentId) -> Result<Option<Versioned<Document>>, RepositoryError>;
    fn documents_for_worker(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Vec<Versioned<Document>>, RepositoryError>;
    fn worker_approval(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<Versioned<WorkerApproval>>, RepositoryError>;
    /// Apply a change set atomically.
    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{key} changed since it was read")]
    VersionConflict { key: RecordKey },
    #[error("{key} conflicts with existing {existing}")]
    UniqueViolation { key: RecordKey, existing: RecordKey },
    #[error("{key} does not exist")]
    Missing { key: RecordKey },
    #[error("storage timed out after {waited_ms}ms during {operation}")]
    Timeout {
        operation: &'static str,
        waited_ms: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Timeouts and outages may succeed on a later attempt; constraint failures never will.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// Local wall clock. All instants share one timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Outbound notification hook. Delivery is advisory: clients poll, and nothing in the engine
/// depends on a notification having been seen.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Worker(WorkerId),
    CareHome(CareHomeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTopic {
    ApplicationReceived,
    ApplicationAccepted,
    ApplicationRejected,
    ShiftFilled,
    ShiftCancelled,
    TimesheetSubmitted,
    TimesheetReviewed,
    TimesheetPaid,
    DocumentReviewed,
    WorkerStatusChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub topic: NotificationTopic,
    pub subject_id: String,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(recipient: Recipient, topic: NotificationTopic, subject_id: impl ToString) -> Self {
        Self {
            recipient,
            topic,
            subject_id: subject_id.to_string(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
