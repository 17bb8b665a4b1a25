//! Shift, application, and timesheet operations over a [`StaffingRepository`].
//!
//! Every operation reads the records it needs, decides through the lifecycle tables, and
//! commits one `ChangeSet`. A version conflict means another request got there first; the
//! operation is re-read and re-decided rather than failed.

mod applications;
mod shifts;
mod timesheets;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{
    Application, ApplicationId, DocumentId, EntityKind, Shift, ShiftId, Timesheet, TimesheetId,
    WorkerId,
};
use super::lifecycle::{Lifecycle, Step};
use super::repository::{
    Clock, Notification, NotificationPublisher, RepositoryError, StaffingRepository,
    SystemClock, Versioned,
};
use crate::config::AppConfig;
use crate::workflows::scheduling::{DurationError, PayPolicy, ScheduleError, ScheduleLimits};

/// Upper bound on re-decisions after version conflicts. Each conflict means some other
/// commit succeeded, so this only trips under pathological contention.
const MAX_CONFLICT_RETRIES: u32 = 32;

/// Business rules the service is parameterised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffingConfig {
    pub limits: ScheduleLimits,
    pub pay: PayPolicy,
    /// Extra attempts after a transient storage failure, for operations that may be replayed.
    pub retry_attempts: u32,
}

impl Default for StaffingConfig {
    fn default() -> Self {
        Self {
            limits: ScheduleLimits::default(),
            pay: PayPolicy::default(),
            retry_attempts: 3,
        }
    }
}

impl From<&AppConfig> for StaffingConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            limits: ScheduleLimits::from_hours(config.scheduling.max_shift_hours),
            pay: PayPolicy {
                overtime_multiplier: config.scheduling.overtime_multiplier,
            },
            retry_attempts: config.storage.retry_attempts,
        }
    }
}

/// Service composing the repository, notification hook, and clock.
pub struct StaffingService<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    config: StaffingConfig,
}

impl<R, N> StaffingService<R, N>
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifications: Arc<N>, config: StaffingConfig) -> Self {
        Self::with_clock(repository, notifications, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        notifications: Arc<N>,
        config: StaffingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            notifications,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &StaffingConfig {
        &self.config
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn retrier(&self) -> Retrier {
        Retrier::new(self.config.retry_attempts)
    }

    fn finish<T>(&self, committed: Committed<T>) -> T {
        deliver(self.notifications.as_ref(), committed.notifications);
        committed.value
    }

    fn load_shift(&self, shift_id: &ShiftId) -> Result<Versioned<Shift>, StaffingError> {
        require(self.repository.shift(shift_id)?, EntityKind::Shift, shift_id)
    }

    fn load_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Versioned<Application>, StaffingError> {
        require(
            self.repository.application(application_id)?,
            EntityKind::Application,
            application_id,
        )
    }

    fn load_timesheet(
        &self,
        timesheet_id: &TimesheetId,
    ) -> Result<Versioned<Timesheet>, StaffingError> {
        require(
            self.repository.timesheet(timesheet_id)?,
            EntityKind::Timesheet,
            timesheet_id,
        )
    }
}

/// Why a worker cannot record time against a shift (or a shift cannot complete yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    ShiftCancelled,
    ShiftNotEnded { ends_at: NaiveDateTime },
    NoAcceptedApplication,
    TimesheetExists { timesheet_id: TimesheetId },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::ShiftCancelled => f.write_str("the shift was cancelled"),
            Ineligibility::ShiftNotEnded { ends_at } => {
                write!(f, "the shift does not end until {ends_at}")
            }
            Ineligibility::NoAcceptedApplication => {
                f.write_str("the worker holds no accepted application")
            }
            Ineligibility::TimesheetExists { timesheet_id } => {
                write!(f, "timesheet {timesheet_id} already covers this shift")
            }
        }
    }
}

/// Error raised by the staffing and verification services.
#[derive(Debug, thiserror::Error)]
pub enum StaffingError {
    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),
    #[error(transparent)]
    InvalidDuration(#[from] DurationError),
    #[error("cannot {action} {entity} {id} while it is {from}")]
    InvalidTransition {
        entity: EntityKind,
        id: String,
        from: &'static str,
        action: &'static str,
    },
    #[error("shift {shift_id} cannot be published without {}", .missing.join(", "))]
    IncompleteShift {
        shift_id: ShiftId,
        missing: Vec<&'static str>,
    },
    #[error("shift {shift_id} has all {quantity} slots filled ({filled} accepted)")]
    CapacityExceeded {
        shift_id: ShiftId,
        filled: u32,
        quantity: u32,
    },
    #[error("worker {worker_id} is {status}, not approved")]
    NotApproved {
        worker_id: WorkerId,
        status: &'static str,
    },
    #[error("shift {shift_id} is not eligible{}: {reason}", worker_suffix(.worker_id))]
    NotEligible {
        shift_id: ShiftId,
        worker_id: Option<WorkerId>,
        reason: Ineligibility,
    },
    #[error("worker {worker_id} already holds application {existing} on shift {shift_id}")]
    DuplicateApplication {
        shift_id: ShiftId,
        worker_id: WorkerId,
        existing: String,
    },
    #[error("{action} on {entity} {id} requires a note")]
    MissingNote {
        entity: EntityKind,
        id: String,
        action: &'static str,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

fn worker_suffix(worker_id: &Option<WorkerId>) -> String {
    worker_id
        .as_ref()
        .map(|worker| format!(" for worker {worker}"))
        .unwrap_or_default()
}

impl StaffingError {
    /// Only transient storage failures may succeed when the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(error) if error.is_transient())
    }

    /// Stable machine-readable code used in API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSchedule(_) => "invalid_schedule",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::IncompleteShift { .. } => "incomplete_shift",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotApproved { .. } => "not_approved",
            Self::NotEligible { .. } => "not_eligible",
            Self::DuplicateApplication { .. } => "duplicate_application",
            Self::MissingNote { .. } => "missing_note",
            Self::NotFound { .. } => "not_found",
            Self::Storage(RepositoryError::VersionConflict { .. })
            | Self::Storage(RepositoryError::UniqueViolation { .. }) => "storage_conflict",
            Self::Storage(error) if error.is_transient() => "storage_unavailable",
            Self::Storage(_) => "storage_error",
        }
    }
}

/// Apply `action` through the lifecycle table, naming the record in the error.
pub(crate) fn transition<S: Lifecycle>(
    entity: EntityKind,
    id: impl fmt::Display,
    status: S,
    action: S::Action,
) -> Result<Step<S>, StaffingError> {
    status
        .apply(action)
        .map_err(|illegal| StaffingError::InvalidTransition {
            entity,
            id: id.to_string(),
            from: illegal.from,
            action: illegal.action,
        })
}

/// Like [`transition`], but writes the new state in place. Returns whether anything changed.
pub(crate) fn advance<S: Lifecycle>(
    entity: EntityKind,
    id: impl fmt::Display,
    status: &mut S,
    action: S::Action,
) -> Result<bool, StaffingError> {
    match transition(entity, id, *status, action)? {
        Step::Advance(next) => {
            *status = next;
            Ok(true)
        }
        Step::Unchanged => Ok(false),
    }
}

pub(crate) fn require<T>(
    found: Option<Versioned<T>>,
    entity: EntityKind,
    id: impl fmt::Display,
) -> Result<Versioned<T>, StaffingError> {
    found.ok_or_else(|| StaffingError::NotFound {
        entity,
        id: id.to_string(),
    })
}

/// Trimmed note, or `None` when blank.
pub(crate) fn present(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|note| !note.is_empty())
        .map(str::to_string)
}

/// Value produced by a committed transition plus the notifications it triggers.
#[derive(Debug)]
pub(crate) struct Committed<T> {
    pub(crate) value: T,
    pub(crate) notifications: Vec<Notification>,
}

impl<T> Committed<T> {
    pub(crate) fn quiet(value: T) -> Self {
        Self {
            value,
            notifications: Vec::new(),
        }
    }

    pub(crate) fn notify(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub(crate) fn notify_all(
        mut self,
        notifications: impl IntoIterator<Item = Notification>,
    ) -> Self {
        self.notifications.extend(notifications);
        self
    }
}

/// Whether an operation may be replayed after a transient storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    OnTransient,
    ConflictsOnly,
}

/// Runs one read-decide-commit attempt until it settles.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Retrier {
    transient_attempts: u32,
}

impl Retrier {
    pub(crate) fn new(transient_attempts: u32) -> Self {
        Self { transient_attempts }
    }

    pub(crate) fn run<T>(
        &self,
        operation: &'static str,
        replay: Replay,
        mut attempt: impl FnMut() -> Result<Committed<T>, StaffingError>,
    ) -> Result<Committed<T>, StaffingError> {
        let mut conflicts = 0;
        let mut failures = 0;
        loop {
            match attempt() {
                Err(StaffingError::Storage(RepositoryError::VersionConflict { key }))
                    if conflicts < MAX_CONFLICT_RETRIES =>
                {
                    conflicts += 1;
                    debug!(operation, %key, conflicts, "record moved during commit; re-deciding");
                }
                Err(error)
                    if replay == Replay::OnTransient
                        && error.is_retryable()
                        && failures < self.transient_attempts =>
                {
                    failures += 1;
                    warn!(
                        operation,
                        error = %error,
                        failures,
                        "transient storage failure; retrying"
                    );
                }
                settled => return settled,
            }
        }
    }
}

/// Publish after commit. Delivery failures never undo a transition.
pub(crate) fn deliver<N: NotificationPublisher + ?Sized>(
    publisher: &N,
    notifications: Vec<Notification>,
) {
    for notification in notifications {
        let topic = notification.topic;
        let subject = notification.subject_id.clone();
        if let Err(error) = publisher.publish(notification) {
            warn!(?topic, subject = %subject, error = %error, "notification not delivered");
        }
    }
}

static SHIFT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TIMESHEET_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str, sequence: &AtomicU64) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

pub(crate) fn next_shift_id() -> ShiftId {
    ShiftId(next_id("sh", &SHIFT_SEQUENCE))
}

pub(crate) fn next_application_id() -> ApplicationId {
    ApplicationId(next_id("app", &APPLICATION_SEQUENCE))
}

pub(crate) fn next_timesheet_id() -> TimesheetId {
    TimesheetId(next_id("ts", &TIMESHEET_SEQUENCE))
}

pub(crate) fn next_document_id() -> DocumentId {
    DocumentId(next_id("doc", &DOCUMENT_SEQUENCE))
}
