use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::scheduling::ScheduleInput;
use crate::workflows::staffing::domain::{
    Application, ApplicationId, CareHomeId, Document, DocumentId, Shift, ShiftDefinition, ShiftId,
    Timesheet, TimesheetEntry, TimesheetId, WorkerApproval, WorkerId,
};
use crate::workflows::staffing::lifecycle::{ShiftStatus, WorkerAction};
use crate::workflows::staffing::repository::{
    ChangeSet, Clock, Notification, NotificationError, NotificationPublisher, NotificationTopic,
    RepositoryError, StaffingRepository, Versioned,
};
use crate::workflows::staffing::{
    InMemoryStaffingRepository, StaffingApi, StaffingConfig, StaffingService, VerificationService,
};

pub(super) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date")
}

pub(super) fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    date(day).and_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn money(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

/// Clock pinned to a chosen instant, moved explicitly by tests.
#[derive(Debug)]
pub(super) struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub(super) fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn set(&self, now: NaiveDateTime) {
        *self.now.lock().expect("clock mutex poisoned") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

/// 2025-03-10 20:00 to 08:00 the next morning, 15.00/h, 30 minute unpaid break.
pub(super) fn night_shift(quantity: u32) -> ShiftDefinition {
    ShiftDefinition {
        care_home_id: CareHomeId::from("home-oak"),
        role: "Senior Carer".to_string(),
        schedule: ScheduleInput {
            date: date(10),
            start: "20:00".parse().expect("clock"),
            end: "08:00".parse().expect("clock"),
            ends_next_day: None,
        },
        hourly_rate: money("15.00"),
        break_minutes: 30,
        break_paid: false,
        quantity,
        urgent: false,
        notes: None,
    }
}

/// 2025-03-10 22:00 to 06:00, an eight hour shift.
pub(super) fn eight_hour_shift() -> ShiftDefinition {
    let mut definition = night_shift(1);
    definition.schedule.start = "22:00".parse().expect("clock");
    definition.schedule.end = "06:00".parse().expect("clock");
    definition
}

pub(super) fn entry(clock_in: &str, clock_out: &str, break_minutes: u32) -> TimesheetEntry {
    TimesheetEntry {
        work_date: date(10),
        clock_in: clock_in.parse().expect("clock"),
        clock_out: clock_out.parse().expect("clock"),
        break_minutes,
        notes: None,
    }
}

pub(super) type MemoryService = StaffingService<InMemoryStaffingRepository, MemoryNotifications>;
pub(super) type MemoryVerification =
    VerificationService<InMemoryStaffingRepository, MemoryNotifications>;

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) verification: Arc<MemoryVerification>,
    pub(super) repository: Arc<InMemoryStaffingRepository>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) clock: Arc<FixedClock>,
}

/// Services over a fresh in-memory store with the clock at 2025-03-01 09:00.
pub(super) fn harness() -> Harness {
    let repository = Arc::new(InMemoryStaffingRepository::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let clock = Arc::new(FixedClock::new(at(1, 9, 0)));
    let config = StaffingConfig::default();

    let service = StaffingService::with_clock(
        repository.clone(),
        notifications.clone(),
        config,
        clock.clone(),
    );
    let verification = VerificationService::with_clock(
        repository.clone(),
        notifications.clone(),
        config,
        clock.clone(),
    );

    Harness {
        service: Arc::new(service),
        verification: Arc::new(verification),
        repository,
        notifications,
        clock,
    }
}

impl Harness {
    pub(super) fn approved_worker(&self, id: &str) -> WorkerId {
        let worker_id = WorkerId::from(id);
        self.verification
            .register_worker(&worker_id)
            .expect("worker registers");
        self.verification
            .decide_worker(&worker_id, WorkerAction::Approve, "admin@rota", None)
            .expect("worker approved");
        worker_id
    }

    pub(super) fn published(&self, definition: ShiftDefinition) -> Shift {
        let shift = self
            .service
            .create_shift(definition)
            .expect("shift created");
        self.service
            .publish_shift(&shift.id)
            .expect("shift published")
    }

    pub(super) fn apply(&self, shift_id: &ShiftId, worker: &str) -> Application {
        let worker_id = self.approved_worker(worker);
        self.service
            .apply_to_shift(shift_id, &worker_id, None)
            .expect("application recorded")
    }

    /// A shift with one accepted worker and the clock moved past its end.
    pub(super) fn worked_shift(
        &self,
        definition: ShiftDefinition,
        worker: &str,
    ) -> (Shift, WorkerId) {
        let shift = self.published(definition);
        let application = self.apply(&shift.id, worker);
        self.service
            .accept_application(&application.id)
            .expect("application accepted");
        self.clock.set(at(11, 9, 0));
        (shift, application.worker_id)
    }

    pub(super) fn api(&self) -> StaffingApi<InMemoryStaffingRepository, MemoryNotifications> {
        StaffingApi {
            staffing: self.service.clone(),
            verification: self.verification.clone(),
        }
    }

    pub(super) fn stored_shift(&self, shift_id: &ShiftId) -> Versioned<Shift> {
        self.repository
            .shift(shift_id)
            .expect("read")
            .expect("shift stored")
    }

    pub(super) fn shift_status(&self, shift_id: &ShiftId) -> ShiftStatus {
        self.stored_shift(shift_id).record.status
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }

    pub(super) fn topics(&self) -> Vec<NotificationTopic> {
        self.events().into_iter().map(|event| event.topic).collect()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationPublisher for FailingNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("push gateway offline".to_string()))
    }
}

/// Every call fails as if the database were down.
#[derive(Default)]
pub(super) struct UnavailableRepository {
    pub(super) calls: AtomicUsize,
}

impl UnavailableRepository {
    fn down<T>(&self) -> Result<T, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl StaffingRepository for UnavailableRepository {
    fn shift(&self, _id: &ShiftId) -> Result<Option<Versioned<Shift>>, RepositoryError> {
        self.down()
    }

    fn shifts_with_status(
        &self,
        _status: ShiftStatus,
    ) -> Result<Vec<Versioned<Shift>>, RepositoryError> {
        self.down()
    }

    fn application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<Versioned<Application>>, RepositoryError> {
        self.down()
    }

    fn applications_for_shift(
        &self,
        _shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Application>>, RepositoryError> {
        self.down()
    }

    fn timesheet(
        &self,
        _id: &TimesheetId,
    ) -> Result<Option<Versioned<Timesheet>>, RepositoryError> {
        self.down()
    }

    fn timesheets_for_shift(
        &self,
        _shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Timesheet>>, RepositoryError> {
        self.down()
    }

    fn document(&self, _id: &DocumentId) -> Result<Option<Versioned<Document>>, RepositoryError> {
        self.down()
    }

    fn documents_for_worker(
        &self,
        _worker_id: &WorkerId,
    ) -> Result<Vec<Versioned<Document>>, RepositoryError> {
        self.down()
    }

    fn worker_approval(
        &self,
        _worker_id: &WorkerId,
    ) -> Result<Option<Versioned<WorkerApproval>>, RepositoryError> {
        self.down()
    }

    fn commit(&self, _changes: ChangeSet) -> Result<(), RepositoryError> {
        self.down()
    }
}

/// Releases a shift read parked by [`FlakyRepository::park_next_shift_read`].
pub(super) struct ReadGate {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl ReadGate {
    /// Yield to the runtime until the parked read has started.
    pub(super) async fn entered(&self) {
        while self.entered.try_recv().is_err() {
            tokio::task::yield_now().await;
        }
    }

    pub(super) fn open(self) {
        let _ = self.release.send(());
    }
}

type ParkedRead = (mpsc::Sender<()>, mpsc::Receiver<()>);

/// In-memory store whose next `failures` commits time out, and whose next shift read can be
/// held until a test lets it through.
pub(super) struct FlakyRepository {
    pub(super) inner: InMemoryStaffingRepository,
    failures: AtomicU32,
    parked: Mutex<Option<ParkedRead>>,
}

impl FlakyRepository {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryStaffingRepository::default(),
            failures: AtomicU32::new(0),
            parked: Mutex::new(None),
        }
    }

    pub(super) fn fail_next_commits(&self, failures: u32) {
        self.failures.store(failures, Ordering::SeqCst);
    }

    pub(super) fn park_next_shift_read(&self) -> ReadGate {
        let (entered_tx, entered) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        *self.parked.lock().expect("gate mutex poisoned") = Some((entered_tx, release_rx));
        ReadGate { entered, release }
    }
}

impl StaffingRepository for FlakyRepository {
    fn shift(&self, id: &ShiftId) -> Result<Option<Versioned<Shift>>, RepositoryError> {
        let parked = self.parked.lock().expect("gate mutex poisoned").take();
        if let Some((entered, release)) = parked {
            let _ = entered.send(());
            // a held lock, as the in-memory store would see it under contention
            if release.recv_timeout(Duration::from_secs(2)).is_err() {
                return Err(RepositoryError::Timeout {
                    operation: "shift",
                    waited_ms: 2000,
                });
            }
        }
        self.inner.shift(id)
    }

    fn shifts_with_status(
        &self,
        status: ShiftStatus,
    ) -> Result<Vec<Versioned<Shift>>, RepositoryError> {
        self.inner.shifts_with_status(status)
    }

    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Versioned<Application>>, RepositoryError> {
        self.inner.application(id)
    }

    fn applications_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Application>>, RepositoryError> {
        self.inner.applications_for_shift(shift_id)
    }

    fn timesheet(&self, id: &TimesheetId) -> Result<Option<Versioned<Timesheet>>, RepositoryError> {
        self.inner.timesheet(id)
    }

    fn timesheets_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Versioned<Timesheet>>, RepositoryError> {
        self.inner.timesheets_for_shift(shift_id)
    }

    fn document(&self, id: &DocumentId) -> Result<Option<Versioned<Document>>, RepositoryError> {
        self.inner.document(id)
    }

    fn documents_for_worker(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Vec<Versioned<Document>>, RepositoryError> {
        self.inner.documents_for_worker(worker_id)
    }

    fn worker_approval(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<Versioned<WorkerApproval>>, RepositoryError> {
        self.inner.worker_approval(worker_id)
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Timeout {
                operation: "commit",
                waited_ms: 2000,
            });
        }
        self.inner.commit(changes)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
