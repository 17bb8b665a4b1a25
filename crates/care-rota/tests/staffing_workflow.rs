//! End-to-end scenarios for the care-home staffing engine.
//!
//! Everything here goes through the public service facade and HTTP router: a care home posts a
//! shift, approved workers apply, the shift fills, and the worked time is priced, reviewed, and
//! paid.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;

    use care_rota::workflows::scheduling::ScheduleInput;
    use care_rota::workflows::staffing::{
        CareHomeId, Clock, DocumentDecision, DocumentKind, InMemoryStaffingRepository,
        Notification, NotificationError, NotificationPublisher, ShiftDefinition, StaffingApi,
        StaffingConfig, StaffingService, TimesheetEntry, VerificationService, WorkerId,
    };
    use care_rota::workflows::staffing::lifecycle::WorkerAction;

    pub(super) fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid instant")
    }

    pub(super) fn money(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    pub(super) struct ManualClock(Mutex<NaiveDateTime>);

    impl ManualClock {
        pub(super) fn set(&self, now: NaiveDateTime) {
            *self.0.lock().expect("clock mutex poisoned") = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().expect("clock mutex poisoned")
        }
    }

    #[derive(Default)]
    pub(super) struct Outbox(Mutex<Vec<Notification>>);

    impl Outbox {
        pub(super) fn drain(&self) -> Vec<Notification> {
            std::mem::take(&mut *self.0.lock().expect("outbox mutex poisoned"))
        }
    }

    impl NotificationPublisher for Outbox {
        fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
            self.0
                .lock()
                .expect("outbox mutex poisoned")
                .push(notification);
            Ok(())
        }
    }

    pub(super) type Staffing = StaffingService<InMemoryStaffingRepository, Outbox>;
    pub(super) type Verification = VerificationService<InMemoryStaffingRepository, Outbox>;

    pub(super) struct Rota {
        pub(super) staffing: Arc<Staffing>,
        pub(super) verification: Arc<Verification>,
        pub(super) outbox: Arc<Outbox>,
        pub(super) clock: Arc<ManualClock>,
    }

    impl Rota {
        pub(super) fn new() -> Self {
            let repository = Arc::new(InMemoryStaffingRepository::default());
            let outbox = Arc::new(Outbox::default());
            let clock = Arc::new(ManualClock(Mutex::new(at(1, 8, 0))));
            let config = StaffingConfig::default();
            Self {
                staffing: Arc::new(StaffingService::with_clock(
                    repository.clone(),
                    outbox.clone(),
                    config,
                    clock.clone(),
                )),
                verification: Arc::new(VerificationService::with_clock(
                    repository,
                    outbox.clone(),
                    config,
                    clock.clone(),
                )),
                outbox,
                clock,
            }
        }

        pub(super) fn api(&self) -> StaffingApi<InMemoryStaffingRepository, Outbox> {
            StaffingApi {
                staffing: self.staffing.clone(),
                verification: self.verification.clone(),
            }
        }

        /// Register a worker, approve their identity document, then approve the account.
        pub(super) fn onboard(&self, id: &str) -> WorkerId {
            let worker = WorkerId::from(id);
            self.verification
                .register_worker(&worker)
                .expect("registered");
            let document = self
                .verification
                .upload_document(&worker, DocumentKind::Identification)
                .expect("uploaded");
            self.verification
                .review_document(&document.id, DocumentDecision::Approve)
                .expect("document approved");
            let summary = self
                .verification
                .document_summary(&worker)
                .expect("summary");
            assert!(summary.all_approved());
            self.verification
                .decide_worker(&worker, WorkerAction::Approve, "ops@rota", None)
                .expect("worker approved");
            worker
        }
    }

    /// Early shift 2025-04-07 07:00 to 15:00 at 14.50/h with a paid 20 minute break.
    pub(super) fn early_shift(quantity: u32) -> ShiftDefinition {
        ShiftDefinition {
            care_home_id: CareHomeId::from("home-willow"),
            role: "Care Assistant".to_string(),
            schedule: ScheduleInput {
                date: NaiveDate::from_ymd_opt(2025, 4, 7).expect("valid date"),
                start: "07:00".parse().expect("clock"),
                end: "15:00".parse().expect("clock"),
                ends_next_day: None,
            },
            hourly_rate: money("14.50"),
            break_minutes: 20,
            break_paid: true,
            quantity,
            urgent: true,
            notes: Some("Covering sickness on the dementia unit".to_string()),
        }
    }

    pub(super) fn worked(clock_in: &str, clock_out: &str, break_minutes: u32) -> TimesheetEntry {
        TimesheetEntry {
            work_date: NaiveDate::from_ymd_opt(2025, 4, 7).expect("valid date"),
            clock_in: clock_in.parse().expect("clock"),
            clock_out: clock_out.parse().expect("clock"),
            break_minutes,
            notes: None,
        }
    }
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use care_rota::workflows::staffing::lifecycle::{
    ApplicationStatus, ShiftStatus, TimesheetStatus,
};
use care_rota::workflows::staffing::{
    staffing_router, NotificationTopic, Recipient, StaffingError, TimesheetDecision,
};
use common::*;

#[test]
fn a_shift_is_staffed_worked_and_paid() {
    let rota = Rota::new();
    let alice = rota.onboard("w-alice");
    let bilal = rota.onboard("w-bilal");
    let chen = rota.onboard("w-chen");
    rota.outbox.drain();

    let shift = rota
        .staffing
        .create_shift(early_shift(2))
        .expect("shift drafted");
    assert_eq!(shift.planned_pay.billable_hours, money("8"));
    assert_eq!(shift.planned_pay.total_pay, money("116.00"));
    let shift = rota.staffing.publish_shift(&shift.id).expect("published");

    let applications: Vec<_> = [&alice, &bilal, &chen]
        .into_iter()
        .map(|worker| {
            rota.staffing
                .apply_to_shift(&shift.id, worker, None)
                .expect("applied")
        })
        .collect();
    rota.staffing
        .accept_application(&applications[0].id)
        .expect("alice accepted");
    rota.staffing
        .accept_application(&applications[1].id)
        .expect("bilal accepted");

    let filled = rota.staffing.shift(&shift.id).expect("read");
    assert_eq!(filled.status, ShiftStatus::Filled);
    assert_eq!(filled.filled_slots, 2);
    let chen_application = rota
        .staffing
        .application(&applications[2].id)
        .expect("read");
    assert_eq!(chen_application.status, ApplicationStatus::Rejected);

    let delivered = rota.outbox.drain();
    assert!(delivered.iter().any(|note| {
        note.topic == NotificationTopic::ApplicationRejected
            && note.recipient == Recipient::Worker(chen.clone())
    }));
    assert_eq!(
        delivered
            .iter()
            .filter(|note| note.topic == NotificationTopic::ShiftFilled)
            .count(),
        1
    );

    rota.clock.set(at(7, 16, 0));
    let timesheet = rota
        .staffing
        .create_timesheet(&shift.id, &alice, worked("07:00", "16:00", 20))
        .expect("timesheet drafted");
    assert_eq!(timesheet.pay.worked_hours, money("8.67"));
    assert_eq!(timesheet.pay.overtime_hours, money("0.67"));
    assert_eq!(timesheet.pay.total_pay, money("130.52"));

    assert!(matches!(
        rota.staffing
            .create_timesheet(&shift.id, &chen, worked("07:00", "15:00", 20)),
        Err(StaffingError::NotEligible { .. })
    ));

    rota.staffing
        .submit_timesheet(&timesheet.id)
        .expect("submitted");
    rota.staffing
        .review_timesheet(&timesheet.id, TimesheetDecision::Approve, None)
        .expect("approved");
    let paid = rota
        .staffing
        .mark_timesheet_paid(&timesheet.id, "BACS-0415-001")
        .expect("paid");
    assert_eq!(paid.status, TimesheetStatus::Paid);

    let completed = rota
        .staffing
        .complete_elapsed_shifts()
        .expect("sweep runs");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, ShiftStatus::Completed);
}

#[tokio::test]
async fn router_serves_the_posting_flow() {
    let rota = Rota::new();
    let worker = rota.onboard("w-dana");
    let router = staffing_router(rota.api());

    let definition = serde_json::to_vec(&early_shift(1)).expect("encode");
    let created = router
        .clone()
        .oneshot(
            Request::post("/api/v1/shifts")
                .header("content-type", "application/json")
                .body(Body::from(definition))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(created.into_body(), 64 * 1024)
        .await
        .expect("body");
    let created: serde_json::Value = serde_json::from_slice(&body).expect("json");
    let shift_id = created["id"].as_str().expect("shift id").to_string();

    let published = router
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/shifts/{shift_id}/publish"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(published.status(), StatusCode::OK);

    let apply = serde_json::json!({ "worker_id": worker, "message": "Happy to cover" });
    let applied = router
        .oneshot(
            Request::post(format!("/api/v1/shifts/{shift_id}/applications"))
                .header("content-type", "application/json")
                .body(Body::from(apply.to_string()))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(applied.status(), StatusCode::CREATED);

    let topics: Vec<_> = rota.outbox.drain().into_iter().map(|note| note.topic).collect();
    assert!(topics.contains(&NotificationTopic::ApplicationReceived));
}
