use crate::infra::{parse_date, parse_money, RecordingNotifications};
use care_rota::error::AppError;
use care_rota::workflows::scheduling::{ClockTime, ScheduleError, ScheduleInput};
use care_rota::workflows::staffing::lifecycle::{ApplicationStatus, Labelled, WorkerAction};
use care_rota::workflows::staffing::{
    CareHomeId, Clock, DocumentDecision, DocumentKind, InMemoryStaffingRepository,
    NotificationTopic, ShiftDefinition, StaffingConfig, StaffingError, StaffingService,
    TimesheetDecision, TimesheetEntry, VerificationService, WorkerId,
};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Date of the demo night shift (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Number of slots on the shift
    #[arg(long, default_value_t = 2)]
    pub(crate) quantity: u32,
    /// Number of workers who apply
    #[arg(long, default_value_t = 3)]
    pub(crate) applicants: u32,
    /// Hourly rate offered
    #[arg(long, value_parser = parse_money, default_value = "15.00")]
    pub(crate) rate: Decimal,
}

/// Clock the demo moves forward by hand so the shift can end without waiting for it.
struct ScriptedClock(Mutex<NaiveDateTime>);

impl ScriptedClock {
    fn advance_to(&self, instant: NaiveDateTime) {
        if let Ok(mut now) = self.0.lock() {
            *now = instant;
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

type DemoStaffing = StaffingService<InMemoryStaffingRepository, RecordingNotifications>;
type DemoVerification = VerificationService<InMemoryStaffingRepository, RecordingNotifications>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let clock = Arc::new(ScriptedClock(Mutex::new(date.and_time(NaiveTime::MIN))));
    let repository = Arc::new(InMemoryStaffingRepository::default());
    let notifications = Arc::new(RecordingNotifications::default());
    let config = StaffingConfig::default();
    let staffing = DemoStaffing::with_clock(
        repository.clone(),
        notifications.clone(),
        config,
        clock.clone(),
    );
    let verification =
        DemoVerification::with_clock(repository, notifications.clone(), config, clock.clone());

    println!("Care rota demo for the night of {date}");

    let workers = (1..=args.applicants)
        .map(|index| onboard(&verification, &format!("w-demo-{index:02}")))
        .collect::<Result<Vec<_>, _>>()?;
    println!("\nOnboarded {} worker(s)", workers.len());

    let shift = staffing.create_shift(night_shift(date, args.rate, args.quantity)?)?;
    let shift = staffing.publish_shift(&shift.id)?;
    println!(
        "\nShift {} published: {} -> {}",
        shift.id, shift.starts_at, shift.ends_at
    );
    println!(
        "  {} slot(s), {} billable hours, {} per slot",
        shift.quantity, shift.planned_pay.billable_hours, shift.planned_pay.total_pay
    );

    let mut applications = Vec::with_capacity(workers.len());
    for worker in &workers {
        applications.push(staffing.apply_to_shift(&shift.id, worker, None)?);
    }
    for application in applications.iter().take(args.quantity as usize) {
        staffing.accept_application(&application.id)?;
    }

    println!("\nApplications");
    for application in staffing.applications_for_shift(&shift.id)? {
        println!(
            "  {} {:<10} {}",
            application.worker_id,
            application.status.label(),
            application.review_note.as_deref().unwrap_or("")
        );
    }
    let staffed = staffing.shift(&shift.id)?;
    println!(
        "  Shift is {} with {}/{} filled",
        staffed.status.label(),
        staffed.filled_slots,
        staffed.quantity
    );

    clock.advance_to(staffed.ends_at + Duration::hours(1));
    let accepted = staffing
        .applications_for_shift(&shift.id)?
        .into_iter()
        .filter(|application| application.status == ApplicationStatus::Accepted);

    println!("\nTimesheets");
    for (index, application) in accepted.enumerate() {
        // the first worker stays an hour late to show the overtime split
        let clock_out = if index == 0 { "09:00" } else { "08:00" };
        let timesheet = staffing.create_timesheet(
            &shift.id,
            &application.worker_id,
            TimesheetEntry {
                work_date: date,
                clock_in: clock_time("20:00")?,
                clock_out: clock_time(clock_out)?,
                break_minutes: 30,
                notes: None,
            },
        )?;
        staffing.submit_timesheet(&timesheet.id)?;
        staffing.review_timesheet(&timesheet.id, TimesheetDecision::Approve, None)?;
        let reference = format!("DEMO-{}", timesheet.id);
        let paid = staffing.mark_timesheet_paid(&timesheet.id, &reference)?;
        println!(
            "  {} worked {}h ({}h overtime), paid {} [{}]",
            paid.worker_id,
            paid.pay.worked_hours,
            paid.pay.overtime_hours,
            paid.pay.total_pay,
            reference
        );
    }

    let completed = staffing.complete_elapsed_shifts()?;
    println!("\nCompleted {} elapsed shift(s)", completed.len());

    println!("\nNotifications sent");
    for topic in [
        NotificationTopic::ApplicationReceived,
        NotificationTopic::ApplicationAccepted,
        NotificationTopic::ApplicationRejected,
        NotificationTopic::ShiftFilled,
        NotificationTopic::TimesheetSubmitted,
        NotificationTopic::TimesheetPaid,
    ] {
        println!("  {:<22} {}", format!("{topic:?}"), notifications.count(topic));
    }

    Ok(())
}

fn onboard(verification: &DemoVerification, id: &str) -> Result<WorkerId, AppError> {
    let worker = WorkerId::from(id);
    verification.register_worker(&worker)?;
    for kind in [DocumentKind::Identification, DocumentKind::RightToWork] {
        let document = verification.upload_document(&worker, kind)?;
        verification.review_document(&document.id, DocumentDecision::Approve)?;
    }
    verification.decide_worker(&worker, WorkerAction::Approve, "demo-admin", None)?;
    Ok(worker)
}

fn night_shift(
    date: NaiveDate,
    rate: Decimal,
    quantity: u32,
) -> Result<ShiftDefinition, AppError> {
    Ok(ShiftDefinition {
        care_home_id: CareHomeId::from("home-demo"),
        role: "Night Care Assistant".to_string(),
        schedule: ScheduleInput {
            date,
            start: clock_time("20:00")?,
            end: clock_time("08:00")?,
            ends_next_day: None,
        },
        hourly_rate: rate,
        break_minutes: 30,
        break_paid: false,
        quantity,
        urgent: false,
        notes: None,
    })
}

fn clock_time(raw: &str) -> Result<ClockTime, AppError> {
    raw.parse()
        .map_err(|err: ScheduleError| StaffingError::from(err).into())
}
