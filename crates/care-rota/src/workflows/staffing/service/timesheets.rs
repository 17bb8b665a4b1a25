use tracing::info;

use super::{
    advance, next_timesheet_id, present, Committed, Ineligibility, Replay, StaffingError,
    StaffingService,
};
use crate::workflows::scheduling::{actual_pay, quote_worked_time, ActualPay, CanonicalSchedule};
use crate::workflows::staffing::domain::{
    EntityKind, Shift, ShiftId, Timesheet, TimesheetDecision, TimesheetEntry, TimesheetId,
    WorkerId,
};
use crate::workflows::staffing::lifecycle::{
    ApplicationStatus, Labelled, ShiftStatus, TimesheetAction, TimesheetStatus,
};
use crate::workflows::staffing::repository::{
    ChangeSet, Notification, NotificationPublisher, NotificationTopic, Recipient, RecordKey,
    RepositoryError, StaffingRepository,
};

impl<R, N> StaffingService<R, N>
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    /// Open a draft timesheet for a worker whose application on an ended shift was accepted.
    pub fn create_timesheet(
        &self,
        shift_id: &ShiftId,
        worker_id: &WorkerId,
        entry: TimesheetEntry,
    ) -> Result<Timesheet, StaffingError> {
        let committed = self
            .retrier()
            .run("create_timesheet", Replay::ConflictsOnly, || {
                let shift = self.load_shift(shift_id)?.record;
                let ineligible = |reason| StaffingError::NotEligible {
                    shift_id: shift_id.clone(),
                    worker_id: Some(worker_id.clone()),
                    reason,
                };

                if shift.status == ShiftStatus::Cancelled {
                    return Err(ineligible(Ineligibility::ShiftCancelled));
                }
                let now = self.now();
                if !shift.has_ended(now) {
                    return Err(ineligible(Ineligibility::ShiftNotEnded {
                        ends_at: shift.ends_at,
                    }));
                }

                let accepted = self
                    .repository
                    .applications_for_shift(shift_id)?
                    .into_iter()
                    .find(|application| {
                        &application.record.worker_id == worker_id
                            && application.record.status == ApplicationStatus::Accepted
                    })
                    .ok_or_else(|| ineligible(Ineligibility::NoAcceptedApplication))?;

                if let Some(existing) = self
                    .repository
                    .timesheets_for_shift(shift_id)?
                    .into_iter()
                    .find(|timesheet| &timesheet.record.worker_id == worker_id)
                {
                    return Err(ineligible(Ineligibility::TimesheetExists {
                        timesheet_id: existing.record.id,
                    }));
                }

                let (period, pay) = self.price_entry(&shift, &entry)?;
                let timesheet = Timesheet {
                    id: next_timesheet_id(),
                    shift_id: shift_id.clone(),
                    worker_id: worker_id.clone(),
                    application_id: accepted.record.id.clone(),
                    clock_in: period.start,
                    clock_out: period.end,
                    break_minutes: entry.break_minutes,
                    status: TimesheetStatus::Draft,
                    pay,
                    worker_notes: present(entry.notes.as_deref()),
                    manager_notes: None,
                    created_at: now,
                    submitted_at: None,
                    reviewed_at: None,
                    paid_at: None,
                    payout_reference: None,
                };

                let mut changes = ChangeSet::new();
                changes
                    .insert(timesheet.clone())
                    .guard(RecordKey::Application(accepted.record.id), accepted.version);
                match self.repository.commit(changes) {
                    Ok(()) => {}
                    Err(RepositoryError::UniqueViolation {
                        existing: RecordKey::Timesheet(timesheet_id),
                        ..
                    }) => {
                        return Err(ineligible(Ineligibility::TimesheetExists { timesheet_id }));
                    }
                    Err(error) => return Err(error.into()),
                }

                info!(
                    timesheet_id = %timesheet.id,
                    shift_id = %shift_id,
                    worker_id = %worker_id,
                    worked_hours = %timesheet.pay.worked_hours,
                    overtime_hours = %timesheet.pay.overtime_hours,
                    "timesheet drafted"
                );
                Ok(Committed::quiet(timesheet))
            })?;
        Ok(self.finish(committed))
    }

    /// Worker edit of a draft, queried, or rejected timesheet. Pay is recomputed and the sheet
    /// returns to draft.
    pub fn update_timesheet(
        &self,
        timesheet_id: &TimesheetId,
        entry: TimesheetEntry,
    ) -> Result<Timesheet, StaffingError> {
        let committed = self
            .retrier()
            .run("update_timesheet", Replay::ConflictsOnly, || {
                let stored = self.load_timesheet(timesheet_id)?;
                let mut timesheet = stored.record;
                advance(
                    EntityKind::Timesheet,
                    timesheet_id,
                    &mut timesheet.status,
                    TimesheetAction::Edit,
                )?;

                let shift = self.load_shift(&timesheet.shift_id)?.record;
                let (period, pay) = self.price_entry(&shift, &entry)?;
                timesheet.clock_in = period.start;
                timesheet.clock_out = period.end;
                timesheet.break_minutes = entry.break_minutes;
                timesheet.worker_notes = present(entry.notes.as_deref());
                timesheet.pay = pay;

                let mut changes = ChangeSet::new();
                changes.update(timesheet.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    timesheet_id = %timesheet_id,
                    worked_hours = %timesheet.pay.worked_hours,
                    "timesheet edited"
                );
                Ok(Committed::quiet(timesheet))
            })?;
        Ok(self.finish(committed))
    }

    /// Send a draft to the care home. The stored times are priced again so a sheet that no
    /// longer yields payable time cannot be submitted.
    pub fn submit_timesheet(
        &self,
        timesheet_id: &TimesheetId,
    ) -> Result<Timesheet, StaffingError> {
        let committed = self
            .retrier()
            .run("submit_timesheet", Replay::ConflictsOnly, || {
                let stored = self.load_timesheet(timesheet_id)?;
                let mut timesheet = stored.record;
                if !advance(
                    EntityKind::Timesheet,
                    timesheet_id,
                    &mut timesheet.status,
                    TimesheetAction::Submit,
                )? {
                    return Ok(Committed::quiet(timesheet));
                }

                let shift = self.load_shift(&timesheet.shift_id)?.record;
                timesheet.pay = actual_pay(
                    timesheet.clock_in,
                    timesheet.clock_out,
                    timesheet.break_minutes,
                    shift.scheduled_hours(),
                    shift.hourly_rate,
                    &self.config.pay,
                )?;
                timesheet.submitted_at = Some(self.now());

                let mut changes = ChangeSet::new();
                changes.update(timesheet.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    timesheet_id = %timesheet_id,
                    total_pay = %timesheet.pay.total_pay,
                    "timesheet submitted"
                );
                let notification = Notification::new(
                    Recipient::CareHome(shift.care_home_id.clone()),
                    NotificationTopic::TimesheetSubmitted,
                    timesheet_id,
                )
                .with_detail("shift_id", &shift.id)
                .with_detail("worker_id", &timesheet.worker_id);
                Ok(Committed::quiet(timesheet).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    /// Care-home verdict on a submitted sheet. Queries and rejections need a manager note.
    pub fn review_timesheet(
        &self,
        timesheet_id: &TimesheetId,
        decision: TimesheetDecision,
        note: Option<&str>,
    ) -> Result<Timesheet, StaffingError> {
        let action = match decision {
            TimesheetDecision::Approve => TimesheetAction::Approve,
            TimesheetDecision::Query => TimesheetAction::Query,
            TimesheetDecision::Reject => TimesheetAction::Reject,
        };
        let note = present(note);
        if decision.requires_note() && note.is_none() {
            return Err(StaffingError::MissingNote {
                entity: EntityKind::Timesheet,
                id: timesheet_id.to_string(),
                action: action.label(),
            });
        }

        let committed = self
            .retrier()
            .run("review_timesheet", Replay::ConflictsOnly, || {
                let stored = self.load_timesheet(timesheet_id)?;
                let mut timesheet = stored.record;
                if !advance(EntityKind::Timesheet, timesheet_id, &mut timesheet.status, action)? {
                    return Ok(Committed::quiet(timesheet));
                }
                timesheet.reviewed_at = Some(self.now());
                if note.is_some() {
                    timesheet.manager_notes = note.clone();
                }

                let mut changes = ChangeSet::new();
                changes.update(timesheet.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    timesheet_id = %timesheet_id,
                    status = timesheet.status.label(),
                    "timesheet reviewed"
                );
                let mut notification = Notification::new(
                    Recipient::Worker(timesheet.worker_id.clone()),
                    NotificationTopic::TimesheetReviewed,
                    timesheet_id,
                )
                .with_detail("status", timesheet.status.label());
                if let Some(note) = &timesheet.manager_notes {
                    notification = notification.with_detail("note", note);
                }
                Ok(Committed::quiet(timesheet).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    /// Billing callback once the payout for an approved sheet has been sent.
    pub fn mark_timesheet_paid(
        &self,
        timesheet_id: &TimesheetId,
        payout_reference: &str,
    ) -> Result<Timesheet, StaffingError> {
        let Some(reference) = present(Some(payout_reference)) else {
            return Err(StaffingError::MissingNote {
                entity: EntityKind::Timesheet,
                id: timesheet_id.to_string(),
                action: TimesheetAction::MarkPaid.label(),
            });
        };

        let committed = self
            .retrier()
            .run("mark_timesheet_paid", Replay::ConflictsOnly, || {
                let stored = self.load_timesheet(timesheet_id)?;
                let mut timesheet = stored.record;
                if !advance(
                    EntityKind::Timesheet,
                    timesheet_id,
                    &mut timesheet.status,
                    TimesheetAction::MarkPaid,
                )? {
                    return Ok(Committed::quiet(timesheet));
                }
                timesheet.paid_at = Some(self.now());
                timesheet.payout_reference = Some(reference.clone());

                let mut changes = ChangeSet::new();
                changes.update(timesheet.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    timesheet_id = %timesheet_id,
                    payout_reference = %reference,
                    "timesheet paid"
                );
                let notification = Notification::new(
                    Recipient::Worker(timesheet.worker_id.clone()),
                    NotificationTopic::TimesheetPaid,
                    timesheet_id,
                )
                .with_detail("total_pay", timesheet.pay.total_pay);
                Ok(Committed::quiet(timesheet).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    pub fn timesheet(&self, timesheet_id: &TimesheetId) -> Result<Timesheet, StaffingError> {
        Ok(self.load_timesheet(timesheet_id)?.record)
    }

    /// Resolve the entry's clock pair and price it against the shift's rate and schedule.
    fn price_entry(
        &self,
        shift: &Shift,
        entry: &TimesheetEntry,
    ) -> Result<(CanonicalSchedule, ActualPay), StaffingError> {
        Ok(quote_worked_time(
            entry.work_date,
            entry.clock_in,
            entry.clock_out,
            entry.break_minutes,
            shift.scheduled_hours(),
            shift.hourly_rate,
            &self.config.pay,
        )?)
    }
}
