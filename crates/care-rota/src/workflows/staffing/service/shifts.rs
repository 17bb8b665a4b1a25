use tracing::{debug, info};

use super::{
    advance, next_shift_id, transition, Committed, Ineligibility, Replay, StaffingError,
    StaffingService,
};
use crate::workflows::scheduling::ShiftQuote;
use crate::workflows::staffing::domain::{EntityKind, Shift, ShiftDefinition, ShiftId};
use crate::workflows::staffing::lifecycle::{
    ApplicationAction, ApplicationStatus, ShiftAction, ShiftStatus, Step,
};
use crate::workflows::staffing::repository::{
    ChangeSet, Notification, NotificationPublisher, NotificationTopic, Recipient,
    StaffingRepository,
};

const CANCELLED_NOTE: &str = "the shift was cancelled";

impl<R, N> StaffingService<R, N>
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    /// Normalize and price a definition without storing anything.
    pub fn quote(&self, definition: &ShiftDefinition) -> Result<ShiftQuote, StaffingError> {
        Ok(definition.quote(&self.config.limits)?)
    }

    /// Store a new draft shift.
    pub fn create_shift(&self, definition: ShiftDefinition) -> Result<Shift, StaffingError> {
        let quote = definition.quote(&self.config.limits)?;
        let shift = Shift::from_definition(next_shift_id(), definition, &quote, self.now());

        let mut changes = ChangeSet::new();
        changes.insert(shift.clone());
        self.repository.commit(changes)?;

        info!(
            shift_id = %shift.id,
            care_home_id = %shift.care_home_id,
            starts_at = %shift.starts_at,
            rollover = shift.rollover,
            "shift drafted"
        );
        Ok(shift)
    }

    pub fn shift(&self, shift_id: &ShiftId) -> Result<Shift, StaffingError> {
        let stored = self.load_shift(shift_id)?;
        Ok(stored.record)
    }

    /// Open a draft shift to applications. Publishing twice returns the shift unchanged.
    pub fn publish_shift(&self, shift_id: &ShiftId) -> Result<Shift, StaffingError> {
        let committed = self
            .retrier()
            .run("publish_shift", Replay::OnTransient, || {
                let stored = self.load_shift(shift_id)?;
                let mut shift = stored.record;

                let next = match transition(
                    EntityKind::Shift,
                    shift_id,
                    shift.status,
                    ShiftAction::Publish,
                )? {
                    Step::Unchanged => return Ok(Committed::quiet(shift)),
                    Step::Advance(next) => next,
                };

                let missing = shift.missing_fields();
                if !missing.is_empty() {
                    return Err(StaffingError::IncompleteShift {
                        shift_id: shift_id.clone(),
                        missing,
                    });
                }

                shift.status = next;
                let mut changes = ChangeSet::new();
                changes.update(shift.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(shift_id = %shift_id, "shift published");
                Ok(Committed::quiet(shift))
            })?;
        Ok(self.finish(committed))
    }

    /// Cancel a shift that has not completed, rejecting every pending application on it.
    pub fn cancel_shift(&self, shift_id: &ShiftId) -> Result<Shift, StaffingError> {
        let committed = self
            .retrier()
            .run("cancel_shift", Replay::OnTransient, || {
                let stored = self.load_shift(shift_id)?;
                let mut shift = stored.record;

                let next = match transition(
                    EntityKind::Shift,
                    shift_id,
                    shift.status,
                    ShiftAction::Cancel,
                )? {
                    Step::Unchanged => return Ok(Committed::quiet(shift)),
                    Step::Advance(next) => next,
                };
                shift.status = next;

                let now = self.now();
                let mut changes = ChangeSet::new();
                changes.update(shift.clone(), stored.version);

                let mut notifications = Vec::new();
                for entry in self.repository.applications_for_shift(shift_id)? {
                    let mut application = entry.record;
                    match application.status {
                        ApplicationStatus::Pending => {
                            advance(
                                EntityKind::Application,
                                &application.id,
                                &mut application.status,
                                ApplicationAction::Reject,
                            )?;
                            application.reviewed_at = Some(now);
                            application.review_note = Some(CANCELLED_NOTE.to_string());
                            notifications.push(
                                Notification::new(
                                    Recipient::Worker(application.worker_id.clone()),
                                    NotificationTopic::ApplicationRejected,
                                    &application.id,
                                )
                                .with_detail("shift_id", shift_id)
                                .with_detail("reason", CANCELLED_NOTE),
                            );
                            changes.update(application, entry.version);
                        }
                        ApplicationStatus::Accepted => notifications.push(
                            Notification::new(
                                Recipient::Worker(application.worker_id.clone()),
                                NotificationTopic::ShiftCancelled,
                                shift_id,
                            )
                            .with_detail("application_id", &application.id),
                        ),
                        ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => {}
                    }
                }

                self.repository.commit(changes)?;
                info!(
                    shift_id = %shift_id,
                    notified = notifications.len(),
                    "shift cancelled"
                );
                Ok(Committed::quiet(shift).notify_all(notifications))
            })?;
        Ok(self.finish(committed))
    }

    /// Mark a published or filled shift completed once its end instant has passed.
    pub fn complete_shift(&self, shift_id: &ShiftId) -> Result<Shift, StaffingError> {
        let committed = self
            .retrier()
            .run("complete_shift", Replay::ConflictsOnly, || {
                let stored = self.load_shift(shift_id)?;
                let mut shift = stored.record;

                let next = match transition(
                    EntityKind::Shift,
                    shift_id,
                    shift.status,
                    ShiftAction::Complete,
                )? {
                    Step::Unchanged => return Ok(Committed::quiet(shift)),
                    Step::Advance(next) => next,
                };

                if !shift.has_ended(self.now()) {
                    return Err(StaffingError::NotEligible {
                        shift_id: shift_id.clone(),
                        worker_id: None,
                        reason: Ineligibility::ShiftNotEnded {
                            ends_at: shift.ends_at,
                        },
                    });
                }

                shift.status = next;
                let mut changes = ChangeSet::new();
                changes.update(shift.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(shift_id = %shift_id, "shift completed");
                Ok(Committed::quiet(shift))
            })?;
        Ok(self.finish(committed))
    }

    /// Complete every published or filled shift whose end has passed.
    pub fn complete_elapsed_shifts(&self) -> Result<Vec<Shift>, StaffingError> {
        let now = self.now();
        let mut completed = Vec::new();

        for status in [ShiftStatus::Published, ShiftStatus::Filled] {
            for entry in self.repository.shifts_with_status(status)? {
                if !entry.record.has_ended(now) {
                    continue;
                }
                match self.complete_shift(&entry.record.id) {
                    Ok(shift) => completed.push(shift),
                    // cancelled between the scan and the commit
                    Err(StaffingError::InvalidTransition { from, .. }) => {
                        debug!(shift_id = %entry.record.id, from, "skipping shift during sweep");
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        Ok(completed)
    }
}
