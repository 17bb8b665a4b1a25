use tracing::info;

use super::{
    advance, next_application_id, present, transition, Committed, Replay, StaffingError,
    StaffingService,
};
use crate::workflows::staffing::domain::{
    worker_status_label, Application, ApplicationId, EntityKind, Shift, ShiftId, WorkerApproval,
    WorkerId,
};
use crate::workflows::staffing::lifecycle::{
    ApplicationAction, ApplicationStatus, Labelled, ShiftAction, ShiftStatus, Step,
};
use crate::workflows::staffing::repository::{
    ChangeSet, Notification, NotificationPublisher, NotificationTopic, Recipient, RecordKey,
    RepositoryError, StaffingRepository, Versioned,
};

const FILLED_NOTE: &str = "all slots on this shift have been filled";

impl<R, N> StaffingService<R, N>
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    /// Record a worker's bid on a published shift.
    pub fn apply_to_shift(
        &self,
        shift_id: &ShiftId,
        worker_id: &WorkerId,
        message: Option<String>,
    ) -> Result<Application, StaffingError> {
        let committed = self
            .retrier()
            .run("apply_to_shift", Replay::ConflictsOnly, || {
                let shift = self.load_shift(shift_id)?;
                ensure_open(&shift.record)?;
                let approval = self.approved_worker(worker_id)?;

                let existing = self
                    .repository
                    .applications_for_shift(shift_id)?
                    .into_iter()
                    .find(|entry| {
                        &entry.record.worker_id == worker_id && entry.record.is_active()
                    });
                if let Some(existing) = existing {
                    return Err(duplicate(shift_id, worker_id, existing.record.id.to_string()));
                }

                let application = Application {
                    id: next_application_id(),
                    shift_id: shift_id.clone(),
                    worker_id: worker_id.clone(),
                    status: ApplicationStatus::Pending,
                    message: present(message.as_deref()),
                    applied_at: self.now(),
                    reviewed_at: None,
                    review_note: None,
                };

                let mut changes = ChangeSet::new();
                changes
                    .insert(application.clone())
                    .guard(RecordKey::Shift(shift_id.clone()), shift.version)
                    .guard(RecordKey::WorkerApproval(worker_id.clone()), approval.version);

                match self.repository.commit(changes) {
                    Ok(()) => {}
                    Err(RepositoryError::UniqueViolation { existing, .. }) => {
                        return Err(duplicate(shift_id, worker_id, existing_id(&existing)));
                    }
                    Err(error) => return Err(error.into()),
                }

                info!(
                    application_id = %application.id,
                    shift_id = %shift_id,
                    worker_id = %worker_id,
                    "application received"
                );
                let notification = Notification::new(
                    Recipient::CareHome(shift.record.care_home_id.clone()),
                    NotificationTopic::ApplicationReceived,
                    &application.id,
                )
                .with_detail("shift_id", shift_id)
                .with_detail("worker_id", worker_id);
                Ok(Committed::quiet(application).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    /// Accept a pending application, taking one slot on its shift.
    ///
    /// When that was the last slot the shift becomes filled and every other pending
    /// application is rejected in the same commit.
    pub fn accept_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, StaffingError> {
        let committed = self
            .retrier()
            .run("accept_application", Replay::OnTransient, || {
                let stored = self.load_application(application_id)?;
                let mut application = stored.record;
                if application.status == ApplicationStatus::Accepted {
                    return Ok(Committed::quiet(application));
                }

                let shift_entry = self.load_shift(&application.shift_id)?;
                let mut shift = shift_entry.record;
                if shift.status == ShiftStatus::Filled || shift.is_at_capacity() {
                    return Err(capacity_exceeded(&shift));
                }
                if shift.status != ShiftStatus::Published {
                    return Err(StaffingError::InvalidTransition {
                        entity: EntityKind::Shift,
                        id: shift.id.to_string(),
                        from: shift.status.label(),
                        action: ApplicationAction::Accept.label(),
                    });
                }

                if let Step::Unchanged = transition(
                    EntityKind::Application,
                    application_id,
                    application.status,
                    ApplicationAction::Accept,
                )? {
                    return Ok(Committed::quiet(application));
                }
                let approval = self.approved_worker(&application.worker_id)?;

                let now = self.now();
                application.status = ApplicationStatus::Accepted;
                application.reviewed_at = Some(now);
                shift.filled_slots += 1;

                let mut changes = ChangeSet::new();
                changes
                    .update(application.clone(), stored.version)
                    .guard(
                        RecordKey::WorkerApproval(application.worker_id.clone()),
                        approval.version,
                    );

                let mut notifications = vec![Notification::new(
                    Recipient::Worker(application.worker_id.clone()),
                    NotificationTopic::ApplicationAccepted,
                    application_id,
                )
                .with_detail("shift_id", &shift.id)];

                if shift.is_at_capacity() {
                    advance(EntityKind::Shift, &shift.id, &mut shift.status, ShiftAction::Fill)?;
                    notifications.push(
                        Notification::new(
                            Recipient::CareHome(shift.care_home_id.clone()),
                            NotificationTopic::ShiftFilled,
                            &shift.id,
                        )
                        .with_detail("quantity", shift.quantity),
                    );

                    for other in self.repository.applications_for_shift(&shift.id)? {
                        if other.record.id == application.id
                            || other.record.status != ApplicationStatus::Pending
                        {
                            continue;
                        }
                        let mut rejected = other.record;
                        advance(
                            EntityKind::Application,
                            &rejected.id,
                            &mut rejected.status,
                            ApplicationAction::Reject,
                        )?;
                        rejected.reviewed_at = Some(now);
                        rejected.review_note = Some(FILLED_NOTE.to_string());
                        notifications.push(
                            Notification::new(
                                Recipient::Worker(rejected.worker_id.clone()),
                                NotificationTopic::ApplicationRejected,
                                &rejected.id,
                            )
                            .with_detail("shift_id", &shift.id)
                            .with_detail("reason", FILLED_NOTE),
                        );
                        changes.update(rejected, other.version);
                    }
                }
                changes.update(shift.clone(), shift_entry.version);
                self.repository.commit(changes)?;

                info!(
                    application_id = %application_id,
                    shift_id = %shift.id,
                    filled_slots = shift.filled_slots,
                    quantity = shift.quantity,
                    shift_status = shift.status.label(),
                    "application accepted"
                );
                Ok(Committed::quiet(application).notify_all(notifications))
            })?;
        Ok(self.finish(committed))
    }

    /// Turn down a pending application. A review note is required.
    pub fn reject_application(
        &self,
        application_id: &ApplicationId,
        reason: &str,
    ) -> Result<Application, StaffingError> {
        let Some(reason) = present(Some(reason)) else {
            return Err(StaffingError::MissingNote {
                entity: EntityKind::Application,
                id: application_id.to_string(),
                action: ApplicationAction::Reject.label(),
            });
        };

        let committed = self
            .retrier()
            .run("reject_application", Replay::ConflictsOnly, || {
                let stored = self.load_application(application_id)?;
                let mut application = stored.record;
                if !advance(
                    EntityKind::Application,
                    application_id,
                    &mut application.status,
                    ApplicationAction::Reject,
                )? {
                    return Ok(Committed::quiet(application));
                }
                application.reviewed_at = Some(self.now());
                application.review_note = Some(reason.clone());

                let mut changes = ChangeSet::new();
                changes.update(application.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(application_id = %application_id, "application rejected");
                let notification = Notification::new(
                    Recipient::Worker(application.worker_id.clone()),
                    NotificationTopic::ApplicationRejected,
                    application_id,
                )
                .with_detail("shift_id", &application.shift_id)
                .with_detail("reason", &reason);
                Ok(Committed::quiet(application).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    /// Worker pulls a pending application. The worker may apply to the shift again afterwards.
    pub fn withdraw_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, StaffingError> {
        let committed = self
            .retrier()
            .run("withdraw_application", Replay::ConflictsOnly, || {
                let stored = self.load_application(application_id)?;
                let mut application = stored.record;
                if !advance(
                    EntityKind::Application,
                    application_id,
                    &mut application.status,
                    ApplicationAction::Withdraw,
                )? {
                    return Ok(Committed::quiet(application));
                }

                let mut changes = ChangeSet::new();
                changes.update(application.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(application_id = %application_id, "application withdrawn");
                Ok(Committed::quiet(application))
            })?;
        Ok(self.finish(committed))
    }

    pub fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, StaffingError> {
        Ok(self.load_application(application_id)?.record)
    }

    /// Every application on a shift, oldest first.
    pub fn applications_for_shift(
        &self,
        shift_id: &ShiftId,
    ) -> Result<Vec<Application>, StaffingError> {
        self.load_shift(shift_id)?;
        Ok(self
            .repository
            .applications_for_shift(shift_id)?
            .into_iter()
            .map(|entry| entry.record)
            .collect())
    }

    /// Load the worker's approval record, denying anyone who is not currently approved.
    fn approved_worker(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Versioned<WorkerApproval>, StaffingError> {
        let approval = self.repository.worker_approval(worker_id)?;
        match approval {
            Some(entry) if entry.record.status.can_work() => Ok(entry),
            other => Err(StaffingError::NotApproved {
                worker_id: worker_id.clone(),
                status: worker_status_label(other.as_ref().map(|entry| &entry.record)),
            }),
        }
    }
}

/// Applications are only taken on published shifts with a free slot.
fn ensure_open(shift: &Shift) -> Result<(), StaffingError> {
    match shift.status {
        ShiftStatus::Filled => Err(capacity_exceeded(shift)),
        ShiftStatus::Published if shift.is_at_capacity() => Err(capacity_exceeded(shift)),
        ShiftStatus::Published => Ok(()),
        status => Err(StaffingError::InvalidTransition {
            entity: EntityKind::Shift,
            id: shift.id.to_string(),
            from: status.label(),
            action: "apply",
        }),
    }
}

fn capacity_exceeded(shift: &Shift) -> StaffingError {
    StaffingError::CapacityExceeded {
        shift_id: shift.id.clone(),
        filled: shift.filled_slots,
        quantity: shift.quantity,
    }
}

fn duplicate(shift_id: &ShiftId, worker_id: &WorkerId, existing: String) -> StaffingError {
    StaffingError::DuplicateApplication {
        shift_id: shift_id.clone(),
        worker_id: worker_id.clone(),
        existing,
    }
}

fn existing_id(key: &RecordKey) -> String {
    match key {
        RecordKey::Application(id) => id.to_string(),
        other => other.to_string(),
    }
}
