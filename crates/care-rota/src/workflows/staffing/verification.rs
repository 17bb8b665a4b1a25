//! Document review and the worker approval state that gates shift applications.
//!
//! How document outcomes roll up into an approval decision belongs to the admin tooling. This
//! module exposes the read-only [`DocumentSummary`] it needs and records the decision it makes.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use super::domain::{
    ApprovalChange, Document, DocumentDecision, DocumentId, DocumentKind, DocumentSummary,
    EntityKind, WorkerApproval, WorkerId,
};
use super::lifecycle::{DocumentAction, DocumentStatus, Labelled, WorkerAction};
use super::repository::{
    ChangeSet, Clock, Notification, NotificationPublisher, NotificationTopic, Recipient,
    RecordKey, StaffingRepository, SystemClock, Versioned,
};
use super::service::{
    advance, deliver, next_document_id, present, require, Committed, Replay, Retrier,
    StaffingConfig, StaffingError,
};

pub struct VerificationService<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    retrier: Retrier,
}

impl<R, N> VerificationService<R, N>
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
            retrier: Retrier::new(config.retry_attempts),
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn finish<T>(&self, committed: Committed<T>) -> T {
        deliver(self.notifications.as_ref(), committed.notifications);
        committed.value
    }

    fn load_approval(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Versioned<WorkerApproval>, StaffingError> {
        require(
            self.repository.worker_approval(worker_id)?,
            EntityKind::Worker,
            worker_id,
        )
    }

    fn load_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Versioned<Document>, StaffingError> {
        require(
            self.repository.document(document_id)?,
            EntityKind::Document,
            document_id,
        )
    }

    /// Create a pending approval record. Registering an existing worker returns their record.
    pub fn register_worker(&self, worker_id: &WorkerId) -> Result<WorkerApproval, StaffingError> {
        let committed = self
            .retrier
            .run("register_worker", Replay::ConflictsOnly, || {
                if let Some(existing) = self.repository.worker_approval(worker_id)? {
                    return Ok(Committed::quiet(existing.record));
                }

                let approval = WorkerApproval::pending(worker_id.clone());
                let mut changes = ChangeSet::new();
                changes.insert(approval.clone());
                self.repository.commit(changes)?;

                info!(worker_id = %worker_id, "worker registered");
                Ok(Committed::quiet(approval))
            })?;
        Ok(self.finish(committed))
    }

    pub fn worker_approval(&self, worker_id: &WorkerId) -> Result<WorkerApproval, StaffingError> {
        Ok(self.load_approval(worker_id)?.record)
    }

    /// Record an admin decision on a worker account. Rejection and suspension need a reason.
    pub fn decide_worker(
        &self,
        worker_id: &WorkerId,
        action: WorkerAction,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<WorkerApproval, StaffingError> {
        let reason = present(reason);
        if matches!(action, WorkerAction::Reject | WorkerAction::Suspend) && reason.is_none() {
            return Err(StaffingError::MissingNote {
                entity: EntityKind::Worker,
                id: worker_id.to_string(),
                action: action.label(),
            });
        }

        let committed = self
            .retrier
            .run("decide_worker", Replay::ConflictsOnly, || {
                let stored = self.load_approval(worker_id)?;
                let mut approval = stored.record;
                let from = approval.status;
                if !advance(EntityKind::Worker, worker_id, &mut approval.status, action)? {
                    return Ok(Committed::quiet(approval));
                }
                approval.history.push(ApprovalChange {
                    from,
                    to: approval.status,
                    action,
                    actor: actor.to_string(),
                    reason: reason.clone(),
                    at: self.now(),
                });

                let mut changes = ChangeSet::new();
                changes.update(approval.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    worker_id = %worker_id,
                    from = from.label(),
                    to = approval.status.label(),
                    actor,
                    "worker approval changed"
                );
                let notification = Notification::new(
                    Recipient::Worker(worker_id.clone()),
                    NotificationTopic::WorkerStatusChanged,
                    worker_id,
                )
                .with_detail("status", approval.status.label());
                Ok(Committed::quiet(approval).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    /// Record a newly uploaded document for a registered worker.
    pub fn upload_document(
        &self,
        owner_id: &WorkerId,
        kind: DocumentKind,
    ) -> Result<Document, StaffingError> {
        let committed = self
            .retrier
            .run("upload_document", Replay::ConflictsOnly, || {
                let owner = self.load_approval(owner_id)?;
                let document = Document {
                    id: next_document_id(),
                    owner_id: owner_id.clone(),
                    kind,
                    status: DocumentStatus::Pending,
                    revision: 1,
                    rejection_reason: None,
                    action_note: None,
                    uploaded_at: self.now(),
                    reviewed_at: None,
                };

                let mut changes = ChangeSet::new();
                changes
                    .insert(document.clone())
                    .guard(RecordKey::WorkerApproval(owner_id.clone()), owner.version);
                self.repository.commit(changes)?;

                info!(
                    document_id = %document.id,
                    owner_id = %owner_id,
                    ?kind,
                    "document uploaded"
                );
                Ok(Committed::quiet(document))
            })?;
        Ok(self.finish(committed))
    }

    /// A fresh upload replaces the file and puts the document back in the review queue.
    pub fn replace_document(&self, document_id: &DocumentId) -> Result<Document, StaffingError> {
        let committed = self
            .retrier
            .run("replace_document", Replay::ConflictsOnly, || {
                let stored = self.load_document(document_id)?;
                let mut document = stored.record;
                advance(
                    EntityKind::Document,
                    document_id,
                    &mut document.status,
                    DocumentAction::Replace,
                )?;
                document.revision += 1;
                document.rejection_reason = None;
                document.action_note = None;
                document.uploaded_at = self.now();
                document.reviewed_at = None;

                let mut changes = ChangeSet::new();
                changes.update(document.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    document_id = %document_id,
                    revision = document.revision,
                    "document replaced"
                );
                Ok(Committed::quiet(document))
            })?;
        Ok(self.finish(committed))
    }

    /// Admin verdict on a pending document.
    pub fn review_document(
        &self,
        document_id: &DocumentId,
        decision: DocumentDecision,
    ) -> Result<Document, StaffingError> {
        let (action, note) = match &decision {
            DocumentDecision::Approve => (DocumentAction::Approve, None),
            DocumentDecision::Reject { reason } => {
                (DocumentAction::Reject, Some(reason.as_str()))
            }
            DocumentDecision::RequireAttention { note } => {
                (DocumentAction::RequestAttention, Some(note.as_str()))
            }
        };
        let note = present(note);
        if action != DocumentAction::Approve && note.is_none() {
            return Err(StaffingError::MissingNote {
                entity: EntityKind::Document,
                id: document_id.to_string(),
                action: action.label(),
            });
        }

        let committed = self
            .retrier
            .run("review_document", Replay::ConflictsOnly, || {
                let stored = self.load_document(document_id)?;
                let mut document = stored.record;
                if !advance(EntityKind::Document, document_id, &mut document.status, action)? {
                    return Ok(Committed::quiet(document));
                }
                match action {
                    DocumentAction::Reject => document.rejection_reason = note.clone(),
                    DocumentAction::RequestAttention => document.action_note = note.clone(),
                    DocumentAction::Approve | DocumentAction::Replace => {}
                }
                document.reviewed_at = Some(self.now());

                let mut changes = ChangeSet::new();
                changes.update(document.clone(), stored.version);
                self.repository.commit(changes)?;

                info!(
                    document_id = %document_id,
                    status = document.status.label(),
                    "document reviewed"
                );
                let mut notification = Notification::new(
                    Recipient::Worker(document.owner_id.clone()),
                    NotificationTopic::DocumentReviewed,
                    document_id,
                )
                .with_detail("status", document.status.label());
                if let Some(note) = &note {
                    notification = notification.with_detail("note", note);
                }
                Ok(Committed::quiet(document).notify(notification))
            })?;
        Ok(self.finish(committed))
    }

    /// Counts by status plus the documents still awaiting approval.
    pub fn document_summary(
        &self,
        worker_id: &WorkerId,
    ) -> Result<DocumentSummary, StaffingError> {
        self.load_approval(worker_id)?;
        let documents = self.repository.documents_for_worker(worker_id)?;
        Ok(DocumentSummary::from_documents(
            documents.iter().map(|entry| &entry.record),
        ))
    }
}
