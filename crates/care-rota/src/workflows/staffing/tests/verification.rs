use super::common::*;
use crate::workflows::staffing::domain::{
    DocumentDecision, DocumentId, DocumentKind, EntityKind, WorkerId,
};
use crate::workflows::staffing::lifecycle::{DocumentStatus, WorkerAction, WorkerStatus};
use crate::workflows::staffing::repository::NotificationTopic;
use crate::workflows::staffing::StaffingError;

#[test]
fn registration_is_idempotent() {
    let harness = harness();
    let worker = WorkerId::from("w-new");

    let first = harness
        .verification
        .register_worker(&worker)
        .expect("registered");
    assert_eq!(first.status, WorkerStatus::Pending);
    assert!(first.history.is_empty());

    harness
        .verification
        .decide_worker(&worker, WorkerAction::Approve, "admin@rota", None)
        .expect("approved");
    let again = harness
        .verification
        .register_worker(&worker)
        .expect("registered again");
    assert_eq!(again.status, WorkerStatus::Approved);
}

#[test]
fn decisions_are_recorded_in_history() {
    let harness = harness();
    let worker = harness.approved_worker("w-1");
    harness.clock.set(at(5, 14, 30));

    let suspended = harness
        .verification
        .decide_worker(
            &worker,
            WorkerAction::Suspend,
            "compliance@rota",
            Some("DBS check lapsed"),
        )
        .expect("suspended");

    assert_eq!(suspended.status, WorkerStatus::Suspended);
    assert_eq!(suspended.history.len(), 2);
    let last = suspended.history.last().expect("history entry");
    assert_eq!(last.from, WorkerStatus::Approved);
    assert_eq!(last.to, WorkerStatus::Suspended);
    assert_eq!(last.actor, "compliance@rota");
    assert_eq!(last.reason.as_deref(), Some("DBS check lapsed"));
    assert_eq!(last.at, at(5, 14, 30));

    let reinstated = harness
        .verification
        .decide_worker(&worker, WorkerAction::Approve, "compliance@rota", None)
        .expect("reinstated");
    assert_eq!(reinstated.status, WorkerStatus::Approved);
    assert_eq!(
        harness.notifications.topics().last(),
        Some(&NotificationTopic::WorkerStatusChanged)
    );
}

#[test]
fn rejection_and_suspension_need_a_reason() {
    let harness = harness();
    let worker = WorkerId::from("w-1");
    harness
        .verification
        .register_worker(&worker)
        .expect("registered");

    for action in [WorkerAction::Reject, WorkerAction::Suspend] {
        assert!(matches!(
            harness
                .verification
                .decide_worker(&worker, action, "admin@rota", None),
            Err(StaffingError::MissingNote {
                entity: EntityKind::Worker,
                ..
            })
        ));
    }
}

#[test]
fn pending_workers_can_be_suspended_before_review() {
    let harness = harness();
    let worker = WorkerId::from("w-1");
    harness
        .verification
        .register_worker(&worker)
        .expect("registered");

    let suspended = harness
        .verification
        .decide_worker(
            &worker,
            WorkerAction::Suspend,
            "admin@rota",
            Some("identity check flagged"),
        )
        .expect("pending worker suspended");
    assert_eq!(suspended.status, WorkerStatus::Suspended);
    assert_eq!(suspended.history.len(), 1);
    assert_eq!(suspended.history[0].from, WorkerStatus::Pending);

    let reinstated = harness
        .verification
        .decide_worker(&worker, WorkerAction::Approve, "admin@rota", None)
        .expect("reinstated");
    assert_eq!(reinstated.status, WorkerStatus::Approved);
}

#[test]
fn rejected_workers_are_reopened_before_approval() {
    let harness = harness();
    let worker = WorkerId::from("w-1");
    harness
        .verification
        .register_worker(&worker)
        .expect("registered");
    harness
        .verification
        .decide_worker(
            &worker,
            WorkerAction::Reject,
            "admin@rota",
            Some("missing references"),
        )
        .expect("rejected");

    assert!(matches!(
        harness
            .verification
            .decide_worker(&worker, WorkerAction::Approve, "admin@rota", None),
        Err(StaffingError::InvalidTransition {
            entity: EntityKind::Worker,
            from: "rejected",
            action: "approve",
            ..
        })
    ));

    let reopened = harness
        .verification
        .decide_worker(&worker, WorkerAction::Reopen, "admin@rota", None)
        .expect("reopened");
    assert_eq!(reopened.status, WorkerStatus::Pending);
    let approved = harness
        .verification
        .decide_worker(&worker, WorkerAction::Approve, "admin@rota", None)
        .expect("approved");
    assert_eq!(approved.history.len(), 3);
}

#[test]
fn unknown_workers_are_not_found() {
    let harness = harness();
    let ghost = WorkerId::from("w-ghost");

    assert!(matches!(
        harness.verification.worker_approval(&ghost),
        Err(StaffingError::NotFound {
            entity: EntityKind::Worker,
            ..
        })
    ));
    assert!(matches!(
        harness
            .verification
            .upload_document(&ghost, DocumentKind::Identification),
        Err(StaffingError::NotFound { .. })
    ));
    assert!(matches!(
        harness.verification.document_summary(&ghost),
        Err(StaffingError::NotFound { .. })
    ));
}

#[test]
fn documents_are_reviewed_and_replaced() {
    let harness = harness();
    let worker = WorkerId::from("w-1");
    harness
        .verification
        .register_worker(&worker)
        .expect("registered");

    let passport = harness
        .verification
        .upload_document(&worker, DocumentKind::Identification)
        .expect("uploaded");
    assert_eq!(passport.status, DocumentStatus::Pending);
    assert_eq!(passport.revision, 1);

    let rejected = harness
        .verification
        .review_document(
            &passport.id,
            DocumentDecision::Reject {
                reason: "photo page is cropped".to_string(),
            },
        )
        .expect("rejected");
    assert_eq!(rejected.status, DocumentStatus::Rejected);
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("photo page is cropped")
    );
    assert!(matches!(
        harness
            .verification
            .review_document(&passport.id, DocumentDecision::Approve),
        Err(StaffingError::InvalidTransition { from: "rejected", .. })
    ));

    harness.clock.set(at(3, 10, 0));
    let replaced = harness
        .verification
        .replace_document(&passport.id)
        .expect("replaced");
    assert_eq!(replaced.status, DocumentStatus::Pending);
    assert_eq!(replaced.revision, 2);
    assert_eq!(replaced.rejection_reason, None);
    assert_eq!(replaced.uploaded_at, at(3, 10, 0));
    assert_eq!(replaced.reviewed_at, None);

    let approved = harness
        .verification
        .review_document(&passport.id, DocumentDecision::Approve)
        .expect("approved");
    assert_eq!(approved.status, DocumentStatus::Approved);
    assert!(harness
        .notifications
        .topics()
        .contains(&NotificationTopic::DocumentReviewed));
}

#[test]
fn document_notes_must_not_be_blank() {
    let harness = harness();
    let worker = WorkerId::from("w-1");
    harness
        .verification
        .register_worker(&worker)
        .expect("registered");
    let document = harness
        .verification
        .upload_document(&worker, DocumentKind::RightToWork)
        .expect("uploaded");

    assert!(matches!(
        harness.verification.review_document(
            &document.id,
            DocumentDecision::RequireAttention {
                note: " ".to_string()
            }
        ),
        Err(StaffingError::MissingNote {
            entity: EntityKind::Document,
            action: "request_attention",
            ..
        })
    ));

    let flagged = harness
        .verification
        .review_document(
            &document.id,
            DocumentDecision::RequireAttention {
                note: "share code expires next month".to_string(),
            },
        )
        .expect("flagged");
    assert_eq!(flagged.status, DocumentStatus::RequiresAttention);
    assert_eq!(
        flagged.action_note.as_deref(),
        Some("share code expires next month")
    );
}

#[test]
fn summary_counts_documents_by_status() {
    let harness = harness();
    let worker = WorkerId::from("w-1");
    harness
        .verification
        .register_worker(&worker)
        .expect("registered");

    let id = harness
        .verification
        .upload_document(&worker, DocumentKind::Identification)
        .expect("uploaded");
    let dbs = harness
        .verification
        .upload_document(&worker, DocumentKind::CriminalRecordCheck)
        .expect("uploaded");
    let training = harness
        .verification
        .upload_document(&worker, DocumentKind::TrainingCertificate)
        .expect("uploaded");

    harness
        .verification
        .review_document(&id.id, DocumentDecision::Approve)
        .expect("approved");
    harness
        .verification
        .review_document(
            &dbs.id,
            DocumentDecision::Reject {
                reason: "older than three years".to_string(),
            },
        )
        .expect("rejected");

    let summary = harness
        .verification
        .document_summary(&worker)
        .expect("summary");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.approved, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.pending, 1);
    assert!(!summary.all_approved());

    let mut outstanding = vec![dbs.id, training.id];
    outstanding.sort();
    assert_eq!(summary.outstanding, outstanding);
}

#[test]
fn unknown_documents_are_not_found() {
    let harness = harness();
    let error = harness
        .verification
        .replace_document(&DocumentId::from("doc-missing"))
        .expect_err("missing");
    assert_eq!(error.to_string(), "document doc-missing not found");
}
