//! Staffing engine: shifts, applications, timesheets, documents, and worker approval.
//!
//! Each entity moves through a closed status set (see [`lifecycle`]). Services decide
//! transitions against the tables and commit every write of a transition in one versioned
//! change set, so capacity and uniqueness hold under concurrent requests.

pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
mod service;
pub mod verification;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApprovalChange, CareHomeId, Document, DocumentDecision,
    DocumentId, DocumentKind, DocumentSummary, EntityKind, Shift, ShiftDefinition, ShiftId,
    Timesheet, TimesheetDecision, TimesheetEntry, TimesheetId, WorkerApproval, WorkerId,
};
pub use memory::InMemoryStaffingRepository;
pub use repository::{
    ChangeSet, Clock, Notification, NotificationError, NotificationPublisher, NotificationTopic,
    Recipient, RecordKey, RepositoryError, StaffingRepository, SystemClock, Versioned,
};
pub use router::{error_response, staffing_router, status_for, StaffingApi};
pub use service::{Ineligibility, StaffingConfig, StaffingError, StaffingService};
pub use verification::VerificationService;
