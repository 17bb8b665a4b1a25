use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lifecycle::{
    ApplicationStatus, DocumentStatus, Labelled, ShiftStatus, TimesheetStatus, WorkerAction,
    WorkerStatus,
};
use crate::workflows::scheduling::{
    pay, quote_shift, ActualPay, BreakPolicy, ClockTime, PlannedPay, ScheduleError, ScheduleInput,
    ScheduleLimits, ShiftQuote,
};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for posted shifts.
    ShiftId
);
identifier!(
    /// Identifier wrapper for a worker's bid on a shift.
    ApplicationId
);
identifier!(TimesheetId);
identifier!(DocumentId);
identifier!(
    /// Worker account reference owned by the identity collaborator.
    WorkerId
);
identifier!(CareHomeId);

fn default_quantity() -> u32 {
    1
}

/// Shift fields as submitted by a care home, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDefinition {
    pub care_home_id: CareHomeId,
    pub role: String,
    pub schedule: ScheduleInput,
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub break_paid: bool,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ShiftDefinition {
    pub fn break_policy(&self) -> BreakPolicy {
        BreakPolicy {
            minutes: self.break_minutes,
            paid: self.break_paid,
        }
    }

    /// Validate and price the definition through the shared calculator.
    pub fn quote(&self, limits: &ScheduleLimits) -> Result<ShiftQuote, ScheduleError> {
        if self.role.trim().is_empty() {
            return Err(ScheduleError::MissingRole);
        }
        quote_shift(
            &self.schedule,
            self.break_policy(),
            self.hourly_rate,
            self.quantity,
            limits,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub care_home_id: CareHomeId,
    pub role: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub rollover: bool,
    pub hourly_rate: Decimal,
    pub break_minutes: u32,
    pub break_paid: bool,
    pub quantity: u32,
    pub filled_slots: u32,
    pub status: ShiftStatus,
    pub urgent: bool,
    pub notes: Option<String>,
    pub planned_pay: PlannedPay,
    pub created_at: NaiveDateTime,
}

impl Shift {
    pub fn from_definition(
        id: ShiftId,
        definition: ShiftDefinition,
        quote: &ShiftQuote,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            care_home_id: definition.care_home_id,
            role: definition.role.trim().to_string(),
            starts_at: quote.schedule.start,
            ends_at: quote.schedule.end,
            rollover: quote.schedule.rollover,
            hourly_rate: definition.hourly_rate,
            break_minutes: definition.break_minutes,
            break_paid: definition.break_paid,
            quantity: definition.quantity,
            filled_slots: 0,
            status: ShiftStatus::Draft,
            urgent: definition.urgent,
            notes: definition.notes,
            planned_pay: quote.pay,
            created_at,
        }
    }

    pub fn remaining_slots(&self) -> u32 {
        self.quantity.saturating_sub(self.filled_slots)
    }

    pub fn is_at_capacity(&self) -> bool {
        self.remaining_slots() == 0
    }

    /// Overtime threshold for timesheets against this shift.
    pub fn scheduled_hours(&self) -> Decimal {
        pay::scheduled_hours(self.starts_at, self.ends_at)
    }

    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        now >= self.ends_at
    }

    /// Fields that must be present before the shift can be published.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.role.trim().is_empty() {
            missing.push("role");
        }
        if self.hourly_rate <= Decimal::ZERO {
            missing.push("hourly_rate");
        }
        if self.quantity == 0 {
            missing.push("quantity");
        }
        if self.ends_at <= self.starts_at {
            missing.push("schedule");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub shift_id: ShiftId,
    pub worker_id: WorkerId,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub applied_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: Option<String>,
}

impl Application {
    /// Withdrawn applications no longer count against the one-per-shift rule.
    pub fn is_active(&self) -> bool {
        self.status != ApplicationStatus::Withdrawn
    }
}

/// Worker-entered attendance for a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetEntry {
    pub work_date: NaiveDate,
    pub clock_in: ClockTime,
    pub clock_out: ClockTime,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: TimesheetId,
    pub shift_id: ShiftId,
    pub worker_id: WorkerId,
    pub application_id: ApplicationId,
    pub clock_in: NaiveDateTime,
    pub clock_out: NaiveDateTime,
    pub break_minutes: u32,
    pub status: TimesheetStatus,
    pub pay: ActualPay,
    pub worker_notes: Option<String>,
    pub manager_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub submitted_at: Option<NaiveDateTime>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
    pub payout_reference: Option<String>,
}

/// Care-home verdict on a submitted timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetDecision {
    Approve,
    Query,
    Reject,
}

impl TimesheetDecision {
    pub fn requires_note(self) -> bool {
        !matches!(self, Self::Approve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Identification,
    RightToWork,
    CriminalRecordCheck,
    ProfessionalRegistration,
    TrainingCertificate,
    Reference,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: WorkerId,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub revision: u32,
    pub rejection_reason: Option<String>,
    pub action_note: Option<String>,
    pub uploaded_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
}

/// Admin verdict on a pending document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DocumentDecision {
    Approve,
    Reject { reason: String },
    RequireAttention { note: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChange {
    pub from: WorkerStatus,
    pub to: WorkerStatus,
    pub action: WorkerAction,
    pub actor: String,
    pub reason: Option<String>,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerApproval {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    pub history: Vec<ApprovalChange>,
}

impl WorkerApproval {
    pub fn pending(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Pending,
            history: Vec::new(),
        }
    }
}

/// Read-only document counts handed to the approval collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub requires_attention: usize,
    pub outstanding: Vec<DocumentId>,
}

impl DocumentSummary {
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut summary = Self::default();
        for document in documents {
            summary.total += 1;
            match document.status {
                DocumentStatus::Pending => summary.pending += 1,
                DocumentStatus::Approved => summary.approved += 1,
                DocumentStatus::Rejected => summary.rejected += 1,
                DocumentStatus::RequiresAttention => summary.requires_attention += 1,
            }
            if document.status != DocumentStatus::Approved {
                summary.outstanding.push(document.id.clone());
            }
        }
        summary.outstanding.sort();
        summary
    }

    pub fn all_approved(&self) -> bool {
        self.total > 0 && self.approved == self.total
    }
}

/// Entity names used in error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Shift,
    Application,
    Timesheet,
    Document,
    Worker,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Shift => "shift",
            EntityKind::Application => "application",
            EntityKind::Timesheet => "timesheet",
            EntityKind::Document => "document",
            EntityKind::Worker => "worker",
        };
        f.write_str(label)
    }
}

/// Status label for a worker who may not have an approval record yet.
pub fn worker_status_label(approval: Option<&WorkerApproval>) -> &'static str {
    approval
        .map(|approval| approval.status.label())
        .unwrap_or("unregistered")
}
