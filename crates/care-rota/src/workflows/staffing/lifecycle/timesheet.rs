use serde::{Deserialize, Serialize};

use super::{Labelled, Lifecycle, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetStatus {
    Draft,
    Submitted,
    Approved,
    Queried,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetAction {
    Edit,
    Submit,
    Approve,
    Query,
    Reject,
    MarkPaid,
}

impl Labelled for TimesheetStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Queried => "queried",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
        }
    }
}

impl Labelled for TimesheetAction {
    fn label(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Query => "query",
            Self::Reject => "reject",
            Self::MarkPaid => "mark_paid",
        }
    }
}

impl Lifecycle for TimesheetStatus {
    type Action = TimesheetAction;

    fn next(self, action: TimesheetAction) -> Option<Step<Self>> {
        use TimesheetAction::*;
        use TimesheetStatus::*;

        match (self, action) {
            // queried and rejected sheets loop back through draft on the next worker edit
            (Draft | Queried | Rejected, Edit) => Some(Step::Advance(Draft)),

            (Draft, Submit) => Some(Step::Advance(Submitted)),
            (Submitted, Submit) => Some(Step::Unchanged),

            (Submitted, Approve) => Some(Step::Advance(Approved)),
            (Submitted, Query) => Some(Step::Advance(Queried)),
            (Submitted, Reject) => Some(Step::Advance(Rejected)),
            (Approved, Approve) | (Queried, Query) | (Rejected, Reject) => Some(Step::Unchanged),

            (Approved, MarkPaid) => Some(Step::Advance(Paid)),
            (Paid, MarkPaid) => Some(Step::Unchanged),

            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Paid)
    }
}
