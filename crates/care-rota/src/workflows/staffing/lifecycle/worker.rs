use serde::{Deserialize, Serialize};

use super::{Labelled, Lifecycle, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerAction {
    Approve,
    Reject,
    Suspend,
    Reopen,
}

impl Labelled for WorkerStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }
}

impl Labelled for WorkerAction {
    fn label(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Suspend => "suspend",
            Self::Reopen => "reopen",
        }
    }
}

impl Lifecycle for WorkerStatus {
    type Action = WorkerAction;

    fn next(self, action: WorkerAction) -> Option<Step<Self>> {
        use WorkerAction::*;
        use WorkerStatus::*;

        match (self, action) {
            (Pending | Suspended, Approve) => Some(Step::Advance(Approved)),
            (Pending, Reject) => Some(Step::Advance(Rejected)),
            (Pending | Approved, Suspend) => Some(Step::Advance(Suspended)),
            (Rejected, Reopen) => Some(Step::Advance(Pending)),
            (Approved, Approve) | (Rejected, Reject) | (Suspended, Suspend) | (Pending, Reopen) => {
                Some(Step::Unchanged)
            }
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        false
    }
}

impl WorkerStatus {
    /// Only approved workers may see and apply for shifts.
    pub fn can_work(self) -> bool {
        matches!(self, Self::Approved)
    }
}
