use serde::{Deserialize, Serialize};

use super::{Labelled, Lifecycle, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationAction {
    Accept,
    Reject,
    Withdraw,
}

impl Labelled for ApplicationStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl Labelled for ApplicationAction {
    fn label(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Withdraw => "withdraw",
        }
    }
}

impl Lifecycle for ApplicationStatus {
    type Action = ApplicationAction;

    fn next(self, action: ApplicationAction) -> Option<Step<Self>> {
        use ApplicationAction::*;
        use ApplicationStatus::*;

        match (self, action) {
            (Pending, Accept) => Some(Step::Advance(Accepted)),
            (Pending, Reject) => Some(Step::Advance(Rejected)),
            (Pending, Withdraw) => Some(Step::Advance(Withdrawn)),
            (Accepted, Accept) | (Rejected, Reject) | (Withdrawn, Withdraw) => {
                Some(Step::Unchanged)
            }
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}
