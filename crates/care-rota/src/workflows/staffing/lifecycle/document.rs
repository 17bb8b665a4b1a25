use serde::{Deserialize, Serialize};

use super::{Labelled, Lifecycle, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
    RequiresAttention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Approve,
    Reject,
    RequestAttention,
    Replace,
}

impl Labelled for DocumentStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::RequiresAttention => "requires_attention",
        }
    }
}

impl Labelled for DocumentAction {
    fn label(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestAttention => "request_attention",
            Self::Replace => "replace",
        }
    }
}

impl Lifecycle for DocumentStatus {
    type Action = DocumentAction;

    fn next(self, action: DocumentAction) -> Option<Step<Self>> {
        use DocumentAction::*;
        use DocumentStatus::*;

        match (self, action) {
            (_, Replace) => Some(Step::Advance(Pending)),
            (Pending, Approve) => Some(Step::Advance(Approved)),
            (Pending, Reject) => Some(Step::Advance(Rejected)),
            (Pending, RequestAttention) => Some(Step::Advance(RequiresAttention)),
            (Approved, Approve)
            | (Rejected, Reject)
            | (RequiresAttention, RequestAttention) => Some(Step::Unchanged),
            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        false
    }
}
