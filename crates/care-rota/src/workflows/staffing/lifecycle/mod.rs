//! Closed status sets with explicit `state x action -> next state` tables.

mod application;
mod document;
mod shift;
mod timesheet;
mod worker;

pub use application::{ApplicationAction, ApplicationStatus};
pub use document::{DocumentAction, DocumentStatus};
pub use shift::{ShiftAction, ShiftStatus};
pub use timesheet::{TimesheetAction, TimesheetStatus};
pub use worker::{WorkerAction, WorkerStatus};

/// Stable snake_case name used in error messages and API payloads.
pub trait Labelled: Copy {
    fn label(self) -> &'static str;
}

/// Result of a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// Move to the given state.
    Advance(S),
    /// The action was already applied; callers return the current record untouched.
    Unchanged,
}

/// The action is not permitted from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: &'static str,
    pub action: &'static str,
}

pub trait Lifecycle: Labelled + PartialEq {
    type Action: Labelled;

    /// The transition table. `None` marks an illegal pair.
    fn next(self, action: Self::Action) -> Option<Step<Self>>;

    fn is_terminal(self) -> bool;

    fn apply(self, action: Self::Action) -> Result<Step<Self>, IllegalTransition> {
        self.next(action).ok_or(IllegalTransition {
            from: self.label(),
            action: action.label(),
        })
    }
}
