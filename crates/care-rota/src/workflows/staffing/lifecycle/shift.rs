use serde::{Deserialize, Serialize};

use super::{Labelled, Lifecycle, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Draft,
    Published,
    Filled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftAction {
    Publish,
    Fill,
    Cancel,
    Complete,
}

impl Labelled for ShiftStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Filled => "filled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Labelled for ShiftAction {
    fn label(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Fill => "fill",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
        }
    }
}

impl Lifecycle for ShiftStatus {
    type Action = ShiftAction;

    fn next(self, action: ShiftAction) -> Option<Step<Self>> {
        use ShiftAction::*;
        use ShiftStatus::*;

        match (self, action) {
            (Draft, Publish) => Some(Step::Advance(Published)),
            (Published, Publish) => Some(Step::Unchanged),

            (Published, Fill) => Some(Step::Advance(Filled)),
            (Filled, Fill) => Some(Step::Unchanged),

            (Draft | Published | Filled, Cancel) => Some(Step::Advance(Cancelled)),
            (Cancelled, Cancel) => Some(Step::Unchanged),

            (Published | Filled, Complete) => Some(Step::Advance(Completed)),
            (Completed, Complete) => Some(Step::Unchanged),

            _ => None,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::staffing::lifecycle::IllegalTransition;

    #[test]
    fn publish_is_idempotent_but_not_from_cancelled() {
        assert_eq!(
            ShiftStatus::Draft.apply(ShiftAction::Publish),
            Ok(Step::Advance(ShiftStatus::Published))
        );
        assert_eq!(
            ShiftStatus::Published.apply(ShiftAction::Publish),
            Ok(Step::Unchanged)
        );
        assert_eq!(
            ShiftStatus::Cancelled.apply(ShiftAction::Publish),
            Err(IllegalTransition {
                from: "cancelled",
                action: "publish"
            })
        );
    }

    #[test]
    fn terminal_states_only_accept_their_own_action() {
        let actions = [
            ShiftAction::Publish,
            ShiftAction::Fill,
            ShiftAction::Cancel,
            ShiftAction::Complete,
        ];
        for status in [ShiftStatus::Completed, ShiftStatus::Cancelled] {
            assert!(status.is_terminal());
            for action in actions {
                match status.apply(action) {
                    Ok(Step::Unchanged) => {}
                    Ok(Step::Advance(next)) => panic!("{status:?} advanced to {next:?}"),
                    Err(_) => {}
                }
            }
        }
    }

    #[test]
    fn cancel_is_allowed_until_completion() {
        for status in [
            ShiftStatus::Draft,
            ShiftStatus::Published,
            ShiftStatus::Filled,
        ] {
            assert_eq!(
                status.apply(ShiftAction::Cancel),
                Ok(Step::Advance(ShiftStatus::Cancelled))
            );
        }
        assert!(ShiftStatus::Completed.apply(ShiftAction::Cancel).is_err());
    }

    #[test]
    fn drafts_cannot_fill_or_complete() {
        assert!(ShiftStatus::Draft.apply(ShiftAction::Fill).is_err());
        assert!(ShiftStatus::Draft.apply(ShiftAction::Complete).is_err());
        assert_eq!(
            ShiftStatus::Filled.apply(ShiftAction::Complete),
            Ok(Step::Advance(ShiftStatus::Completed))
        );
    }
}
