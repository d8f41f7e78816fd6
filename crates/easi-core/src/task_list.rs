//! Requester-facing task list: one status tag per governance stage.
//!
//! Resolution is a pure function of the request's lifecycle fields. Each
//! stage is gated on its predecessor; a skipped (`NotNeeded`) predecessor
//! lets an activated stage through and marks an untouched one as skipped too,
//! so a skip carries forward until the workflow activates a later stage.

use crate::feedback::{self, FeedbackRecord};
use crate::types::{DecisionState, IntakeState, IntakeStep, StepStatus, TaskStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The lifecycle fields the resolver reads. Borrowed so callers can build it
/// straight from a loaded intake without cloning.
#[derive(Debug, Clone, Copy)]
pub struct TaskListInput<'a> {
    /// Carried for callers that label the current step. Resolution reads
    /// only the stored statuses, so a stale step never changes a row.
    pub step: IntakeStep,
    pub state: IntakeState,
    pub decision_state: DecisionState,
    pub step_statuses: &'a BTreeMap<TaskStage, StepStatus>,
    pub feedback: &'a [FeedbackRecord],
}

impl TaskListInput<'_> {
    /// Stored status for a stage. A missing entry is `CannotStart`.
    fn stored(&self, stage: TaskStage) -> StepStatus {
        self.step_statuses.get(&stage).copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListRow {
    pub stage: TaskStage,
    pub status: StepStatus,
    pub dimmed: bool,
    pub has_feedback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub rows: Vec<TaskListRow>,
}

impl TaskList {
    pub fn status(&self, stage: TaskStage) -> StepStatus {
        self.rows
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> BTreeMap<TaskStage, StepStatus> {
        self.rows.iter().map(|r| (r.stage, r.status)).collect()
    }

    /// First stage that is neither done nor skipped.
    pub fn current_stage(&self) -> Option<TaskStage> {
        self.rows
            .iter()
            .find(|r| !r.status.is_terminal())
            .map(|r| r.stage)
    }
}

// ---------------------------------------------------------------------------
// Dependency table
// ---------------------------------------------------------------------------

/// The stage that must be finished before `stage` can start.
pub fn predecessor(stage: TaskStage) -> Option<TaskStage> {
    match stage {
        TaskStage::IntakeForm => None,
        TaskStage::InitialReviewFeedback => Some(TaskStage::IntakeForm),
        TaskStage::DraftBusinessCase => Some(TaskStage::InitialReviewFeedback),
        TaskStage::GrtMeeting => Some(TaskStage::DraftBusinessCase),
        TaskStage::FinalBusinessCase => Some(TaskStage::GrtMeeting),
        TaskStage::GrbMeeting => Some(TaskStage::FinalBusinessCase),
        TaskStage::DecisionAndNextSteps => Some(TaskStage::GrbMeeting),
    }
}

/// Rows rendered grayed out.
pub fn is_dimmed(status: StepStatus) -> bool {
    match status {
        StepStatus::NotNeeded | StepStatus::CannotStart => true,
        StepStatus::Ready
        | StepStatus::InProgress
        | StepStatus::EditsRequested
        | StepStatus::Submitted
        | StepStatus::Done => false,
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub fn resolve(input: &TaskListInput) -> TaskList {
    let decided = input.state == IntakeState::Closed && input.decision_state.is_terminal();

    let mut resolved: BTreeMap<TaskStage, StepStatus> = BTreeMap::new();
    for &stage in TaskStage::all() {
        let status = if decided {
            resolve_decided(input, stage)
        } else {
            resolve_open(input, stage, &resolved)
        };
        resolved.insert(stage, status);
    }

    let rows = TaskStage::all()
        .iter()
        .map(|&stage| {
            let status = resolved.get(&stage).copied().unwrap_or_default();
            TaskListRow {
                stage,
                status,
                dimmed: is_dimmed(status),
                has_feedback: feedback::has_feedback_for(input.feedback, stage),
            }
        })
        .collect();

    TaskList { rows }
}

/// A closed request with a final decision: nothing is left to do.
fn resolve_decided(input: &TaskListInput, stage: TaskStage) -> StepStatus {
    if stage == TaskStage::DecisionAndNextSteps {
        return StepStatus::Done;
    }
    match input.stored(stage) {
        StepStatus::Done => StepStatus::Done,
        _ => StepStatus::NotNeeded,
    }
}

/// `resolved` holds every stage earlier in the sequence than `stage`.
fn resolve_open(
    input: &TaskListInput,
    stage: TaskStage,
    resolved: &BTreeMap<TaskStage, StepStatus>,
) -> StepStatus {
    let stored = input.stored(stage);
    if stored == StepStatus::NotNeeded {
        return StepStatus::NotNeeded;
    }

    let Some(pred) = predecessor(stage) else {
        return stored;
    };

    match resolved.get(&pred).copied().unwrap_or_default() {
        StepStatus::Done => stored,
        StepStatus::NotNeeded => match stored {
            StepStatus::CannotStart => StepStatus::NotNeeded,
            activated => activated,
        },
        StepStatus::CannotStart
        | StepStatus::Ready
        | StepStatus::InProgress
        | StepStatus::EditsRequested
        | StepStatus::Submitted => StepStatus::CannotStart,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::add as add_feedback;
    use crate::types::{FeedbackTarget, FeedbackType};

    struct Fixture {
        step: IntakeStep,
        state: IntakeState,
        decision: DecisionState,
        statuses: BTreeMap<TaskStage, StepStatus>,
        feedback: Vec<FeedbackRecord>,
    }

    impl Fixture {
        fn new(step: IntakeStep) -> Self {
            Self {
                step,
                state: IntakeState::Open,
                decision: DecisionState::NoDecision,
                statuses: BTreeMap::new(),
                feedback: Vec::new(),
            }
        }

        fn with(mut self, stage: TaskStage, status: StepStatus) -> Self {
            self.statuses.insert(stage, status);
            self
        }

        fn resolve(&self) -> TaskList {
            resolve(&TaskListInput {
                step: self.step,
                state: self.state,
                decision_state: self.decision,
                step_statuses: &self.statuses,
                feedback: &self.feedback,
            })
        }
    }

    fn all_statuses() -> &'static [StepStatus] {
        StepStatus::all()
    }

    #[test]
    fn new_request_only_intake_form_is_actionable() {
        let list = Fixture::new(IntakeStep::InitialRequestForm)
            .with(TaskStage::IntakeForm, StepStatus::Ready)
            .resolve();
        assert_eq!(list.status(TaskStage::IntakeForm), StepStatus::Ready);
        for &stage in &TaskStage::all()[1..] {
            assert_eq!(list.status(stage), StepStatus::CannotStart, "{stage}");
            assert!(list.rows[stage.index()].dimmed);
        }
        assert_eq!(list.current_stage(), Some(TaskStage::IntakeForm));
    }

    #[test]
    fn missing_step_data_is_cannot_start() {
        let list = Fixture::new(IntakeStep::InitialRequestForm).resolve();
        assert!(list
            .rows
            .iter()
            .all(|r| r.status == StepStatus::CannotStart));
        assert_eq!(list.current_stage(), Some(TaskStage::IntakeForm));
    }

    #[test]
    fn stale_step_does_not_change_rows() {
        let at_form = Fixture::new(IntakeStep::InitialRequestForm)
            .with(TaskStage::IntakeForm, StepStatus::Done)
            .with(TaskStage::InitialReviewFeedback, StepStatus::Ready);
        let at_grb = Fixture {
            step: IntakeStep::GrbMeeting,
            ..Fixture::new(IntakeStep::InitialRequestForm)
                .with(TaskStage::IntakeForm, StepStatus::Done)
                .with(TaskStage::InitialReviewFeedback, StepStatus::Ready)
        };
        assert_eq!(at_form.resolve(), at_grb.resolve());
    }

    #[test]
    fn predecessor_not_done_forces_cannot_start() {
        // Every stored status for the GRT row, with the draft business case
        // in every non-finished state, resolves to CANNOT_START.
        for &pred in all_statuses() {
            if pred.is_terminal() {
                continue;
            }
            for &stored in all_statuses() {
                if stored == StepStatus::NotNeeded {
                    continue;
                }
                let list = Fixture::new(IntakeStep::DraftBusinessCase)
                    .with(TaskStage::IntakeForm, StepStatus::Done)
                    .with(TaskStage::InitialReviewFeedback, StepStatus::Done)
                    .with(TaskStage::DraftBusinessCase, pred)
                    .with(TaskStage::GrtMeeting, stored)
                    .resolve();
                assert_eq!(
                    list.status(TaskStage::GrtMeeting),
                    StepStatus::CannotStart,
                    "pred={pred} stored={stored}"
                );
            }
        }
    }

    #[test]
    fn done_predecessor_exposes_stored_status() {
        let list = Fixture::new(IntakeStep::DraftBusinessCase)
            .with(TaskStage::IntakeForm, StepStatus::Done)
            .with(TaskStage::InitialReviewFeedback, StepStatus::Done)
            .with(TaskStage::DraftBusinessCase, StepStatus::EditsRequested)
            .resolve();
        assert_eq!(
            list.status(TaskStage::DraftBusinessCase),
            StepStatus::EditsRequested
        );
        assert!(!list.rows[TaskStage::DraftBusinessCase.index()].dimmed);
        assert_eq!(list.current_stage(), Some(TaskStage::DraftBusinessCase));
    }

    #[test]
    fn skipped_stage_propagates_until_an_activated_stage() {
        // Progressed straight to the GRB meeting.
        let list = Fixture::new(IntakeStep::GrbMeeting)
            .with(TaskStage::IntakeForm, StepStatus::Done)
            .with(TaskStage::InitialReviewFeedback, StepStatus::Done)
            .with(TaskStage::DraftBusinessCase, StepStatus::NotNeeded)
            .with(TaskStage::GrbMeeting, StepStatus::Ready)
            .resolve();
        assert_eq!(list.status(TaskStage::DraftBusinessCase), StepStatus::NotNeeded);
        assert_eq!(list.status(TaskStage::GrtMeeting), StepStatus::NotNeeded);
        assert_eq!(list.status(TaskStage::FinalBusinessCase), StepStatus::NotNeeded);
        assert_eq!(list.status(TaskStage::GrbMeeting), StepStatus::Ready);
        assert_eq!(
            list.status(TaskStage::DecisionAndNextSteps),
            StepStatus::CannotStart
        );
    }

    #[test]
    fn skip_propagates_transitively_to_untouched_stages() {
        let list = Fixture::new(IntakeStep::DraftBusinessCase)
            .with(TaskStage::IntakeForm, StepStatus::Done)
            .with(TaskStage::InitialReviewFeedback, StepStatus::Done)
            .with(TaskStage::DraftBusinessCase, StepStatus::NotNeeded)
            .resolve();
        for &stage in &TaskStage::all()[2..] {
            assert_eq!(list.status(stage), StepStatus::NotNeeded, "{stage}");
        }
    }

    #[test]
    fn closed_with_terminal_decision_marks_rest_not_needed() {
        for decision in [DecisionState::LcidIssued, DecisionState::NotApproved] {
            let mut fx = Fixture::new(IntakeStep::GrtMeeting)
                .with(TaskStage::IntakeForm, StepStatus::Done)
                .with(TaskStage::InitialReviewFeedback, StepStatus::Done)
                .with(TaskStage::DraftBusinessCase, StepStatus::Done)
                .with(TaskStage::GrtMeeting, StepStatus::InProgress);
            fx.state = IntakeState::Closed;
            fx.decision = decision;
            let list = fx.resolve();

            assert_eq!(list.status(TaskStage::DraftBusinessCase), StepStatus::Done);
            assert_eq!(list.status(TaskStage::GrtMeeting), StepStatus::NotNeeded);
            assert_eq!(list.status(TaskStage::FinalBusinessCase), StepStatus::NotNeeded);
            assert_eq!(list.status(TaskStage::GrbMeeting), StepStatus::NotNeeded);
            assert_eq!(
                list.status(TaskStage::DecisionAndNextSteps),
                StepStatus::Done
            );
            assert_eq!(list.current_stage(), None);
        }
    }

    #[test]
    fn closed_without_terminal_decision_uses_normal_rules() {
        let mut fx = Fixture::new(IntakeStep::InitialRequestForm)
            .with(TaskStage::IntakeForm, StepStatus::Submitted);
        fx.state = IntakeState::Closed;
        fx.decision = DecisionState::NotGovernance;
        let list = fx.resolve();
        assert_eq!(list.status(TaskStage::IntakeForm), StepStatus::Submitted);
        assert_eq!(
            list.status(TaskStage::DecisionAndNextSteps),
            StepStatus::CannotStart
        );
    }

    #[test]
    fn resolver_is_idempotent() {
        let fx = Fixture::new(IntakeStep::FinalBusinessCase)
            .with(TaskStage::IntakeForm, StepStatus::Done)
            .with(TaskStage::InitialReviewFeedback, StepStatus::Done)
            .with(TaskStage::DraftBusinessCase, StepStatus::Done)
            .with(TaskStage::GrtMeeting, StepStatus::NotNeeded)
            .with(TaskStage::FinalBusinessCase, StepStatus::Submitted);
        assert_eq!(fx.resolve(), fx.resolve());
    }

    #[test]
    fn resolved_statuses_are_a_fixed_point() {
        let fx = Fixture::new(IntakeStep::GrbMeeting)
            .with(TaskStage::IntakeForm, StepStatus::Done)
            .with(TaskStage::DraftBusinessCase, StepStatus::NotNeeded)
            .with(TaskStage::GrbMeeting, StepStatus::InProgress);
        let first = fx.resolve();
        let again = Fixture {
            statuses: first.statuses(),
            ..Fixture::new(fx.step)
        }
        .resolve();
        assert_eq!(first, again);
    }

    #[test]
    fn resolver_is_total_over_single_stage_inputs() {
        for &step in IntakeStep::all() {
            for &stage in TaskStage::all() {
                for &status in all_statuses() {
                    let list = Fixture::new(step).with(stage, status).resolve();
                    assert_eq!(list.rows.len(), 7);
                }
            }
        }
    }

    #[test]
    fn feedback_visibility_is_independent_of_status() {
        let mut fx = Fixture::new(IntakeStep::InitialRequestForm)
            .with(TaskStage::IntakeForm, StepStatus::Submitted);
        add_feedback(
            &mut fx.feedback,
            FeedbackTarget::IntakeRequest,
            FeedbackType::GovernanceTeam,
            "Please clarify funding",
            None,
        );
        let list = fx.resolve();
        assert!(list.rows[TaskStage::IntakeForm.index()].has_feedback);
        assert!(!list.rows[TaskStage::DraftBusinessCase.index()].has_feedback);
    }

    #[test]
    fn dimming_rule() {
        assert!(is_dimmed(StepStatus::NotNeeded));
        assert!(is_dimmed(StepStatus::CannotStart));
        assert!(!is_dimmed(StepStatus::Done));
        assert!(!is_dimmed(StepStatus::EditsRequested));
    }
}
