use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// String-backed enum helper
// ---------------------------------------------------------------------------

/// Generates `all()`, `as_str()`, `Display` and a lenient `FromStr` for a
/// closed enum. Parsing accepts the canonical `SCREAMING_SNAKE_CASE` tag as
/// well as lowercase and kebab-case spellings.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $ty {
            pub fn all() -> &'static [$ty] {
                &[$($ty::$variant),+]
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::error::EasiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
                match normalized.as_str() {
                    $($tag => Ok($ty::$variant),)+
                    _ => Err(crate::error::EasiError::InvalidValue(format!(
                        "'{}' is not a valid {}",
                        s,
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// IntakeStep
// ---------------------------------------------------------------------------

/// The lifecycle step a system intake is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntakeStep {
    InitialRequestForm,
    DraftBusinessCase,
    GrtMeeting,
    FinalBusinessCase,
    GrbMeeting,
    DecisionAndNextSteps,
}

string_enum!(IntakeStep {
    InitialRequestForm => "INITIAL_REQUEST_FORM",
    DraftBusinessCase => "DRAFT_BUSINESS_CASE",
    GrtMeeting => "GRT_MEETING",
    FinalBusinessCase => "FINAL_BUSINESS_CASE",
    GrbMeeting => "GRB_MEETING",
    DecisionAndNextSteps => "DECISION_AND_NEXT_STEPS",
});

impl IntakeStep {
    /// The task-list row that represents work on this step.
    pub fn stage(self) -> TaskStage {
        match self {
            IntakeStep::InitialRequestForm => TaskStage::IntakeForm,
            IntakeStep::DraftBusinessCase => TaskStage::DraftBusinessCase,
            IntakeStep::GrtMeeting => TaskStage::GrtMeeting,
            IntakeStep::FinalBusinessCase => TaskStage::FinalBusinessCase,
            IntakeStep::GrbMeeting => TaskStage::GrbMeeting,
            IntakeStep::DecisionAndNextSteps => TaskStage::DecisionAndNextSteps,
        }
    }

    pub fn is_meeting(self) -> bool {
        matches!(self, IntakeStep::GrtMeeting | IntakeStep::GrbMeeting)
    }
}

// ---------------------------------------------------------------------------
// IntakeState / DecisionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntakeState {
    Open,
    Closed,
}

string_enum!(IntakeState {
    Open => "OPEN",
    Closed => "CLOSED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    NoDecision,
    LcidIssued,
    NotApproved,
    NotGovernance,
}

string_enum!(DecisionState {
    NoDecision => "NO_DECISION",
    LcidIssued => "LCID_ISSUED",
    NotApproved => "NOT_APPROVED",
    NotGovernance => "NOT_GOVERNANCE",
});

impl DecisionState {
    /// Decisions that end the governance process for the request.
    pub fn is_terminal(self) -> bool {
        matches!(self, DecisionState::LcidIssued | DecisionState::NotApproved)
    }
}

// ---------------------------------------------------------------------------
// TaskStage
// ---------------------------------------------------------------------------

/// One row of the requester-facing task list, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    IntakeForm,
    InitialReviewFeedback,
    DraftBusinessCase,
    GrtMeeting,
    FinalBusinessCase,
    GrbMeeting,
    DecisionAndNextSteps,
}

string_enum!(TaskStage {
    IntakeForm => "INTAKE_FORM",
    InitialReviewFeedback => "INITIAL_REVIEW_FEEDBACK",
    DraftBusinessCase => "DRAFT_BUSINESS_CASE",
    GrtMeeting => "GRT_MEETING",
    FinalBusinessCase => "FINAL_BUSINESS_CASE",
    GrbMeeting => "GRB_MEETING",
    DecisionAndNextSteps => "DECISION_AND_NEXT_STEPS",
});

impl TaskStage {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStage::IntakeForm => "Fill out the Intake Request form",
            TaskStage::InitialReviewFeedback => "Feedback from initial review",
            TaskStage::DraftBusinessCase => "Prepare a draft Business Case",
            TaskStage::GrtMeeting => "Attend the GRT meeting",
            TaskStage::FinalBusinessCase => "Submit your final Business Case",
            TaskStage::GrbMeeting => "Attend the GRB meeting",
            TaskStage::DecisionAndNextSteps => "Decision and next steps",
        }
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Stored per-stage status and resolved task-list tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    CannotStart,
    Ready,
    InProgress,
    EditsRequested,
    Submitted,
    Done,
    NotNeeded,
}

string_enum!(StepStatus {
    CannotStart => "CANNOT_START",
    Ready => "READY",
    InProgress => "IN_PROGRESS",
    EditsRequested => "EDITS_REQUESTED",
    Submitted => "SUBMITTED",
    Done => "DONE",
    NotNeeded => "NOT_NEEDED",
});

impl StepStatus {
    /// Text shown on the task-list status tag.
    pub fn label(self) -> &'static str {
        match self {
            StepStatus::CannotStart => "Cannot start yet",
            StepStatus::Ready => "Ready to start",
            StepStatus::InProgress => "In progress",
            StepStatus::EditsRequested => "Edits requested",
            StepStatus::Submitted => "Submitted",
            StepStatus::Done => "Completed",
            StepStatus::NotNeeded => "Not needed",
        }
    }

    /// Done or skipped: the stage will not change again while the request is open.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::NotNeeded)
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackTarget {
    IntakeRequest,
    DraftBusinessCase,
    FinalBusinessCase,
    GrbMeeting,
    NoTargetProvided,
}

string_enum!(FeedbackTarget {
    IntakeRequest => "INTAKE_REQUEST",
    DraftBusinessCase => "DRAFT_BUSINESS_CASE",
    FinalBusinessCase => "FINAL_BUSINESS_CASE",
    GrbMeeting => "GRB_MEETING",
    NoTargetProvided => "NO_TARGET_PROVIDED",
});

impl FeedbackTarget {
    /// The task-list row whose "read feedback" link shows this record.
    pub fn stage(self) -> TaskStage {
        match self {
            FeedbackTarget::IntakeRequest => TaskStage::IntakeForm,
            FeedbackTarget::NoTargetProvided => TaskStage::InitialReviewFeedback,
            FeedbackTarget::DraftBusinessCase => TaskStage::DraftBusinessCase,
            FeedbackTarget::FinalBusinessCase => TaskStage::FinalBusinessCase,
            FeedbackTarget::GrbMeeting => TaskStage::GrbMeeting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    GovernanceTeam,
    Reviewer,
}

string_enum!(FeedbackType {
    GovernanceTeam => "GOVERNANCE_TEAM",
    Reviewer => "REVIEWER",
});

// ---------------------------------------------------------------------------
// LCID
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LcidStatus {
    Issued,
    Retired,
    Expired,
}

string_enum!(LcidStatus {
    Issued => "ISSUED",
    Retired => "RETIRED",
    Expired => "EXPIRED",
});

/// Technical Review Board follow-up recommendation attached to decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrbFollowUp {
    StronglyRecommended,
    RecommendedButNotCritical,
    NotRecommended,
}

string_enum!(TrbFollowUp {
    StronglyRecommended => "STRONGLY_RECOMMENDED",
    RecommendedButNotCritical => "RECOMMENDED_BUT_NOT_CRITICAL",
    NotRecommended => "NOT_RECOMMENDED",
});

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
