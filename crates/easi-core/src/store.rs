//! File-backed intake store.
//!
//! `IntakeStore` is the backend the action forms talk to: it loads the
//! context a form hydrates from and applies dispatched mutations to the
//! intake manifests under `.easi/intakes/`.

use crate::action::fields::{FormValues, ValidationErrors};
use crate::action::mutation::{LcidDecision, Mutation, Operation};
use crate::action::recipients::EmailRecipients;
use crate::action::{
    ActionContext, ActionForm, ActionKind, DefaultsSource, FlashMessage, FormPhase,
    MutationClient, MutationOutcome, SubmitButton, SubmitError, SubmitOutcome,
};
use crate::config::{Config, LcidConfig, NotificationConfig};
use crate::error::{EasiError, Result};
use crate::feedback;
use crate::intake::SystemIntake;
use crate::lcid::{self, LcidRecord};
use crate::types::{
    DecisionState, FeedbackTarget, FeedbackType, IntakeState, IntakeStep, StepStatus, TaskStage,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const LCID_SELECTION_FIELDS: [&str; 2] = ["useExistingLcid", "lcid"];

pub struct IntakeStore {
    root: PathBuf,
    today: NaiveDate,
}

impl IntakeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            today: Utc::now().date_naive(),
        }
    }

    /// Pin the store's notion of "today". Used for LCID allocation and expiry.
    pub fn at(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn config(&self) -> Result<Option<Config>> {
        match Config::load(&self.root) {
            Ok(cfg) => Ok(Some(cfg)),
            Err(EasiError::NotInitialized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every LCID held by any intake, ordered by ID.
    pub fn existing_lcids(&self) -> Result<Vec<LcidRecord>> {
        let mut lcids: Vec<LcidRecord> = SystemIntake::list(&self.root)?
            .into_iter()
            .filter_map(|i| i.lcid)
            .collect();
        lcids.sort_by(|a, b| a.lcid.cmp(&b.lcid));
        Ok(lcids)
    }

    /// Next free LCID for `date`.
    fn allocate_lcid(&self, date: NaiveDate) -> Result<String> {
        let taken: BTreeSet<String> = self
            .existing_lcids()?
            .into_iter()
            .map(|l| l.lcid)
            .collect();
        let mut sequence = 0;
        loop {
            let candidate = lcid::format_lcid(date, sequence);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            sequence += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Applying mutations
    // -----------------------------------------------------------------------

    /// Apply `mutation` to its intake and persist the result.
    pub fn apply(&self, kind: ActionKind, mutation: &Mutation) -> Result<SystemIntake> {
        let mut intake = SystemIntake::load(&self.root, &mutation.system_intake_id)?;
        let cfg = self.config()?;
        let notifications = cfg
            .as_ref()
            .map(|c| c.notifications.clone())
            .unwrap_or_default();

        match &mutation.operation {
            Operation::RequestEdits {
                target,
                email_feedback,
            } => {
                let stage = target.stage();
                intake.set_step_status(stage, StepStatus::EditsRequested);
                if let Some(step) = step_for_target(*target) {
                    intake.step = step;
                }
                intake.state = IntakeState::Open;
                feedback::add(
                    &mut intake.feedback,
                    *target,
                    FeedbackType::GovernanceTeam,
                    email_feedback.clone(),
                    None,
                );
            }
            Operation::ProgressToNewStep {
                new_step,
                meeting_date,
                feedback: text,
                grb_recommendations,
            } => {
                progress(&mut intake, *new_step);
                match new_step {
                    IntakeStep::GrtMeeting => intake.grt_date = *meeting_date,
                    IntakeStep::GrbMeeting => intake.grb_date = *meeting_date,
                    _ => {}
                }
                if let Some(text) = text {
                    feedback::add(
                        &mut intake.feedback,
                        FeedbackTarget::NoTargetProvided,
                        FeedbackType::GovernanceTeam,
                        text.clone(),
                        None,
                    );
                }
                if let Some(recs) = grb_recommendations {
                    feedback::add(
                        &mut intake.feedback,
                        FeedbackTarget::GrbMeeting,
                        FeedbackType::Reviewer,
                        recs.clone(),
                        None,
                    );
                }
            }
            Operation::IssueLcid(decision) => {
                let record = self.issue(decision)?;
                intake.lcid = Some(record);
                decide(&mut intake, DecisionState::LcidIssued);
            }
            Operation::ConfirmLcid(decision) => {
                let current = intake
                    .lcid
                    .as_mut()
                    .ok_or_else(|| EasiError::NoLcid(mutation.system_intake_id.clone()))?;
                current.expires_at = decision.expires_at;
                current.scope = decision.scope.clone();
                current.next_steps = decision.next_steps.clone();
                current.trb_follow_up = decision.trb_follow_up;
                current.cost_baseline = decision.cost_baseline.clone();
                decide(&mut intake, DecisionState::LcidIssued);
            }
            Operation::UpdateLcid {
                expires_at,
                scope,
                next_steps,
                cost_baseline,
                reason: _,
            } => {
                let current = lcid_mut(&mut intake)?;
                if let Some(date) = expires_at {
                    current.expires_at = *date;
                    current.expired_manually = false;
                }
                if let Some(scope) = scope {
                    current.scope = scope.clone();
                }
                if let Some(next) = next_steps {
                    current.next_steps = next.clone();
                }
                if let Some(cost) = cost_baseline {
                    current.cost_baseline = Some(cost.clone());
                }
            }
            Operation::RetireLcid { retires_at, .. }
            | Operation::ChangeLcidRetirementDate { retires_at } => {
                lcid_mut(&mut intake)?.retires_at = Some(*retires_at);
            }
            Operation::UnretireLcid { .. } => {
                lcid_mut(&mut intake)?.retires_at = None;
            }
            Operation::ExpireLcid { next_steps, .. } => {
                let today = self.today;
                let current = lcid_mut(&mut intake)?;
                current.expired_manually = true;
                current.expires_at = current.expires_at.min(today);
                if let Some(next) = next_steps {
                    current.next_steps = next.clone();
                }
            }
            Operation::RejectIntake { .. } => decide(&mut intake, DecisionState::NotApproved),
            Operation::MarkNotGovernance { .. } => {
                decide(&mut intake, DecisionState::NotGovernance)
            }
            Operation::CloseRequest { .. } => intake.state = IntakeState::Closed,
            Operation::ReopenRequest { .. } => intake.state = IntakeState::Open,
        }

        // Any other completed action supersedes an open edits request.
        if !matches!(mutation.operation, Operation::RequestEdits { .. }) {
            if let Some(stage) = intake.edits_requested() {
                intake.set_step_status(stage, StepStatus::Submitted);
                tracing::debug!(intake = %intake.id, stage = %stage, "cleared edits request");
            }
        }

        intake.record_action(kind, mutation);
        intake.save(&self.root)?;

        tracing::info!(
            intake = %intake.id,
            operation = mutation.operation.name(),
            "applied admin action"
        );
        if let Some(recipients) = &mutation.notification_recipients {
            notify(&intake, mutation, recipients, &notifications);
        }
        Ok(intake)
    }

    fn issue(&self, decision: &LcidDecision) -> Result<LcidRecord> {
        let lcid = match &decision.lcid {
            Some(existing) => {
                let known = self.existing_lcids()?.iter().any(|l| &l.lcid == existing);
                if !known {
                    return Err(EasiError::LcidNotFound(existing.clone()));
                }
                existing.clone()
            }
            None => self.allocate_lcid(self.today)?,
        };
        Ok(LcidRecord {
            lcid,
            issued_at: Utc::now(),
            expires_at: decision.expires_at,
            retires_at: None,
            scope: decision.scope.clone(),
            next_steps: decision.next_steps.clone(),
            trb_follow_up: decision.trb_follow_up,
            cost_baseline: decision.cost_baseline.clone(),
            expired_manually: false,
        })
    }

    // -----------------------------------------------------------------------
    // Running a whole action form
    // -----------------------------------------------------------------------

    /// Drive an action form from open to completion against this store.
    ///
    /// With `recipients` unset the form keeps its hydrated defaults. A
    /// confirmation modal is accepted only when `confirmed` is true.
    pub fn run_action(&self, request: ActionRequest) -> Result<ActionRun> {
        let mut form = ActionForm::new(request.kind, request.intake_id.clone());
        form.hydrate(self.load_context(&request.intake_id, self.today))?;
        if form.phase() == FormPhase::Failed {
            return Ok(ActionRun::Failed {
                message: form.root_error().unwrap_or_default().to_string(),
                retryable: true,
            });
        }

        // The LCID selection goes in before the other values, so explicit
        // values override what choosing an existing LCID copies in.
        let (selection, rest): (Vec<_>, Vec<_>) = request
            .values
            .iter()
            .partition(|(name, _)| LCID_SELECTION_FIELDS.contains(&name.as_str()));
        for (name, value) in selection.into_iter().chain(rest) {
            form.set_value(name, value.clone())?;
        }
        if let Some(recipients) = request.recipients {
            form.set_recipients(recipients)?;
        }

        // Re-read so mutation selection sees the latest state.
        let ctx = self.load_context(&request.intake_id, self.today)?;
        let outcome = match form.submit(request.button, &ctx)? {
            SubmitOutcome::NeedsConfirmation(modal) if !request.confirmed => {
                return Ok(ActionRun::NeedsConfirmation {
                    title: modal.title,
                    content: modal.content,
                });
            }
            SubmitOutcome::NeedsConfirmation(_) => form.confirm(&ctx)?,
            other => other,
        };

        let mutation = match outcome {
            SubmitOutcome::Dispatch(m) => m,
            SubmitOutcome::Invalid(errors) => return Ok(ActionRun::Invalid { errors }),
            SubmitOutcome::NeedsConfirmation(_) => {
                return Err(EasiError::InvalidFormPhase {
                    expected: FormPhase::Submitting.to_string(),
                    actual: form.phase().to_string(),
                })
            }
        };

        form.dispatch_with(self, &mutation)?;
        match form.phase() {
            FormPhase::Done => Ok(ActionRun::Done {
                mutation,
                flash: form.flash().cloned(),
                redirect: form.redirect().map(str::to_string),
            }),
            phase => Ok(ActionRun::Failed {
                message: form.root_error().unwrap_or_default().to_string(),
                retryable: phase == FormPhase::Editing,
            }),
        }
    }
}

/// Input for [`IntakeStore::run_action`].
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub intake_id: String,
    pub kind: ActionKind,
    pub values: FormValues,
    pub recipients: Option<EmailRecipients>,
    pub button: SubmitButton,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionRun {
    Done {
        mutation: Mutation,
        #[serde(skip_serializing_if = "Option::is_none")]
        flash: Option<FlashMessage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        redirect: Option<String>,
    },
    Invalid {
        errors: ValidationErrors,
    },
    NeedsConfirmation {
        title: String,
        content: String,
    },
    Failed {
        message: String,
        retryable: bool,
    },
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

impl DefaultsSource for IntakeStore {
    fn load_context(&self, intake_id: &str, today: NaiveDate) -> Result<ActionContext> {
        let intake = SystemIntake::load(&self.root, intake_id)?;
        let term = self
            .config()?
            .map(|c| c.lcid)
            .unwrap_or_else(LcidConfig::default)
            .default_term_years;
        Ok(ActionContext {
            intake,
            existing_lcids: self.existing_lcids()?,
            today,
            lcid_term_years: term,
        })
    }
}

impl MutationClient for IntakeStore {
    fn dispatch(&self, mutation: &Mutation) -> std::result::Result<MutationOutcome, SubmitError> {
        let kind = action_for(&mutation.operation);
        match self.apply(kind, mutation) {
            Ok(intake) => Ok(MutationOutcome {
                system_intake_id: intake.id,
                operation: mutation.operation.name().to_string(),
                lcid: intake.lcid.map(|l| l.lcid),
            }),
            Err(e @ (EasiError::Io(_) | EasiError::Yaml(_) | EasiError::Json(_))) => {
                Err(SubmitError::Transport(e.to_string()))
            }
            Err(e) => Err(SubmitError::Rejected(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn action_for(op: &Operation) -> ActionKind {
    match op {
        Operation::RequestEdits { .. } => ActionKind::RequestEdits,
        Operation::ProgressToNewStep { .. } => ActionKind::ProgressToNewStep,
        Operation::IssueLcid(_) | Operation::ConfirmLcid(_) => ActionKind::IssueLcid,
        Operation::UpdateLcid { .. } => ActionKind::UpdateLcid,
        Operation::RetireLcid { .. } | Operation::ChangeLcidRetirementDate { .. } => {
            ActionKind::RetireLcid
        }
        Operation::UnretireLcid { .. } => ActionKind::UnretireLcid,
        Operation::ExpireLcid { .. } => ActionKind::ExpireLcid,
        Operation::RejectIntake { .. } => ActionKind::NotApproved,
        Operation::MarkNotGovernance { .. } => ActionKind::NotGovernance,
        Operation::CloseRequest { .. } => ActionKind::CloseRequest,
        Operation::ReopenRequest { .. } => ActionKind::ReopenRequest,
    }
}

fn step_for_target(target: FeedbackTarget) -> Option<IntakeStep> {
    match target {
        FeedbackTarget::IntakeRequest => Some(IntakeStep::InitialRequestForm),
        FeedbackTarget::DraftBusinessCase => Some(IntakeStep::DraftBusinessCase),
        FeedbackTarget::FinalBusinessCase => Some(IntakeStep::FinalBusinessCase),
        FeedbackTarget::GrbMeeting | FeedbackTarget::NoTargetProvided => None,
    }
}

fn lcid_mut(intake: &mut SystemIntake) -> Result<&mut LcidRecord> {
    let id = intake.id.clone();
    intake.lcid.as_mut().ok_or(EasiError::NoLcid(id))
}

/// Record a decision: the request closes and moves to the decision stage.
fn decide(intake: &mut SystemIntake, decision: DecisionState) {
    intake.decision_state = decision;
    intake.step = IntakeStep::DecisionAndNextSteps;
    intake.state = IntakeState::Closed;
    intake.set_step_status(TaskStage::DecisionAndNextSteps, StepStatus::Done);
}

/// Move the request to `new_step`. Stages already worked through are done,
/// stages jumped over are not needed, and stages after the new one are reset.
fn progress(intake: &mut SystemIntake, new_step: IntakeStep) {
    let current = intake.step.stage().index();
    let target = new_step.stage();
    for &stage in TaskStage::all() {
        let i = stage.index();
        let next = if i < target.index() {
            match intake.step_status(stage) {
                StepStatus::Done => continue,
                _ if i <= current || stage == TaskStage::InitialReviewFeedback => StepStatus::Done,
                _ => StepStatus::NotNeeded,
            }
        } else if stage == target {
            StepStatus::Ready
        } else {
            StepStatus::CannotStart
        };
        intake.set_step_status(stage, next);
    }
    intake.step = new_step;
    intake.state = IntakeState::Open;
    tracing::debug!(intake = %intake.id, step = %new_step, "progressed to new step");
}

fn notify(
    intake: &SystemIntake,
    mutation: &Mutation,
    recipients: &EmailRecipients,
    cfg: &NotificationConfig,
) {
    let to = recipients.resolve(cfg);
    tracing::info!(
        intake = %intake.id,
        operation = mutation.operation.name(),
        recipients = %to.join(", "),
        "notification email queued"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
