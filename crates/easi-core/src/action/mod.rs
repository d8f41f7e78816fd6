//! Admin action forms.
//!
//! An `ActionForm` walks one admin action through
//! `LoadingDefaults → Editing → Validating → [Confirming] → Submitting → Done | Failed`.
//! It never performs I/O itself: defaults arrive through `hydrate`, and the
//! caller dispatches the returned `Mutation` (usually via a
//! `MutationClient`) and reports the result back through `resolve`.

pub mod fields;
pub mod mutation;
pub mod recipients;

use crate::error::{EasiError, Result};
use crate::intake::SystemIntake;
use crate::lcid::LcidRecord;
use crate::paths;
use crate::types::{IntakeState, TaskStage};
use chrono::{Months, NaiveDate};
use fields::{FieldValue, FieldWarning, FormValues, ValidationErrors};
use mutation::Mutation;
use recipients::EmailRecipients;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    RequestEdits,
    ProgressToNewStep,
    IssueLcid,
    UpdateLcid,
    RetireLcid,
    UnretireLcid,
    ExpireLcid,
    NotApproved,
    NotGovernance,
    CloseRequest,
    ReopenRequest,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::RequestEdits,
            ActionKind::ProgressToNewStep,
            ActionKind::IssueLcid,
            ActionKind::UpdateLcid,
            ActionKind::RetireLcid,
            ActionKind::UnretireLcid,
            ActionKind::ExpireLcid,
            ActionKind::NotApproved,
            ActionKind::NotGovernance,
            ActionKind::CloseRequest,
            ActionKind::ReopenRequest,
        ]
    }

    pub fn slug(self) -> &'static str {
        match self {
            ActionKind::RequestEdits => "request-edits",
            ActionKind::ProgressToNewStep => "progress-to-new-step",
            ActionKind::IssueLcid => "issue-lcid",
            ActionKind::UpdateLcid => "update-lcid",
            ActionKind::RetireLcid => "retire-lcid",
            ActionKind::UnretireLcid => "unretire-lcid",
            ActionKind::ExpireLcid => "expire-lcid",
            ActionKind::NotApproved => "not-approved",
            ActionKind::NotGovernance => "not-governance",
            ActionKind::CloseRequest => "close-request",
            ActionKind::ReopenRequest => "reopen-request",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ActionKind::RequestEdits => "Request edits to a form",
            ActionKind::ProgressToNewStep => "Progress to a new step",
            ActionKind::IssueLcid => "Issue a Life Cycle ID",
            ActionKind::UpdateLcid => "Update a Life Cycle ID",
            ActionKind::RetireLcid => "Retire a Life Cycle ID",
            ActionKind::UnretireLcid => "Remove retirement date",
            ActionKind::ExpireLcid => "Expire a Life Cycle ID",
            ActionKind::NotApproved => "Not approved by GRB",
            ActionKind::NotGovernance => "Not an IT Governance request",
            ActionKind::CloseRequest => "Close request",
            ActionKind::ReopenRequest => "Re-open request",
        }
    }

    /// Whether the action can be taken on the intake as it stands.
    pub fn is_available(self, intake: &SystemIntake) -> bool {
        let has_lcid = intake.lcid.is_some();
        let open = intake.state == IntakeState::Open;
        match self {
            ActionKind::RequestEdits
            | ActionKind::ProgressToNewStep
            | ActionKind::NotApproved
            | ActionKind::NotGovernance
            | ActionKind::CloseRequest => open,
            ActionKind::IssueLcid => true,
            ActionKind::UpdateLcid | ActionKind::RetireLcid | ActionKind::ExpireLcid => has_lcid,
            ActionKind::UnretireLcid => intake
                .lcid
                .as_ref()
                .is_some_and(|l| l.retires_at.is_some()),
            ActionKind::ReopenRequest => !open,
        }
    }

    fn success_message(self, request_name: &str, lcid: Option<&str>) -> String {
        match (self, lcid) {
            (ActionKind::IssueLcid, Some(lcid)) => {
                format!("Life Cycle ID {lcid} is issued for {request_name}.")
            }
            (ActionKind::RequestEdits, _) => {
                format!("Edits requested for {request_name}.")
            }
            (ActionKind::CloseRequest, _) => format!("{request_name} is closed."),
            (ActionKind::ReopenRequest, _) => format!("{request_name} is re-opened."),
            (kind, _) => format!("Action complete: {} for {request_name}.", kind.title()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = EasiError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().replace('_', "-").to_ascii_lowercase();
        ActionKind::all()
            .iter()
            .copied()
            .find(|k| k.slug() == s)
            .ok_or(EasiError::UnknownAction(s))
    }
}

// ---------------------------------------------------------------------------
// ActionContext
// ---------------------------------------------------------------------------

/// Everything an action form reads: the latest loaded intake, LCIDs that can
/// be reused, and the current date. Passed explicitly instead of being read
/// from shared state.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub intake: SystemIntake,
    pub existing_lcids: Vec<LcidRecord>,
    pub today: NaiveDate,
    pub lcid_term_years: u32,
}

impl ActionContext {
    pub fn new(intake: SystemIntake, today: NaiveDate) -> Self {
        Self {
            intake,
            existing_lcids: Vec::new(),
            today,
            lcid_term_years: 5,
        }
    }

    pub fn edits_requested(&self) -> Option<TaskStage> {
        self.intake.edits_requested()
    }

    pub fn find_lcid(&self, lcid: &str) -> Option<&LcidRecord> {
        self.existing_lcids.iter().find(|l| l.lcid == lcid.trim())
    }
}

/// Source of the data an action form hydrates from.
pub trait DefaultsSource {
    fn load_context(&self, intake_id: &str, today: NaiveDate) -> Result<ActionContext>;
}

// ---------------------------------------------------------------------------
// Mutation dispatch seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub system_intake_id: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Network or server failure. The admin can retry.
    Transport(String),
    /// The backend refused the mutation.
    Rejected(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Transport(msg) => write!(f, "transport error: {msg}"),
            SubmitError::Rejected(msg) => write!(f, "rejected: {msg}"),
        }
    }
}

impl std::error::Error for SubmitError {}

pub trait MutationClient {
    fn dispatch(&self, mutation: &Mutation) -> std::result::Result<MutationOutcome, SubmitError>;
}

// ---------------------------------------------------------------------------
// Form state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    LoadingDefaults,
    Editing,
    Validating,
    Confirming,
    Submitting,
    Done,
    Failed,
}

impl fmt::Display for FormPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormPhase::LoadingDefaults => "loading_defaults",
            FormPhase::Editing => "editing",
            FormPhase::Validating => "validating",
            FormPhase::Confirming => "confirming",
            FormPhase::Submitting => "submitting",
            FormPhase::Done => "done",
            FormPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitButton {
    /// "Complete action": sends the notification email.
    Complete,
    /// "Complete action without sending an email".
    CompleteWithoutEmail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationModal {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

/// Message queued for display on the page the admin lands on next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Invalid(ValidationErrors),
    NeedsConfirmation(ConfirmationModal),
    Dispatch(Mutation),
}

pub const GENERIC_SUBMIT_ERROR: &str =
    "Something went wrong. Your action could not be completed. Please try again.";
pub const DEFAULTS_LOAD_ERROR: &str =
    "Failed to load request data. Refresh the page to try again.";

/// The modal shown before an action that would discard an open edits request.
pub fn confirmation_for(kind: ActionKind, ctx: &ActionContext) -> Option<ConfirmationModal> {
    if kind == ActionKind::RequestEdits {
        return None;
    }
    let stage = ctx.edits_requested()?;
    Some(ConfirmationModal {
        title: "Are you sure you want to complete this action?".to_string(),
        content: format!(
            "You previously requested edits to \"{}\". Completing this action will \
             remove that edits request, and the requester will no longer be able to \
             make changes to that form.",
            stage.label()
        ),
    })
}

#[derive(Debug, Clone)]
pub struct ActionForm {
    kind: ActionKind,
    intake_id: String,
    request_name: String,
    phase: FormPhase,
    values: FormValues,
    recipients: EmailRecipients,
    suppress_email: bool,
    confirmation_open: bool,
    errors: ValidationErrors,
    root_error: Option<String>,
    flash: Option<FlashMessage>,
    redirect: Option<String>,
    existing_lcids: Vec<LcidRecord>,
}

impl ActionForm {
    pub fn new(kind: ActionKind, intake_id: impl Into<String>) -> Self {
        Self {
            kind,
            intake_id: intake_id.into(),
            request_name: String::new(),
            phase: FormPhase::LoadingDefaults,
            values: FormValues::new(),
            recipients: EmailRecipients::default(),
            suppress_email: false,
            confirmation_open: false,
            errors: ValidationErrors::new(),
            root_error: None,
            flash: None,
            redirect: None,
            existing_lcids: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn recipients(&self) -> &EmailRecipients {
        &self.recipients
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn root_error(&self) -> Option<&str> {
        self.root_error.as_deref()
    }

    pub fn flash(&self) -> Option<&FlashMessage> {
        self.flash.as_ref()
    }

    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    pub fn email_suppressed(&self) -> bool {
        self.suppress_email
    }

    pub fn confirmation_open(&self) -> bool {
        self.confirmation_open
    }

    /// Submit controls are disabled while a mutation is in flight.
    pub fn can_submit(&self) -> bool {
        self.phase == FormPhase::Editing
    }

    /// Fields rendered for the current values.
    pub fn visible_fields(&self) -> Vec<fields::FieldSpec> {
        fields::schema(self.kind)
            .into_iter()
            .filter(|f| f.is_visible(&self.values))
            .collect()
    }

    pub fn warnings(&self, today: NaiveDate) -> Vec<FieldWarning> {
        fields::past_date_warnings(self.kind, &self.values, today)
    }

    fn expect_phase(&self, expected: FormPhase) -> Result<()> {
        if self.phase == expected {
            return Ok(());
        }
        if self.phase == FormPhase::Submitting {
            return Err(EasiError::FormBusy);
        }
        Err(EasiError::InvalidFormPhase {
            expected: expected.to_string(),
            actual: self.phase.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // loading-defaults → editing
    // -----------------------------------------------------------------------

    /// Apply loaded defaults. A failed load leaves the form `Failed` with a
    /// root error; it is neither retried nor opened with empty defaults.
    pub fn hydrate(&mut self, loaded: Result<ActionContext>) -> Result<()> {
        self.expect_phase(FormPhase::LoadingDefaults)?;
        let ctx = match loaded {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(action = %self.kind, intake = %self.intake_id, error = %e, "failed to load action defaults");
                self.root_error = Some(DEFAULTS_LOAD_ERROR.to_string());
                self.phase = FormPhase::Failed;
                return Ok(());
            }
        };

        self.request_name = ctx.intake.request_name.clone();
        self.recipients = EmailRecipients::for_requester(ctx.intake.requester.email.clone());
        self.values = default_values(self.kind, &ctx);
        self.existing_lcids = ctx.existing_lcids;
        self.phase = FormPhase::Editing;
        tracing::debug!(action = %self.kind, intake = %self.intake_id, "action form ready");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // editing
    // -----------------------------------------------------------------------

    pub fn set_value(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.expect_phase(FormPhase::Editing)?;
        if fields::field(self.kind, name).is_none() {
            return Err(EasiError::UnknownField {
                action: self.kind.to_string(),
                field: name.to_string(),
            });
        }
        self.values.set(name, value);

        if self.kind == ActionKind::IssueLcid
            && matches!(name, "lcid" | "useExistingLcid")
            && self.values.flag("useExistingLcid")
        {
            self.copy_existing_lcid();
        }
        Ok(())
    }

    /// Choosing an existing LCID fills the decision fields from it.
    fn copy_existing_lcid(&mut self) {
        let Some(chosen) = self.values.text("lcid") else {
            return;
        };
        let Some(record) = self.existing_lcids.iter().find(|l| l.lcid == chosen).cloned() else {
            return;
        };
        self.values.set("expiresAt", fields::format_date(record.expires_at));
        self.values.set("scope", record.scope);
        self.values.set("nextSteps", record.next_steps);
        self.values
            .set("costBaseline", record.cost_baseline.unwrap_or_default());
    }

    pub fn set_recipients(&mut self, recipients: EmailRecipients) -> Result<()> {
        self.expect_phase(FormPhase::Editing)?;
        self.recipients = recipients;
        Ok(())
    }

    fn validate(&self, suppress_email: bool) -> ValidationErrors {
        let mut errors = fields::validate(self.kind, &self.values);
        if self.kind == ActionKind::IssueLcid && self.values.flag("useExistingLcid") {
            if let Some(chosen) = self.values.text("lcid") {
                if !self.existing_lcids.iter().any(|l| l.lcid == chosen) {
                    errors.insert("lcid", "Select an existing Life Cycle ID");
                }
            }
        }
        if !suppress_email {
            if let Some(message) = self.recipients.validate() {
                errors.insert("recipients", message);
            }
        }
        errors
    }

    // -----------------------------------------------------------------------
    // editing → validating → (editing | confirming | submitting)
    // -----------------------------------------------------------------------

    /// Press one of the two submit buttons. `ctx` must be the latest loaded
    /// state; the mutation variant is chosen from it.
    pub fn submit(&mut self, button: SubmitButton, ctx: &ActionContext) -> Result<SubmitOutcome> {
        self.expect_phase(FormPhase::Editing)?;
        self.phase = FormPhase::Validating;
        self.suppress_email = button == SubmitButton::CompleteWithoutEmail;
        self.root_error = None;

        let errors = self.validate(self.suppress_email);
        if !errors.is_empty() {
            tracing::debug!(action = %self.kind, count = errors.len(), "action form invalid");
            self.errors = errors.clone();
            self.phase = FormPhase::Editing;
            return Ok(SubmitOutcome::Invalid(errors));
        }
        self.errors.clear();

        if let Some(modal) = confirmation_for(self.kind, ctx) {
            self.phase = FormPhase::Confirming;
            self.confirmation_open = true;
            return Ok(SubmitOutcome::NeedsConfirmation(modal));
        }
        Ok(self.begin_submit(ctx))
    }

    /// Confirm in the modal.
    pub fn confirm(&mut self, ctx: &ActionContext) -> Result<SubmitOutcome> {
        self.expect_phase(FormPhase::Confirming)?;
        self.confirmation_open = false;
        Ok(self.begin_submit(ctx))
    }

    /// Dismiss the modal. Values are kept.
    pub fn cancel(&mut self) -> Result<()> {
        self.expect_phase(FormPhase::Confirming)?;
        self.confirmation_open = false;
        self.phase = FormPhase::Editing;
        Ok(())
    }

    fn begin_submit(&mut self, ctx: &ActionContext) -> SubmitOutcome {
        let notification = (!self.suppress_email).then(|| self.recipients.clone());
        match mutation::build_mutation(self.kind, &self.values, ctx, notification) {
            Ok(m) => {
                self.phase = FormPhase::Submitting;
                SubmitOutcome::Dispatch(m)
            }
            Err(errors) => {
                self.errors = errors.clone();
                self.phase = FormPhase::Editing;
                SubmitOutcome::Invalid(errors)
            }
        }
    }

    // -----------------------------------------------------------------------
    // submitting → done | failed
    // -----------------------------------------------------------------------

    pub fn resolve(&mut self, result: std::result::Result<MutationOutcome, SubmitError>) -> Result<()> {
        self.expect_submitting()?;
        match result {
            Ok(outcome) => {
                let text = self
                    .kind
                    .success_message(&self.request_name, outcome.lcid.as_deref());
                self.flash = Some(FlashMessage {
                    kind: FlashKind::Success,
                    text,
                });
                self.redirect = Some(paths::action_list_route(&self.intake_id));
                self.phase = FormPhase::Done;
            }
            Err(SubmitError::Transport(msg)) => {
                tracing::warn!(action = %self.kind, intake = %self.intake_id, error = %msg, "action submission failed");
                self.root_error = Some(GENERIC_SUBMIT_ERROR.to_string());
                self.confirmation_open = false;
                self.phase = FormPhase::Editing;
            }
            Err(SubmitError::Rejected(msg)) => {
                tracing::warn!(action = %self.kind, intake = %self.intake_id, error = %msg, "action rejected");
                self.flash = Some(FlashMessage {
                    kind: FlashKind::Error,
                    text: msg.clone(),
                });
                self.root_error = Some(msg);
                self.confirmation_open = false;
                self.phase = FormPhase::Failed;
            }
        }
        Ok(())
    }

    fn expect_submitting(&self) -> Result<()> {
        if self.phase == FormPhase::Submitting {
            Ok(())
        } else {
            Err(EasiError::InvalidFormPhase {
                expected: FormPhase::Submitting.to_string(),
                actual: self.phase.to_string(),
            })
        }
    }

    /// Send `mutation` through `client` and record the result.
    pub fn dispatch_with<C: MutationClient + ?Sized>(&mut self, client: &C, mutation: &Mutation) -> Result<()> {
        self.expect_submitting()?;
        let result = client.dispatch(mutation);
        self.resolve(result)
    }
}

/// Initial field values for a freshly opened form.
fn default_values(kind: ActionKind, ctx: &ActionContext) -> FormValues {
    let mut values = FormValues::new();
    let lcid = ctx.intake.lcid.as_ref();
    match kind {
        ActionKind::IssueLcid => match lcid {
            Some(l) => {
                values.set("expiresAt", fields::format_date(l.expires_at));
                values.set("scope", l.scope.clone());
                values.set("nextSteps", l.next_steps.clone());
                values.set("trbFollowUp", l.trb_follow_up.as_str());
                if let Some(cost) = &l.cost_baseline {
                    values.set("costBaseline", cost.clone());
                }
            }
            None => {
                let suggested = ctx
                    .today
                    .checked_add_months(Months::new(ctx.lcid_term_years.saturating_mul(12)))
                    .unwrap_or(ctx.today);
                values.set("expiresAt", fields::format_date(suggested));
            }
        },
        ActionKind::UpdateLcid => {
            if let Some(l) = lcid {
                values.set("expiresAt", fields::format_date(l.expires_at));
                values.set("scope", l.scope.clone());
                values.set("nextSteps", l.next_steps.clone());
                if let Some(cost) = &l.cost_baseline {
                    values.set("costBaseline", cost.clone());
                }
            }
        }
        ActionKind::RetireLcid => {
            if let Some(retires_at) = lcid.and_then(|l| l.retires_at) {
                values.set("retiresAt", fields::format_date(retires_at));
            }
        }
        ActionKind::RequestEdits
        | ActionKind::ProgressToNewStep
        | ActionKind::UnretireLcid
        | ActionKind::ExpireLcid
        | ActionKind::NotApproved
        | ActionKind::NotGovernance
        | ActionKind::CloseRequest
        | ActionKind::ReopenRequest => {}
    }
    values
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::Contact;
    use crate::types::{StepStatus, TrbFollowUp};
    use chrono::Utc;
    use mutation::Operation;
    use std::cell::RefCell;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn intake() -> SystemIntake {
        SystemIntake::new(
            "Data platform",
            Contact {
                name: "Ada".into(),
                email: "ada@example.gov".into(),
                role: None,
            },
        )
    }

    fn existing_lcid() -> LcidRecord {
        LcidRecord {
            lcid: "24100C".into(),
            issued_at: Utc::now(),
            expires_at: NaiveDate::from_ymd_opt(2029, 3, 15).unwrap(),
            retires_at: None,
            scope: "Existing scope".into(),
            next_steps: "Existing next steps".into(),
            trb_follow_up: TrbFollowUp::RecommendedButNotCritical,
            cost_baseline: Some("$1.2M".into()),
            expired_manually: false,
        }
    }

    fn open_form(kind: ActionKind, ctx: &ActionContext) -> ActionForm {
        let mut form = ActionForm::new(kind, ctx.intake.id.clone());
        form.hydrate(Ok(ctx.clone())).unwrap();
        form
    }

    struct FakeClient {
        result: std::result::Result<MutationOutcome, SubmitError>,
        calls: RefCell<Vec<Mutation>>,
    }

    impl MutationClient for FakeClient {
        fn dispatch(&self, mutation: &Mutation) -> std::result::Result<MutationOutcome, SubmitError> {
            self.calls.borrow_mut().push(mutation.clone());
            self.result.clone()
        }
    }

    fn ok_client() -> FakeClient {
        FakeClient {
            result: Ok(MutationOutcome {
                system_intake_id: "x".into(),
                operation: "CloseRequest".into(),
                lcid: None,
            }),
            calls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn starts_loading_then_edits() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = ActionForm::new(ActionKind::CloseRequest, ctx.intake.id.clone());
        assert_eq!(form.phase(), FormPhase::LoadingDefaults);
        assert!(!form.can_submit());
        form.hydrate(Ok(ctx)).unwrap();
        assert_eq!(form.phase(), FormPhase::Editing);
        assert_eq!(
            form.recipients().regular_recipient_emails,
            ["ada@example.gov"]
        );
    }

    #[test]
    fn failed_defaults_load_is_surfaced() {
        let mut form = ActionForm::new(ActionKind::CloseRequest, "missing");
        form.hydrate(Err(EasiError::IntakeNotFound("missing".into())))
            .unwrap();
        assert_eq!(form.phase(), FormPhase::Failed);
        assert_eq!(form.root_error(), Some(DEFAULTS_LOAD_ERROR));
        assert!(form.set_value("reason", "x").is_err());
    }

    #[test]
    fn missing_required_field_returns_to_editing() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::NotApproved, &ctx);
        form.set_value("reason", "Too costly").unwrap();

        for button in [SubmitButton::Complete, SubmitButton::CompleteWithoutEmail] {
            let outcome = form.submit(button, &ctx).unwrap();
            assert!(matches!(outcome, SubmitOutcome::Invalid(ref e) if !e.is_empty()));
            assert_eq!(form.phase(), FormPhase::Editing);
            assert!(form.errors().contains("nextSteps"));
            assert_eq!(form.values().text("reason"), Some("Too costly"));
        }
    }

    #[test]
    fn recipients_required_only_when_sending_email() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        form.set_recipients(EmailRecipients::default()).unwrap();

        let outcome = form.submit(SubmitButton::Complete, &ctx).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Invalid(ref e) if e.contains("recipients")));

        let outcome = form.submit(SubmitButton::CompleteWithoutEmail, &ctx).unwrap();
        let SubmitOutcome::Dispatch(m) = outcome else {
            panic!("expected dispatch");
        };
        assert!(m.notification_recipients.is_none());
        assert!(form.email_suppressed());
        assert_eq!(form.phase(), FormPhase::Submitting);
    }

    #[test]
    fn edits_requested_forces_confirmation_for_both_buttons() {
        let mut i = intake();
        i.set_step_status(TaskStage::IntakeForm, StepStatus::EditsRequested);
        let ctx = ActionContext::new(i, today());

        for button in [SubmitButton::Complete, SubmitButton::CompleteWithoutEmail] {
            let mut form = open_form(ActionKind::CloseRequest, &ctx);
            let outcome = form.submit(button, &ctx).unwrap();
            assert!(matches!(outcome, SubmitOutcome::NeedsConfirmation(_)));
            assert_eq!(form.phase(), FormPhase::Confirming);
            assert!(form.confirmation_open());
        }
    }

    #[test]
    fn request_edits_never_asks_for_confirmation() {
        let mut i = intake();
        i.set_step_status(TaskStage::IntakeForm, StepStatus::EditsRequested);
        let ctx = ActionContext::new(i, today());
        assert!(confirmation_for(ActionKind::RequestEdits, &ctx).is_none());
        assert!(confirmation_for(ActionKind::IssueLcid, &ctx).is_some());
    }

    #[test]
    fn cancel_preserves_values_and_confirm_dispatches() {
        let mut i = intake();
        i.set_step_status(TaskStage::DraftBusinessCase, StepStatus::EditsRequested);
        let ctx = ActionContext::new(i, today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        form.set_value("reason", "Withdrawn").unwrap();

        form.submit(SubmitButton::Complete, &ctx).unwrap();
        form.cancel().unwrap();
        assert_eq!(form.phase(), FormPhase::Editing);
        assert_eq!(form.values().text("reason"), Some("Withdrawn"));

        form.submit(SubmitButton::Complete, &ctx).unwrap();
        let SubmitOutcome::Dispatch(m) = form.confirm(&ctx).unwrap() else {
            panic!("expected dispatch");
        };
        assert_eq!(m.operation.name(), "CloseRequest");
        assert_eq!(form.phase(), FormPhase::Submitting);
    }

    #[test]
    fn only_one_submission_in_flight() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        form.submit(SubmitButton::Complete, &ctx).unwrap();
        assert!(matches!(
            form.submit(SubmitButton::Complete, &ctx),
            Err(EasiError::FormBusy)
        ));
        assert!(!form.can_submit());
    }

    #[test]
    fn success_queues_message_and_redirects() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        let SubmitOutcome::Dispatch(m) = form.submit(SubmitButton::Complete, &ctx).unwrap() else {
            panic!("expected dispatch");
        };
        let client = ok_client();
        form.dispatch_with(&client, &m).unwrap();

        assert_eq!(client.calls.borrow().len(), 1);
        assert_eq!(form.phase(), FormPhase::Done);
        assert_eq!(form.flash().unwrap().kind, FlashKind::Success);
        assert_eq!(
            form.redirect(),
            Some(format!("/it-governance/{}/actions", ctx.intake.id).as_str())
        );
    }

    #[test]
    fn transport_error_returns_to_editing_with_root_error() {
        let mut i = intake();
        i.set_step_status(TaskStage::IntakeForm, StepStatus::EditsRequested);
        let ctx = ActionContext::new(i, today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        form.set_value("reason", "Withdrawn").unwrap();
        form.submit(SubmitButton::Complete, &ctx).unwrap();
        let SubmitOutcome::Dispatch(m) = form.confirm(&ctx).unwrap() else {
            panic!("expected dispatch");
        };

        let client = FakeClient {
            result: Err(SubmitError::Transport("connection reset".into())),
            calls: RefCell::new(Vec::new()),
        };
        form.dispatch_with(&client, &m).unwrap();
        assert_eq!(form.phase(), FormPhase::Editing);
        assert_eq!(form.root_error(), Some(GENERIC_SUBMIT_ERROR));
        assert!(!form.confirmation_open());
        assert_eq!(form.values().text("reason"), Some("Withdrawn"));
    }

    #[test]
    fn rejection_fails_the_form() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        form.submit(SubmitButton::Complete, &ctx).unwrap();
        form.resolve(Err(SubmitError::Rejected("intake is archived".into())))
            .unwrap();
        assert_eq!(form.phase(), FormPhase::Failed);
        assert_eq!(form.flash().unwrap().kind, FlashKind::Error);
    }

    #[test]
    fn choosing_existing_lcid_copies_its_fields() {
        let mut ctx = ActionContext::new(intake(), today());
        ctx.existing_lcids.push(existing_lcid());
        let mut form = open_form(ActionKind::IssueLcid, &ctx);

        form.set_value("useExistingLcid", true).unwrap();
        form.set_value("lcid", "24100C").unwrap();

        let v = form.values();
        assert_eq!(v.text("expiresAt"), Some("03/15/2029"));
        assert_eq!(v.text("scope"), Some("Existing scope"));
        assert_eq!(v.text("nextSteps"), Some("Existing next steps"));
        assert_eq!(v.text("costBaseline"), Some("$1.2M"));

        form.set_value("trbFollowUp", "NOT_RECOMMENDED").unwrap();
        let SubmitOutcome::Dispatch(m) = form.submit(SubmitButton::Complete, &ctx).unwrap() else {
            panic!("expected dispatch");
        };
        let Operation::IssueLcid(decision) = m.operation else {
            panic!("expected IssueLcid");
        };
        assert_eq!(decision.lcid.as_deref(), Some("24100C"));
        assert_eq!(decision.expires_at, existing_lcid().expires_at);
        assert_eq!(decision.cost_baseline.as_deref(), Some("$1.2M"));
    }

    #[test]
    fn ticking_use_existing_after_choosing_lcid_copies_fields() {
        let mut ctx = ActionContext::new(intake(), today());
        ctx.existing_lcids.push(existing_lcid());
        let mut form = open_form(ActionKind::IssueLcid, &ctx);

        form.set_value("lcid", "24100C").unwrap();
        assert_ne!(form.values().text("scope"), Some("Existing scope"));
        form.set_value("useExistingLcid", "true").unwrap();

        let v = form.values();
        assert_eq!(v.text("expiresAt"), Some("03/15/2029"));
        assert_eq!(v.text("scope"), Some("Existing scope"));
        assert_eq!(v.text("nextSteps"), Some("Existing next steps"));
    }

    #[test]
    fn unknown_existing_lcid_is_invalid() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::IssueLcid, &ctx);
        form.set_value("useExistingLcid", true).unwrap();
        form.set_value("lcid", "99999Z").unwrap();
        form.set_value("scope", "s").unwrap();
        form.set_value("nextSteps", "n").unwrap();
        form.set_value("trbFollowUp", "NOT_RECOMMENDED").unwrap();
        let outcome = form.submit(SubmitButton::Complete, &ctx).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Invalid(ref e) if e.contains("lcid")));
    }

    #[test]
    fn mutation_variant_uses_latest_context() {
        // Opened before an LCID existed, submitted after one was issued elsewhere.
        let stale = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::IssueLcid, &stale);
        form.set_value("scope", "s").unwrap();
        form.set_value("nextSteps", "n").unwrap();
        form.set_value("trbFollowUp", "NOT_RECOMMENDED").unwrap();

        let mut latest = stale.clone();
        latest.intake.lcid = Some(existing_lcid());
        let SubmitOutcome::Dispatch(m) = form.submit(SubmitButton::Complete, &latest).unwrap() else {
            panic!("expected dispatch");
        };
        assert_eq!(m.operation.name(), "ConfirmLcid");
    }

    #[test]
    fn past_retirement_date_warns_but_submits() {
        let mut i = intake();
        i.lcid = Some(existing_lcid());
        let ctx = ActionContext::new(i, today());
        let mut form = open_form(ActionKind::RetireLcid, &ctx);
        form.set_value("retiresAt", "01/01/2023").unwrap();

        let warnings = form.warnings(today());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "retiresAt");

        let outcome = form.submit(SubmitButton::Complete, &ctx).unwrap();
        let SubmitOutcome::Dispatch(m) = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(m.operation.name(), "RetireLcid");
    }

    #[test]
    fn issue_form_suggests_expiration_from_term() {
        let ctx = ActionContext::new(intake(), today());
        let form = open_form(ActionKind::IssueLcid, &ctx);
        assert_eq!(form.values().text("expiresAt"), Some("10/16/2031"));
    }

    #[test]
    fn retire_form_prefills_existing_retirement_date() {
        let mut i = intake();
        let mut l = existing_lcid();
        l.retires_at = NaiveDate::from_ymd_opt(2027, 2, 1);
        i.lcid = Some(l);
        let ctx = ActionContext::new(i, today());
        let form = open_form(ActionKind::RetireLcid, &ctx);
        assert_eq!(form.values().text("retiresAt"), Some("02/01/2027"));
    }

    #[test]
    fn unknown_field_rejected() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::CloseRequest, &ctx);
        assert!(matches!(
            form.set_value("lcid", "x"),
            Err(EasiError::UnknownField { .. })
        ));
    }

    #[test]
    fn visible_fields_follow_values() {
        let ctx = ActionContext::new(intake(), today());
        let mut form = open_form(ActionKind::IssueLcid, &ctx);
        assert!(!form.visible_fields().iter().any(|f| f.name == "lcid"));
        form.set_value("useExistingLcid", true).unwrap();
        assert!(form.visible_fields().iter().any(|f| f.name == "lcid"));
    }

    #[test]
    fn availability_depends_on_intake() {
        let mut i = intake();
        assert!(ActionKind::CloseRequest.is_available(&i));
        assert!(!ActionKind::ReopenRequest.is_available(&i));
        assert!(!ActionKind::RetireLcid.is_available(&i));
        i.lcid = Some(existing_lcid());
        i.state = IntakeState::Closed;
        assert!(ActionKind::RetireLcid.is_available(&i));
        assert!(!ActionKind::UnretireLcid.is_available(&i));
        assert!(ActionKind::ReopenRequest.is_available(&i));
    }

    #[test]
    fn action_kind_parses_slugs() {
        assert_eq!("issue-lcid".parse::<ActionKind>().unwrap(), ActionKind::IssueLcid);
        assert_eq!("retire_lcid".parse::<ActionKind>().unwrap(), ActionKind::RetireLcid);
        assert!("bogus".parse::<ActionKind>().is_err());
    }
}
