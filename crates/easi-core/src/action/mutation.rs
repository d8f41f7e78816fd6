//! Backend mutation input and the mapping from form values to it.
//!
//! `build_mutation` is the only place form values become typed input. It
//! reads visible fields only, parses every value it needs, and reports a
//! field error instead of guessing when a value does not parse. Which
//! operation an action turns into is decided here from the latest loaded
//! intake, never from state captured when the form was opened.

use super::fields::{self, FormValues, ValidationErrors};
use super::recipients::EmailRecipients;
use super::{ActionContext, ActionKind};
use crate::types::{FeedbackTarget, IntakeStep, TrbFollowUp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(rename = "systemIntakeID")]
    pub system_intake_id: String,
    /// `None` when the admin chose "complete action without email".
    pub notification_recipients: Option<EmailRecipients>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
    pub operation: Operation,
}

/// Shared decision fields for issuing or confirming an LCID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LcidDecision {
    /// Existing LCID to reuse; `None` allocates a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcid: Option<String>,
    pub expires_at: NaiveDate,
    pub scope: String,
    pub next_steps: String,
    pub trb_follow_up: TrbFollowUp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_baseline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "input")]
pub enum Operation {
    RequestEdits {
        #[serde(rename = "intakeFormStep")]
        target: FeedbackTarget,
        #[serde(rename = "emailFeedback")]
        email_feedback: String,
    },
    ProgressToNewStep {
        #[serde(rename = "newStep")]
        new_step: IntakeStep,
        #[serde(rename = "meetingDate", default)]
        meeting_date: Option<NaiveDate>,
        #[serde(default)]
        feedback: Option<String>,
        #[serde(rename = "grbRecommendations", default)]
        grb_recommendations: Option<String>,
    },
    IssueLcid(LcidDecision),
    ConfirmLcid(LcidDecision),
    UpdateLcid {
        #[serde(rename = "expiresAt", default)]
        expires_at: Option<NaiveDate>,
        #[serde(default)]
        scope: Option<String>,
        #[serde(rename = "nextSteps", default)]
        next_steps: Option<String>,
        #[serde(rename = "costBaseline", default)]
        cost_baseline: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    RetireLcid {
        #[serde(rename = "retiresAt")]
        retires_at: NaiveDate,
        #[serde(default)]
        reason: Option<String>,
    },
    ChangeLcidRetirementDate {
        #[serde(rename = "retiresAt")]
        retires_at: NaiveDate,
    },
    UnretireLcid {
        #[serde(default)]
        reason: Option<String>,
    },
    ExpireLcid {
        reason: String,
        #[serde(rename = "nextSteps", default)]
        next_steps: Option<String>,
    },
    RejectIntake {
        reason: String,
        #[serde(rename = "nextSteps")]
        next_steps: String,
        #[serde(rename = "trbFollowUp")]
        trb_follow_up: TrbFollowUp,
    },
    MarkNotGovernance {
        #[serde(default)]
        reason: Option<String>,
    },
    CloseRequest {
        #[serde(default)]
        reason: Option<String>,
    },
    ReopenRequest {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RequestEdits { .. } => "RequestEdits",
            Operation::ProgressToNewStep { .. } => "ProgressToNewStep",
            Operation::IssueLcid(_) => "IssueLcid",
            Operation::ConfirmLcid(_) => "ConfirmLcid",
            Operation::UpdateLcid { .. } => "UpdateLcid",
            Operation::RetireLcid { .. } => "RetireLcid",
            Operation::ChangeLcidRetirementDate { .. } => "ChangeLcidRetirementDate",
            Operation::UnretireLcid { .. } => "UnretireLcid",
            Operation::ExpireLcid { .. } => "ExpireLcid",
            Operation::RejectIntake { .. } => "RejectIntake",
            Operation::MarkNotGovernance { .. } => "MarkNotGovernance",
            Operation::CloseRequest { .. } => "CloseRequest",
            Operation::ReopenRequest { .. } => "ReopenRequest",
        }
    }
}

// ---------------------------------------------------------------------------
// Form values → mutation
// ---------------------------------------------------------------------------

/// Collects required values, recording an error for each one missing or unparseable.
struct Reader<'a> {
    values: &'a FormValues,
    errors: ValidationErrors,
}

impl<'a> Reader<'a> {
    fn new(values: &'a FormValues) -> Self {
        Self {
            values,
            errors: ValidationErrors::new(),
        }
    }

    fn text(&mut self, name: &str) -> String {
        match self.values.owned_text(name) {
            Some(s) => s,
            None => {
                self.errors.insert(name, "This field is required");
                String::new()
            }
        }
    }

    fn opt_text(&self, name: &str) -> Option<String> {
        self.values.owned_text(name)
    }

    fn date(&mut self, name: &str) -> NaiveDate {
        match self.values.date(name) {
            Some(d) => d,
            None => {
                self.errors.insert(name, "A valid date is required");
                NaiveDate::MIN
            }
        }
    }

    fn opt_date(&mut self, name: &str) -> Option<NaiveDate> {
        let raw = self.values.text(name)?;
        let parsed = fields::parse_date(raw);
        if parsed.is_none() {
            self.errors.insert(name, "A valid date is required");
        }
        parsed
    }

    fn required<T>(&mut self, name: &str, value: Option<T>, fallback: T) -> T {
        match value {
            Some(v) => v,
            None => {
                self.errors.insert(name, "A valid selection is required");
                fallback
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

/// Build the backend input for `kind` from validated form values and the
/// latest loaded context.
pub fn build_mutation(
    kind: ActionKind,
    values: &FormValues,
    ctx: &ActionContext,
    notification: Option<EmailRecipients>,
) -> Result<Mutation, ValidationErrors> {
    let mut r = Reader::new(values);
    let intake = &ctx.intake;

    let operation = match kind {
        ActionKind::RequestEdits => {
            let target = fields::edit_target(values);
            Operation::RequestEdits {
                target: r.required("intakeFormStep", target, FeedbackTarget::IntakeRequest),
                email_feedback: r.text("emailFeedback"),
            }
        }
        ActionKind::ProgressToNewStep => {
            let new_step = values.text("newStep").and_then(|s| s.parse::<IntakeStep>().ok());
            let new_step = r.required("newStep", new_step, IntakeStep::DraftBusinessCase);
            Operation::ProgressToNewStep {
                new_step,
                meeting_date: if new_step.is_meeting() {
                    r.opt_date("meetingDate")
                } else {
                    None
                },
                feedback: r.opt_text("feedback"),
                grb_recommendations: if new_step == IntakeStep::GrbMeeting {
                    r.opt_text("grbRecommendations")
                } else {
                    None
                },
            }
        }
        ActionKind::IssueLcid => {
            let decision = LcidDecision {
                lcid: if values.flag("useExistingLcid") {
                    Some(r.text("lcid"))
                } else {
                    None
                },
                expires_at: r.date("expiresAt"),
                scope: r.text("scope"),
                next_steps: r.text("nextSteps"),
                trb_follow_up: {
                    let v = fields::trb_follow_up(values);
                    r.required("trbFollowUp", v, TrbFollowUp::NotRecommended)
                },
                cost_baseline: r.opt_text("costBaseline"),
            };
            if intake.lcid.is_some() {
                Operation::ConfirmLcid(LcidDecision {
                    lcid: None,
                    ..decision
                })
            } else {
                Operation::IssueLcid(decision)
            }
        }
        ActionKind::UpdateLcid => Operation::UpdateLcid {
            expires_at: r.opt_date("expiresAt"),
            scope: r.opt_text("scope"),
            next_steps: r.opt_text("nextSteps"),
            cost_baseline: r.opt_text("costBaseline"),
            reason: r.opt_text("reason"),
        },
        ActionKind::RetireLcid => {
            let retires_at = r.date("retiresAt");
            let already_retiring = intake
                .lcid
                .as_ref()
                .is_some_and(|l| l.retires_at.is_some());
            if already_retiring {
                Operation::ChangeLcidRetirementDate { retires_at }
            } else {
                Operation::RetireLcid {
                    retires_at,
                    reason: r.opt_text("reason"),
                }
            }
        }
        ActionKind::UnretireLcid => Operation::UnretireLcid {
            reason: r.opt_text("reason"),
        },
        ActionKind::ExpireLcid => Operation::ExpireLcid {
            reason: r.text("reason"),
            next_steps: r.opt_text("nextSteps"),
        },
        ActionKind::NotApproved => Operation::RejectIntake {
            reason: r.text("reason"),
            next_steps: r.text("nextSteps"),
            trb_follow_up: {
                let v = fields::trb_follow_up(values);
                r.required("trbFollowUp", v, TrbFollowUp::NotRecommended)
            },
        },
        ActionKind::NotGovernance => Operation::MarkNotGovernance {
            reason: r.opt_text("reason"),
        },
        ActionKind::CloseRequest => Operation::CloseRequest {
            reason: r.opt_text("reason"),
        },
        ActionKind::ReopenRequest => Operation::ReopenRequest {
            reason: r.opt_text("reason"),
        },
    };

    let mutation = Mutation {
        system_intake_id: intake.id.clone(),
        notification_recipients: notification,
        additional_info: r.opt_text("additionalInfo"),
        admin_note: r.opt_text("adminNote"),
        operation,
    };
    r.finish(mutation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
