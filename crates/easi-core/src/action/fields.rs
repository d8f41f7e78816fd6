//! Field schemas for admin action forms, plus value storage, validation and
//! past-date warnings.
//!
//! Values arrive from the UI as loosely typed text/bool pairs. Only fields
//! that are currently visible are validated; hidden fields are ignored both
//! here and when the mutation input is built.

use super::ActionKind;
use crate::types::{FeedbackTarget, IntakeStep, TrbFollowUp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Trimmed text, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FieldValue::Text(s)) => Some(s.trim()).filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    pub fn owned_text(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    /// Checkbox state. Text "true"/"yes"/"on" also counts as checked.
    pub fn flag(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(FieldValue::Bool(b)) => *b,
            Some(FieldValue::Text(s)) => {
                matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "on")
            }
            None => false,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.text(name).and_then(parse_date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

/// Accepts the UI's `MM/DD/YYYY` as well as ISO `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

// ---------------------------------------------------------------------------
// Errors and warnings
// ---------------------------------------------------------------------------

/// Field name → message. `recipients` and `root` are used for the
/// notification picker and form-level problems respectively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Non-blocking notice shown next to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWarning {
    pub field: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Date,
    Bool,
    Choice(&'static [&'static str]),
}

#[derive(Clone, Copy)]
pub enum Required {
    Always,
    Never,
    When(fn(&FormValues) -> bool),
}

#[derive(Clone, Copy)]
pub enum Visibility {
    Always,
    When(fn(&FormValues) -> bool),
}

#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: Required,
    pub visible: Visibility,
    pub warn_if_past: bool,
}

impl FieldSpec {
    fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: Required::Always,
            visible: Visibility::Always,
            warn_if_past: false,
        }
    }

    fn text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    fn long_text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::LongText)
    }

    fn date(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Date)
    }

    fn checkbox(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Bool).optional()
    }

    fn choice(name: &'static str, label: &'static str, options: &'static [&'static str]) -> Self {
        Self::new(name, label, FieldKind::Choice(options))
    }

    fn optional(mut self) -> Self {
        self.required = Required::Never;
        self
    }

    fn required_when(mut self, pred: fn(&FormValues) -> bool) -> Self {
        self.required = Required::When(pred);
        self
    }

    fn visible_when(mut self, pred: fn(&FormValues) -> bool) -> Self {
        self.visible = Visibility::When(pred);
        self
    }

    fn past_date_warning(mut self) -> Self {
        self.warn_if_past = true;
        self
    }

    pub fn is_visible(&self, values: &FormValues) -> bool {
        match self.visible {
            Visibility::Always => true,
            Visibility::When(pred) => pred(values),
        }
    }

    pub fn is_required(&self, values: &FormValues) -> bool {
        match self.required {
            Required::Always => true,
            Required::Never => false,
            Required::When(pred) => pred(values),
        }
    }
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("warn_if_past", &self.warn_if_past)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Choice options
// ---------------------------------------------------------------------------

pub const EDIT_TARGETS: &[&str] = &["INTAKE_REQUEST", "DRAFT_BUSINESS_CASE", "FINAL_BUSINESS_CASE"];
pub const PROGRESS_STEPS: &[&str] = &[
    "DRAFT_BUSINESS_CASE",
    "GRT_MEETING",
    "FINAL_BUSINESS_CASE",
    "GRB_MEETING",
];
pub const TRB_FOLLOW_UPS: &[&str] = &[
    "STRONGLY_RECOMMENDED",
    "RECOMMENDED_BUT_NOT_CRITICAL",
    "NOT_RECOMMENDED",
];

fn progressing_to_meeting(v: &FormValues) -> bool {
    v.text("newStep")
        .and_then(|s| s.parse::<IntakeStep>().ok())
        .is_some_and(IntakeStep::is_meeting)
}

fn progressing_to_grb(v: &FormValues) -> bool {
    v.text("newStep") == Some(IntakeStep::GrbMeeting.as_str())
}

fn using_existing_lcid(v: &FormValues) -> bool {
    v.flag("useExistingLcid")
}

fn admin_note() -> FieldSpec {
    FieldSpec::long_text("adminNote", "Admin note").optional()
}

fn additional_info() -> FieldSpec {
    FieldSpec::long_text("additionalInfo", "Additional information for the requester").optional()
}

pub fn schema(kind: ActionKind) -> Vec<FieldSpec> {
    match kind {
        ActionKind::RequestEdits => vec![
            FieldSpec::choice("intakeFormStep", "Which form needs edits?", EDIT_TARGETS),
            FieldSpec::long_text("emailFeedback", "What changes are needed?"),
            additional_info(),
            admin_note(),
        ],
        ActionKind::ProgressToNewStep => vec![
            FieldSpec::choice("newStep", "Which step should the request move to?", PROGRESS_STEPS),
            FieldSpec::date("meetingDate", "Meeting date")
                .optional()
                .visible_when(progressing_to_meeting),
            FieldSpec::long_text("feedback", "Feedback for the requester").optional(),
            FieldSpec::long_text("grbRecommendations", "Recommendations for the GRB")
                .optional()
                .visible_when(progressing_to_grb),
            additional_info(),
            admin_note(),
        ],
        ActionKind::IssueLcid => vec![
            FieldSpec::checkbox("useExistingLcid", "Use an existing Life Cycle ID"),
            FieldSpec::text("lcid", "Life Cycle ID")
                .required_when(using_existing_lcid)
                .visible_when(using_existing_lcid),
            FieldSpec::date("expiresAt", "Expiration date").past_date_warning(),
            FieldSpec::long_text("scope", "Scope of Life Cycle ID"),
            FieldSpec::long_text("nextSteps", "Project next steps"),
            FieldSpec::choice("trbFollowUp", "TRB follow-up", TRB_FOLLOW_UPS),
            FieldSpec::long_text("costBaseline", "Project cost baseline").optional(),
            additional_info(),
            admin_note(),
        ],
        ActionKind::UpdateLcid => vec![
            FieldSpec::date("expiresAt", "Expiration date")
                .optional()
                .past_date_warning(),
            FieldSpec::long_text("scope", "Scope of Life Cycle ID").optional(),
            FieldSpec::long_text("nextSteps", "Project next steps").optional(),
            FieldSpec::long_text("costBaseline", "Project cost baseline").optional(),
            FieldSpec::long_text("reason", "Reason for update").optional(),
            additional_info(),
            admin_note(),
        ],
        ActionKind::RetireLcid => vec![
            FieldSpec::date("retiresAt", "Retirement date").past_date_warning(),
            FieldSpec::long_text("reason", "Reason for retirement").optional(),
            additional_info(),
            admin_note(),
        ],
        ActionKind::ExpireLcid => vec![
            FieldSpec::long_text("reason", "Reason for expiration"),
            FieldSpec::long_text("nextSteps", "Next steps").optional(),
            additional_info(),
            admin_note(),
        ],
        ActionKind::NotApproved => vec![
            FieldSpec::long_text("reason", "Why was this request not approved?"),
            FieldSpec::long_text("nextSteps", "Next steps"),
            FieldSpec::choice("trbFollowUp", "TRB follow-up", TRB_FOLLOW_UPS),
            additional_info(),
            admin_note(),
        ],
        ActionKind::UnretireLcid
        | ActionKind::NotGovernance
        | ActionKind::CloseRequest
        | ActionKind::ReopenRequest => vec![
            FieldSpec::long_text("reason", "Reason").optional(),
            additional_info(),
            admin_note(),
        ],
    }
}

pub fn field(kind: ActionKind, name: &str) -> Option<FieldSpec> {
    schema(kind).into_iter().find(|f| f.name == name)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate every visible field of the action's schema.
pub fn validate(kind: ActionKind, values: &FormValues) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for spec in schema(kind) {
        if !spec.is_visible(values) {
            continue;
        }
        if let Some(message) = validate_field(&spec, values) {
            errors.insert(spec.name, message);
        }
    }
    errors
}

fn validate_field(spec: &FieldSpec, values: &FormValues) -> Option<String> {
    if spec.kind == FieldKind::Bool {
        return None;
    }

    let Some(text) = values.text(spec.name) else {
        return spec
            .is_required(values)
            .then(|| format!("{} is required", spec.label));
    };

    match spec.kind {
        FieldKind::Date if parse_date(text).is_none() => {
            Some(format!("{} must be a valid date (MM/DD/YYYY)", spec.label))
        }
        FieldKind::Choice(options) if !options.contains(&text) => {
            Some(format!("{} must be one of: {}", spec.label, options.join(", ")))
        }
        _ => None,
    }
}

/// Past dates on flagged fields. Never blocks submission.
pub fn past_date_warnings(kind: ActionKind, values: &FormValues, today: NaiveDate) -> Vec<FieldWarning> {
    schema(kind)
        .into_iter()
        .filter(|spec| spec.warn_if_past && spec.is_visible(values))
        .filter_map(|spec| {
            let date = values.date(spec.name)?;
            (date < today).then(|| FieldWarning {
                field: spec.name.to_string(),
                message: format!(
                    "{} ({}) is in the past. You can still complete this action.",
                    spec.label,
                    format_date(date)
                ),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Choice parsing helpers used when building mutation input
// ---------------------------------------------------------------------------

pub(crate) fn edit_target(values: &FormValues) -> Option<FeedbackTarget> {
    values.text("intakeFormStep")?.parse().ok()
}

pub(crate) fn trb_follow_up(values: &FormValues) -> Option<TrbFollowUp> {
    values.text("trbFollowUp")?.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
