use crate::action::mutation::{Mutation, Operation};
use crate::action::recipients::EmailRecipients;
use crate::action::ActionKind;
use crate::error::{EasiError, Result};
use crate::feedback::FeedbackRecord;
use crate::lcid::LcidRecord;
use crate::paths;
use crate::task_list::{self, TaskList, TaskListInput};
use crate::types::{DecisionState, IntakeState, IntakeStep, StepStatus, TaskStage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// One applied admin action, kept for the intake's action history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: ActionKind,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<EmailRecipients>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

const HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// SystemIntake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemIntake {
    pub id: String,
    pub request_name: String,
    pub requester: Contact,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    pub step: IntakeStep,
    pub state: IntakeState,
    pub decision_state: DecisionState,
    #[serde(default)]
    pub step_statuses: BTreeMap<TaskStage, StepStatus>,
    #[serde(default)]
    pub feedback: Vec<FeedbackRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcid: Option<LcidRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grt_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grb_date: Option<NaiveDate>,
    #[serde(default)]
    pub history: Vec<ActionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemIntake {
    pub fn new(request_name: impl Into<String>, requester: Contact) -> Self {
        let now = Utc::now();
        let mut step_statuses = BTreeMap::new();
        step_statuses.insert(TaskStage::IntakeForm, StepStatus::Ready);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_name: request_name.into(),
            requester,
            contacts: Vec::new(),
            step: IntakeStep::InitialRequestForm,
            state: IntakeState::Open,
            decision_state: DecisionState::NoDecision,
            step_statuses,
            feedback: Vec::new(),
            lcid: None,
            grt_date: None,
            grb_date: None,
            history: Vec::new(),
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn create(root: &Path, request_name: impl Into<String>, requester: Contact) -> Result<Self> {
        if !paths::easi_dir(root).is_dir() {
            return Err(EasiError::NotInitialized);
        }
        let intake = Self::new(request_name, requester);
        intake.save(root)?;
        Ok(intake)
    }

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        paths::validate_intake_id(id)?;
        let manifest = paths::intake_manifest(root, id);
        if !manifest.exists() {
            return Err(EasiError::IntakeNotFound(id.to_string()));
        }
        let data = std::fs::read_to_string(&manifest)?;
        let intake: SystemIntake = serde_yaml::from_str(&data)?;
        Ok(intake)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        paths::validate_intake_id(&self.id)?;
        let manifest = paths::intake_manifest(root, &self.id);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&manifest, data.as_bytes())
    }

    pub fn list(root: &Path) -> Result<Vec<Self>> {
        let dir = paths::intakes_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut intakes = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let id = entry.file_name().to_string_lossy().into_owned();
                match Self::load(root, &id) {
                    Ok(i) => intakes.push(i),
                    Err(EasiError::IntakeNotFound(_)) => {
                        tracing::warn!(id = %id, "skipping intake directory without manifest");
                    }
                    Err(EasiError::InvalidValue(_)) => {
                        tracing::warn!(id = %id, "skipping intake directory with invalid name");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        intakes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(intakes)
    }

    // ---------------------------------------------------------------------------
    // Lifecycle views
    // ---------------------------------------------------------------------------

    pub fn step_status(&self, stage: TaskStage) -> StepStatus {
        self.step_statuses.get(&stage).copied().unwrap_or_default()
    }

    pub fn set_step_status(&mut self, stage: TaskStage, status: StepStatus) {
        self.step_statuses.insert(stage, status);
        self.updated_at = Utc::now();
    }

    pub fn task_list_input(&self) -> TaskListInput<'_> {
        TaskListInput {
            step: self.step,
            state: self.state,
            decision_state: self.decision_state,
            step_statuses: &self.step_statuses,
            feedback: &self.feedback,
        }
    }

    pub fn task_list(&self) -> TaskList {
        task_list::resolve(&self.task_list_input())
    }

    /// The single stage the open request is waiting on.
    pub fn current_stage(&self) -> Option<TaskStage> {
        if self.state == IntakeState::Closed {
            return None;
        }
        self.task_list().current_stage()
    }

    /// The form that currently has edits requested, if any. Drives the
    /// confirmation modal on other admin actions.
    pub fn edits_requested(&self) -> Option<TaskStage> {
        [
            TaskStage::IntakeForm,
            TaskStage::DraftBusinessCase,
            TaskStage::FinalBusinessCase,
        ]
        .into_iter()
        .find(|&stage| self.step_status(stage) == StepStatus::EditsRequested)
    }

    /// All people who can be picked as notification recipients, requester first.
    pub fn recipient_candidates(&self) -> Vec<&Contact> {
        std::iter::once(&self.requester)
            .chain(
                self.contacts
                    .iter()
                    .filter(|c| !c.email.eq_ignore_ascii_case(&self.requester.email)),
            )
            .collect()
    }

    pub fn record_action(&mut self, action: ActionKind, mutation: &Mutation) {
        self.history.push(ActionRecord {
            action,
            operation: mutation.operation.clone(),
            notification: mutation.notification_recipients.clone(),
            additional_info: mutation.additional_info.clone(),
            admin_note: mutation.admin_note.clone(),
            created_at: Utc::now(),
        });
        if self.history.len() > HISTORY_LIMIT {
            self.history.drain(..self.history.len() - HISTORY_LIMIT);
        }
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn requester() -> Contact {
        Contact {
            name: "Ada Requester".to_string(),
            email: "ada@example.gov".to_string(),
            role: Some("Product Owner".to_string()),
        }
    }

    fn init(dir: &TempDir) {
        crate::io::ensure_dir(&paths::intakes_dir(dir.path())).unwrap();
    }

    #[test]
    fn intake_roundtrip() {
        let dir = TempDir::new().unwrap();
        init(&dir);
        let mut intake = SystemIntake::create(dir.path(), "Cloud migration", requester()).unwrap();
        intake.set_step_status(TaskStage::IntakeForm, StepStatus::Submitted);
        intake.save(dir.path()).unwrap();

        let loaded = SystemIntake::load(dir.path(), &intake.id).unwrap();
        assert_eq!(loaded.request_name, "Cloud migration");
        assert_eq!(loaded.step_status(TaskStage::IntakeForm), StepStatus::Submitted);
        assert_eq!(loaded.step_status(TaskStage::GrbMeeting), StepStatus::CannotStart);
    }

    #[test]
    fn create_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SystemIntake::create(dir.path(), "x", requester()),
            Err(EasiError::NotInitialized)
        ));
    }

    #[test]
    fn load_missing_intake() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SystemIntake::load(dir.path(), "nope"),
            Err(EasiError::IntakeNotFound(_))
        ));
    }

    #[test]
    fn load_rejects_ids_outside_intakes_dir() {
        let dir = TempDir::new().unwrap();
        init(&dir);
        let intake = SystemIntake::create(dir.path(), "Cloud migration", requester()).unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::copy(
            paths::intake_manifest(dir.path(), &intake.id),
            outside.join(paths::MANIFEST_FILE),
        )
        .unwrap();

        assert!(matches!(
            SystemIntake::load(dir.path(), "../../outside"),
            Err(EasiError::InvalidValue(_))
        ));
    }

    #[test]
    fn list_skips_badly_named_directories() {
        let dir = TempDir::new().unwrap();
        init(&dir);
        SystemIntake::create(dir.path(), "Cloud migration", requester()).unwrap();
        std::fs::create_dir_all(paths::intakes_dir(dir.path()).join(".scratch")).unwrap();
        assert_eq!(SystemIntake::list(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn list_is_in_creation_order() {
        let dir = TempDir::new().unwrap();
        init(&dir);
        let a = SystemIntake::create(dir.path(), "first", requester()).unwrap();
        let b = SystemIntake::create(dir.path(), "second", requester()).unwrap();
        let ids: Vec<String> = SystemIntake::list(dir.path())
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, [a.id, b.id]);
    }

    #[test]
    fn new_intake_is_on_intake_form() {
        let intake = SystemIntake::new("x", requester());
        assert_eq!(intake.current_stage(), Some(TaskStage::IntakeForm));
        assert_eq!(intake.edits_requested(), None);
    }

    #[test]
    fn closed_intake_has_no_current_stage() {
        let mut intake = SystemIntake::new("x", requester());
        intake.state = IntakeState::Closed;
        assert_eq!(intake.current_stage(), None);
    }

    #[test]
    fn edits_requested_finds_business_case() {
        let mut intake = SystemIntake::new("x", requester());
        intake.set_step_status(TaskStage::DraftBusinessCase, StepStatus::EditsRequested);
        assert_eq!(intake.edits_requested(), Some(TaskStage::DraftBusinessCase));
    }

    #[test]
    fn recipient_candidates_dedupe_requester() {
        let mut intake = SystemIntake::new("x", requester());
        intake.contacts.push(Contact {
            name: "Ada again".to_string(),
            email: "ADA@example.gov".to_string(),
            role: None,
        });
        intake.contacts.push(Contact {
            name: "Bo ISSO".to_string(),
            email: "bo@example.gov".to_string(),
            role: Some("ISSO".to_string()),
        });
        let emails: Vec<&str> = intake
            .recipient_candidates()
            .iter()
            .map(|c| c.email.as_str())
            .collect();
        assert_eq!(emails, ["ada@example.gov", "bo@example.gov"]);
    }

    #[test]
    fn history_is_capped() {
        let mut intake = SystemIntake::new("x", requester());
        let mutation = Mutation {
            system_intake_id: intake.id.clone(),
            notification_recipients: None,
            additional_info: None,
            admin_note: None,
            operation: Operation::CloseRequest { reason: None },
        };
        for _ in 0..(HISTORY_LIMIT + 5) {
            intake.record_action(ActionKind::CloseRequest, &mutation);
        }
        assert_eq!(intake.history.len(), HISTORY_LIMIT);
    }
}
