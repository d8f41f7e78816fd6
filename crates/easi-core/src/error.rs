use crate::action::fields::ValidationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EasiError {
    #[error("not initialized: run 'easi init'")]
    NotInitialized,

    #[error("system intake not found: {0}")]
    IntakeNotFound(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unknown field '{field}' for action '{action}'")]
    UnknownField { action: String, field: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action form is {actual}, expected {expected}")]
    InvalidFormPhase { expected: String, actual: String },

    #[error("validation failed on {} field(s)", .0.len())]
    Validation(ValidationErrors),

    #[error("a submission is already in flight")]
    FormBusy,

    #[error("system intake {0} has no life cycle ID")]
    NoLcid(String),

    #[error("life cycle ID not found: {0}")]
    LcidNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EasiError>;
