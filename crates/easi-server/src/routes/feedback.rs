use axum::{
    extract::{Path, State},
    Json,
};
use easi_core::feedback::{self, FeedbackRecord};
use easi_core::intake::SystemIntake;
use easi_core::types::{FeedbackTarget, FeedbackType, TaskStage};

use crate::error::AppError;
use crate::state::{lock_writes, AppState};

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/intakes/{id}/feedback: feedback grouped by task-list row, in
/// display order (governance team first, newest first within each type).
pub async fn list_feedback(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let intake = SystemIntake::load(&root, &id)?;
        let groups: Vec<serde_json::Value> = TaskStage::all()
            .iter()
            .filter_map(|&stage| {
                let records = feedback::feedback_for(&intake.feedback, stage);
                (!records.is_empty()).then(|| {
                    serde_json::json!({
                        "stage": stage,
                        "label": stage.label(),
                        "feedback": records.into_iter().map(record_to_json).collect::<Vec<_>>(),
                    })
                })
            })
            .collect();
        Ok::<_, easi_core::EasiError>(serde_json::json!(groups))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
pub struct AddBody {
    pub target_form: String,
    #[serde(default)]
    pub feedback_type: Option<String>,
    pub feedback: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// POST /api/intakes/{id}/feedback: append a feedback record.
pub async fn add_feedback(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let text = body.feedback.trim().to_string();
    if text.is_empty() {
        return Err(AppError::bad_request("feedback must not be empty"));
    }
    let target: FeedbackTarget = body.target_form.parse()?;
    let kind: FeedbackType = match body.feedback_type.as_deref() {
        Some(t) => t.parse()?,
        None => FeedbackType::GovernanceTeam,
    };

    let root = app.root.clone();
    let lock = app.write_lock.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _guard = lock_writes(&lock);
        let mut intake = SystemIntake::load(&root, &id)?;
        let fb_id = feedback::add(&mut intake.feedback, target, kind, text, body.author);
        intake.save(&root)?;
        let record = intake
            .feedback
            .iter()
            .find(|r| r.id == fb_id)
            .map(record_to_json)
            .unwrap_or_default();
        Ok::<_, easi_core::EasiError>(record)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    app.notify();
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record_to_json(r: &FeedbackRecord) -> serde_json::Value {
    serde_json::json!({
        "id": r.id,
        "target_form": r.target_form,
        "feedback_type": r.feedback_type,
        "feedback": r.feedback,
        "author": r.author,
        "created_at": r.created_at,
    })
}
