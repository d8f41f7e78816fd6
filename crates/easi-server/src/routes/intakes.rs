use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use easi_core::action::recipients::is_valid_email;
use easi_core::feedback;
use easi_core::intake::{Contact, SystemIntake};

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/intakes: all intakes in creation order.
pub async fn list_intakes(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let today = Utc::now().date_naive();
        let intakes = SystemIntake::list(&root)?;
        let list: Vec<serde_json::Value> = intakes.iter().map(|i| summary(i, today)).collect();
        Ok::<_, easi_core::EasiError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// GET /api/intakes/{id}: the full intake plus derived status.
pub async fn get_intake(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let intake = SystemIntake::load(&root, &id)?;
        let today = Utc::now().date_naive();
        let mut json = serde_json::to_value(&intake)?;
        json["current_stage"] = serde_json::to_value(intake.current_stage())?;
        json["lcid_status"] = serde_json::to_value(intake.lcid.as_ref().map(|l| l.status(today)))?;
        Ok::<_, easi_core::EasiError>(json)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
pub struct CreateIntakeBody {
    pub request_name: String,
    pub requester: Contact,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

/// POST /api/intakes: start a new request on the intake form.
pub async fn create_intake(
    State(app): State<AppState>,
    Json(body): Json<CreateIntakeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.request_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("request_name must not be empty"));
    }
    if let Some(bad) = std::iter::once(&body.requester)
        .chain(body.contacts.iter())
        .find(|c| !is_valid_email(&c.email))
    {
        return Err(AppError::bad_request(format!(
            "invalid email address: {}",
            bad.email
        )));
    }

    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut intake = SystemIntake::create(&root, name, body.requester)?;
        if !body.contacts.is_empty() {
            intake.contacts = body.contacts;
            intake.save(&root)?;
        }
        tracing::info!(intake = %intake.id, "created system intake");
        Ok::<_, easi_core::EasiError>(serde_json::to_value(&intake)?)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    app.notify();
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Task list
// ---------------------------------------------------------------------------

/// GET /api/intakes/{id}/task-list: resolved status tag per stage.
pub async fn get_task_list(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let intake = SystemIntake::load(&root, &id)?;
        let tasks = intake.task_list();
        let rows: Vec<serde_json::Value> = tasks
            .rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "stage": row.stage,
                    "label": row.stage.label(),
                    "status": row.status,
                    "status_label": row.status.label(),
                    "dimmed": row.dimmed,
                    "has_feedback": row.has_feedback,
                    "feedback_count": feedback::feedback_for(&intake.feedback, row.stage).len(),
                })
            })
            .collect();
        Ok::<_, easi_core::EasiError>(serde_json::json!({
            "id": intake.id,
            "request_name": intake.request_name,
            "current_stage": intake.current_stage(),
            "rows": rows,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn summary(i: &SystemIntake, today: NaiveDate) -> serde_json::Value {
    serde_json::json!({
        "id": i.id,
        "request_name": i.request_name,
        "requester": i.requester.name,
        "step": i.step,
        "state": i.state,
        "decision_state": i.decision_state,
        "current_stage": i.current_stage(),
        "lcid": i.lcid.as_ref().map(|l| &l.lcid),
        "lcid_status": i.lcid.as_ref().map(|l| l.status(today)),
        "created_at": i.created_at,
    })
}
