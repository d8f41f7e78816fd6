use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use easi_core::action::fields::{FieldKind, FieldSpec, FormValues};
use easi_core::action::recipients::EmailRecipients;
use easi_core::action::{self, ActionForm, ActionKind, DefaultsSource, SubmitButton};
use easi_core::intake::SystemIntake;
use easi_core::store::{ActionRequest, ActionRun, IntakeStore};
use easi_core::EasiError;

use crate::error::AppError;
use crate::state::{lock_writes, AppState};

// ---------------------------------------------------------------------------
// Action list
// ---------------------------------------------------------------------------

/// GET /api/intakes/{id}/actions: actions available now plus the action history.
pub async fn list_actions(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let intake = SystemIntake::load(&root, &id)?;
        let available: Vec<serde_json::Value> = ActionKind::all()
            .iter()
            .filter(|k| k.is_available(&intake))
            .map(|k| serde_json::json!({ "action": k.slug(), "title": k.title() }))
            .collect();
        Ok::<_, easi_core::EasiError>(serde_json::json!({
            "id": intake.id,
            "available": available,
            "history": intake.history,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Form view
// ---------------------------------------------------------------------------

/// GET /api/intakes/{id}/actions/{action}: the hydrated form: visible
/// fields, default values, recipients, warnings and the confirmation the
/// admin will be asked for on submit, if any.
pub async fn get_action_form(
    State(app): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: ActionKind = action.parse()?;
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let store = IntakeStore::new(&root);
        let ctx = store.load_context(&id, store.today())?;
        let mut form = ActionForm::new(kind, id.clone());
        form.hydrate(Ok(ctx.clone()))?;

        let fields: Vec<serde_json::Value> = form
            .visible_fields()
            .iter()
            .map(|f| field_to_json(f, form.values()))
            .collect();
        let candidates: Vec<serde_json::Value> = ctx
            .intake
            .recipient_candidates()
            .iter()
            .map(|c| serde_json::json!({ "name": c.name, "email": c.email, "role": c.role }))
            .collect();

        Ok::<_, easi_core::EasiError>(serde_json::json!({
            "action": kind.slug(),
            "title": kind.title(),
            "available": kind.is_available(&ctx.intake),
            "phase": form.phase(),
            "can_submit": form.can_submit(),
            "fields": fields,
            "values": form.values(),
            "recipients": form.recipients(),
            "recipient_candidates": candidates,
            "warnings": form.warnings(ctx.today),
            "confirmation": action::confirmation_for(kind, &ctx),
            "existing_lcids": ctx.existing_lcids.iter().map(|l| &l.lcid).collect::<Vec<_>>(),
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    pub values: FormValues,
    #[serde(default)]
    pub recipients: Option<EmailRecipients>,
    #[serde(default = "default_button")]
    pub button: SubmitButton,
    #[serde(default)]
    pub confirmed: bool,
}

fn default_button() -> SubmitButton {
    SubmitButton::Complete
}

/// POST /api/intakes/{id}/actions/{action}: validate, confirm and apply an action.
///
/// 200 with the dispatched mutation, 422 with field errors, 409 with the
/// confirmation modal when one must be accepted first (resend with
/// `confirmed: true`).
pub async fn submit_action(
    State(app): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let kind: ActionKind = action.parse()?;
    let root = app.root.clone();
    let lock = app.write_lock.clone();
    let run = tokio::task::spawn_blocking(move || {
        let _guard = lock_writes(&lock);
        // Surface a missing intake as 404 rather than a failed form.
        SystemIntake::load(&root, &id)?;
        IntakeStore::new(&root).run_action(ActionRequest {
            intake_id: id,
            kind,
            values: body.values,
            recipients: body.recipients,
            button: body.button,
            confirmed: body.confirmed,
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let response = match run {
        ActionRun::Done {
            mutation,
            flash,
            redirect,
        } => {
            app.notify();
            (
                StatusCode::OK,
                serde_json::json!({
                    "mutation": mutation,
                    "message": flash.map(|f| f.text),
                    "redirect": redirect,
                }),
            )
        }
        ActionRun::Invalid { errors } => return Err(EasiError::Validation(errors).into()),
        ActionRun::NeedsConfirmation { title, content } => (
            StatusCode::CONFLICT,
            serde_json::json!({ "confirmation": { "title": title, "content": content } }),
        ),
        ActionRun::Failed { message, retryable } => {
            let status = if retryable {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, serde_json::json!({ "error": message }))
        }
    };
    Ok((response.0, Json(response.1)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn field_to_json(f: &FieldSpec, values: &FormValues) -> serde_json::Value {
    const NO_OPTIONS: &[&str] = &[];
    let (kind, options) = match f.kind {
        FieldKind::Text => ("text", NO_OPTIONS),
        FieldKind::LongText => ("long_text", NO_OPTIONS),
        FieldKind::Date => ("date", NO_OPTIONS),
        FieldKind::Bool => ("bool", NO_OPTIONS),
        FieldKind::Choice(options) => ("choice", options),
    };
    serde_json::json!({
        "name": f.name,
        "label": f.label,
        "kind": kind,
        "options": options,
        "required": f.is_required(values),
        "warn_if_past": f.warn_if_past,
        "value": values.get(f.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use easi_core::action::fields;

    #[test]
    fn choice_field_lists_options() {
        let spec = fields::field(ActionKind::NotApproved, "trbFollowUp").unwrap();
        let json = field_to_json(&spec, &FormValues::new());
        assert_eq!(json["kind"], "choice");
        assert_eq!(json["options"].as_array().unwrap().len(), 3);
        assert_eq!(json["required"], true);
        assert!(json["value"].is_null());
    }

    #[test]
    fn submit_body_defaults_to_complete() {
        let body: SubmitBody = serde_json::from_str(r#"{"values": {"reason": "x"}}"#).unwrap();
        assert_eq!(body.button, SubmitButton::Complete);
        assert!(!body.confirmed);
        assert_eq!(body.values.text("reason"), Some("x"));
    }
}
