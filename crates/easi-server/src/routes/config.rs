use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config: read-only view of `.easi/config.yaml` plus its validation warnings.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let config = easi_core::config::Config::load(&root)?;
        let mut json = serde_json::to_value(&config)?;
        json["warnings"] = serde_json::to_value(config.validate())?;
        Ok::<_, easi_core::EasiError>(json)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
