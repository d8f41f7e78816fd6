use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use easi_core::error::EasiError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(EasiError::InvalidValue(msg.into()).into())
    }
}

fn status_for(e: &EasiError) -> StatusCode {
    match e {
        EasiError::NotInitialized
        | EasiError::InvalidValue(_)
        | EasiError::UnknownField { .. }
        | EasiError::UnknownAction(_) => StatusCode::BAD_REQUEST,
        EasiError::IntakeNotFound(_) | EasiError::LcidNotFound(_) => StatusCode::NOT_FOUND,
        EasiError::InvalidFormPhase { .. } | EasiError::FormBusy | EasiError::NoLcid(_) => {
            StatusCode::CONFLICT
        }
        EasiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EasiError::Io(_) | EasiError::Yaml(_) | EasiError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Some(e) = self.0.downcast_ref::<EasiError>() else {
            let body = serde_json::json!({ "error": self.0.to_string() });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
        };

        let status = status_for(e);
        let body = match e {
            EasiError::Validation(errors) => {
                serde_json::json!({ "error": e.to_string(), "errors": errors })
            }
            _ => serde_json::json!({ "error": e.to_string() }),
        };
        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easi_core::action::fields::ValidationErrors;

    #[test]
    fn intake_not_found_maps_to_404() {
        let err = AppError(EasiError::IntakeNotFound("abc".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_action_maps_to_400() {
        let err = AppError(EasiError::UnknownAction("bogus".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn no_lcid_maps_to_409() {
        let err = AppError(EasiError::NoLcid("abc".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_maps_to_422() {
        let mut errors = ValidationErrors::new();
        errors.insert("reason", "Reason is required");
        let err = AppError(EasiError::Validation(errors).into());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn io_maps_to_500() {
        let err = AppError(EasiError::Io(std::io::Error::other("disk")).into());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("boom"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
