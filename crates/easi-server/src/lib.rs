pub mod error;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    let app_state = state::AppState::new(root);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Config
        .route("/api/config", get(routes::config::get_config))
        // Intakes
        .route(
            "/api/intakes",
            get(routes::intakes::list_intakes).post(routes::intakes::create_intake),
        )
        .route("/api/intakes/{id}", get(routes::intakes::get_intake))
        .route(
            "/api/intakes/{id}/task-list",
            get(routes::intakes::get_task_list),
        )
        // Feedback
        .route(
            "/api/intakes/{id}/feedback",
            get(routes::feedback::list_feedback).post(routes::feedback::add_feedback),
        )
        // Admin actions
        .route(
            "/api/intakes/{id}/actions",
            get(routes::actions::list_actions),
        )
        .route(
            "/api/intakes/{id}/actions/{action}",
            get(routes::actions::get_action_form).post(routes::actions::submit_action),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Start the API server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root);

    tracing::info!("EASi API server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
