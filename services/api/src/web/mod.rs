pub mod chat_task;
pub mod ingest_task;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use rest::{
    chat_handler, clear_chat_handler, create_session_handler, get_chat_history_handler,
    get_pdfs_handler, health_handler, remove_pdf_handler, session_info_handler,
    upload_pdf_handler, ApiDoc,
};
pub use state::AppState;

/// Builds the application router with every endpoint, request tracing and Swagger UI.
///
/// CORS is left to the caller, since it depends on the deployment. Uploads enforce
/// their size caps per file part, so the upload route carries no body limit.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/create_session", post(create_session_handler))
        .route(
            "/upload_pdf",
            post(upload_pdf_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/get_pdfs/{session_id}", get(get_pdfs_handler))
        .route("/remove_pdf/{session_id}/{pdf_id}", delete(remove_pdf_handler))
        .route("/chat", post(chat_handler))
        .route("/get_chat_history/{session_id}", get(get_chat_history_handler))
        .route("/clear_chat/{session_id}", delete(clear_chat_handler))
        .route("/session_info/{session_id}", get(session_info_handler))
        .route("/health", get(health_handler))
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}
