//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiChatAdapter, OpenAiEmbeddingAdapter, PdfExtractAdapter},
    config::{Config, ConfigError, EndpointConfig},
    error::ApiError,
    web::{build_router, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Builds a client for an OpenAI-compatible endpoint.
fn openai_client(endpoint: &EndpointConfig, key_var: &str) -> Result<Client<OpenAIConfig>, ConfigError> {
    let api_key = endpoint
        .api_key
        .as_ref()
        .ok_or_else(|| ConfigError::MissingVar(key_var.to_string()))?;
    let config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(&endpoint.api_base);
    Ok(Client::with_config(config))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received, draining connections...");
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let llm_client = openai_client(&config.llm, "LLM_API_KEY")?;
    let embedding_client = openai_client(&config.embedding, "EMBEDDING_API_KEY")?;

    let generator = Arc::new(
        OpenAiChatAdapter::new(llm_client, config.llm.model.clone())
            .with_sampling(config.llm_temperature, config.llm_max_tokens),
    );
    let embedder = Arc::new(OpenAiEmbeddingAdapter::new(
        embedding_client,
        config.embedding.model.clone(),
        config.embedding_batch_size,
    ));
    let extractor = Arc::new(PdfExtractAdapter::new());
    info!(
        chat_model = %config.llm.model,
        embedding_model = %config.embedding.model,
        "Model adapters ready"
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_adapter,
        embedder,
        generator,
        extractor,
    ));

    // --- 5. Create the Web Router ---
    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|_| {
        ConfigError::InvalidValue(
            "CORS_ORIGIN".to_string(),
            format!("'{}' is not a valid origin", config.cors_origin),
        )
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let app = build_router(app_state).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
