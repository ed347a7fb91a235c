//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{InMemoryJobTypeDirectory, InMemoryResumeService, InMemoryStore, OpenAiOracleAdapter},
    config::Config,
    engine::{EngineConfig, InterviewEngine},
    error::ApiError,
    report_cache::ReportStreamCache,
    web::{
        get_current_question_handler, read_report_handler, rest::ApiDoc, start_report_handler,
        start_session_handler, state::AppState, submit_answer_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let oracle = Arc::new(OpenAiOracleAdapter::new(
        openai_client,
        config.oracle_model.clone(),
    ));

    let store = Arc::new(InMemoryStore::new());
    let resumes = Arc::new(InMemoryResumeService::new());
    let job_types = Arc::new(InMemoryJobTypeDirectory::new());
    job_types.insert("backend", "Backend Engineer").await;
    job_types.insert("frontend", "Frontend Engineer").await;
    job_types.insert("data", "Data Engineer").await;

    // --- 3. Build the Report Cache and its Sweep Task ---
    let reports = Arc::new(ReportStreamCache::new(config.report_expiry));
    let sweep_token = CancellationToken::new();
    tokio::spawn(
        reports
            .clone()
            .run_sweeper(config.report_sweep_interval, sweep_token.clone()),
    );

    // --- 4. Build the Engine and Shared AppState ---
    let engine = Arc::new(InterviewEngine::new(
        oracle,
        store,
        resumes,
        job_types,
        reports,
        EngineConfig {
            question_bank_floor: config.question_bank_floor,
        },
    ));
    let app_state = Arc::new(AppState {
        engine,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/sessions", post(start_session_handler))
        .route("/sessions/{session_id}/question", get(get_current_question_handler))
        .route("/sessions/{session_id}/answers", post(submit_answer_handler))
        .route("/sessions/{session_id}/report", post(start_report_handler))
        .route("/reports/{report_id}", get(read_report_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;
    sweep_token.cancel();

    Ok(())
}
