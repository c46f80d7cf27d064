//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        OpenAiHomeworkAdapter, OpenAiHttp, OpenAiImageAdapter, OpenAiPracticeAdapter,
        OpenAiRealtimeConnector, OpenAiVideoAdapter, SqliteKeyValueStore,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, mastery_handler, session_handler, signup_handler},
        classroom::{
            add_student_handler, create_assignment_handler, list_assignments_handler,
            remove_student_handler, roster_handler,
        },
        middleware::require_auth,
        rest::{
            create_log_handler, dashboard_handler, delete_log_handler, list_logs_handler,
            options_handler, ApiDoc,
        },
        state::{AppState, ScreenState},
        study::{
            answer_quiz_handler, diagram_handler, homework_handler, next_question_handler,
            start_quiz_handler, start_video_handler, video_content_handler, video_status_handler,
            worksheet_handler,
        },
        ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use lumina_core::{ClassroomStore, CollectionStore, LearningLogStore, SessionManager, SystemClock};
use std::sync::Arc;
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
    info!("Configuration loaded. Starting Lumina...");

    // --- 2. Open Storage & Run Migrations ---
    info!("Opening database at {}...", config.database_url);
    let kv_store = Arc::new(SqliteKeyValueStore::connect(&config.database_url).await?);
    kv_store.run_migrations().await?;
    info!("Database migrations complete.");

    let store = CollectionStore::new(kv_store);
    let clock = Arc::new(SystemClock);

    // --- 3. Initialize Service Adapters ---
    let api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
    let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(api_key.clone()));
    let openai_http = OpenAiHttp::new(api_key.clone());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        sessions: SessionManager::new(store.clone(), clock.clone()),
        logs: LearningLogStore::new(store.clone(), clock.clone()),
        classroom: ClassroomStore::new(store, clock),
        homework: Arc::new(OpenAiHomeworkAdapter::new(
            openai_client.clone(),
            config.text_model.clone(),
        )),
        practice: Arc::new(OpenAiPracticeAdapter::new(
            openai_client,
            openai_http.clone(),
            config.text_model.clone(),
        )),
        diagrams: Arc::new(OpenAiImageAdapter::new(
            openai_http.clone(),
            config.image_model.clone(),
        )),
        videos: Arc::new(OpenAiVideoAdapter::new(openai_http, config.video_model.clone())),
        realtime: Arc::new(OpenAiRealtimeConnector::new(
            api_key,
            config.realtime_model.clone(),
        )),
        screens: ScreenState::default(),
    });

    // Only the local page served alongside this host may call it.
    let origin = format!("http://{}", config.bind_address)
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no signed-in student required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/session", get(session_handler))
        .route("/options", get(options_handler));

    // Protected routes (signed-in student required)
    let protected_routes = Router::new()
        .route("/profile/mastery", put(mastery_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/logs", get(list_logs_handler).post(create_log_handler))
        .route("/logs/{id}", delete(delete_log_handler))
        .route("/homework", post(homework_handler))
        .route("/practice/quiz", post(start_quiz_handler))
        .route("/practice/quiz/answer", post(answer_quiz_handler))
        .route("/practice/quiz/next", post(next_question_handler))
        .route("/practice/worksheet", post(worksheet_handler))
        .route("/diagrams", post(diagram_handler))
        .route("/videos", post(start_video_handler))
        .route("/videos/{id}", get(video_status_handler))
        .route("/videos/{id}/content", get(video_content_handler))
        .route("/classroom/roster", get(roster_handler).post(add_student_handler))
        .route("/classroom/roster/{email}", delete(remove_student_handler))
        .route(
            "/classroom/assignments",
            get(list_assignments_handler).post(create_assignment_handler),
        )
        .route("/tutor/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
